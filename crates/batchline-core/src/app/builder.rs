//! ControllerBuilder - コントローラの構築とワイヤリング
//!
//! # Fail-fast 設計
//! - ストア・レジストリ・アーカイブは必須
//! - build() 時に不足をまとめて BuildError で返す
//! - リモートクライアントは任意（実際に必要になった操作が Config エラーになる）

use std::sync::Arc;

use super::controller::LifecycleController;
use crate::config::{Config, ModelConfig};
use crate::impls::{
    DirectoryResultArchive, FileStateLock, InMemoryBatchRegistry, InMemoryResultArchive,
    InMemoryTaskStore, InProcessStateLock, JsonBatchRegistry, JsonTaskStore,
};
use crate::ports::{
    BatchClient, BatchRegistry, Clock, IdGenerator, ResultArchive, StateLock, SystemClock,
    TaskStore,
};

/// ControllerBuilder は LifecycleController を構築
///
/// # 使用例
/// ```ignore
/// let controller = ControllerBuilder::from_config(&config)
///     .client(Arc::new(AnthropicBatchClient::new(&config.remote, key)?))
///     .build()?;
/// ```
#[derive(Default)]
pub struct ControllerBuilder {
    tasks: Option<Arc<dyn TaskStore>>,
    registry: Option<Arc<dyn BatchRegistry>>,
    archive: Option<Arc<dyn ResultArchive>>,
    client: Option<Arc<dyn BatchClient>>,
    lock: Option<Arc<dyn StateLock>>,
    clock: Option<Arc<dyn Clock>>,
    models: ModelConfig,
}

/// BuildError はコントローラ構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing components: {0:?}. These must be set before build().")]
    MissingComponents(Vec<&'static str>),
}

impl ControllerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// File-backed stores, archive and lock under `config.state_dir`.
    pub fn from_config(config: &Config) -> Self {
        let ids = config.task_ids.generator();
        Self::new()
            .task_store(Arc::new(JsonTaskStore::new(config.tasks_path(), ids)))
            .batch_registry(Arc::new(JsonBatchRegistry::new(config.active_path())))
            .result_archive(Arc::new(DirectoryResultArchive::new(config.results_dir())))
            .state_lock(Arc::new(FileStateLock::new(config.lock_path())))
            .models(config.models.clone())
    }

    /// Everything in memory; no client.
    pub fn in_memory(ids: Arc<dyn IdGenerator>) -> Self {
        Self::new()
            .task_store(Arc::new(InMemoryTaskStore::new(ids)))
            .batch_registry(Arc::new(InMemoryBatchRegistry::new()))
            .result_archive(Arc::new(InMemoryResultArchive::new()))
    }

    pub fn task_store(mut self, tasks: Arc<dyn TaskStore>) -> Self {
        self.tasks = Some(tasks);
        self
    }

    pub fn batch_registry(mut self, registry: Arc<dyn BatchRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn result_archive(mut self, archive: Arc<dyn ResultArchive>) -> Self {
        self.archive = Some(archive);
        self
    }

    pub fn client(mut self, client: Arc<dyn BatchClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn state_lock(mut self, lock: Arc<dyn StateLock>) -> Self {
        self.lock = Some(lock);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn models(mut self, models: ModelConfig) -> Self {
        self.models = models;
        self
    }

    /// # 検証
    /// - task_store / batch_registry / result_archive が全て設定されているか
    /// - state_lock 未設定ならプロセス内ロック、clock 未設定なら SystemClock
    pub fn build(self) -> Result<LifecycleController, BuildError> {
        let mut missing = Vec::new();
        if self.tasks.is_none() {
            missing.push("task_store");
        }
        if self.registry.is_none() {
            missing.push("batch_registry");
        }
        if self.archive.is_none() {
            missing.push("result_archive");
        }

        match (self.tasks, self.registry, self.archive) {
            (Some(tasks), Some(registry), Some(archive)) => Ok(LifecycleController {
                tasks,
                registry,
                archive,
                client: self.client,
                lock: self
                    .lock
                    .unwrap_or_else(|| Arc::new(InProcessStateLock::new())),
                clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
                models: self.models,
            }),
            _ => Err(BuildError::MissingComponents(missing)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::SequenceIdGenerator;

    #[test]
    fn test_build_in_memory() {
        let controller = ControllerBuilder::in_memory(Arc::new(SequenceIdGenerator::new("t-")))
            .build();
        assert!(controller.is_ok());
    }

    #[test]
    fn test_build_missing_components() {
        let result = ControllerBuilder::new()
            .result_archive(Arc::new(InMemoryResultArchive::new()))
            .build();
        assert!(matches!(
            result,
            Err(BuildError::MissingComponents(missing)) if missing == vec!["task_store", "batch_registry"]
        ));
    }

    #[test]
    fn test_build_from_config_uses_state_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::with_state_dir(dir.path());
        let controller = ControllerBuilder::from_config(&config).build().unwrap();
        assert!(controller.pending().unwrap().is_empty());
        assert!(controller.active().unwrap().is_empty());
    }
}
