//! ResultArchive port - 取得結果の追記専用ストア

use std::fmt;
use std::path::{Path, PathBuf};

use crate::domain::{BatchId, ResultRecord, Result};

/// Where an archived record ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveLocation(PathBuf);

impl ArchiveLocation {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for ArchiveLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// ResultArchive は drain ごとに 1 レコードを保存
///
/// # 設計原則
/// - 追記のみ（上書きしない）
/// - 毎回新しい location を返す
pub trait ResultArchive: Send + Sync {
    /// Persist a record under a never-before-used location.
    fn append(&self, record: &ResultRecord) -> Result<ArchiveLocation>;

    /// An existing record for this batch, if any.
    ///
    /// Lets a retried drain notice that an earlier attempt already archived
    /// the batch before it could be deregistered.
    fn locate(&self, batch_id: &BatchId) -> Result<Option<ArchiveLocation>>;
}
