//! Configuration for batchline
//!
//! Loaded from an optional `batchline.json` in the state directory, then
//! adjusted by environment overrides. Every field has a default, so an empty
//! or missing file is valid.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{BatchError, Result};
use crate::impls::json_file::read_json;
use crate::ports::{IdGenerator, TimestampIdGenerator, UlidGenerator};

/// Environment variable overriding the state directory.
pub const STATE_DIR_ENV: &str = "BATCHLINE_STATE_DIR";
/// Environment variable overriding the remote API base URL.
pub const API_URL_ENV: &str = "BATCHLINE_API_URL";
/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

const CONFIG_FILE: &str = "batchline.json";
const AUTH_PROFILE_KEY: &str = "anthropic:default";

/// Remote batch service settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL (default: "https://api.anthropic.com")
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Value of the `anthropic-version` header (default: "2023-06-01")
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Per-request HTTP timeout in seconds (default: 60)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Auth profile file to fall back on when no API key is in the
    /// environment (default: `~/.openclaw/agents/main/agent/auth-profiles.json`)
    #[serde(default)]
    pub auth_profiles: Option<PathBuf>,
}

impl RemoteConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            api_version: default_api_version(),
            request_timeout_secs: default_request_timeout_secs(),
            auth_profiles: None,
        }
    }
}

/// Model selection and generation defaults for new tasks.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model (alias or full id) used when enqueue gives none (default: "sonnet")
    #[serde(default = "default_model")]
    pub default_model: String,

    /// `max_tokens` for every new task (default: 4096)
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Short names accepted by `--model`
    #[serde(default = "default_aliases")]
    pub aliases: BTreeMap<String, String>,
}

impl ModelConfig {
    /// Resolve an alias (or the default) to a full model id. Unknown names
    /// pass through unchanged.
    pub fn resolve(&self, requested: Option<&str>) -> String {
        let name = requested
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.default_model);
        self.aliases
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            max_tokens: default_max_tokens(),
            aliases: default_aliases(),
        }
    }
}

/// How generated task ids look.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskIdStyle {
    /// `task-YYYYmmdd-HHMMSS-<index>`
    #[default]
    Timestamp,
    /// `task-<ULID>`
    Ulid,
}

impl TaskIdStyle {
    pub fn generator(self) -> Arc<dyn IdGenerator> {
        match self {
            TaskIdStyle::Timestamp => Arc::new(TimestampIdGenerator),
            TaskIdStyle::Ulid => Arc::new(UlidGenerator),
        }
    }
}

/// Top-level configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding `batch_tasks/` and `batch_results/`; set from where
    /// the config was loaded, never from the file itself.
    #[serde(skip)]
    pub state_dir: PathBuf,

    #[serde(default)]
    pub remote: RemoteConfig,

    #[serde(default)]
    pub models: ModelConfig,

    #[serde(default)]
    pub task_ids: TaskIdStyle,
}

impl Config {
    /// Load `<state_dir>/batchline.json` (if present) and apply environment
    /// overrides. `state_dir` falls back to `$BATCHLINE_STATE_DIR`, then `.`.
    pub fn load(state_dir: Option<PathBuf>) -> Result<Self> {
        let state_dir = state_dir
            .or_else(|| std::env::var_os(STATE_DIR_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("."));

        let mut config: Config = read_json(&state_dir.join(CONFIG_FILE))?;
        config.state_dir = state_dir;

        if let Ok(url) = std::env::var(API_URL_ENV)
            && !url.trim().is_empty()
        {
            config.remote.api_base_url = url;
        }
        config.validate()?;
        Ok(config)
    }

    /// Configuration rooted at `state_dir` with every default.
    pub fn with_state_dir(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.models.max_tokens == 0 {
            return Err(BatchError::Config("models.max_tokens must be positive".into()));
        }
        if self.models.default_model.trim().is_empty() {
            return Err(BatchError::Config("models.default_model must not be empty".into()));
        }
        if !self.remote.api_base_url.starts_with("http://")
            && !self.remote.api_base_url.starts_with("https://")
        {
            return Err(BatchError::Config(format!(
                "remote.api_base_url must be an http(s) URL, got {:?}",
                self.remote.api_base_url
            )));
        }
        Ok(())
    }

    pub fn tasks_path(&self) -> PathBuf {
        self.state_dir.join("batch_tasks").join("pending.json")
    }

    pub fn active_path(&self) -> PathBuf {
        self.state_dir.join("batch_tasks").join("active.json")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.state_dir.join("batch_tasks").join(".lock")
    }

    pub fn results_dir(&self) -> PathBuf {
        self.state_dir.join("batch_results")
    }

    /// Find the API key.
    ///
    /// Order: `<state_dir>/.env` (never overriding variables already set),
    /// `$ANTHROPIC_API_KEY`, then the `anthropic:default` auth profile.
    pub fn resolve_api_key(&self) -> Result<String> {
        let env_file = self.state_dir.join(".env");
        if env_file.exists()
            && let Err(e) = dotenvy::from_path(&env_file)
        {
            tracing::warn!(path = %env_file.display(), error = %e, "ignoring unreadable .env file");
        }

        if let Ok(key) = std::env::var(API_KEY_ENV)
            && !key.trim().is_empty()
        {
            return Ok(key.trim().to_string());
        }

        let profiles = self
            .remote
            .auth_profiles
            .clone()
            .or_else(default_auth_profiles_path);
        if let Some(path) = profiles
            && let Some(key) = api_key_from_profiles(&path)?
        {
            tracing::debug!(path = %path.display(), "using API key from auth profile");
            return Ok(key);
        }

        Err(BatchError::Config(format!(
            "{API_KEY_ENV} not found; export {API_KEY_ENV}=sk-ant-..."
        )))
    }
}

/// Read `anthropic:default.apiKey` from an auth profile file.
pub fn api_key_from_profiles(path: &Path) -> Result<Option<String>> {
    let profiles: serde_json::Value = read_json(path)?;
    Ok(profiles
        .get(AUTH_PROFILE_KEY)
        .and_then(|p| p.get("apiKey"))
        .and_then(|k| k.as_str())
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string))
}

fn default_auth_profiles_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| {
        home.join(".openclaw")
            .join("agents")
            .join("main")
            .join("agent")
            .join("auth-profiles.json")
    })
}

fn default_api_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_model() -> String {
    "sonnet".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_aliases() -> BTreeMap<String, String> {
    [
        ("opus", "claude-opus-4-5-20250929"),
        ("sonnet", "claude-sonnet-4-5-20250929"),
        ("haiku", "claude-haiku-4-5-20251001"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::default(None, "claude-sonnet-4-5-20250929")]
    #[case::blank(Some("  "), "claude-sonnet-4-5-20250929")]
    #[case::alias(Some("opus"), "claude-opus-4-5-20250929")]
    #[case::full_id(Some("claude-3-haiku-20240307"), "claude-3-haiku-20240307")]
    fn model_aliases_resolve(#[case] requested: Option<&str>, #[case] expected: &str) {
        assert_eq!(ModelConfig::default().resolve(requested), expected);
    }

    #[test]
    fn paths_follow_state_dir_layout() {
        let config = Config::with_state_dir("/srv/agent");
        assert_eq!(
            config.tasks_path(),
            PathBuf::from("/srv/agent/batch_tasks/pending.json")
        );
        assert_eq!(
            config.active_path(),
            PathBuf::from("/srv/agent/batch_tasks/active.json")
        );
        assert_eq!(config.results_dir(), PathBuf::from("/srv/agent/batch_results"));
    }

    #[test]
    fn load_reads_partial_file_and_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{ "models": { "default_model": "haiku" }, "task_ids": "ulid" }"#,
        )
        .unwrap();

        let config = Config::load(Some(dir.path().to_path_buf())).unwrap();
        assert_eq!(config.state_dir, dir.path());
        assert_eq!(config.models.resolve(None), "claude-haiku-4-5-20251001");
        assert_eq!(config.models.max_tokens, 4096);
        assert_eq!(config.task_ids, TaskIdStyle::Ulid);
        assert_eq!(config.remote.request_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn load_without_file_is_all_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(Some(dir.path().to_path_buf())).unwrap();
        assert_eq!(config.task_ids, TaskIdStyle::Timestamp);
        assert_eq!(config.models.default_model, "sonnet");
    }

    #[test]
    fn invalid_values_are_config_errors() {
        let mut config = Config::with_state_dir(".");
        config.models.max_tokens = 0;
        assert!(matches!(config.validate(), Err(BatchError::Config(_))));

        let mut config = Config::with_state_dir(".");
        config.remote.api_base_url = "api.anthropic.com".into();
        assert!(matches!(config.validate(), Err(BatchError::Config(_))));
    }

    #[test]
    fn api_key_is_read_from_default_profile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth-profiles.json");
        std::fs::write(
            &path,
            r#"{ "anthropic:default": { "apiKey": "sk-ant-test" }, "other": {} }"#,
        )
        .unwrap();
        assert_eq!(
            api_key_from_profiles(&path).unwrap().as_deref(),
            Some("sk-ant-test")
        );

        std::fs::write(&path, r#"{ "other": { "apiKey": "x" } }"#).unwrap();
        assert_eq!(api_key_from_profiles(&path).unwrap(), None);

        assert_eq!(
            api_key_from_profiles(&dir.path().join("missing.json")).unwrap(),
            None
        );
    }
}
