//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **JsonTaskStore / JsonBatchRegistry**: 状態ディレクトリ上の JSON ファイル
//! - **DirectoryResultArchive**: 1 バッチ 1 ファイルの追記専用アーカイブ
//! - **FileStateLock**: プロセス間の単一ライターロック
//! - **AnthropicBatchClient**: Message Batches API
//! - **InMemory\* / ScriptedBatchClient**: テスト用

pub(crate) mod json_file;

pub mod anthropic;
pub mod archive;
pub mod json_store;
pub mod memory;
pub mod scripted;
pub mod state_lock;

// 主要な型を再エクスポート
pub use self::anthropic::AnthropicBatchClient;
pub use self::archive::DirectoryResultArchive;
pub use self::json_store::{JsonBatchRegistry, JsonTaskStore};
pub use self::memory::{InMemoryBatchRegistry, InMemoryResultArchive, InMemoryTaskStore};
pub use self::scripted::ScriptedBatchClient;
pub use self::state_lock::{FileStateLock, InProcessStateLock};
