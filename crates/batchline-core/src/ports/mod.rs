//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 各 trait はローカルの永続ストアやリモートのバッチサービスへの
//! インターフェースを提供し、実装の詳細を隠蔽します。
//!
//! # 設計原則
//! - リモートサービスがバッチ状態の正本
//! - ローカルストアはキューとキャッシュと追記専用アーカイブ
//! - テストでは in-memory 実装と差し替え可能

pub mod batch_client;
pub mod batch_registry;
pub mod clock;
pub mod id_generator;
pub mod result_archive;
pub mod state_lock;
pub mod task_store;

// 主要な trait を再エクスポート
pub use self::batch_client::{BatchClient, BatchHandle};
pub use self::batch_registry::BatchRegistry;
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, SequenceIdGenerator, TimestampIdGenerator, UlidGenerator};
pub use self::result_archive::{ArchiveLocation, ResultArchive};
pub use self::state_lock::{StateGuard, StateLock};
pub use self::task_store::TaskStore;
