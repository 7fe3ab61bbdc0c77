//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてバッチのライフサイクルを実装します。
//!
//! # 主要コンポーネント
//! - **ControllerBuilder**: コントローラの構築とワイヤリング
//! - **LifecycleController**: enqueue → submit → poll → drain
//! - **Report**: 各操作のバッチ単位の結果

pub mod builder;
pub mod controller;
pub mod report;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, ControllerBuilder};
pub use self::controller::{EnqueueRequest, LifecycleController};
pub use self::report::{
    DrainEntry, DrainReport, EnqueueReport, PollEntry, PollReport, SubmitReport,
};
