//! batchline-core
//!
//! Core building blocks for the batchline job lifecycle manager.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task, batch, outcome, errors）
//! - **ports**: 抽象化レイヤー（TaskStore, BatchRegistry, ResultArchive, BatchClient, など）
//! - **impls**: 実装（JSON ファイル、Anthropic API、テスト用 in-memory）
//! - **app**: アプリケーションロジック（builder, controller, report）
//! - **config**: 設定と API キーの解決

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;

pub use app::{ControllerBuilder, EnqueueRequest, LifecycleController};
pub use config::Config;
pub use domain::{BatchError, Result};
