//! taskfarm-core
//!
//! Dynamic master-worker task farming: rank 0 hands out tasks one at a time
//! and gives each worker its next task as soon as its previous result comes
//! back.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task, message, outcome）
//! - **ports**: 抽象化レイヤー（Communicator, TaskFunction）
//! - **impls**: 実装（InMemoryComm: tokio channel ベースの world）
//! - **app**: manager / worker / pool / builder
//! - **config**: FarmConfig（TOML + 環境変数）
//! - **error**: FarmError, ProtocolViolation, TaskError

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod ports;

pub use crate::app::{FarmBuilder, LocalFarm, RunReport, TaskFarm, WorkerPool, WorkerSummary};
pub use crate::config::FarmConfig;
pub use crate::domain::{FarmResults, Rank, TaskId, TaskRegistry};
pub use crate::error::{FarmError, ProtocolViolation, TaskError};
pub use crate::ports::{FnTask, TaskFunction};
