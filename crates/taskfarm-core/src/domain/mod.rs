//! Domain model (ids, tasks, messages, results).
//!
//! - ids: `TaskId`, `Rank`, `BatchId`
//! - task: `Task`, `TaskRegistry`
//! - message: `FarmMessage` とその中身（`TaskResult`, `TaskFailure`）
//! - outcome: `FarmResults`

pub mod ids;
pub mod message;
pub mod outcome;
pub mod task;

pub use ids::{BatchId, Rank, TaskId};
pub use message::{FarmMessage, Reply, TaskFailure, TaskResult};
pub use outcome::FarmResults;
pub use task::{Task, TaskRegistry};
