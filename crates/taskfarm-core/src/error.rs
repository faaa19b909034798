use thiserror::Error;

use crate::config::ConfigError;
use crate::domain::{Rank, TaskId};
use crate::ports::CommError;

/// Top-level error returned by the manager, the worker loop and the pool.
#[derive(Debug, Error)]
pub enum FarmError {
    #[error("communication error: {0}")]
    Comm(#[from] CommError),

    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),

    #[error("task {task_id} failed on {worker}: {message}")]
    TaskFailed {
        task_id: TaskId,
        worker: Rank,
        message: String,
    },

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("worker {rank} did not finish: {message}")]
    WorkerJoin { rank: Rank, message: String },
}

/// Broken scheduling invariant. The accounting is already wrong when one of
/// these shows up, so callers abandon the run instead of carrying on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    #[error("task farm must run on the manager, not {rank}")]
    NotManager { rank: Rank },

    #[error("{rank} is not a worker in a world of {size} ranks")]
    UnknownWorker { rank: Rank, size: usize },

    #[error("{task_id} is not in the registry ({len} tasks)")]
    UnknownTask { task_id: TaskId, len: usize },

    #[error("{task_id} was already allotted in this batch")]
    AlreadyAllotted { task_id: TaskId },

    #[error("{worker} still holds an outstanding request")]
    WorkerBusy { worker: Rank },

    #[error("{worker} has been stopped")]
    WorkerStopped { worker: Rank },

    #[error("stop was already sent to {worker}")]
    AlreadyStopped { worker: Rank },

    #[error("cannot stop {worker} while it holds an outstanding request")]
    StopWithOutstanding { worker: Rank },

    #[error("cannot start a new batch with {outstanding} requests outstanding")]
    BatchInProgress { outstanding: usize },

    #[error("reply for {task_id} from {worker} does not match an outstanding request")]
    UnexpectedReply { worker: Rank, task_id: TaskId },

    #[error("reply claims to come from {claimed} but was sent by {from}")]
    WorkerMismatch { claimed: Rank, from: Rank },

    #[error("unexpected {kind} message from {from}")]
    UnexpectedMessage { from: Rank, kind: &'static str },
}

/// Error returned by a task function.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct TaskError(String);

impl TaskError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<String> for TaskError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for TaskError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}
