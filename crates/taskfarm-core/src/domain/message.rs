//! Messages exchanged between the manager and its workers.
//!
//! Stop is its own variant rather than a reserved task id, so no real task can
//! ever be mistaken for the termination signal.

use serde::{Deserialize, Serialize};

use super::ids::{Rank, TaskId};
use super::task::Task;

/// Everything that travels over the farm's communicator.
///
/// - manager -> worker: `Task`, `Stop`
/// - worker -> manager: `Result`, `Failed`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
pub enum FarmMessage<A, R> {
    Task(Task<A>),
    Stop,
    Result(TaskResult<R>),
    Failed(TaskFailure),
}

impl<A, R> FarmMessage<A, R> {
    /// Short name for logs and protocol errors.
    pub fn kind(&self) -> &'static str {
        match self {
            FarmMessage::Task(_) => "task",
            FarmMessage::Stop => "stop",
            FarmMessage::Result(_) => "result",
            FarmMessage::Failed(_) => "failed",
        }
    }

    /// Split off the worker -> manager variants. Anything else is handed back.
    pub fn into_reply(self) -> Result<Reply<R>, Self> {
        match self {
            FarmMessage::Result(result) => Ok(Reply::Value(result)),
            FarmMessage::Failed(failure) => Ok(Reply::Failed(failure)),
            other => Err(other),
        }
    }
}

/// Value produced by a worker for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult<R> {
    worker_id: Rank,
    task_id: TaskId,
    value: R,
}

impl<R> TaskResult<R> {
    pub fn new(worker_id: Rank, task_id: TaskId, value: R) -> Self {
        Self {
            worker_id,
            task_id,
            value,
        }
    }

    pub fn worker_id(&self) -> Rank {
        self.worker_id
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn value(&self) -> &R {
        &self.value
    }

    pub fn into_value(self) -> R {
        self.value
    }
}

/// Sent instead of a `TaskResult` when the task function returned an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub worker_id: Rank,
    pub task_id: TaskId,
    pub message: String,
}

impl TaskFailure {
    pub fn new(worker_id: Rank, task_id: TaskId, message: impl Into<String>) -> Self {
        Self {
            worker_id,
            task_id,
            message: message.into(),
        }
    }
}

/// A worker's answer to one task, as seen by the manager.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply<R> {
    Value(TaskResult<R>),
    Failed(TaskFailure),
}

impl<R> Reply<R> {
    pub fn worker_id(&self) -> Rank {
        match self {
            Reply::Value(result) => result.worker_id(),
            Reply::Failed(failure) => failure.worker_id,
        }
    }

    pub fn task_id(&self) -> TaskId {
        match self {
            Reply::Value(result) => result.task_id(),
            Reply::Failed(failure) => failure.task_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Msg = FarmMessage<u64, u64>;

    #[test]
    fn stop_is_tagged_without_body() {
        let v = serde_json::to_value(Msg::Stop).unwrap();
        assert_eq!(v, serde_json::json!({ "kind": "stop" }));
    }

    #[test]
    fn task_message_shape() {
        let msg = Msg::Task(Task::new(TaskId::new(4), 9));
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(v["kind"], "task");
        assert_eq!(v["body"]["id"], 4);
        assert_eq!(v["body"]["args"], 9);
    }

    #[test]
    fn into_reply_accepts_only_worker_messages() {
        let ok = Msg::Result(TaskResult::new(Rank::new(1), TaskId::new(0), 8));
        let reply = ok.into_reply().unwrap();
        assert_eq!(reply.worker_id(), Rank::new(1));
        assert_eq!(reply.task_id(), TaskId::new(0));

        let failed = Msg::Failed(TaskFailure::new(Rank::new(2), TaskId::new(3), "boom"));
        assert!(matches!(failed.into_reply(), Ok(Reply::Failed(f)) if f.message == "boom"));

        let stop = Msg::Stop.into_reply().unwrap_err();
        assert_eq!(stop.kind(), "stop");
    }
}
