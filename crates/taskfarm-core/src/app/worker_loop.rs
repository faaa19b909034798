//! WorkerLoop - タスク実行ループ
//!
//! # フロー
//! 1. manager から 1 件受信（blocking）
//! 2. `Stop` ならループを抜ける（返信しない）
//! 3. TaskFunction 実行 → `Result` または `Failed` を manager へ返信
//! 4. 1 に戻る

use std::marker::PhantomData;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{FarmMessage, Rank, TaskFailure, TaskResult};
use crate::error::{FarmError, ProtocolViolation};
use crate::ports::{Communicator, Envelope, Source, TaskFunction};

/// What one worker did before it was stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSummary {
    pub rank: Rank,
    pub tasks_run: usize,
    pub failures: usize,
}

impl WorkerSummary {
    pub fn new(rank: Rank) -> Self {
        Self {
            rank,
            tasks_run: 0,
            failures: 0,
        }
    }
}

/// Runs on every non-manager rank until the manager sends `Stop`.
pub struct WorkerLoop<A, R, C, F> {
    comm: C,
    func: F,
    _marker: PhantomData<fn(A) -> R>,
}

impl<A, R, C, F> WorkerLoop<A, R, C, F>
where
    A: Send + 'static,
    R: Send + 'static,
    C: Communicator<FarmMessage<A, R>>,
    F: TaskFunction<A, R>,
{
    pub fn new(comm: C, func: F) -> Self {
        Self {
            comm,
            func,
            _marker: PhantomData,
        }
    }

    pub async fn run(self) -> Result<WorkerSummary, FarmError> {
        let rank = self.comm.rank();
        let mut summary = WorkerSummary::new(rank);

        loop {
            let Envelope { source, message } =
                self.comm.recv(Source::Rank(Rank::MANAGER)).await?;

            let task = match message {
                FarmMessage::Task(task) => task,
                FarmMessage::Stop => {
                    debug!(%rank, tasks_run = summary.tasks_run, "received stop");
                    break;
                }
                other => {
                    return Err(ProtocolViolation::UnexpectedMessage {
                        from: source,
                        kind: other.kind(),
                    }
                    .into());
                }
            };

            let task_id = task.id();
            debug!(%rank, %task_id, "running task");
            let reply = match self.func.call(task.into_args()).await {
                Ok(value) => FarmMessage::Result(TaskResult::new(rank, task_id, value)),
                Err(err) => {
                    warn!(%rank, %task_id, error = %err, "task function failed");
                    summary.failures += 1;
                    FarmMessage::Failed(TaskFailure::new(rank, task_id, err.to_string()))
                }
            };
            summary.tasks_run += 1;

            // manager は常に受信待ちなので blocking send で良い
            self.comm.send(reply, Rank::MANAGER).await?;
        }

        Ok(summary)
    }
}
