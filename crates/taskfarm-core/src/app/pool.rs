//! WorkerPool - worker の起動と join
//!
//! manager と同じ in-process world の worker rank ごとに `WorkerLoop` を
//! tokio task として起動する。

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::worker_loop::{WorkerLoop, WorkerSummary};
use crate::domain::{FarmMessage, Rank};
use crate::error::FarmError;
use crate::impls::InMemoryComm;
use crate::ports::{Communicator, TaskFunction};

/// Worker pool handle.
/// - 各 worker は自分の rank で `WorkerLoop` を回す tokio task
/// - 止めるのは manager の `stop_workers()`。pool 側は `join()` で待つだけ
pub struct WorkerPool {
    joins: Vec<(Rank, JoinHandle<Result<WorkerSummary, FarmError>>)>,
}

impl WorkerPool {
    /// Spawn `n_workers` workers on ranks `1..=n_workers` and return the
    /// manager endpoint of the same world.
    pub fn spawn<A, R, F>(
        n_workers: usize,
        capacity: usize,
        func: F,
    ) -> (InMemoryComm<FarmMessage<A, R>>, Self)
    where
        A: Send + 'static,
        R: Send + 'static,
        F: TaskFunction<A, R> + 'static,
    {
        let (manager, workers) = InMemoryComm::with_workers(n_workers, capacity);
        let func = Arc::new(func);

        let mut joins = Vec::with_capacity(n_workers);
        for comm in workers {
            let rank = comm.rank();
            let f = Arc::clone(&func);
            let join = tokio::spawn(WorkerLoop::new(comm, f).run());
            joins.push((rank, join));
        }
        debug!(n_workers, capacity, "worker pool spawned");

        (manager, Self { joins })
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    /// Wait for every worker to return, in rank order.
    ///
    /// Workers only return after receiving `Stop` (or on a protocol or
    /// channel error), so call this after `TaskFarm::stop_workers()`.
    pub async fn join(self) -> Result<Vec<WorkerSummary>, FarmError> {
        let mut summaries = Vec::with_capacity(self.joins.len());
        for (rank, join) in self.joins {
            let summary = join.await.map_err(|e| FarmError::WorkerJoin {
                rank,
                message: e.to_string(),
            })??;
            summaries.push(summary);
        }
        Ok(summaries)
    }

    /// Cancel every worker without waiting for `Stop`.
    pub fn abort(&self) {
        for (rank, join) in &self.joins {
            if !join.is_finished() {
                warn!(%rank, "aborting worker");
                join.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Task, TaskId, TaskResult};
    use crate::error::TaskError;
    use crate::ports::{FnTask, Source};

    type Msg = FarmMessage<u64, u64>;

    fn double() -> FnTask<impl Fn(u64) -> Result<u64, TaskError> + Send + Sync, u64> {
        FnTask::new(|n: u64| Ok::<_, TaskError>(n * 2))
    }

    #[tokio::test]
    async fn spawns_one_worker_per_rank() {
        let (manager, pool) = WorkerPool::spawn(3, 4, double());
        assert_eq!(pool.len(), 3);
        assert_eq!(manager.size(), 4);
        assert!(manager.rank().is_manager());

        for worker in Rank::workers(4) {
            manager.send(Msg::Stop, worker).await.unwrap();
        }
        let summaries = pool.join().await.unwrap();
        let ranks: Vec<_> = summaries.iter().map(|s| s.rank).collect();
        assert_eq!(ranks, Rank::workers(4).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn workers_share_one_function() {
        let (manager, pool) = WorkerPool::spawn(2, 4, double());
        for (i, worker) in Rank::workers(3).enumerate() {
            let msg = Msg::Task(Task::new(TaskId::new(i), 10 + i as u64));
            manager.send(msg, worker).await.unwrap();
        }

        let mut values = Vec::new();
        for _ in 0..2 {
            let env = manager.recv(Source::Any).await.unwrap();
            if let Msg::Result(result) = env.message {
                values.push(*result.value());
            }
        }
        values.sort();
        assert_eq!(values, vec![20, 22]);

        for worker in Rank::workers(3) {
            manager.send(Msg::Stop, worker).await.unwrap();
        }
        pool.join().await.unwrap();
    }

    #[tokio::test]
    async fn join_surfaces_worker_errors() {
        let (manager, pool) = WorkerPool::spawn(1, 4, double());
        manager
            .send(
                Msg::Result(TaskResult::new(Rank::MANAGER, TaskId::new(0), 0)),
                Rank::new(1),
            )
            .await
            .unwrap();

        let err = pool.join().await.unwrap_err();
        assert!(matches!(err, FarmError::Protocol(_)));
    }

    #[tokio::test]
    async fn abort_reports_join_error() {
        let (_manager, pool) = WorkerPool::spawn(2, 4, double());
        pool.abort();
        let err = pool.join().await.unwrap_err();
        assert!(matches!(err, FarmError::WorkerJoin { rank, .. } if rank == Rank::new(1)));
    }
}
