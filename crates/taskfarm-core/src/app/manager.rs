//! TaskFarm - manager 側のスケジューラ
//!
//! # フロー（`go()`）
//! 1. 各 worker に最初の task を 1 件ずつ配る（`send_initial_tasks`）
//! 2. 誰かの結果が返るたびに、その worker へ次の task を配る
//! 3. 残りの結果をすべて回収する（drain）
//!
//! Stop は `go()` に含めない。同じ worker 群で複数 batch を回してから
//! `stop_workers()` を呼ぶ。
//!
//! # Invariants
//! - a worker holds at most one outstanding request
//! - `outstanding` equals the number of occupied request slots
//! - no task message is sent to a worker after its stop

use tracing::{debug, info, warn};

use super::stats::RunReport;
use crate::domain::{BatchId, FarmMessage, FarmResults, Rank, Reply, TaskFailure, TaskId, TaskRegistry};
use crate::error::{FarmError, ProtocolViolation};
use crate::ports::{Communicator, Envelope, SendRequest, Source};

/// A send the manager has not reconciled yet, and the task it carried.
struct InFlight {
    task_id: TaskId,
    request: SendRequest,
}

/// Manager side of the farm. Lives on rank 0.
pub struct TaskFarm<A, R, C> {
    comm: C,
    tasks: TaskRegistry<A>,
    n_workers: usize,
    /// Indexed by rank; slot 0 (the manager) stays empty.
    requests: Vec<Option<InFlight>>,
    outstanding: usize,
    allotted: Vec<bool>,
    stopped: Vec<bool>,
    results: FarmResults<R>,
    failure: Option<TaskFailure>,
    report: Option<RunReport>,
}

impl<A, R, C> TaskFarm<A, R, C>
where
    A: Clone + Send + 'static,
    R: Send + 'static,
    C: Communicator<FarmMessage<A, R>>,
{
    pub fn new(comm: C, tasks: TaskRegistry<A>) -> Result<Self, FarmError> {
        let rank = comm.rank();
        if !rank.is_manager() {
            return Err(ProtocolViolation::NotManager { rank }.into());
        }
        let size = comm.size();
        let allotted = vec![false; tasks.len()];
        Ok(Self {
            comm,
            tasks,
            n_workers: size.saturating_sub(1),
            requests: (0..size).map(|_| None).collect(),
            outstanding: 0,
            allotted,
            stopped: vec![false; size],
            results: FarmResults::new(),
            failure: None,
            report: None,
        })
    }

    pub fn n_workers(&self) -> usize {
        self.n_workers
    }

    pub fn n_tasks(&self) -> usize {
        self.tasks.len()
    }

    pub fn tasks(&self) -> &TaskRegistry<A> {
        &self.tasks
    }

    /// Tasks sent but not yet answered.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Results collected so far in the current batch. After a successful
    /// `go()` they have been handed to the caller and this is empty; after a
    /// failed one it holds whatever arrived before the failure.
    pub fn results(&self) -> &FarmResults<R> {
        &self.results
    }

    /// Report of the most recent `go()`.
    pub fn last_report(&self) -> Option<&RunReport> {
        self.report.as_ref()
    }

    pub fn is_stopped(&self, worker: Rank) -> bool {
        self.stopped.get(worker.index()).copied().unwrap_or(false)
    }

    /// Swap in the registry for the next batch.
    pub fn set_tasks(&mut self, tasks: TaskRegistry<A>) -> Result<(), FarmError> {
        self.ensure_idle()?;
        self.allotted = vec![false; tasks.len()];
        self.tasks = tasks;
        self.results = FarmResults::new();
        Ok(())
    }

    /// Send task `task_id` to `worker` without waiting for delivery.
    pub fn allot(&mut self, task_id: TaskId, worker: Rank) -> Result<(), FarmError> {
        let slot = self.worker_slot(worker)?;
        let task = self
            .tasks
            .get(task_id)
            .ok_or(ProtocolViolation::UnknownTask {
                task_id,
                len: self.tasks.len(),
            })?
            .clone();
        if self.allotted[task_id.index()] {
            return Err(ProtocolViolation::AlreadyAllotted { task_id }.into());
        }
        if self.stopped[slot] {
            return Err(ProtocolViolation::WorkerStopped { worker }.into());
        }
        if self.requests[slot].is_some() {
            return Err(ProtocolViolation::WorkerBusy { worker }.into());
        }

        let request = self.comm.isend(FarmMessage::Task(task), worker)?;
        self.requests[slot] = Some(InFlight { task_id, request });
        self.allotted[task_id.index()] = true;
        self.outstanding += 1;
        if let Some(report) = self.report.as_mut() {
            report.record_allot(worker);
        }
        debug!(%task_id, %worker, outstanding = self.outstanding, "allotted task");
        self.check_accounting();
        Ok(())
    }

    /// Wait for the next reply from any worker and reconcile its request.
    ///
    /// Returns the rank that answered, which is idle again.
    pub async fn collect_result(&mut self) -> Result<Rank, FarmError> {
        let Envelope { source, message } = self.comm.recv(Source::Any).await?;
        let reply = message
            .into_reply()
            .map_err(|other| ProtocolViolation::UnexpectedMessage {
                from: source,
                kind: other.kind(),
            })?;
        let (worker, task_id) = (reply.worker_id(), reply.task_id());
        if worker != source {
            return Err(ProtocolViolation::WorkerMismatch {
                claimed: worker,
                from: source,
            }
            .into());
        }

        let slot = self.worker_slot(worker)?;
        let mut in_flight = match self.requests[slot].take() {
            Some(in_flight) if in_flight.task_id == task_id => in_flight,
            other => {
                self.requests[slot] = other;
                return Err(ProtocolViolation::UnexpectedReply { worker, task_id }.into());
            }
        };
        // the reply is here, so the send that carried the task is long done
        let sent = in_flight.request.wait().await;
        self.outstanding -= 1;
        self.check_accounting();
        sent?;

        match reply {
            Reply::Value(result) => {
                debug!(%task_id, %worker, "received result");
                self.results.insert(task_id, result.into_value());
                if let Some(report) = self.report.as_mut() {
                    report.record_completed();
                }
            }
            Reply::Failed(failure) => {
                warn!(%task_id, %worker, error = %failure.message, "task failed");
                if let Some(report) = self.report.as_mut() {
                    report.record_failed();
                }
                self.failure.get_or_insert(failure);
            }
        }
        self.check_accounting();
        Ok(worker)
    }

    /// Hand task `i` to worker `i + 1` for as many pairs as exist.
    pub fn send_initial_tasks(&mut self) -> Result<usize, FarmError> {
        let n_initial = self.n_workers.min(self.tasks.len());
        for index in 0..n_initial {
            self.allot(TaskId::new(index), Rank::new(index + 1))?;
        }
        debug!(n_initial, "initial tasks allotted");
        Ok(n_initial)
    }

    /// Run every task in the registry and return the results.
    ///
    /// When a task function fails, no further tasks are handed out; the
    /// replies already in flight are drained and the first failure is
    /// returned as `FarmError::TaskFailed`. Workers stay alive either way.
    pub async fn go(&mut self) -> Result<FarmResults<R>, FarmError> {
        self.ensure_idle()?;
        let batch = BatchId::generate();
        self.begin_batch(batch);
        info!(%batch, tasks = self.tasks.len(), workers = self.n_workers, "starting batch");

        let n_initial = self.send_initial_tasks()?;

        for index in n_initial..self.tasks.len() {
            let worker = self.collect_result().await?;
            if self.failure.is_some() {
                break;
            }
            self.allot(TaskId::new(index), worker)?;
        }

        while self.outstanding > 0 {
            self.collect_result().await?;
        }

        if let Some(report) = self.report.as_mut() {
            report.finish();
        }

        if let Some(failure) = self.failure.take() {
            warn!(%batch, task_id = %failure.task_id, "batch failed");
            return Err(FarmError::TaskFailed {
                task_id: failure.task_id,
                worker: failure.worker_id,
                message: failure.message,
            });
        }

        info!(%batch, results = self.results.len(), "batch complete");
        Ok(std::mem::take(&mut self.results))
    }

    /// Send `Stop` to one worker.
    pub async fn stop_worker(&mut self, worker: Rank) -> Result<(), FarmError> {
        let slot = self.worker_slot(worker)?;
        if self.stopped[slot] {
            return Err(ProtocolViolation::AlreadyStopped { worker }.into());
        }
        if self.requests[slot].is_some() {
            return Err(ProtocolViolation::StopWithOutstanding { worker }.into());
        }
        self.comm.send(FarmMessage::Stop, worker).await?;
        self.stopped[slot] = true;
        debug!(%worker, "sent stop");
        Ok(())
    }

    /// Send `Stop` to every worker that has not been stopped yet.
    pub async fn stop_workers(&mut self) -> Result<(), FarmError> {
        for worker in Rank::workers(self.n_workers + 1) {
            if !self.is_stopped(worker) {
                self.stop_worker(worker).await?;
            }
        }
        info!(workers = self.n_workers, "all workers stopped");
        Ok(())
    }

    fn begin_batch(&mut self, batch: BatchId) {
        self.allotted = vec![false; self.tasks.len()];
        self.results = FarmResults::new();
        self.failure = None;
        self.report = Some(RunReport::start(batch, self.n_workers));
    }

    fn ensure_idle(&self) -> Result<(), FarmError> {
        if self.outstanding > 0 {
            return Err(ProtocolViolation::BatchInProgress {
                outstanding: self.outstanding,
            }
            .into());
        }
        Ok(())
    }

    fn worker_slot(&self, rank: Rank) -> Result<usize, FarmError> {
        let index = rank.index();
        if index == 0 || index > self.n_workers {
            return Err(ProtocolViolation::UnknownWorker {
                rank,
                size: self.n_workers + 1,
            }
            .into());
        }
        Ok(index)
    }

    fn check_accounting(&self) {
        debug_assert_eq!(
            self.outstanding,
            self.requests.iter().filter(|slot| slot.is_some()).count()
        );
    }
}
