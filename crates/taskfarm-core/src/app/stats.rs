//! Run statistics for one `go()` call.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{BatchId, Rank};

/// How a batch was spread over the workers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub batch: BatchId,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Tasks allotted to each worker rank (every rank present, zero if idle).
    pub tasks_per_worker: BTreeMap<Rank, usize>,
    pub completed: usize,
    pub failed: usize,
}

impl RunReport {
    pub fn start(batch: BatchId, n_workers: usize) -> Self {
        Self {
            batch,
            started_at: Utc::now(),
            finished_at: None,
            tasks_per_worker: Rank::workers(n_workers + 1).map(|r| (r, 0)).collect(),
            completed: 0,
            failed: 0,
        }
    }

    pub fn record_allot(&mut self, worker: Rank) {
        *self.tasks_per_worker.entry(worker).or_default() += 1;
    }

    pub fn record_completed(&mut self) {
        self.completed += 1;
    }

    pub fn record_failed(&mut self) {
        self.failed += 1;
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn tasks_for(&self, worker: Rank) -> usize {
        self.tasks_per_worker.get(&worker).copied().unwrap_or(0)
    }

    pub fn total_allotted(&self) -> usize {
        self.tasks_per_worker.values().sum()
    }

    pub fn elapsed(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_worker_starts_at_zero() {
        let report = RunReport::start(BatchId::generate(), 3);
        assert_eq!(report.tasks_per_worker.len(), 3);
        assert!(Rank::workers(4).all(|r| report.tasks_for(r) == 0));
        assert!(!report.tasks_per_worker.contains_key(&Rank::MANAGER));
    }

    #[test]
    fn counts_allotments_and_replies() {
        let mut report = RunReport::start(BatchId::generate(), 2);
        report.record_allot(Rank::new(1));
        report.record_allot(Rank::new(1));
        report.record_allot(Rank::new(2));
        report.record_completed();
        report.record_completed();
        report.record_failed();

        assert_eq!(report.tasks_for(Rank::new(1)), 2);
        assert_eq!(report.total_allotted(), 3);
        assert_eq!((report.completed, report.failed), (2, 1));
        assert!(report.elapsed().is_none());

        report.finish();
        assert!(report.elapsed().is_some_and(|d| d >= chrono::Duration::zero()));
    }

    #[test]
    fn report_serializes_with_rank_keys() {
        let mut report = RunReport::start(BatchId::generate(), 1);
        report.record_allot(Rank::new(1));
        let v = serde_json::to_value(&report).unwrap();
        assert_eq!(v["tasks_per_worker"]["1"], 1);
    }
}
