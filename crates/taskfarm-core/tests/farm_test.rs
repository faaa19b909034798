use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use taskfarm_core::{FarmBuilder, FarmError, FnTask, Rank, TaskError, TaskFunction, TaskId};

/// Cubes its argument after a random delay and records which tasks ran.
struct JitteryCube {
    max_delay_ms: u64,
    seen: Mutex<Vec<u64>>,
}

#[async_trait]
impl TaskFunction<u64, u64> for JitteryCube {
    async fn call(&self, n: u64) -> Result<u64, TaskError> {
        let delay = rand::thread_rng().gen_range(0..=self.max_delay_ms);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(n);
        }
        Ok(n * n * n)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn hundred_cubes_with_uneven_finish_order() {
    let func = std::sync::Arc::new(JitteryCube {
        max_delay_ms: 5,
        seen: Mutex::new(Vec::new()),
    });
    let (mut farm, pool) = FarmBuilder::new()
        .workers(3)
        .capacity(2)
        .launch(std::sync::Arc::clone(&func), (0..100u64).collect())
        .unwrap();

    let results = farm.go().await.unwrap();
    assert_eq!(results.len(), 100);
    for (id, cube) in results.sorted() {
        let n = id.index() as u64;
        assert_eq!(*cube, n * n * n);
    }

    let report = farm.last_report().unwrap().clone();
    assert_eq!(report.total_allotted(), 100);
    assert_eq!(report.completed, 100);
    assert!(report.finished_at.is_some());
    assert!(Rank::workers(4).all(|w| report.tasks_for(w) >= 1));

    farm.stop_workers().await.unwrap();
    let summaries = pool.join().await.unwrap();
    assert_eq!(summaries.iter().map(|s| s.tasks_run).sum::<usize>(), 100);
    for summary in &summaries {
        assert_eq!(summary.tasks_run, report.tasks_for(summary.rank));
    }

    // every task ran exactly once
    let seen = func.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 100);
    assert_eq!(seen.into_iter().collect::<HashSet<_>>().len(), 100);
}

#[tokio::test]
async fn more_workers_than_tasks() {
    let (mut farm, pool) = FarmBuilder::new()
        .workers(6)
        .launch(FnTask::new(|n: u64| Ok::<_, TaskError>(n + 1)), (0..2u64).collect())
        .unwrap();

    let results = farm.go().await.unwrap();
    assert_eq!(results.get(TaskId::new(0)), Some(&1));
    assert_eq!(results.get(TaskId::new(1)), Some(&2));

    farm.stop_workers().await.unwrap();
    let summaries = pool.join().await.unwrap();
    let busy: Vec<Rank> = summaries
        .iter()
        .filter(|s| s.tasks_run > 0)
        .map(|s| s.rank)
        .collect();
    assert_eq!(busy, vec![Rank::new(1), Rank::new(2)]);
}

#[tokio::test]
async fn same_pool_runs_several_batches() {
    let (mut farm, pool) = FarmBuilder::new()
        .workers(2)
        .launch(
            FnTask::new(|s: String| Ok::<_, TaskError>(s.len())),
            ["a", "bb", "ccc"].map(String::from).into_iter().collect(),
        )
        .unwrap();

    let first = farm.go().await.unwrap();
    let first_batch = farm.last_report().unwrap().batch;
    assert_eq!(first.get(TaskId::new(2)), Some(&3));

    farm.set_tasks(["dddd"].map(String::from).into_iter().collect())
        .unwrap();
    let second = farm.go().await.unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second.get(TaskId::new(0)), Some(&4));
    assert_ne!(farm.last_report().unwrap().batch, first_batch);

    farm.stop_workers().await.unwrap();
    let summaries = pool.join().await.unwrap();
    assert_eq!(summaries.iter().map(|s| s.tasks_run).sum::<usize>(), 4);
}

#[tokio::test]
async fn task_failure_surfaces_and_pool_still_stops() {
    let (mut farm, pool) = FarmBuilder::new()
        .workers(3)
        .launch(
            FnTask::new(|n: u64| {
                if n == 7 {
                    Err(TaskError::new("unlucky"))
                } else {
                    Ok(n)
                }
            }),
            (0..20u64).collect(),
        )
        .unwrap();

    let err = farm.go().await.unwrap_err();
    match err {
        FarmError::TaskFailed {
            task_id, message, ..
        } => {
            assert_eq!(task_id, TaskId::new(7));
            assert_eq!(message, "unlucky");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(farm.outstanding(), 0);
    assert!(farm.results().len() < 20);

    farm.stop_workers().await.unwrap();
    pool.join().await.unwrap();
}
