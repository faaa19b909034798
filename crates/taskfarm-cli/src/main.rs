//! taskfarm - cube demo on an in-process farm
//!
//! # フロー
//! 1. config を読む（--config / TASKFARM_*）→ CLI 引数で上書き
//! 2. worker pool と manager を起動
//! 3. `go()` で 0..T の立方を計算
//! 4. `stop_workers()` → `join()`
//! 5. `n^3 = v` を task id 順に出力（--json なら JSON）

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use clap::Parser;
use rand::Rng;
use serde::Serialize;
use tracing::info;

use taskfarm_core::domain::FarmMessage;
use taskfarm_core::ports::Communicator;
use taskfarm_core::{
    FarmBuilder, FarmConfig, FarmError, FarmResults, RunReport, TaskError, TaskFarm, TaskFunction,
    WorkerPool, WorkerSummary,
};

// ── CLI ─────────────────────────────────────────────────────────────

/// Dynamic master-worker farm computing n^3 for every task.
#[derive(Parser, Debug)]
#[command(name = "taskfarm", version, about)]
struct Cli {
    /// Path to taskfarm.toml. Without it, defaults plus TASKFARM_* are used.
    #[arg(long, env = "TASKFARM_CONFIG")]
    config: Option<PathBuf>,

    /// Number of worker ranks (overrides config).
    #[arg(long, short = 'w')]
    workers: Option<usize>,

    /// Number of tasks; task n cubes n.
    #[arg(long, short = 't', default_value_t = 100)]
    tasks: u64,

    /// Inbox capacity per rank (overrides config).
    #[arg(long)]
    capacity: Option<usize>,

    /// Upper bound of a random per-task delay, to make finish order uneven.
    #[arg(long, default_value_t = 0)]
    jitter_ms: u64,

    /// Print results and the run report as JSON.
    #[arg(long)]
    json: bool,

    /// Log every allot and collect.
    #[arg(long, short = 'v')]
    verbose: bool,
}

// ── CubeTask ────────────────────────────────────────────────────────

struct CubeTask {
    jitter_ms: u64,
}

#[async_trait]
impl TaskFunction<u64, u64> for CubeTask {
    async fn call(&self, n: u64) -> Result<u64, TaskError> {
        if self.jitter_ms > 0 {
            // ThreadRng is not Send, so draw before the await
            let delay = rand::thread_rng().gen_range(0..=self.jitter_ms);
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        n.checked_pow(3)
            .ok_or_else(|| TaskError::new(format!("{n}^3 overflows u64")))
    }
}

// ── Output ──────────────────────────────────────────────────────────

#[derive(Serialize)]
struct CubeLine {
    n: u64,
    cube: u64,
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    results: Vec<CubeLine>,
    report: Option<&'a RunReport>,
    workers: &'a [WorkerSummary],
}

fn load_config(cli: &Cli) -> anyhow::Result<FarmConfig> {
    let mut config = match &cli.config {
        Some(path) => FarmConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => FarmConfig::from_env()?,
    };
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    if let Some(capacity) = cli.capacity {
        config.channel_capacity = capacity;
    }
    config.verbose |= cli.verbose;
    config.validate()?;
    Ok(config)
}

/// Stop and join the pool after `go()`, then hand back the batch outcome.
///
/// A failed task leaves the farm drained, so the workers are stopped
/// normally. Any other error may leave tasks outstanding; the workers are
/// cancelled and that error is returned as is.
async fn shut_down<A, R, C>(
    farm: &mut TaskFarm<A, R, C>,
    pool: WorkerPool,
    outcome: Result<FarmResults<R>, FarmError>,
) -> anyhow::Result<(FarmResults<R>, Vec<WorkerSummary>)>
where
    A: Clone + Send + 'static,
    R: Send + 'static,
    C: Communicator<FarmMessage<A, R>>,
{
    let outcome = match outcome {
        Err(err) if !matches!(err, FarmError::TaskFailed { .. }) => {
            pool.abort();
            return Err(err.into());
        }
        outcome => outcome,
    };
    farm.stop_workers().await?;
    let summaries = pool.join().await?;
    Ok((outcome?, summaries))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let default_level = if config.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(
        workers = config.workers,
        capacity = config.channel_capacity,
        tasks = cli.tasks,
        "launching farm"
    );

    let func = CubeTask {
        jitter_ms: cli.jitter_ms,
    };
    let (mut farm, pool) = FarmBuilder::from_config(&config).launch(func, (0..cli.tasks).collect())?;

    let outcome = farm.go().await;
    let (results, summaries) = shut_down(&mut farm, pool, outcome).await?;

    let lines: Vec<CubeLine> = results
        .into_sorted()
        .into_iter()
        .filter_map(|(id, cube)| {
            let task = farm.tasks().get(id)?;
            Some(CubeLine {
                n: *task.args(),
                cube,
            })
        })
        .collect();

    if cli.json {
        let output = JsonOutput {
            results: lines,
            report: farm.last_report(),
            workers: &summaries,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    for line in &lines {
        println!("{}^3 = {}", line.n, line.cube);
    }
    for summary in &summaries {
        println!(
            "{}: {} tasks ({} failed)",
            summary.rank, summary.tasks_run, summary.failures
        );
    }
    if let Some(elapsed) = farm.last_report().and_then(RunReport::elapsed) {
        info!(elapsed_ms = elapsed.num_milliseconds(), "batch finished");
    }
    Ok(())
}
