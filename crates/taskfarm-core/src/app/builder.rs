//! FarmBuilder - farm の構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）: worker 0 人や capacity 0 は launch 前に弾く

use super::manager::TaskFarm;
use super::pool::WorkerPool;
use crate::config::{ConfigError, FarmConfig};
use crate::domain::{FarmMessage, TaskRegistry};
use crate::error::FarmError;
use crate::impls::InMemoryComm;
use crate::ports::TaskFunction;

/// A farm whose workers are tokio tasks in this process.
pub type LocalFarm<A, R> = TaskFarm<A, R, InMemoryComm<FarmMessage<A, R>>>;

/// FarmBuilder は manager と worker pool を同じ world で立ち上げる
///
/// # 使用例
/// ```ignore
/// let (mut farm, pool) = FarmBuilder::new()
///     .workers(4)
///     .launch(FnTask::new(cube), (0..100u64).collect())?;
/// let results = farm.go().await?;
/// farm.stop_workers().await?;
/// pool.join().await?;
/// ```
#[derive(Debug, Clone)]
pub struct FarmBuilder {
    workers: usize,
    capacity: usize,
}

impl FarmBuilder {
    pub fn new() -> Self {
        Self::from_config(&FarmConfig::default())
    }

    pub fn from_config(config: &FarmConfig) -> Self {
        Self {
            workers: config.workers,
            capacity: config.channel_capacity,
        }
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Spawn the workers and build the manager over `tasks`.
    ///
    /// # 検証
    /// - workers >= 1
    /// - capacity >= 1
    pub fn launch<A, R, F>(
        self,
        func: F,
        tasks: TaskRegistry<A>,
    ) -> Result<(LocalFarm<A, R>, WorkerPool), FarmError>
    where
        A: Clone + Send + 'static,
        R: Send + 'static,
        F: TaskFunction<A, R> + 'static,
    {
        if self.workers == 0 {
            return Err(ConfigError::Invalid("at least one worker is required".into()).into());
        }
        if self.capacity == 0 {
            return Err(ConfigError::Invalid("channel capacity must be at least 1".into()).into());
        }

        let (comm, pool) = WorkerPool::spawn(self.workers, self.capacity, func);
        let farm = TaskFarm::new(comm, tasks)?;
        Ok((farm, pool))
    }
}

impl Default for FarmBuilder {
    fn default() -> Self {
        Self::new()
    }
}
