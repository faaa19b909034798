//! App - アプリケーション層
//!
//! ports を組み合わせて manager / worker の振る舞いを実装します。
//!
//! # 主要コンポーネント
//! - **TaskFarm**: manager 側のスケジューラ（allot → collect → drain）
//! - **WorkerLoop**: worker 側の実行ループ（recv → call → reply）
//! - **WorkerPool**: worker を tokio task として起動・join
//! - **FarmBuilder**: 起動時検証つきのワイヤリング
//! - **RunReport**: 直近の `go()` の配分統計

pub mod builder;
pub mod manager;
pub mod pool;
pub mod stats;
pub mod worker_loop;

// 主要な型を再エクスポート
pub use self::builder::{FarmBuilder, LocalFarm};
pub use self::manager::TaskFarm;
pub use self::pool::WorkerPool;
pub use self::stats::RunReport;
pub use self::worker_loop::{WorkerLoop, WorkerSummary};
