//! Ports - 抽象化レイヤー
//!
//! The farm core talks to the outside world through two traits:
//! - **Communicator**: message passing between ranks
//! - **TaskFunction**: the work a worker performs on each task

pub mod communicator;
pub mod task_fn;

pub use self::communicator::{CommError, Communicator, Envelope, SendRequest, Source};
pub use self::task_fn::{FnTask, TaskFunction};
