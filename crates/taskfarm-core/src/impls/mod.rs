//! Impls - port の実装
//!
//! # 含まれる実装
//! - **InMemoryComm**: bounded tokio channels, one inbox per rank

pub mod inmem_comm;

pub use self::inmem_comm::InMemoryComm;
