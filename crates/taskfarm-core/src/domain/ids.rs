//! Domain identifiers (strongly-typed IDs).
//!
//! - `TaskId`: dense, 0-based position of a task in its `TaskRegistry`
//! - `Rank`: participant identity inside a communicator world (rank 0 is the manager)
//! - `BatchId`: ULID generated for every `go()` run, used to correlate logs and reports
//!
//! ## Phantom Type パターン
//! `TaskId` と `Rank` はどちらも `usize` だが、`Id<T>` のマーカー型で区別するので
//! 「task id を rank として渡す」ような取り違えはコンパイル時に弾かれる。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"task-", "rank-"）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// Integer identifier tagged with a marker type.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    value: usize,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub const fn new(value: usize) -> Self {
        Self {
            value,
            _marker: PhantomData,
        }
    }

    pub const fn index(&self) -> usize {
        self.value
    }
}

impl<T: IdMarker> From<usize> for Id<T> {
    fn from(value: usize) -> Self {
        Self::new(value)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.value)
    }
}

/// Task のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskIndex {}

impl IdMarker for TaskIndex {
    fn prefix() -> &'static str {
        "task-"
    }
}

/// Process (rank) のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Process {}

impl IdMarker for Process {
    fn prefix() -> &'static str {
        "rank-"
    }
}

/// Identifier of a task within one registry (= its position).
pub type TaskId = Id<TaskIndex>;

/// Identity of a participant in the communicator world.
pub type Rank = Id<Process>;

impl Id<Process> {
    /// The manager is always rank zero.
    pub const MANAGER: Rank = Rank::new(0);

    pub const fn is_manager(&self) -> bool {
        self.value == 0
    }

    /// Worker ranks `1..size` of a world with `size` participants.
    pub fn workers(size: usize) -> impl Iterator<Item = Rank> {
        (1..size).map(Rank::new)
    }
}

/// Identifier of one `go()` run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BatchId(Ulid);

impl BatchId {
    pub fn generate() -> Self {
        Self(Ulid::new())
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "batch-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_marker_prefix() {
        assert_eq!(TaskId::new(3).to_string(), "task-3");
        assert_eq!(Rank::new(1).to_string(), "rank-1");
        assert!(BatchId::generate().to_string().starts_with("batch-"));
    }

    #[test]
    fn manager_is_rank_zero() {
        assert!(Rank::MANAGER.is_manager());
        assert!(!Rank::new(2).is_manager());
        assert_eq!(Rank::MANAGER.index(), 0);
    }

    #[test]
    fn workers_skip_the_manager() {
        let ranks: Vec<usize> = Rank::workers(4).map(|r| r.index()).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
        assert_eq!(Rank::workers(1).count(), 0);
        assert_eq!(Rank::workers(0).count(), 0);
    }

    #[test]
    fn ids_serialize_as_plain_integers() {
        let s = serde_json::to_string(&TaskId::new(7)).unwrap();
        assert_eq!(s, "7");
        let back: Rank = serde_json::from_str("2").unwrap();
        assert_eq!(back, Rank::new(2));
    }

    #[test]
    fn phantom_data_does_not_consume_memory() {
        use std::mem::size_of;
        assert_eq!(size_of::<TaskId>(), size_of::<usize>());
        assert_eq!(size_of::<Rank>(), size_of::<usize>());
    }

    #[test]
    fn batch_ids_are_unique() {
        assert_ne!(BatchId::generate(), BatchId::generate());
    }
}
