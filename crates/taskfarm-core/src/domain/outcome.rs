//! Collected results of one farm run.
//!
//! Results arrive in completion order, not task order, so they are kept in a
//! keyed map. Anything that needs id order (display, reports) sorts afterwards.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::ids::TaskId;

/// Results of a batch, keyed by task id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FarmResults<R> {
    values: HashMap<TaskId, R>,
}

impl<R> FarmResults<R> {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Record a value. Returns the previous value if the id was already present.
    pub fn insert(&mut self, task_id: TaskId, value: R) -> Option<R> {
        self.values.insert(task_id, value)
    }

    pub fn get(&self, task_id: TaskId) -> Option<&R> {
        self.values.get(&task_id)
    }

    pub fn contains(&self, task_id: TaskId) -> bool {
        self.values.contains_key(&task_id)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TaskId, &R)> {
        self.values.iter().map(|(id, value)| (*id, value))
    }

    /// Entries ordered by task id.
    pub fn sorted(&self) -> Vec<(TaskId, &R)> {
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_by_key(|(id, _)| *id);
        entries
    }

    pub fn into_sorted(self) -> Vec<(TaskId, R)> {
        let mut entries: Vec<_> = self.values.into_iter().collect();
        entries.sort_by_key(|(id, _)| *id);
        entries
    }
}

impl<R> Default for FarmResults<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> FromIterator<(TaskId, R)> for FarmResults<R> {
    fn from_iter<I: IntoIterator<Item = (TaskId, R)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorted_orders_by_task_id() {
        let mut results = FarmResults::new();
        results.insert(TaskId::new(2), "c");
        results.insert(TaskId::new(0), "a");
        results.insert(TaskId::new(1), "b");

        let values: Vec<&str> = results.sorted().into_iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec!["a", "b", "c"]);
    }

    #[test]
    fn insert_reports_duplicates() {
        let mut results = FarmResults::new();
        assert_eq!(results.insert(TaskId::new(0), 1), None);
        assert_eq!(results.insert(TaskId::new(0), 2), Some(1));
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn equality_ignores_insertion_order() {
        let a: FarmResults<u64> = [(TaskId::new(0), 0), (TaskId::new(1), 1)].into_iter().collect();
        let b: FarmResults<u64> = [(TaskId::new(1), 1), (TaskId::new(0), 0)].into_iter().collect();
        assert_eq!(a, b);
    }
}
