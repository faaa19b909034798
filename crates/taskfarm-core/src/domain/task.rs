//! Task and the ordered registry the manager hands out from.

use serde::{Deserialize, Serialize};

use super::ids::TaskId;

/// One unit of work: an id plus the arguments for the farm's task function.
///
/// `A` plays the role of the (positional, keyword) argument pair; a tuple or
/// a small struct both work as long as it can travel over the channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task<A> {
    id: TaskId,
    args: A,
}

impl<A> Task<A> {
    pub fn new(id: TaskId, args: A) -> Self {
        Self { id, args }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn args(&self) -> &A {
        &self.args
    }

    pub fn into_args(self) -> A {
        self.args
    }
}

/// Ordered, immutable list of tasks indexed by `TaskId`.
///
/// Ids are assigned at construction time from the position of each argument,
/// so they are always dense and start at zero. There is no way to add or
/// remove tasks afterwards; build a new registry for the next batch instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRegistry<A> {
    tasks: Vec<Task<A>>,
}

impl<A> TaskRegistry<A> {
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    pub fn from_args(args: impl IntoIterator<Item = A>) -> Self {
        let tasks = args
            .into_iter()
            .enumerate()
            .map(|(index, args)| Task::new(TaskId::new(index), args))
            .collect();
        Self { tasks }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, task_id: TaskId) -> Option<&Task<A>> {
        self.tasks.get(task_id.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task<A>> {
        self.tasks.iter()
    }
}

impl<A> Default for TaskRegistry<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> FromIterator<A> for TaskRegistry<A> {
    fn from_iter<I: IntoIterator<Item = A>>(iter: I) -> Self {
        Self::from_args(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_follow_insertion_order() {
        let registry = TaskRegistry::from_args(["a", "b", "c"]);
        assert_eq!(registry.len(), 3);
        for (expected, task) in registry.iter().enumerate() {
            assert_eq!(task.id(), TaskId::new(expected));
        }
        assert_eq!(registry.get(TaskId::new(1)).map(|t| *t.args()), Some("b"));
    }

    #[test]
    fn out_of_range_lookup_is_none() {
        let registry: TaskRegistry<u64> = (0..2).collect();
        assert!(registry.get(TaskId::new(2)).is_none());
    }

    #[test]
    fn empty_registry() {
        let registry = TaskRegistry::<(u64, String)>::default();
        assert!(registry.is_empty());
        assert_eq!(registry.iter().count(), 0);
    }
}
