//! Per-model serialisation of selection requests.
//!
//! Only one selection request per model is with the loader at a time. Later
//! requests wait in FIFO order and are dispatched as earlier ones resolve.

use std::collections::{BTreeSet, VecDeque};

/// A change to the server-side selection set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionOp {
    /// Add (`checked`) or remove the keys.
    Set { checked: bool, keys: Vec<String> },
    Replace(Vec<String>),
    Clear,
}

impl SelectionOp {
    /// Apply a confirmed change to the local selection set.
    pub fn apply_to(&self, selections: &mut BTreeSet<String>) {
        match self {
            Self::Set { checked: true, keys } => selections.extend(keys.iter().cloned()),
            Self::Set {
                checked: false,
                keys,
            } => {
                for key in keys {
                    selections.remove(key);
                }
            }
            Self::Replace(keys) => *selections = keys.iter().cloned().collect(),
            Self::Clear => selections.clear(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionTask {
    Load,
    SelectAll,
    Mutate(SelectionOp),
}

/// Result of queueing a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enqueued {
    /// Nothing was in flight; dispatch this task now.
    Dispatch(SelectionTask),
    /// Waiting behind the in-flight request.
    Queued,
    /// An identical load is already waiting; dropped.
    Coalesced,
}

#[derive(Debug, Clone, Default)]
pub struct SelectionQueue {
    in_flight: bool,
    /// Request number of the in-flight task once dispatched.
    in_flight_seq: Option<u64>,
    pending: VecDeque<SelectionTask>,
}

impl SelectionQueue {
    pub fn push(&mut self, task: SelectionTask) -> Enqueued {
        if task == SelectionTask::Load && self.pending.contains(&SelectionTask::Load) {
            return Enqueued::Coalesced;
        }
        if self.in_flight {
            self.pending.push_back(task);
            Enqueued::Queued
        } else {
            self.in_flight = true;
            self.in_flight_seq = None;
            Enqueued::Dispatch(task)
        }
    }

    /// Record the request number the dispatched task went out with.
    pub fn dispatched(&mut self, seq: u64) {
        self.in_flight_seq = Some(seq);
    }

    /// The request numbered `seq` resolved. Returns the next task to
    /// dispatch when that was the in-flight request; any other result
    /// leaves the queue as it is.
    pub fn complete(&mut self, seq: u64) -> Option<SelectionTask> {
        if !self.in_flight || self.in_flight_seq != Some(seq) {
            return None;
        }
        let next = self.pending.pop_front();
        self.in_flight = next.is_some();
        self.in_flight_seq = None;
        next
    }

    pub fn is_idle(&self) -> bool {
        !self.in_flight && self.pending.is_empty()
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_request_waits_for_first() {
        let mut queue = SelectionQueue::default();
        assert_eq!(
            queue.push(SelectionTask::SelectAll),
            Enqueued::Dispatch(SelectionTask::SelectAll)
        );
        queue.dispatched(1);
        assert_eq!(queue.push(SelectionTask::Load), Enqueued::Queued);
        assert_eq!(queue.push(SelectionTask::Load), Enqueued::Coalesced);
        assert_eq!(queue.pending(), 1);

        assert_eq!(queue.complete(1), Some(SelectionTask::Load));
        queue.dispatched(2);
        assert!(!queue.is_idle());
        assert_eq!(queue.complete(2), None);
        assert!(queue.is_idle());
    }

    #[test]
    fn results_of_other_requests_do_not_advance() {
        let mut queue = SelectionQueue::default();
        assert_eq!(
            queue.push(SelectionTask::Load),
            Enqueued::Dispatch(SelectionTask::Load)
        );
        queue.dispatched(7);
        assert_eq!(queue.push(SelectionTask::SelectAll), Enqueued::Queued);

        assert_eq!(queue.complete(6), None);
        assert_eq!(queue.pending(), 1);
        assert_eq!(queue.complete(7), Some(SelectionTask::SelectAll));
    }

    #[test]
    fn set_then_unset_restores_selection() {
        let mut selections = BTreeSet::from(["a".to_string()]);
        let keys = vec!["b".to_string()];
        SelectionOp::Set {
            checked: true,
            keys: keys.clone(),
        }
        .apply_to(&mut selections);
        assert!(selections.contains("b"));
        SelectionOp::Set {
            checked: false,
            keys,
        }
        .apply_to(&mut selections);
        assert_eq!(selections, BTreeSet::from(["a".to_string()]));
    }
}
