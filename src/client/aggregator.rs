//! Fan-in of partition sub-responses into one client response.
//!
//! An [`IncrementalResponse`] starts from a template whose topic/partition
//! structure is already complete and whose per-partition values are
//! placeholders. Each sub-response fills exactly one placeholder; when none
//! are left the finished response is delivered once. A partition listed
//! more than once has one placeholder per listing, filled in request order.

use std::collections::{HashMap, VecDeque};
use tokio::sync::oneshot;

use crate::types::PartitionId;

/// A response made of per-partition slots.
pub trait PartitionSlots {
    /// The value that fills one slot.
    type Slot: Clone;

    /// Every partition that has a slot, in response order.
    fn slots(&self) -> Vec<PartitionId>;

    /// Overwrite the slot at `position` in [`slots`](Self::slots) order,
    /// keeping its partition index. Returns false if there is no such slot.
    fn fill(&mut self, position: usize, value: Self::Slot) -> bool;
}

pub struct IncrementalResponse<R: PartitionSlots> {
    response: Option<R>,
    pending: HashMap<PartitionId, VecDeque<usize>>,
    done: Option<oneshot::Sender<R>>,
}

impl<R: PartitionSlots> IncrementalResponse<R> {
    /// Wrap `template`. The receiver resolves with the completed response, or
    /// errors if the response is aborted. A template without partitions
    /// completes immediately.
    pub fn new(template: R) -> (Self, oneshot::Receiver<R>) {
        let (done, receiver) = oneshot::channel();
        let mut pending: HashMap<PartitionId, VecDeque<usize>> = HashMap::new();
        for (position, partition) in template.slots().into_iter().enumerate() {
            pending.entry(partition).or_default().push_back(position);
        }
        let mut response = Self {
            response: Some(template),
            pending,
            done: Some(done),
        };
        response.check_done();
        (response, receiver)
    }

    /// Fill the first open slot for `partition`. Responses for partitions
    /// that are not pending are discarded.
    pub fn add_partition(&mut self, partition: &PartitionId, value: R::Slot) {
        let Some(positions) = self.pending.get_mut(partition) else {
            return;
        };
        let position = positions.pop_front();
        if positions.is_empty() {
            self.pending.remove(partition);
        }
        if let (Some(position), Some(response)) = (position, self.response.as_mut()) {
            if !response.fill(position, value) {
                tracing::warn!(partition = %partition, position, "No slot for pending partition");
            }
        }
        self.check_done();
    }

    /// Fill every open slot for `partition` with `value`.
    pub fn fail_partition(&mut self, partition: &PartitionId, value: R::Slot) {
        let Some(positions) = self.pending.remove(partition) else {
            return;
        };
        if let Some(response) = self.response.as_mut() {
            for position in positions {
                response.fill(position, value.clone());
            }
        }
        self.check_done();
    }

    /// Fill every remaining slot with `value` and deliver now.
    pub fn cancel(&mut self, value: R::Slot) {
        if let Some(response) = self.response.as_mut() {
            for position in self.pending.drain().flat_map(|(_, positions)| positions) {
                response.fill(position, value.clone());
            }
        }
        self.pending.clear();
        self.check_done();
    }

    /// Drop the response without delivering it.
    pub fn abort(&mut self) {
        self.pending.clear();
        self.response = None;
        self.done = None;
    }

    /// True once the response was delivered or aborted.
    pub fn is_settled(&self) -> bool {
        self.done.is_none()
    }

    pub fn is_pending(&self, partition: &PartitionId) -> bool {
        self.pending.contains_key(partition)
    }

    fn check_done(&mut self) {
        if !self.pending.is_empty() {
            return;
        }
        if let (Some(response), Some(done)) = (self.response.take(), self.done.take()) {
            // The requester may have stopped waiting.
            let _ = done.send(response);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Slots are `(topic, index, value)` triples.
    #[derive(Debug, Clone, PartialEq)]
    struct Template(Vec<(String, i32, Option<u32>)>);

    impl Template {
        fn new(partitions: &[(&str, i32)]) -> Self {
            Self(
                partitions
                    .iter()
                    .map(|(topic, index)| (topic.to_string(), *index, None))
                    .collect(),
            )
        }
    }

    impl PartitionSlots for Template {
        type Slot = u32;

        fn slots(&self) -> Vec<PartitionId> {
            self.0
                .iter()
                .map(|(topic, index, _)| PartitionId::new(topic.as_str(), *index))
                .collect()
        }

        fn fill(&mut self, position: usize, value: u32) -> bool {
            match self.0.get_mut(position) {
                Some(slot) => {
                    slot.2 = Some(value);
                    true
                }
                None => false,
            }
        }
    }

    #[tokio::test]
    async fn test_empty_template_completes_immediately() {
        let (response, receiver) = IncrementalResponse::new(Template::new(&[]));
        assert!(response.is_settled());
        assert_eq!(receiver.await.unwrap(), Template(vec![]));
    }

    #[tokio::test]
    async fn test_completes_exactly_once_with_all_slots() {
        let partitions = [("a", 0), ("a", 1), ("b", 0)];
        let (mut response, mut receiver) = IncrementalResponse::new(Template::new(&partitions));

        response.add_partition(&PartitionId::new("b", 0), 3);
        response.add_partition(&PartitionId::new("a", 0), 1);
        assert!(!response.is_settled());
        assert!(receiver.try_recv().is_err());

        response.add_partition(&PartitionId::new("a", 1), 2);
        assert!(response.is_settled());

        // Late and duplicate responses are no-ops.
        response.add_partition(&PartitionId::new("a", 1), 99);
        response.cancel(0);

        let delivered = receiver.await.unwrap();
        assert_eq!(
            delivered.0,
            vec![
                ("a".to_string(), 0, Some(1)),
                ("a".to_string(), 1, Some(2)),
                ("b".to_string(), 0, Some(3)),
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_partition_is_discarded() {
        let (mut response, receiver) = IncrementalResponse::new(Template::new(&[("a", 0)]));
        response.add_partition(&PartitionId::new("a", 7), 1);
        assert!(!response.is_settled());
        response.add_partition(&PartitionId::new("a", 0), 2);
        assert_eq!(receiver.await.unwrap().0[0].2, Some(2));
    }

    #[tokio::test]
    async fn test_cancel_fills_remaining() {
        let (mut response, receiver) =
            IncrementalResponse::new(Template::new(&[("a", 0), ("a", 1)]));
        response.add_partition(&PartitionId::new("a", 0), 5);
        assert!(response.is_pending(&PartitionId::new("a", 1)));
        response.cancel(7);

        let delivered = receiver.await.unwrap();
        assert_eq!(delivered.0[0].2, Some(5));
        assert_eq!(delivered.0[1].2, Some(7));
    }

    #[tokio::test]
    async fn test_repeated_partition_fills_every_slot_in_order() {
        let (mut response, receiver) =
            IncrementalResponse::new(Template::new(&[("a", 0), ("b", 0), ("a", 0)]));
        response.add_partition(&PartitionId::new("a", 0), 1);
        assert!(response.is_pending(&PartitionId::new("a", 0)));
        response.add_partition(&PartitionId::new("b", 0), 2);
        assert!(!response.is_settled());
        response.add_partition(&PartitionId::new("a", 0), 3);

        let delivered = receiver.await.unwrap();
        assert_eq!(
            delivered.0,
            vec![
                ("a".to_string(), 0, Some(1)),
                ("b".to_string(), 0, Some(2)),
                ("a".to_string(), 0, Some(3)),
            ]
        );
    }

    #[tokio::test]
    async fn test_fail_partition_fills_all_of_its_slots() {
        let (mut response, receiver) =
            IncrementalResponse::new(Template::new(&[("a", 0), ("a", 0), ("a", 1)]));
        response.fail_partition(&PartitionId::new("a", 0), 9);
        assert!(!response.is_settled());
        response.add_partition(&PartitionId::new("a", 1), 4);

        let delivered = receiver.await.unwrap();
        assert_eq!(
            delivered.0.iter().map(|(_, _, v)| *v).collect::<Vec<_>>(),
            vec![Some(9), Some(9), Some(4)]
        );
    }

    #[tokio::test]
    async fn test_abort_delivers_nothing() {
        let (mut response, receiver) = IncrementalResponse::new(Template::new(&[("a", 0)]));
        response.abort();
        assert!(response.is_settled());
        response.add_partition(&PartitionId::new("a", 0), 1);
        assert!(receiver.await.is_err());
    }
}
