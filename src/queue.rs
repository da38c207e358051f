//! Queue Set (C2).
//!
//! Four FIFO waiting pools (`any`, `male`, `female`, `other`). Each pool is
//! a hand-rolled intrusive doubly linked list (a `HashMap<ConnectionId,
//! Node>` plus head/tail pointers), so `enqueue`, `remove`, and removing an
//! arbitrary eligible waiter found mid-scan are all O(1).

use std::collections::HashMap;

use crate::id::ConnectionId;
use crate::models::{Gender, PreferredGender, Tier, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueBucket {
    Any,
    Male,
    Female,
    Other,
}

impl QueueBucket {
    pub const ALL: [QueueBucket; 4] = [
        QueueBucket::Any,
        QueueBucket::Male,
        QueueBucket::Female,
        QueueBucket::Other,
    ];
}

impl From<Gender> for QueueBucket {
    fn from(gender: Gender) -> Self {
        match gender {
            Gender::Male => QueueBucket::Male,
            Gender::Female => QueueBucket::Female,
            Gender::Other => QueueBucket::Other,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Node {
    prev: Option<ConnectionId>,
    next: Option<ConnectionId>,
}

/// An intrusive FIFO: oldest waiter is `head`, newest is `tail`.
#[derive(Debug, Default)]
struct Fifo {
    nodes: HashMap<ConnectionId, Node>,
    head: Option<ConnectionId>,
    tail: Option<ConnectionId>,
}

impl Fifo {
    fn push_back(&mut self, id: ConnectionId) {
        if self.nodes.contains_key(&id) {
            return;
        }
        let old_tail = self.tail;
        self.nodes.insert(
            id,
            Node {
                prev: old_tail,
                next: None,
            },
        );
        if let Some(old_tail) = old_tail {
            self.nodes.get_mut(&old_tail).expect("tail node must exist").next = Some(id);
        } else {
            self.head = Some(id);
        }
        self.tail = Some(id);
    }

    /// O(1): splice `id` out of the list using its stored prev/next links.
    fn remove(&mut self, id: ConnectionId) -> bool {
        let Some(node) = self.nodes.remove(&id) else {
            return false;
        };

        match node.prev {
            Some(prev) => {
                self.nodes.get_mut(&prev).expect("prev node must exist").next = node.next;
            }
            None => self.head = node.next,
        }

        match node.next {
            Some(next) => {
                self.nodes.get_mut(&next).expect("next node must exist").prev = node.prev;
            }
            None => self.tail = node.prev,
        }

        true
    }

    fn contains(&self, id: ConnectionId) -> bool {
        self.nodes.contains_key(&id)
    }

    fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Oldest-first iteration, used both by the Matcher's scan and by
    /// diagnostics/tests.
    fn iter(&self) -> FifoIter<'_> {
        FifoIter {
            fifo: self,
            current: self.head,
        }
    }
}

struct FifoIter<'a> {
    fifo: &'a Fifo,
    current: Option<ConnectionId>,
}

impl Iterator for FifoIter<'_> {
    type Item = ConnectionId;

    fn next(&mut self) -> Option<ConnectionId> {
        let id = self.current?;
        self.current = self.fifo.nodes.get(&id).and_then(|n| n.next);
        Some(id)
    }
}

/// Every connection_id appears in at most one pool; a membership index
/// makes `remove` O(1) without knowing the bucket ahead of time.
#[derive(Debug, Default)]
pub struct QueueSet {
    buckets: [Fifo; 4],
    membership: HashMap<ConnectionId, QueueBucket>,
}

fn bucket_index(bucket: QueueBucket) -> usize {
    match bucket {
        QueueBucket::Any => 0,
        QueueBucket::Male => 1,
        QueueBucket::Female => 2,
        QueueBucket::Other => 3,
    }
}

impl QueueSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Which bucket a `Waiting` user belongs in.
    pub fn bucket_for(user: &User) -> QueueBucket {
        match (user.tier, user.preferred_gender) {
            (Tier::Premium, PreferredGender::Male) => QueueBucket::Male,
            (Tier::Premium, PreferredGender::Female) => QueueBucket::Female,
            (Tier::Premium, PreferredGender::Other) => QueueBucket::Other,
            _ => QueueBucket::Any,
        }
    }

    /// Idempotent: never places the same connection_id in more than one
    /// pool.
    pub fn enqueue(&mut self, user: &User) {
        if self.membership.contains_key(&user.connection_id) {
            return;
        }
        let bucket = Self::bucket_for(user);
        self.buckets[bucket_index(bucket)].push_back(user.connection_id);
        self.membership.insert(user.connection_id, bucket);
    }

    /// O(1): removes from whichever pool (if any).
    pub fn remove(&mut self, connection_id: ConnectionId) -> bool {
        let Some(bucket) = self.membership.remove(&connection_id) else {
            return false;
        };
        self.buckets[bucket_index(bucket)].remove(connection_id)
    }

    pub fn contains(&self, connection_id: ConnectionId) -> bool {
        self.membership.contains_key(&connection_id)
    }

    pub fn bucket_of(&self, connection_id: ConnectionId) -> Option<QueueBucket> {
        self.membership.get(&connection_id).copied()
    }

    /// Oldest-waiter-first iteration of one pool.
    pub fn iter_bucket(&self, bucket: QueueBucket) -> impl Iterator<Item = ConnectionId> + '_ {
        self.buckets[bucket_index(bucket)].iter()
    }

    pub fn len_bucket(&self, bucket: QueueBucket) -> usize {
        self.buckets[bucket_index(bucket)].len()
    }

    pub fn is_bucket_empty(&self, bucket: QueueBucket) -> bool {
        self.buckets[bucket_index(bucket)].is_empty()
    }

    pub fn total_len(&self) -> usize {
        self.membership.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_user(id: ConnectionId, tier: Tier, preferred: PreferredGender) -> User {
        User::new(
            id,
            format!("user-{id}"),
            "tester".into(),
            Gender::Male,
            25,
            preferred,
            tier,
        )
    }

    #[test]
    fn fifo_order_is_preserved() {
        let mut q = QueueSet::new();
        let a = ConnectionId::generate();
        let b = ConnectionId::generate();
        let c = ConnectionId::generate();
        for id in [a, b, c] {
            q.enqueue(&fake_user(id, Tier::Free, PreferredGender::Any));
        }
        let order: Vec<_> = q.iter_bucket(QueueBucket::Any).collect();
        assert_eq!(order, vec![a, b, c]);
    }

    #[test]
    fn remove_is_idempotent_and_splices_correctly() {
        let mut q = QueueSet::new();
        let a = ConnectionId::generate();
        let b = ConnectionId::generate();
        let c = ConnectionId::generate();
        for id in [a, b, c] {
            q.enqueue(&fake_user(id, Tier::Free, PreferredGender::Any));
        }
        assert!(q.remove(b));
        assert!(!q.remove(b));
        let order: Vec<_> = q.iter_bucket(QueueBucket::Any).collect();
        assert_eq!(order, vec![a, c]);
        assert_eq!(q.total_len(), 2);
    }

    #[test]
    fn enqueue_is_idempotent_never_double_placed() {
        let mut q = QueueSet::new();
        let a = ConnectionId::generate();
        let user = fake_user(a, Tier::Free, PreferredGender::Any);
        q.enqueue(&user);
        q.enqueue(&user);
        assert_eq!(q.total_len(), 1);
        assert_eq!(q.len_bucket(QueueBucket::Any), 1);
    }

    #[test]
    fn premium_specific_preference_buckets_by_preference() {
        let mut q = QueueSet::new();
        let a = ConnectionId::generate();
        q.enqueue(&fake_user(a, Tier::Premium, PreferredGender::Female));
        assert_eq!(q.bucket_of(a), Some(QueueBucket::Female));
        assert!(q.is_bucket_empty(QueueBucket::Any));
    }

    #[test]
    fn free_tier_specific_preference_still_lands_in_any() {
        // User::new already downgrades this, but QueueSet::bucket_for is
        // exercised directly here to pin the invariant at the queue layer too.
        let mut q = QueueSet::new();
        let a = ConnectionId::generate();
        q.enqueue(&fake_user(a, Tier::Free, PreferredGender::Female));
        assert_eq!(q.bucket_of(a), Some(QueueBucket::Any));
    }
}
