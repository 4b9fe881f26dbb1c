//! Pluggable pending-message store (§4.I, §6). The default is in-memory;
//! callers may substitute a persistent store behind the same trait.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::node_id::NodeId;

#[derive(Debug, Clone)]
pub struct PendingMessage {
    pub msgid: u128,
    pub seq: u64,
    pub priority: u8,
    pub bytes: Vec<u8>,
    pub next_retry_deadline: Instant,
    pub attempts: u32,
}

pub trait PendingStore {
    fn insert(&mut self, dst: NodeId, msg: PendingMessage);
    fn ack(&mut self, dst: NodeId, msgid: u128) -> Option<PendingMessage>;
    /// Every pending message whose retry deadline has passed, with its
    /// `next_retry_deadline` already advanced for the next round.
    fn iterate_due(&mut self, now: Instant, base_timeout: Duration) -> Vec<(NodeId, PendingMessage)>;
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    pending: HashMap<(NodeId, u128), PendingMessage>,
}

impl InMemoryStore {
    pub fn new() -> InMemoryStore {
        InMemoryStore::default()
    }
}

impl PendingStore for InMemoryStore {
    fn insert(&mut self, dst: NodeId, msg: PendingMessage) {
        self.pending.insert((dst, msg.msgid), msg);
    }

    fn ack(&mut self, dst: NodeId, msgid: u128) -> Option<PendingMessage> {
        self.pending.remove(&(dst, msgid))
    }

    fn iterate_due(&mut self, now: Instant, base_timeout: Duration) -> Vec<(NodeId, PendingMessage)> {
        let due_keys: Vec<(NodeId, u128)> = self
            .pending
            .iter()
            .filter(|(_, m)| m.next_retry_deadline <= now)
            .map(|(k, _)| *k)
            .collect();

        let mut due = Vec::with_capacity(due_keys.len());
        for key in due_keys {
            if let Some(msg) = self.pending.get_mut(&key) {
                msg.attempts += 1;
                let backoff = base_timeout * (1u32 << msg.attempts.min(8));
                msg.next_retry_deadline = now + backoff;
                due.push((key.0, msg.clone()));
            }
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nid(v: u128) -> NodeId {
        NodeId::from_u128(v)
    }

    #[test]
    fn insert_then_ack_removes_entry() {
        let mut store = InMemoryStore::new();
        store.insert(nid(1), PendingMessage {
            msgid: 1,
            seq: 0,
            priority: 0,
            bytes: vec![1, 2, 3],
            next_retry_deadline: Instant::now(),
            attempts: 0,
        });
        assert!(store.ack(nid(1), 1).is_some());
        assert!(store.ack(nid(1), 1).is_none());
    }

    #[test]
    fn iterate_due_advances_deadline_and_attempts() {
        let mut store = InMemoryStore::new();
        let now = Instant::now();
        store.insert(nid(1), PendingMessage {
            msgid: 5,
            seq: 0,
            priority: 0,
            bytes: vec![9],
            next_retry_deadline: now,
            attempts: 0,
        });

        let due = store.iterate_due(now, Duration::from_secs(1));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].1.attempts, 1);

        let due_again = store.iterate_due(now, Duration::from_secs(1));
        assert!(due_again.is_empty());
    }
}
