//! Reliable delivery on top of the unreliable core (§4.I). Wraps a
//! [`NodePool`] behind an adapter that diverts `message_received` into an
//! inbox this layer drains on every [`ReliableDeliveryManager::step`], so a
//! retry/ack loop can sit above the core without the core knowing about it.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::addr::SocketAddress4;
use crate::callbacks::Callbacks;
use crate::config::Config;
use crate::node_id::NodeId;
use crate::node_pool::{EnqueueOutcome, NodePool};
use crate::reliable::store::{InMemoryStore, PendingMessage, PendingStore};
use crate::reliable::wire::ReliablePacket;

/// User-facing callback surface for the reliable layer: the same topology
/// events as [`Callbacks`], but `message_received` carries the correlation
/// id and delivery/loss are reported separately from the core's generic
/// `message_delivered`/`message_lost` (which the core itself never fires).
pub trait ReliableCallbacks {
    fn channel_established(&mut self, _peer: NodeId, _is_gateway: bool) {}
    fn channel_destroyed(&mut self, _peer: NodeId) {}
    fn node_alive(&mut self, _peer: NodeId) {}
    fn node_expired(&mut self, _peer: NodeId) {}
    fn unreachable(&mut self, _gw: NodeId, _sender: NodeId, _receiver: NodeId) {}
    fn message_received(&mut self, _from: NodeId, _msgid: u128, _priority: u8, _bytes: &[u8]) {}
    fn message_delivered(&mut self, _to: NodeId, _msgid: u128) {}
    fn message_lost(&mut self, _to: NodeId, _msgid: u128) {}
}

struct InboxItem {
    from: NodeId,
    priority: u8,
    bytes: Vec<u8>,
}

/// Implements [`Callbacks`] for the wrapped [`NodePool`], forwarding
/// everything except `message_received`, which carries reliable-layer
/// framing the user never sees directly.
struct CallbackAdapter<U: ReliableCallbacks> {
    inner: U,
    inbox: Rc<RefCell<VecDeque<InboxItem>>>,
}

impl<U: ReliableCallbacks> Callbacks for CallbackAdapter<U> {
    fn channel_established(&mut self, peer: NodeId, is_gateway: bool) {
        self.inner.channel_established(peer, is_gateway);
    }

    fn channel_destroyed(&mut self, peer: NodeId) {
        self.inner.channel_destroyed(peer);
    }

    fn node_alive(&mut self, peer: NodeId) {
        self.inner.node_alive(peer);
    }

    fn node_expired(&mut self, peer: NodeId) {
        self.inner.node_expired(peer);
    }

    fn unreachable(&mut self, gw: NodeId, sender: NodeId, receiver: NodeId) {
        self.inner.unreachable(gw, sender, receiver);
    }

    fn message_received(&mut self, from: NodeId, priority: u8, bytes: &[u8]) {
        self.inbox.borrow_mut().push_back(InboxItem { from, priority, bytes: bytes.to_vec() });
    }
}

/// §4.I: per-destination sequence counters, a dedup window of seen
/// sequence numbers, and a pending-ack store drive retransmission and
/// exactly-once delivery to the local user on top of the gossip/forwarding
/// core.
pub struct ReliableDeliveryManager<U: ReliableCallbacks> {
    node_pool: NodePool<CallbackAdapter<U>>,
    inbox: Rc<RefCell<VecDeque<InboxItem>>>,
    store: InMemoryStore,
    next_seq: HashMap<NodeId, u64>,
    // Sequence numbers already delivered per sender. Grown unboundedly here;
    // a production store would prune by a sliding low-water mark.
    seen: HashMap<NodeId, HashSet<u64>>,
    retry_timeout: Duration,
    max_attempts: u32,
}

impl<U: ReliableCallbacks> ReliableDeliveryManager<U> {
    pub fn new(self_id: NodeId, is_gateway: bool, user: U) -> ReliableDeliveryManager<U> {
        let inbox = Rc::new(RefCell::new(VecDeque::new()));
        let adapter = CallbackAdapter { inner: user, inbox: inbox.clone() };
        ReliableDeliveryManager {
            node_pool: NodePool::new(self_id, is_gateway, adapter),
            inbox,
            store: InMemoryStore::new(),
            next_seq: HashMap::new(),
            seen: HashMap::new(),
            retry_timeout: Duration::from_secs(2),
            max_attempts: 5,
        }
    }

    pub fn with_config(mut self, config: Config) -> ReliableDeliveryManager<U> {
        self.node_pool = self.node_pool.with_config(config);
        self
    }

    pub fn with_retry_policy(mut self, retry_timeout: Duration, max_attempts: u32) -> ReliableDeliveryManager<U> {
        self.retry_timeout = retry_timeout;
        self.max_attempts = max_attempts;
        self
    }

    pub fn add_node(&mut self, listener_addrs: Vec<SocketAddress4>) -> io::Result<usize> {
        self.node_pool.add_node(listener_addrs)
    }

    pub fn listen(&mut self, node_index: usize, backlog: i32) -> io::Result<()> {
        self.node_pool.listen(node_index, backlog)
    }

    pub fn connect_host(&mut self, node_index: usize, addr: SocketAddress4, behind_nat: bool) -> io::Result<usize> {
        self.node_pool.connect_host(node_index, addr, behind_nat)
    }

    pub fn interrupt(&self) {
        self.node_pool.interrupt();
    }

    /// Records the message as pending, assigns it the next sequence number
    /// for `dst`, and sends the first attempt.
    pub fn enqueue_payload(&mut self, dst: NodeId, msgid: u128, priority: u8, bytes: Vec<u8>) -> EnqueueOutcome {
        let seq = {
            let counter = self.next_seq.entry(dst).or_insert(0);
            let seq = *counter;
            *counter += 1;
            seq
        };

        let wire = ReliablePacket::Payload { msgid, seq, priority, bytes: bytes.clone() }.encode();
        let outcome = self.node_pool.enqueue_message(dst, msgid, priority, wire);
        if outcome == EnqueueOutcome::Enqueued {
            self.store.insert(dst, PendingMessage {
                msgid,
                seq,
                priority,
                bytes,
                next_retry_deadline: Instant::now() + self.retry_timeout,
                attempts: 0,
            });
        }
        outcome
    }

    /// One-shot send with no retry tracking (§4.I `ReportPacket`): useful for
    /// telemetry where losing a sample occasionally is fine.
    pub fn send_report(&mut self, dst: NodeId, priority: u8, bytes: Vec<u8>) -> EnqueueOutcome {
        let wire = ReliablePacket::Report { bytes }.encode();
        self.node_pool.enqueue_message(dst, 0, priority, wire)
    }

    pub fn step(&mut self, max_wait: Option<Duration>) -> io::Result<usize> {
        let count = self.node_pool.step(max_wait)?;
        self.drain_inbox();
        self.drive_retries();
        Ok(count)
    }

    pub fn run(&mut self, poll_interval: Duration) -> io::Result<()> {
        loop {
            self.step(Some(poll_interval))?;
        }
    }

    fn drain_inbox(&mut self) {
        let items: Vec<InboxItem> = self.inbox.borrow_mut().drain(..).collect();
        for item in items {
            match ReliablePacket::decode(&item.bytes) {
                Ok(ReliablePacket::Payload { msgid, seq, priority, bytes }) => {
                    let already_seen = self.seen.entry(item.from).or_default().contains(&seq);
                    if !already_seen {
                        self.seen.get_mut(&item.from).unwrap().insert(seq);
                        self.node_pool.callbacks_mut().inner.message_received(item.from, msgid, priority, &bytes);
                    }
                    let ack = ReliablePacket::Ack { msgid }.encode();
                    self.node_pool.enqueue_message(item.from, msgid, 0, ack);
                }
                Ok(ReliablePacket::Report { bytes }) => {
                    self.node_pool.callbacks_mut().inner.message_received(item.from, 0, item.priority, &bytes);
                }
                Ok(ReliablePacket::Ack { msgid }) => {
                    if self.store.ack(item.from, msgid).is_some() {
                        self.node_pool.callbacks_mut().inner.message_delivered(item.from, msgid);
                    }
                }
                Err(e) => log::warn!("malformed reliable packet from {}: {e}", item.from),
            }
        }
    }

    fn drive_retries(&mut self) {
        let now = Instant::now();
        for (dst, msg) in self.store.iterate_due(now, self.retry_timeout) {
            if msg.attempts > self.max_attempts {
                self.store.ack(dst, msg.msgid);
                self.node_pool.callbacks_mut().inner.message_lost(dst, msg.msgid);
                continue;
            }
            let wire = ReliablePacket::Payload { msgid: msg.msgid, seq: msg.seq, priority: msg.priority, bytes: msg.bytes }.encode();
            self.node_pool.enqueue_message(dst, msg.msgid, msg.priority, wire);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        delivered: Vec<(NodeId, u128, Vec<u8>)>,
        acked: Vec<(NodeId, u128)>,
        lost: Vec<(NodeId, u128)>,
    }

    impl ReliableCallbacks for Recorder {
        fn message_received(&mut self, from: NodeId, msgid: u128, _priority: u8, bytes: &[u8]) {
            self.delivered.push((from, msgid, bytes.to_vec()));
        }
        fn message_delivered(&mut self, to: NodeId, msgid: u128) {
            self.acked.push((to, msgid));
        }
        fn message_lost(&mut self, to: NodeId, msgid: u128) {
            self.lost.push((to, msgid));
        }
    }

    fn nid(v: u128) -> NodeId {
        NodeId::from_u128(v)
    }

    #[test]
    fn enqueue_to_unknown_peer_reports_unreachable() {
        let mut mgr = ReliableDeliveryManager::new(nid(1), false, Recorder::default());
        let outcome = mgr.enqueue_payload(nid(2), 7, 0, b"hi".to_vec());
        assert_eq!(outcome, EnqueueOutcome::Unreachable);
    }

    #[test]
    fn payload_wire_round_trip_matches_what_enqueue_payload_sends() {
        let packet = ReliablePacket::Payload { msgid: 7, seq: 0, priority: 1, bytes: b"hi".to_vec() };
        let decoded = ReliablePacket::decode(&packet.encode()).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn sequence_numbers_increment_per_destination() {
        let mut mgr = ReliableDeliveryManager::new(nid(1), false, Recorder::default());
        let dst = nid(2);
        // Both enqueues fail to find a route (no sockets in this test), but
        // the sequence counter still advances before the route lookup.
        mgr.enqueue_payload(dst, 1, 0, b"a".to_vec());
        mgr.enqueue_payload(dst, 2, 0, b"b".to_vec());
        assert_eq!(*mgr.next_seq.get(&dst).unwrap(), 2);
    }
}
