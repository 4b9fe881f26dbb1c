//! §8 scenario 6: two simultaneous connect attempts between the same pair of
//! nodes collapse to exactly one established channel per side.

use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;

use meshnet_core::callbacks::Callbacks;
use meshnet_core::node_id::NodeId;
use meshnet_core::node_pool::{EnqueueOutcome, NodePool};
use meshnet_core::SocketAddress4;

#[derive(Default)]
struct Recorder {
    established: Vec<NodeId>,
    received: Vec<(NodeId, u8, Vec<u8>)>,
}

impl Callbacks for Recorder {
    fn channel_established(&mut self, peer: NodeId, _is_gateway: bool) {
        self.established.push(peer);
    }

    fn message_received(&mut self, from: NodeId, priority: u8, bytes: &[u8]) {
        self.received.push((from, priority, bytes.to_vec()));
    }
}

fn loopback(port: u16) -> SocketAddress4 {
    SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, 1), port).into()
}

fn step_both(pool_a: &mut NodePool<Recorder>, pool_b: &mut NodePool<Recorder>, rounds: u32) {
    for _ in 0..rounds {
        pool_a.step(Some(Duration::from_millis(20))).unwrap();
        pool_b.step(Some(Duration::from_millis(20))).unwrap();
    }
}

#[test]
fn two_concurrent_connects_collapse_to_one_channel() {
    let a_id = NodeId::from_u128(11);
    let b_id = NodeId::from_u128(12);
    let a_addr = loopback(23111);
    let b_addr = loopback(23112);

    let mut pool_a = NodePool::new(a_id, false, Recorder::default());
    let mut pool_b = NodePool::new(b_id, false, Recorder::default());

    let node_a = pool_a.add_node(vec![a_addr]).unwrap();
    let node_b = pool_b.add_node(vec![b_addr]).unwrap();
    pool_a.listen(node_a, 16).unwrap();
    pool_b.listen(node_b, 16).unwrap();

    // Two connect attempts to the same peer before either handshake settles.
    pool_a.connect_host(node_a, b_addr, false).unwrap();
    pool_a.connect_host(node_a, b_addr, false).unwrap();

    step_both(&mut pool_a, &mut pool_b, 250);

    assert_eq!(pool_a.callbacks_mut().established, vec![b_id]);
    assert_eq!(pool_b.callbacks_mut().established, vec![a_id]);

    let outcome = pool_a.enqueue_message(b_id, 1, 0, b"still works".to_vec());
    assert_eq!(outcome, EnqueueOutcome::Enqueued);

    step_both(&mut pool_a, &mut pool_b, 250);

    let received = &pool_b.callbacks_mut().received;
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].2, b"still works");
}
