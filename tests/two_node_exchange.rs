//! §8 scenario 1: two nodes connect over real loopback TCP, exchange a
//! handshake, and deliver one message end to end.

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

fn run_until<C: Callbacks>(
    pools: &mut [&mut NodePool<C>],
    timeout: Duration,
    mut done: impl FnMut(&mut [&mut NodePool<C>]) -> bool,
) {
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        for pool in pools.iter_mut() {
            pool.step(Some(Duration::from_millis(20))).unwrap();
        }
        if done(pools) {
            return;
        }
    }
    panic!("condition not reached within {timeout:?}");
}

#[test]
fn direct_exchange_between_two_nodes() {
    let a_id = NodeId::from_u128(1);
    let b_id = NodeId::from_u128(2);
    let a_addr = loopback(23101);
    let b_addr = loopback(23102);

    let mut pool_a = NodePool::new(a_id, false, Recorder::default());
    let mut pool_b = NodePool::new(b_id, false, Recorder::default());

    let node_a = pool_a.add_node(vec![a_addr]).unwrap();
    let node_b = pool_b.add_node(vec![b_addr]).unwrap();
    pool_a.listen(node_a, 16).unwrap();
    pool_b.listen(node_b, 16).unwrap();

    pool_a.connect_host(node_a, b_addr, false).unwrap();

    run_until(&mut [&mut pool_a, &mut pool_b], Duration::from_secs(5), |pools| {
        !pools[0].callbacks_mut().established.is_empty() && !pools[1].callbacks_mut().established.is_empty()
    });

    assert_eq!(pool_a.callbacks_mut().established, vec![b_id]);
    assert_eq!(pool_b.callbacks_mut().established, vec![a_id]);

    let outcome = pool_a.enqueue_message(b_id, 0xAAAA, 1, b"hi".to_vec());
    assert_eq!(outcome, EnqueueOutcome::Enqueued);

    run_until(&mut [&mut pool_a, &mut pool_b], Duration::from_secs(5), |pools| {
        !pools[1].callbacks_mut().received.is_empty()
    });

    let received = &pool_b.callbacks_mut().received;
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].0, a_id);
    assert_eq!(received[0].1, 1);
    assert_eq!(received[0].2, b"hi");
}
