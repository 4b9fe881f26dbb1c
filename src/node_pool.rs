//! Multiple nodes under one identity; routing table maintenance, gateway
//! forwarding, alive gossip (§4.H).

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use slab::Slab;

use crate::addr::SocketAddress4;
use crate::callbacks::Callbacks;
use crate::config::Config;
use crate::handshake::{DefaultHandshake, Handshake};
use crate::heartbeat::{DefaultHeartbeat, HeartbeatPolicy};
use crate::input_processor::{DefaultInputProcessor, InputProcessor};
use crate::node::{Node, NodeEvent};
use crate::node_id::NodeId;
use crate::packet::{Packet, RouteWay};
use crate::reconnect::{ReconnectionPolicy, TimeoutReconnectionPolicy};

/// Outcome of [`NodePool::enqueue_message`] (§6 library API).
#[derive(Debug, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Enqueued,
    Unreachable,
}

/// Plug-in policies used for every node added to the pool. Defaults mirror
/// §10.E's `Default*`/`Timeout*` choices; swap in the `without_*` variants to
/// assemble a minimal pool.
pub struct Policies {
    pub handshake: Box<dyn Handshake>,
    pub heartbeat: Box<dyn HeartbeatPolicy>,
    pub input_processor: Box<dyn InputProcessor>,
    pub reconnect: Box<dyn ReconnectionPolicy>,
}

impl Policies {
    pub fn from_config(config: &Config) -> Policies {
        Policies {
            handshake: Box::new(DefaultHandshake),
            heartbeat: Box::new(DefaultHeartbeat),
            input_processor: Box::new(DefaultInputProcessor),
            reconnect: Box::new(TimeoutReconnectionPolicy::new(config.reconnect_attempts, config.reconnect_timeout)),
        }
    }
}

/// §4.H: multiple [`Node`]s sharing one `self_id`, routing table, and
/// callback surface.
pub struct NodePool<C: Callbacks> {
    self_id: NodeId,
    is_gateway: bool,
    config: Config,
    nodes: Slab<Node>,
    routing: crate::routing::RoutingTable,
    callbacks: C,
    interrupted: Arc<AtomicBool>,
    last_alive_broadcast: Instant,
    last_unreachable_sent: HashMap<(NodeId, NodeId), Instant>,
}

impl<C: Callbacks> NodePool<C> {
    pub fn new(self_id: NodeId, is_gateway: bool, callbacks: C) -> NodePool<C> {
        NodePool {
            self_id,
            is_gateway,
            config: Config::default(),
            nodes: Slab::new(),
            routing: crate::routing::RoutingTable::new(),
            callbacks,
            interrupted: Arc::new(AtomicBool::new(false)),
            last_alive_broadcast: Instant::now(),
            last_unreachable_sent: HashMap::new(),
        }
    }

    pub fn with_config(mut self, config: Config) -> NodePool<C> {
        self.config = config;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Escape hatch for layers built on top (the reliable-delivery manager
    /// reaches through this to drive its wrapped adapter directly).
    pub fn callbacks_mut(&mut self) -> &mut C {
        &mut self.callbacks
    }

    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        self.interrupted.clone()
    }

    /// Stop [`NodePool::run`] and wake every node currently blocked in
    /// `epoll_wait`, so the stop is observed without waiting out the full
    /// poll interval.
    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
        for (_, node) in self.nodes.iter() {
            if let Err(e) = node.waker().wakeup() {
                log::warn!("failed to wake node {}: {e}", node.local_index);
            }
        }
    }

    /// Add a node bound to `listener_addrs`, using the default policy set
    /// (§10.E). Use [`NodePool::add_node_with_policies`] to customise.
    pub fn add_node(&mut self, listener_addrs: Vec<SocketAddress4>) -> io::Result<usize> {
        let policies = Policies::from_config(&self.config);
        self.add_node_with_policies(listener_addrs, policies)
    }

    pub fn add_node_with_policies(&mut self, listener_addrs: Vec<SocketAddress4>, policies: Policies) -> io::Result<usize> {
        let index = self.nodes.vacant_key();
        let node = Node::new(
            index,
            self.self_id,
            self.is_gateway,
            listener_addrs,
            policies.handshake,
            policies.heartbeat,
            policies.input_processor,
            policies.reconnect,
        )?;
        Ok(self.nodes.insert(node))
    }

    pub fn listen(&mut self, node_index: usize, backlog: i32) -> io::Result<()> {
        self.nodes[node_index].listen(backlog)
    }

    pub fn connect_host(&mut self, node_index: usize, addr: SocketAddress4, behind_nat: bool) -> io::Result<usize> {
        self.nodes[node_index].connect_host(addr, behind_nat)
    }

    fn find_channel_for_peer(&self, peer: NodeId) -> Option<(usize, usize)> {
        for (node_idx, node) in self.nodes.iter() {
            if let Some(channel) = node.established_peer(peer) {
                return Some((node_idx, channel));
            }
        }
        None
    }

    fn self_id_position(&self, gateways: &[NodeId]) -> Option<usize> {
        gateways.iter().position(|id| *id == self.self_id)
    }

    /// §4.H.3 forwarding. `msgid` is opaque to the unreliable core; it is
    /// accepted only so the reliable-delivery manager above can share this
    /// same entry point without the node pool interpreting the field.
    pub fn enqueue_message(&mut self, dst: NodeId, _msgid: u128, priority: u8, bytes: Vec<u8>) -> EnqueueOutcome {
        if dst == self.self_id {
            log::warn!("enqueue_message to self ({dst}) is pathological; dropping");
            return EnqueueOutcome::Unreachable;
        }

        let route = self.routing.get(dst).copied();
        let gateway = route.map(|r| r.gateway).or_else(|| self.routing.default_gateway());
        let Some(gateway) = gateway else {
            self.callbacks.unreachable(self.self_id, self.self_id, dst);
            return EnqueueOutcome::Unreachable;
        };

        let Some((node_idx, channel)) = self.find_channel_for_peer(gateway) else {
            self.callbacks.unreachable(self.self_id, self.self_id, dst);
            return EnqueueOutcome::Unreachable;
        };

        let direct = route.map(|r| r.hops == 0).unwrap_or(false);
        let packet = if direct {
            Packet::DirectData { force_checksum: false, checksum: None, bytes }
        } else {
            Packet::GatewayData { sender: self.self_id, receiver: dst, force_checksum: false, checksum: None, bytes }
        };

        if self.nodes[node_idx].enqueue_on(channel, priority, &packet) {
            EnqueueOutcome::Enqueued
        } else {
            EnqueueOutcome::Unreachable
        }
    }

    /// Advance every node by one poll quantum and apply routing-level
    /// consequences of what they reported (§4.G/§4.H split).
    pub fn step(&mut self, max_wait: Option<Duration>) -> io::Result<usize> {
        let mut count = 0;
        let now = Instant::now();
        let node_indices: Vec<usize> = self.nodes.iter().map(|(i, _)| i).collect();

        for idx in node_indices {
            let events = self.nodes[idx].step(max_wait, &self.config)?;
            count += events.len();
            for event in events {
                self.apply(idx, event, now);
            }
        }

        self.broadcast_alive_if_due(now);
        self.check_expiry(now);

        Ok(count)
    }

    /// Loop [`NodePool::step`] until [`NodePool::interrupt`] is called.
    pub fn run(&mut self, poll_interval: Duration) -> io::Result<()> {
        while !self.interrupted.load(Ordering::SeqCst) {
            self.step(Some(poll_interval))?;
        }
        self.interrupted.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn apply(&mut self, node_idx: usize, event: NodeEvent, now: Instant) {
        match event {
            NodeEvent::ChannelEstablished { peer_id, is_gateway, .. } => {
                self.routing.insert_direct(peer_id, now);
                self.callbacks.channel_established(peer_id, is_gateway);
            }
            NodeEvent::ChannelDestroyed { peer_id, .. } => {
                if let Some(peer_id) = peer_id {
                    self.routing.remove_via(peer_id);
                    self.callbacks.channel_destroyed(peer_id);
                }
            }
            NodeEvent::Alive { channel, peer_id } => self.handle_alive(node_idx, channel, peer_id, now),
            NodeEvent::Unreachable { gw, sender, receiver } => self.handle_unreachable(gw, sender, receiver, now),
            NodeEvent::Route { channel, way, initiator, responder, gateways } => {
                self.handle_route(node_idx, channel, way, initiator, responder, gateways)
            }
            NodeEvent::DirectData { channel, priority, bytes } => {
                if let Some(peer) = self.nodes[node_idx].peer_of(channel) {
                    self.callbacks.message_received(peer, priority, &bytes);
                }
            }
            NodeEvent::GatewayData { channel, priority, sender, receiver, bytes } => {
                self.handle_gateway_data(node_idx, channel, priority, sender, receiver, bytes);
            }
        }
    }

    fn handle_alive(&mut self, node_idx: usize, channel: usize, peer_id: NodeId, now: Instant) {
        if peer_id == self.self_id {
            return;
        }
        let Some(via) = self.nodes[node_idx].peer_of(channel) else { return };
        let via_hops = self.routing.get(via).map(|r| r.hops).unwrap_or(0);
        let hops = via_hops + 1;
        if hops > self.config.max_hops {
            return;
        }

        let first = self.routing.consider(peer_id, via, hops, now);
        if first {
            self.callbacks.node_alive(peer_id);
        }

        if self.is_gateway && hops < self.config.max_hops {
            self.rebroadcast_alive(peer_id, node_idx, channel);
        }
    }

    fn rebroadcast_alive(&mut self, peer_id: NodeId, skip_node: usize, skip_channel: usize) {
        let targets: Vec<(usize, usize)> = self
            .nodes
            .iter()
            .flat_map(|(idx, node)| node.established_channels().map(move |(ch, _, _)| (idx, ch)))
            .filter(|&(idx, ch)| !(idx == skip_node && ch == skip_channel))
            .collect();

        let packet = Packet::Alive { peer_id };
        for (idx, ch) in targets {
            self.nodes[idx].enqueue_on(ch, 0, &packet);
        }
    }

    fn broadcast_alive_if_due(&mut self, now: Instant) {
        if now.duration_since(self.last_alive_broadcast) < self.config.alive_interval {
            return;
        }
        self.last_alive_broadcast = now;

        let packet = Packet::Alive { peer_id: self.self_id };
        let targets: Vec<(usize, usize)> = self
            .nodes
            .iter()
            .flat_map(|(idx, node)| node.established_channels().map(move |(ch, _, _)| (idx, ch)))
            .collect();
        for (idx, ch) in targets {
            self.nodes[idx].enqueue_on(ch, 0, &packet);
        }
    }

    fn check_expiry(&mut self, now: Instant) {
        let deadline = now.checked_sub(self.config.alive_timeout).unwrap_or(now);
        let expired: Vec<NodeId> = self
            .routing
            .destinations()
            .filter(|d| self.routing.get(*d).map(|r| r.hops > 0 && r.mtime < deadline).unwrap_or(false))
            .collect();

        for dest in expired {
            self.routing.remove(dest);
            self.callbacks.node_expired(dest);
        }
    }

    /// Rate-limited per `(sender, receiver)` to at most once per second (§4.H).
    fn handle_unreachable(&mut self, gw: NodeId, sender: NodeId, receiver: NodeId, now: Instant) {
        if sender == self.self_id {
            self.callbacks.unreachable(gw, sender, receiver);
            return;
        }

        let key = (sender, receiver);
        if let Some(last) = self.last_unreachable_sent.get(&key) {
            if now.duration_since(*last) < Duration::from_secs(1) {
                return;
            }
        }
        self.last_unreachable_sent.insert(key, now);

        let packet = Packet::Unreachable { gw, sender, receiver };
        if let Some((node_idx, channel)) = self.find_channel_for_peer(sender) {
            self.nodes[node_idx].enqueue_on(channel, 0, &packet);
        }
    }

    fn handle_gateway_data(&mut self, _node_idx: usize, _channel: usize, priority: u8, sender: NodeId, receiver: NodeId, bytes: Vec<u8>) {
        if receiver == self.self_id {
            self.callbacks.message_received(sender, priority, &bytes);
            return;
        }

        let route = self.routing.get(receiver).copied();
        if let Some(route) = route {
            if let Some((next_idx, next_channel)) = self.find_channel_for_peer(route.gateway) {
                let packet = Packet::GatewayData { sender, receiver, force_checksum: false, checksum: None, bytes };
                self.nodes[next_idx].enqueue_on(next_channel, priority, &packet);
                return;
            }
        }

        // No route forward: route Unreachable back to sender through our own
        // routing table, not back along the channel the packet arrived on —
        // the previous hop is not necessarily sender once there are ≥2
        // gateways on the path.
        let packet = Packet::Unreachable { gw: self.self_id, sender, receiver };
        if let Some((next_idx, next_channel)) = self.find_channel_for_peer(sender) {
            self.nodes[next_idx].enqueue_on(next_channel, 0, &packet);
        }
    }

    /// §4.H.5 route discovery, optional above gossip. Each hop appends its own
    /// id and forwards toward `responder`; the responder replies along the
    /// reverse path (walking `gateways` backward one hop at a time) so the
    /// initiator can install an explicit route.
    fn handle_route(&mut self, node_idx: usize, channel: usize, way: RouteWay, initiator: NodeId, responder: NodeId, mut gateways: Vec<NodeId>) {
        match way {
            RouteWay::Request => {
                if responder == self.self_id {
                    gateways.push(self.self_id);
                    let reply = Packet::Route { way: RouteWay::Response, initiator, responder, gateways };
                    self.nodes[node_idx].enqueue_on(channel, 0, &reply);
                    return;
                }

                gateways.push(self.self_id);
                if let Some((next_idx, next_channel)) = self
                    .routing
                    .get(responder)
                    .and_then(|r| self.find_channel_for_peer(r.gateway))
                {
                    let forward = Packet::Route { way: RouteWay::Request, initiator, responder, gateways };
                    self.nodes[next_idx].enqueue_on(next_channel, 0, &forward);
                }
            }
            RouteWay::Response => {
                if initiator != self.self_id {
                    // Not ours to install; walk `gateways` (the forward path
                    // the request travelled, ending in `responder`) backward
                    // to find the hop we received the request from, and send
                    // the response there. That's the entry just before us in
                    // the list, or `initiator` itself if we're first.
                    let prev_hop = match self.self_id_position(&gateways) {
                        Some(0) | None => initiator,
                        Some(i) => gateways[i - 1],
                    };
                    if let Some((next_idx, next_channel)) = self.find_channel_for_peer(prev_hop) {
                        let forward = Packet::Route { way: RouteWay::Response, initiator, responder, gateways };
                        self.nodes[next_idx].enqueue_on(next_channel, 0, &forward);
                    } else {
                        log::warn!(
                            "route response for {responder} stalled: no channel to prior hop {prev_hop} in path {gateways:?}"
                        );
                    }
                    return;
                }

                if let Some(&first_hop) = gateways.first() {
                    let hops = gateways.len() as u16;
                    self.routing.consider(responder, first_hop, hops, Instant::now());
                }
            }
        }
    }
}
