//! Owns one local listener set, its pollers, and the peer channels reachable
//! through it (§4.G).

use std::collections::HashMap;
use std::io;
use std::time::{Duration, Instant};

use slab::Slab;

use crate::addr::SocketAddress4;
use crate::channel::{Channel, ChannelState};
use crate::config::{Config, PRIORITY_COUNT};
use crate::handshake::Handshake;
use crate::heartbeat::HeartbeatPolicy;
use crate::input_processor::{InputProcessor, PacketHandlers};
use crate::node_id::NodeId;
use crate::packet::{HandshakeWay, Packet, RouteWay};
use crate::pool::{
    ConnectingOutcome, ConnectingPool, ListenerPool, ReaderOutcome, ReaderPool, WriterOutcome,
    WriterPool,
};
use crate::reconnect::ReconnectionPolicy;
use crate::socket::Socket;

/// What a [`Node::step`] could not resolve locally, handed up to the owning
/// node pool for routing-level handling (§4.G/§4.H split).
#[derive(Debug)]
pub enum NodeEvent {
    ChannelEstablished { channel: usize, peer_id: NodeId, is_gateway: bool },
    ChannelDestroyed { channel: usize, peer_id: Option<NodeId> },
    Alive { channel: usize, peer_id: NodeId },
    Unreachable { gw: NodeId, sender: NodeId, receiver: NodeId },
    Route { channel: usize, way: RouteWay, initiator: NodeId, responder: NodeId, gateways: Vec<NodeId> },
    DirectData { channel: usize, priority: u8, bytes: Vec<u8> },
    GatewayData { channel: usize, priority: u8, sender: NodeId, receiver: NodeId, bytes: Vec<u8> },
}

struct PendingReconnect {
    addr: SocketAddress4,
    behind_nat: bool,
    attempt: u32,
    not_before: Instant,
}

#[derive(Default)]
struct Collector {
    events: Vec<Decoded>,
}

enum Decoded {
    Handshake { peer_id: NodeId, is_gateway: bool, behind_nat: bool, way: HandshakeWay },
    Heartbeat,
    Alive { peer_id: NodeId },
    Unreachable { gw: NodeId, sender: NodeId, receiver: NodeId },
    Route { way: RouteWay, initiator: NodeId, responder: NodeId, gateways: Vec<NodeId> },
    Ddata { priority: u8, bytes: Vec<u8> },
    Gdata { priority: u8, sender: NodeId, receiver: NodeId, bytes: Vec<u8> },
}

impl PacketHandlers for Collector {
    fn on_handshake(&mut self, peer_id: NodeId, is_gateway: bool, behind_nat: bool, way: HandshakeWay) {
        self.events.push(Decoded::Handshake { peer_id, is_gateway, behind_nat, way });
    }

    fn on_heartbeat(&mut self, _health_data: u8) {
        self.events.push(Decoded::Heartbeat);
    }

    fn on_alive(&mut self, peer_id: NodeId) {
        self.events.push(Decoded::Alive { peer_id });
    }

    fn on_unreachable(&mut self, gw: NodeId, sender: NodeId, receiver: NodeId) {
        self.events.push(Decoded::Unreachable { gw, sender, receiver });
    }

    fn on_route(&mut self, way: RouteWay, initiator: NodeId, responder: NodeId, gateways: Vec<NodeId>) {
        self.events.push(Decoded::Route { way, initiator, responder, gateways });
    }

    fn on_ddata(&mut self, priority: u8, bytes: Vec<u8>) {
        self.events.push(Decoded::Ddata { priority, bytes });
    }

    fn on_gdata(&mut self, priority: u8, sender: NodeId, receiver: NodeId, bytes: Vec<u8>) {
        self.events.push(Decoded::Gdata { priority, sender, receiver, bytes });
    }
}

/// §4.G: one `local_index`, its listeners, its pools, and its peer channels.
pub struct Node {
    pub local_index: usize,
    pub self_id: NodeId,
    pub is_gateway: bool,
    listener_addrs: Vec<SocketAddress4>,
    channels: Slab<Channel<PRIORITY_COUNT>>,
    channel_map: HashMap<NodeId, usize>,
    connecting: ConnectingPool,
    listeners: ListenerPool,
    readers: ReaderPool,
    writers: WriterPool,
    handshake: Box<dyn Handshake>,
    heartbeat: Box<dyn HeartbeatPolicy>,
    input_processor: Box<dyn InputProcessor>,
    reconnect_policy: Box<dyn ReconnectionPolicy>,
    pending_reconnects: Vec<PendingReconnect>,
}

impl Node {
    pub fn new(
        local_index: usize,
        self_id: NodeId,
        is_gateway: bool,
        listener_addrs: Vec<SocketAddress4>,
        handshake: Box<dyn Handshake>,
        heartbeat: Box<dyn HeartbeatPolicy>,
        input_processor: Box<dyn InputProcessor>,
        reconnect_policy: Box<dyn ReconnectionPolicy>,
    ) -> io::Result<Node> {
        Ok(Node {
            local_index,
            self_id,
            is_gateway,
            listener_addrs,
            channels: Slab::new(),
            channel_map: HashMap::new(),
            connecting: ConnectingPool::new()?,
            listeners: ListenerPool::new()?,
            readers: ReaderPool::new()?,
            writers: WriterPool::new()?,
            handshake,
            heartbeat,
            input_processor,
            reconnect_policy,
            pending_reconnects: Vec::new(),
        })
    }

    pub fn listen(&mut self, backlog: i32) -> io::Result<()> {
        for addr in self.listener_addrs.clone() {
            self.listeners.bind(self.local_index, addr, backlog)?;
        }
        Ok(())
    }

    pub fn channel(&self, id: usize) -> Option<&Channel<PRIORITY_COUNT>> {
        self.channels.get(id)
    }

    pub fn established_peer(&self, peer_id: NodeId) -> Option<usize> {
        self.channel_map.get(&peer_id).copied()
    }

    /// A handle that wakes a blocked [`Node::step`] from another thread.
    pub fn waker(&self) -> crate::waker::Waker {
        self.readers.waker()
    }

    /// Queue `packet` on `channel`'s priority-0 handshake/control lane.
    fn send_control(&mut self, channel: usize, priority: u8, packet: &Packet) {
        if let Some(ch) = self.channels.get_mut(channel) {
            ch.enqueue(priority, packet.encode());
        }
    }

    /// Begin an outbound connection; `behind_nat` is announced in our own
    /// handshake, not the peer's (§4.E).
    pub fn connect_host(&mut self, addr: SocketAddress4, behind_nat: bool) -> io::Result<usize> {
        let (socket, outcome) = Socket::connect(addr)?;
        let id = self
            .channels
            .insert(Channel::new(self.local_index, addr, socket, ChannelState::Connecting, true));

        match outcome {
            crate::socket::ConnectOutcome::Connected => self.begin_handshake(id, behind_nat)?,
            crate::socket::ConnectOutcome::InProgress => {
                self.connecting.track(id, &self.channels[id])?;
            }
            crate::socket::ConnectOutcome::Failed(reason) => {
                log::debug!("connect to {addr} failed synchronously: {reason:?}");
                self.channels.remove(id);
                self.schedule_reconnect(addr, behind_nat, 1);
            }
        }

        Ok(id)
    }

    fn begin_handshake(&mut self, id: usize, behind_nat: bool) -> io::Result<()> {
        {
            let ch = &mut self.channels[id];
            ch.state = ChannelState::Handshaking;
            ch.behind_nat = behind_nat;
        }
        self.readers.track(id, &self.channels[id])?;
        self.writers.track(id, &self.channels[id])?;
        let request = self.handshake.build_request(self.self_id, self.is_gateway, behind_nat);
        self.send_control(id, 0, &request);
        Ok(())
    }

    fn schedule_reconnect(&mut self, addr: SocketAddress4, behind_nat: bool, attempt: u32) {
        if self.reconnect_policy.give_up(attempt) {
            log::debug!("giving up reconnecting to {addr} after {attempt} attempts");
            return;
        }
        let timeout = self.reconnect_policy.timeout_after(attempt);
        self.pending_reconnects.push(PendingReconnect {
            addr,
            behind_nat,
            attempt,
            not_before: Instant::now() + timeout,
        });
    }

    fn close_channel(&mut self, id: usize, events: &mut Vec<NodeEvent>) {
        let Some(ch) = self.channels.get(id) else { return };
        let peer_id = ch.peer_id;
        let addr = ch.peer_addr;
        let behind_nat = ch.behind_nat;
        let was_established = ch.is_established();

        let _ = self.connecting.untrack(ch);
        let _ = self.readers.untrack(ch);
        let _ = self.writers.untrack(ch);

        if let Some(peer) = peer_id {
            self.channel_map.remove(&peer);
        }
        self.channels.remove(id);
        events.push(NodeEvent::ChannelDestroyed { channel: id, peer_id });

        if was_established {
            self.schedule_reconnect(addr, behind_nat, 1);
        }
    }

    /// Advance every pool by one poll quantum; `config` supplies timing
    /// constants (§4.G `step`).
    pub fn step(&mut self, timeout: Option<Duration>, config: &Config) -> io::Result<Vec<NodeEvent>> {
        let mut events = Vec::new();
        let now = Instant::now();

        self.drain_pending_reconnects(now);
        self.drive_connecting(timeout, &mut events)?;
        self.drive_listeners(timeout)?;
        self.drive_readers(timeout, &mut events)?;
        self.drive_writers(timeout, config)?;
        self.drive_heartbeats(now, config, &mut events);

        Ok(events)
    }

    fn drain_pending_reconnects(&mut self, now: Instant) {
        let due: Vec<PendingReconnect> = {
            let mut remaining = Vec::new();
            let mut due = Vec::new();
            for p in self.pending_reconnects.drain(..) {
                if p.not_before <= now {
                    due.push(p);
                } else {
                    remaining.push(p);
                }
            }
            self.pending_reconnects = remaining;
            due
        };

        for p in due {
            match self.connect_host(p.addr, p.behind_nat) {
                Ok(_) => {}
                Err(e) => {
                    log::warn!("reconnect attempt to {} failed: {e}", p.addr);
                    self.schedule_reconnect(p.addr, p.behind_nat, p.attempt + 1);
                }
            }
        }
    }

    fn drive_connecting(&mut self, timeout: Option<Duration>, events: &mut Vec<NodeEvent>) -> io::Result<()> {
        let outcomes = self.connecting.step(timeout, &self.channels)?;
        for outcome in outcomes {
            match outcome {
                ConnectingOutcome::Connected(id) => {
                    let Some(ch) = self.channels.get(id) else { continue };
                    let behind_nat = ch.behind_nat;
                    self.connecting.untrack(&self.channels[id])?;
                    self.begin_handshake(id, behind_nat)?;
                }
                ConnectingOutcome::Refused(id, reason) => {
                    log::debug!("connect refused for channel {id}: {reason:?}");
                    self.close_channel(id, events);
                }
            }
        }
        Ok(())
    }

    fn drive_listeners(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        let accepted = self.listeners.step(timeout)?;
        for a in accepted {
            let id = self.channels.insert(Channel::new(
                a.local_index,
                a.peer_addr,
                a.socket,
                ChannelState::Handshaking,
                false,
            ));
            self.readers.track(id, &self.channels[id])?;
            self.writers.track(id, &self.channels[id])?;
        }
        Ok(())
    }

    fn drive_readers(&mut self, timeout: Option<Duration>, events: &mut Vec<NodeEvent>) -> io::Result<()> {
        let outcomes = self.readers.step(timeout, &mut self.channels)?;
        for outcome in outcomes {
            match outcome {
                ReaderOutcome::Packets(id, packets) => {
                    self.handle_packets(id, packets, events);
                }
                ReaderOutcome::Disconnected(id) | ReaderOutcome::Failed(id, _) => {
                    self.close_channel(id, events);
                }
                ReaderOutcome::Protocol(id, e) => {
                    log::warn!("protocol error on channel {id}: {e}");
                    self.close_channel(id, events);
                }
            }
        }
        Ok(())
    }

    fn handle_packets(&mut self, id: usize, packets: Vec<(u8, Packet)>, events: &mut Vec<NodeEvent>) {
        let mut collector = Collector::default();
        for (priority, packet) in packets {
            if let Err(e) = self.input_processor.process(priority, packet, &mut collector) {
                log::warn!("protocol error decoding channel {id}: {e}");
                self.close_channel(id, events);
                return;
            }
        }

        for decoded in collector.events {
            match decoded {
                Decoded::Handshake { peer_id, is_gateway, behind_nat, way } => {
                    self.handle_handshake(id, peer_id, is_gateway, behind_nat, way, events);
                }
                Decoded::Heartbeat => {
                    if let Some(ch) = self.channels.get_mut(id) {
                        ch.last_heartbeat_received = Instant::now();
                    }
                }
                Decoded::Alive { peer_id } => events.push(NodeEvent::Alive { channel: id, peer_id }),
                Decoded::Unreachable { gw, sender, receiver } => {
                    events.push(NodeEvent::Unreachable { gw, sender, receiver })
                }
                Decoded::Route { way, initiator, responder, gateways } => {
                    events.push(NodeEvent::Route { channel: id, way, initiator, responder, gateways })
                }
                Decoded::Ddata { priority, bytes } => {
                    events.push(NodeEvent::DirectData { channel: id, priority, bytes })
                }
                Decoded::Gdata { priority, sender, receiver, bytes } => {
                    events.push(NodeEvent::GatewayData { channel: id, priority, sender, receiver, bytes })
                }
            }
        }
    }

    /// Another channel (not `id`) already established toward the same
    /// `peer_id`, if one exists. `peer_id` is only known on a channel once
    /// its own handshake has completed, so a rival can only ever be the
    /// earlier-settled side of a simultaneous-connect race, never another
    /// still-`Handshaking` one.
    fn rival_channel(&self, id: usize, peer_id: NodeId) -> Option<usize> {
        self.channels.iter().find_map(|(other_id, ch)| {
            if other_id != id && ch.peer_id == Some(peer_id) && ch.state == ChannelState::Established {
                Some(other_id)
            } else {
                None
            }
        })
    }

    /// §4.E deterministic tie-break: both ends must agree on the surviving
    /// channel without talking to each other, so the decision is keyed off
    /// `NodeId` order plus which side initiated each channel — the side with
    /// the smaller id always keeps the channel it did *not* dial out on.
    fn loses_tie_break(&self, id: usize, peer_id: NodeId) -> bool {
        let Some(ch) = self.channels.get(id) else { return true };
        let keep_inbound = crate::handshake::wins_tie_break(self.self_id, peer_id);
        ch.initiated_locally == keep_inbound
    }

    fn handle_handshake(
        &mut self,
        id: usize,
        peer_id: NodeId,
        is_gateway: bool,
        behind_nat: bool,
        way: HandshakeWay,
        events: &mut Vec<NodeEvent>,
    ) {
        // A simultaneous-connect race can leave two channels to the same peer
        // in flight at once, neither yet `Established`, so `channel_map`
        // alone can't see the conflict. Resolve it deterministically here,
        // before the `already_established` check, so both ends land on the
        // same surviving channel without needing to coordinate.
        if self.handshake.resolves_duplicates() {
            if let Some(other) = self.rival_channel(id, peer_id) {
                if self.loses_tie_break(id, peer_id) {
                    log::debug!("duplicate link to {peer_id}: tie-break favors channel {other}, closing {id}");
                    self.close_channel(id, events);
                    return;
                }
                log::debug!("duplicate link to {peer_id}: tie-break favors channel {id}, closing {other}");
                self.close_channel(other, events);
            }
        }

        let already_established = self.channel_map.contains_key(&peer_id);
        if let Err(reason) = self.handshake.accept(peer_id, already_established) {
            log::debug!("refusing handshake from {peer_id}: {reason:?}");
            self.close_channel(id, events);
            return;
        }

        {
            let Some(ch) = self.channels.get_mut(id) else { return };
            ch.peer_id = Some(peer_id);
            ch.is_gateway = is_gateway;
            ch.behind_nat = behind_nat;
            ch.state = ChannelState::Established;
        }
        self.channel_map.insert(peer_id, id);
        events.push(NodeEvent::ChannelEstablished { channel: id, peer_id, is_gateway });

        if way == HandshakeWay::Request {
            let response = self.handshake.build_response(self.self_id, self.is_gateway, false);
            self.send_control(id, 0, &response);
        }
    }

    fn drive_writers(&mut self, timeout: Option<Duration>, config: &Config) -> io::Result<()> {
        let outcomes = self.writers.step(timeout, &mut self.channels, config.frame_mtu as usize)?;
        for outcome in outcomes {
            match outcome {
                WriterOutcome::Idle(_) => {}
                WriterOutcome::Failed(id, e) => {
                    log::warn!("write failed on channel {id}: {e}");
                }
            }
        }
        Ok(())
    }

    fn drive_heartbeats(&mut self, now: Instant, config: &Config, events: &mut Vec<NodeEvent>) {
        let mut to_close = Vec::new();
        let due: Vec<usize> = self
            .channels
            .iter()
            .filter(|(_, ch)| ch.is_established())
            .filter(|(_, ch)| now.duration_since(ch.last_heartbeat_sent) >= config.heartbeat_interval)
            .map(|(id, _)| id)
            .collect();

        for id in due {
            let beat = self.heartbeat.build();
            self.send_control(id, 0, &beat);
            if let Some(ch) = self.channels.get_mut(id) {
                ch.last_heartbeat_sent = now;
            }
        }

        for (id, ch) in self.channels.iter() {
            if ch.is_established() && now.duration_since(ch.last_heartbeat_received) >= config.heartbeat_timeout {
                to_close.push(id);
            }
        }
        for id in to_close {
            self.close_channel(id, events);
        }
    }

    pub fn enqueue_on(&mut self, channel: usize, priority: u8, packet: &Packet) -> bool {
        if self.channels.contains(channel) {
            self.send_control(channel, priority, packet);
            true
        } else {
            false
        }
    }

    pub fn peer_of(&self, channel: usize) -> Option<NodeId> {
        self.channels.get(channel).and_then(|ch| ch.peer_id)
    }

    pub fn established_channels(&self) -> impl Iterator<Item = (usize, NodeId, bool)> + '_ {
        self.channels
            .iter()
            .filter(|(_, ch)| ch.is_established())
            .filter_map(|(id, ch)| ch.peer_id.map(|peer| (id, peer, ch.is_gateway)))
    }
}
