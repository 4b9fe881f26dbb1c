//! Per-peer channel state machine (§3, §4.E).

use std::time::Instant;

use crate::addr::SocketAddress4;
use crate::error::ProtocolError;
use crate::frame;
use crate::node_id::NodeId;
use crate::packet::Packet;
use crate::socket::Socket;
use crate::writer_queue::WriterQueue;

/// §4.E state machine. `NodeId` is unknown until the handshake completes, so
/// it lives on [`Channel`] as an `Option` rather than on this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Handshaking,
    Established,
    Draining,
    Closed,
}

/// The per-peer runtime object (§3). `PRIORITIES` is the compile-time lane
/// count shared with [`WriterQueue`].
#[derive(Debug)]
pub struct Channel<const PRIORITIES: usize> {
    pub local_index: usize,
    pub peer_addr: SocketAddress4,
    pub socket: Socket,
    pub state: ChannelState,
    pub peer_id: Option<NodeId>,
    pub is_gateway: bool,
    pub behind_nat: bool,
    /// `true` if this side called `connect_host` for this channel, `false`
    /// if it arrived through a listener's `accept` (§4.E duplicate-link
    /// tie-break needs to know which end is which).
    pub initiated_locally: bool,
    pub writer_queue: WriterQueue<PRIORITIES>,
    pub last_heartbeat_sent: Instant,
    pub last_heartbeat_received: Instant,

    raw_buf: Vec<u8>,
    lane_buffers: [Vec<u8>; PRIORITIES],
}

impl<const PRIORITIES: usize> Channel<PRIORITIES> {
    pub fn new(
        local_index: usize,
        peer_addr: SocketAddress4,
        socket: Socket,
        state: ChannelState,
        initiated_locally: bool,
    ) -> Self {
        let now = Instant::now();
        Channel {
            local_index,
            peer_addr,
            socket,
            state,
            peer_id: None,
            is_gateway: false,
            behind_nat: false,
            initiated_locally,
            writer_queue: WriterQueue::new(),
            last_heartbeat_sent: now,
            last_heartbeat_received: now,
            raw_buf: Vec::new(),
            lane_buffers: std::array::from_fn(|_| Vec::new()),
        }
    }

    pub fn enqueue(&mut self, priority: u8, body: Vec<u8>) {
        self.writer_queue.enqueue(priority, body);
    }

    /// Append freshly-read bytes and extract every complete packet now
    /// available. A [`ProtocolError`] here is fatal for this channel (§7):
    /// the caller closes it and does not propagate further.
    pub fn ingest(&mut self, data: &[u8]) -> Result<Vec<(u8, Packet)>, ProtocolError> {
        self.raw_buf.extend_from_slice(data);

        loop {
            match frame::parse(&self.raw_buf)? {
                Some(parsed) => {
                    let priority = parsed.priority as usize;
                    if priority >= PRIORITIES {
                        return Err(ProtocolError::BadPriority(parsed.priority));
                    }
                    self.lane_buffers[priority].extend_from_slice(parsed.body);
                    let consumed = parsed.consumed;
                    self.raw_buf.drain(..consumed);
                }
                None => break,
            }
        }

        let mut packets = Vec::new();
        for (priority, buf) in self.lane_buffers.iter_mut().enumerate() {
            loop {
                match Packet::decode_prefix(buf)? {
                    Some((packet, consumed)) => {
                        packets.push((priority as u8, packet));
                        buf.drain(..consumed);
                    }
                    None => break,
                }
            }
        }

        Ok(packets)
    }

    pub fn is_established(&self) -> bool {
        self.state == ChannelState::Established
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::HandshakeWay;
    use std::net::{SocketAddrV4, TcpListener};

    fn dummy_channel() -> Channel<3> {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = match listener.local_addr().unwrap() {
            std::net::SocketAddr::V4(v4) => v4,
            _ => unreachable!(),
        };
        let stream = std::net::TcpStream::connect(addr).unwrap();
        stream.set_nonblocking(true).unwrap();
        let socket = Socket::from_accepted(stream, SocketAddress4::from(addr)).unwrap();
        Channel::new(0, SocketAddress4::from(addr), socket, ChannelState::Connecting, true)
    }

    #[test]
    fn ingest_reassembles_packet_split_across_two_frames() {
        let mut ch = dummy_channel();
        let packet = Packet::Handshake {
            peer_id: NodeId::from_u128(1),
            is_gateway: false,
            behind_nat: false,
            way: HandshakeWay::Request,
        };
        let body = packet.encode();
        let mid = body.len() / 2;
        let frame_a = frame::pack(0, &body[..mid]);
        let frame_b = frame::pack(0, &body[mid..]);

        assert!(ch.ingest(&frame_a).unwrap().is_empty());
        let decoded = ch.ingest(&frame_b).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].0, 0);
        assert_eq!(decoded[0].1, packet);
    }

    #[test]
    fn ingest_yields_multiple_packets_from_one_buffer() {
        let mut ch = dummy_channel();
        let a = Packet::Heartbeat { health_data: 1 };
        let b = Packet::Alive { peer_id: NodeId::from_u128(2) };

        let mut data = frame::pack(1, &a.encode());
        data.extend_from_slice(&frame::pack(1, &b.encode()));

        let decoded = ch.ingest(&data).unwrap();
        assert_eq!(decoded, vec![(1, a), (1, b)]);
    }

    #[test]
    fn ingest_rejects_out_of_range_priority() {
        let mut ch = dummy_channel();
        let frame = frame::pack(200, b"x");
        assert_eq!(
            ch.ingest(&frame).unwrap_err(),
            ProtocolError::BadPriority(200)
        );
    }
}
