//! Dispatches decoded packets to typed handlers (§4.F, §9, §10.E).

use crate::error::ProtocolError;
use crate::frame;
use crate::node_id::NodeId;
use crate::packet::{HandshakeWay, Packet, RouteWay};

/// One callback per packet kind (§4.F), implemented by whatever owns the
/// channel (typically the node pool). Every method is dispatched
/// synchronously on the pool's thread, inside `step`.
pub trait PacketHandlers {
    fn on_handshake(&mut self, peer_id: NodeId, is_gateway: bool, behind_nat: bool, way: HandshakeWay);
    fn on_heartbeat(&mut self, health_data: u8);
    fn on_alive(&mut self, peer_id: NodeId);
    fn on_unreachable(&mut self, gw: NodeId, sender: NodeId, receiver: NodeId);
    fn on_route(&mut self, way: RouteWay, initiator: NodeId, responder: NodeId, gateways: Vec<NodeId>);
    fn on_ddata(&mut self, priority: u8, bytes: Vec<u8>);
    fn on_gdata(&mut self, priority: u8, sender: NodeId, receiver: NodeId, bytes: Vec<u8>);
}

/// Parses wire bytes into [`Packet`]s and routes them to a [`PacketHandlers`].
pub trait InputProcessor: std::fmt::Debug {
    /// Handle one already-decoded packet received at `priority`.
    ///
    /// The default verifies `force_checksum` data packets before handing the
    /// payload to the handler (§8 testable property); a checksum mismatch is
    /// a [`ProtocolError`] and is fatal for the channel per §7.
    fn process(
        &mut self,
        priority: u8,
        packet: Packet,
        handlers: &mut dyn PacketHandlers,
    ) -> Result<(), ProtocolError> {
        match packet {
            Packet::Handshake { peer_id, is_gateway, behind_nat, way } => {
                handlers.on_handshake(peer_id, is_gateway, behind_nat, way);
            }
            Packet::Heartbeat { health_data } => handlers.on_heartbeat(health_data),
            Packet::Alive { peer_id } => handlers.on_alive(peer_id),
            Packet::Unreachable { gw, sender, receiver } => {
                handlers.on_unreachable(gw, sender, receiver);
            }
            Packet::Route { way, initiator, responder, gateways } => {
                handlers.on_route(way, initiator, responder, gateways);
            }
            Packet::DirectData { force_checksum, checksum, bytes } => {
                verify_checksum(force_checksum, checksum, &bytes)?;
                handlers.on_ddata(priority, bytes);
            }
            Packet::GatewayData { sender, receiver, force_checksum, checksum, bytes } => {
                verify_checksum(force_checksum, checksum, &bytes)?;
                handlers.on_gdata(priority, sender, receiver, bytes);
            }
        }
        Ok(())
    }
}

fn verify_checksum(force_checksum: bool, checksum: Option<u32>, bytes: &[u8]) -> Result<(), ProtocolError> {
    if !force_checksum {
        return Ok(());
    }
    let expected = checksum.ok_or(ProtocolError::Truncated)?;
    if frame::checksum(bytes) == expected {
        Ok(())
    } else {
        Err(ProtocolError::BadChecksum)
    }
}

#[derive(Debug, Default)]
pub struct DefaultInputProcessor;

impl InputProcessor for DefaultInputProcessor {}

/// Drops every packet without dispatching it (mirrors `null_input_processor.hpp`).
#[derive(Debug, Default)]
pub struct NullInputProcessor;

impl InputProcessor for NullInputProcessor {
    fn process(
        &mut self,
        _priority: u8,
        _packet: Packet,
        _handlers: &mut dyn PacketHandlers,
    ) -> Result<(), ProtocolError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        ddata: Vec<Vec<u8>>,
        heartbeats: u32,
    }

    impl PacketHandlers for Recorder {
        fn on_handshake(&mut self, _: NodeId, _: bool, _: bool, _: HandshakeWay) {}
        fn on_heartbeat(&mut self, _: u8) {
            self.heartbeats += 1;
        }
        fn on_alive(&mut self, _: NodeId) {}
        fn on_unreachable(&mut self, _: NodeId, _: NodeId, _: NodeId) {}
        fn on_route(&mut self, _: RouteWay, _: NodeId, _: NodeId, _: Vec<NodeId>) {}
        fn on_ddata(&mut self, _priority: u8, bytes: Vec<u8>) {
            self.ddata.push(bytes);
        }
        fn on_gdata(&mut self, _: u8, _: NodeId, _: NodeId, _: Vec<u8>) {}
    }

    #[test]
    fn dispatches_heartbeat() {
        let mut rec = Recorder::default();
        let mut proc = DefaultInputProcessor;
        proc.process(0, Packet::Heartbeat { health_data: 1 }, &mut rec).unwrap();
        assert_eq!(rec.heartbeats, 1);
    }

    #[test]
    fn rejects_bad_checksum() {
        let mut rec = Recorder::default();
        let mut proc = DefaultInputProcessor;
        let packet = Packet::DirectData {
            force_checksum: true,
            checksum: Some(0xdead_beef),
            bytes: b"hello".to_vec(),
        };
        assert_eq!(
            proc.process(0, packet, &mut rec).unwrap_err(),
            ProtocolError::BadChecksum
        );
        assert!(rec.ddata.is_empty());
    }

    #[test]
    fn accepts_matching_checksum() {
        let mut rec = Recorder::default();
        let mut proc = DefaultInputProcessor;
        let bytes = b"hello".to_vec();
        let packet = Packet::DirectData {
            force_checksum: true,
            checksum: Some(frame::checksum(&bytes)),
            bytes: bytes.clone(),
        };
        proc.process(0, packet, &mut rec).unwrap();
        assert_eq!(rec.ddata, vec![bytes]);
    }

    #[test]
    fn null_processor_drops_everything() {
        let mut rec = Recorder::default();
        let mut proc = NullInputProcessor;
        proc.process(0, Packet::Heartbeat { health_data: 1 }, &mut rec).unwrap();
        assert_eq!(rec.heartbeats, 0);
    }
}
