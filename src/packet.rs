//! Typed packets carried inside frame bodies (§4.F). All integers are
//! big-endian; variable-length sequences of fixed-width elements are
//! prefixed with a `u16` element count. The opaque data payload of
//! `DirectData`/`GatewayData` is prefixed with a `u32` byte length instead,
//! since it may be reassembled from many frames and so is not bounded by a
//! single frame's `u16` length field.

use crate::error::ProtocolError;
use crate::node_id::NodeId;

const TAG_HANDSHAKE: u8 = 1;
const TAG_HEARTBEAT: u8 = 2;
const TAG_ALIVE: u8 = 3;
const TAG_UNREACHABLE: u8 = 4;
const TAG_ROUTE: u8 = 5;
const TAG_DIRECT_DATA: u8 = 6;
const TAG_GATEWAY_DATA: u8 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeWay {
    Request,
    Response,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteWay {
    Request,
    Response,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Handshake {
        peer_id: NodeId,
        is_gateway: bool,
        behind_nat: bool,
        way: HandshakeWay,
    },
    Heartbeat {
        health_data: u8,
    },
    Alive {
        peer_id: NodeId,
    },
    Unreachable {
        gw: NodeId,
        sender: NodeId,
        receiver: NodeId,
    },
    Route {
        way: RouteWay,
        initiator: NodeId,
        responder: NodeId,
        gateways: Vec<NodeId>,
    },
    DirectData {
        force_checksum: bool,
        checksum: Option<u32>,
        bytes: Vec<u8>,
    },
    GatewayData {
        sender: NodeId,
        receiver: NodeId,
        force_checksum: bool,
        checksum: Option<u32>,
        bytes: Vec<u8>,
    },
}

fn put_bool(out: &mut Vec<u8>, b: bool) {
    out.push(b as u8);
}

fn get_bool(buf: &[u8], pos: &mut usize) -> Result<bool, ProtocolError> {
    let b = *buf.get(*pos).ok_or(ProtocolError::Truncated)?;
    *pos += 1;
    Ok(b != 0)
}

fn put_node_id(out: &mut Vec<u8>, id: NodeId) {
    out.extend_from_slice(&id.to_bytes());
}

fn get_node_id(buf: &[u8], pos: &mut usize) -> Result<NodeId, ProtocolError> {
    let end = *pos + 16;
    let bytes: [u8; 16] = buf
        .get(*pos..end)
        .ok_or(ProtocolError::Truncated)?
        .try_into()
        .unwrap();
    *pos = end;
    Ok(NodeId::from_bytes(bytes))
}

fn get_u8(buf: &[u8], pos: &mut usize) -> Result<u8, ProtocolError> {
    let b = *buf.get(*pos).ok_or(ProtocolError::Truncated)?;
    *pos += 1;
    Ok(b)
}

fn get_u32(buf: &[u8], pos: &mut usize) -> Result<u32, ProtocolError> {
    let end = *pos + 4;
    let bytes: [u8; 4] = buf
        .get(*pos..end)
        .ok_or(ProtocolError::Truncated)?
        .try_into()
        .unwrap();
    *pos = end;
    Ok(u32::from_be_bytes(bytes))
}

fn get_bytes<'a>(buf: &'a [u8], pos: &mut usize, len: usize) -> Result<&'a [u8], ProtocolError> {
    let end = *pos + len;
    let slice = buf.get(*pos..end).ok_or(ProtocolError::Truncated)?;
    *pos = end;
    Ok(slice)
}

impl Packet {
    /// Encode `self` as `[tag][payload]`, the bytes that become a frame `body`.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();

        match self {
            Packet::Handshake { peer_id, is_gateway, behind_nat, way } => {
                out.push(TAG_HANDSHAKE);
                put_node_id(&mut out, *peer_id);
                put_bool(&mut out, *is_gateway);
                put_bool(&mut out, *behind_nat);
                out.push(match way {
                    HandshakeWay::Request => 0,
                    HandshakeWay::Response => 1,
                });
            }
            Packet::Heartbeat { health_data } => {
                out.push(TAG_HEARTBEAT);
                out.push(*health_data);
            }
            Packet::Alive { peer_id } => {
                out.push(TAG_ALIVE);
                put_node_id(&mut out, *peer_id);
            }
            Packet::Unreachable { gw, sender, receiver } => {
                out.push(TAG_UNREACHABLE);
                put_node_id(&mut out, *gw);
                put_node_id(&mut out, *sender);
                put_node_id(&mut out, *receiver);
            }
            Packet::Route { way, initiator, responder, gateways } => {
                out.push(TAG_ROUTE);
                out.push(match way {
                    RouteWay::Request => 0,
                    RouteWay::Response => 1,
                });
                put_node_id(&mut out, *initiator);
                put_node_id(&mut out, *responder);
                out.extend_from_slice(&(gateways.len() as u16).to_be_bytes());
                for gw in gateways {
                    put_node_id(&mut out, *gw);
                }
            }
            Packet::DirectData { force_checksum, checksum, bytes } => {
                out.push(TAG_DIRECT_DATA);
                put_bool(&mut out, *force_checksum);
                if *force_checksum {
                    out.extend_from_slice(&checksum.unwrap_or(0).to_be_bytes());
                }
                out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
                out.extend_from_slice(bytes);
            }
            Packet::GatewayData { sender, receiver, force_checksum, checksum, bytes } => {
                out.push(TAG_GATEWAY_DATA);
                put_node_id(&mut out, *sender);
                put_node_id(&mut out, *receiver);
                put_bool(&mut out, *force_checksum);
                if *force_checksum {
                    out.extend_from_slice(&checksum.unwrap_or(0).to_be_bytes());
                }
                out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
                out.extend_from_slice(bytes);
            }
        }

        out
    }

    /// Decode a `[tag][payload]` body previously produced by [`Packet::encode`].
    pub fn decode(body: &[u8]) -> Result<Packet, ProtocolError> {
        let mut pos = 0;
        Self::decode_at(body, &mut pos)
    }

    /// Decode one packet from the front of a continuous per-priority byte
    /// stream (§4.C), returning how many bytes it consumed. Returns `Ok(None)`
    /// when `buf` holds an incomplete packet — the caller should wait for
    /// more frame bodies on this lane before retrying; this is how a
    /// `DirectData`/`GatewayData` payload spanning multiple frames is
    /// reassembled without a fragment header.
    pub fn decode_prefix(buf: &[u8]) -> Result<Option<(Packet, usize)>, ProtocolError> {
        let mut pos = 0;
        match Self::decode_at(buf, &mut pos) {
            Ok(packet) => Ok(Some((packet, pos))),
            Err(ProtocolError::Truncated) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn decode_at(body: &[u8], pos: &mut usize) -> Result<Packet, ProtocolError> {
        let tag = get_u8(body, pos)?;

        let packet = match tag {
            TAG_HANDSHAKE => {
                let peer_id = get_node_id(body, pos)?;
                let is_gateway = get_bool(body, pos)?;
                let behind_nat = get_bool(body, pos)?;
                let way = match get_u8(body, pos)? {
                    0 => HandshakeWay::Request,
                    1 => HandshakeWay::Response,
                    _ => return Err(ProtocolError::Truncated),
                };
                Packet::Handshake { peer_id, is_gateway, behind_nat, way }
            }
            TAG_HEARTBEAT => {
                let health_data = get_u8(body, pos)?;
                Packet::Heartbeat { health_data }
            }
            TAG_ALIVE => {
                let peer_id = get_node_id(body, pos)?;
                Packet::Alive { peer_id }
            }
            TAG_UNREACHABLE => {
                let gw = get_node_id(body, pos)?;
                let sender = get_node_id(body, pos)?;
                let receiver = get_node_id(body, pos)?;
                Packet::Unreachable { gw, sender, receiver }
            }
            TAG_ROUTE => {
                let way = match get_u8(body, pos)? {
                    0 => RouteWay::Request,
                    1 => RouteWay::Response,
                    _ => return Err(ProtocolError::Truncated),
                };
                let initiator = get_node_id(body, pos)?;
                let responder = get_node_id(body, pos)?;
                let count = u16::from_be_bytes([get_u8(body, pos)?, get_u8(body, pos)?]) as usize;
                let mut gateways = Vec::with_capacity(count);
                for _ in 0..count {
                    gateways.push(get_node_id(body, pos)?);
                }
                Packet::Route { way, initiator, responder, gateways }
            }
            TAG_DIRECT_DATA => {
                let force_checksum = get_bool(body, pos)?;
                let checksum = if force_checksum {
                    Some(get_u32(body, pos)?)
                } else {
                    None
                };
                let len = get_u32(body, pos)? as usize;
                let bytes = get_bytes(body, pos, len)?.to_vec();
                Packet::DirectData { force_checksum, checksum, bytes }
            }
            TAG_GATEWAY_DATA => {
                let sender = get_node_id(body, pos)?;
                let receiver = get_node_id(body, pos)?;
                let force_checksum = get_bool(body, pos)?;
                let checksum = if force_checksum {
                    Some(get_u32(body, pos)?)
                } else {
                    None
                };
                let len = get_u32(body, pos)? as usize;
                let bytes = get_bytes(body, pos, len)?.to_vec();
                Packet::GatewayData { sender, receiver, force_checksum, checksum, bytes }
            }
            other => return Err(ProtocolError::UnexpectedTag(other)),
        };

        Ok(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nid(v: u128) -> NodeId {
        NodeId::from_u128(v)
    }

    #[test]
    fn handshake_round_trips() {
        let p = Packet::Handshake {
            peer_id: nid(42),
            is_gateway: true,
            behind_nat: false,
            way: HandshakeWay::Response,
        };
        assert_eq!(Packet::decode(&p.encode()).unwrap(), p);
    }

    #[test]
    fn route_round_trips_with_gateways() {
        let p = Packet::Route {
            way: RouteWay::Request,
            initiator: nid(1),
            responder: nid(2),
            gateways: vec![nid(3), nid(4), nid(5)],
        };
        assert_eq!(Packet::decode(&p.encode()).unwrap(), p);
    }

    #[test]
    fn route_round_trips_empty_gateways() {
        let p = Packet::Route {
            way: RouteWay::Response,
            initiator: nid(1),
            responder: nid(2),
            gateways: vec![],
        };
        assert_eq!(Packet::decode(&p.encode()).unwrap(), p);
    }

    #[test]
    fn direct_data_round_trips_with_checksum() {
        let bytes = b"payload".to_vec();
        let p = Packet::DirectData {
            force_checksum: true,
            checksum: Some(crate::frame::checksum(&bytes)),
            bytes,
        };
        assert_eq!(Packet::decode(&p.encode()).unwrap(), p);
    }

    #[test]
    fn gateway_data_round_trips_without_checksum() {
        let p = Packet::GatewayData {
            sender: nid(1),
            receiver: nid(2),
            force_checksum: false,
            checksum: None,
            bytes: b"hi".to_vec(),
        };
        assert_eq!(Packet::decode(&p.encode()).unwrap(), p);
    }

    #[test]
    fn unexpected_tag_is_protocol_error() {
        assert_eq!(Packet::decode(&[99]).unwrap_err(), ProtocolError::UnexpectedTag(99));
    }

    #[test]
    fn decode_prefix_waits_for_more_bytes_on_incomplete_packet() {
        let p = Packet::DirectData {
            force_checksum: false,
            checksum: None,
            bytes: b"split across frames".to_vec(),
        };
        let encoded = p.encode();

        assert!(Packet::decode_prefix(&encoded[..encoded.len() - 1])
            .unwrap()
            .is_none());

        let (decoded, consumed) = Packet::decode_prefix(&encoded).unwrap().unwrap();
        assert_eq!(decoded, p);
        assert_eq!(consumed, encoded.len());
    }

    #[test]
    fn decode_prefix_reads_one_packet_from_a_concatenated_stream() {
        let a = Packet::Heartbeat { health_data: 1 };
        let b = Packet::Alive { peer_id: nid(9) };
        let mut stream = a.encode();
        stream.extend_from_slice(&b.encode());

        let (first, consumed) = Packet::decode_prefix(&stream).unwrap().unwrap();
        assert_eq!(first, a);
        let (second, _) = Packet::decode_prefix(&stream[consumed..]).unwrap().unwrap();
        assert_eq!(second, b);
    }

    #[test]
    fn truncated_packet_is_protocol_error() {
        let p = Packet::Heartbeat { health_data: 7 };
        let encoded = p.encode();
        assert_eq!(
            Packet::decode(&encoded[..encoded.len() - 1]).unwrap_err(),
            ProtocolError::Truncated
        );
    }
}
