//! Reliable-layer wire format (§4.I), riding inside the opaque `bytes`
//! payload of a core `DirectData`/`GatewayData` packet. Self-describing via a
//! 1-byte sub-tag, independent of the core packet carrying it.

use crate::error::ProtocolError;

const SUB_TAG_PAYLOAD: u8 = 1;
const SUB_TAG_REPORT: u8 = 2;
const SUB_TAG_ACK: u8 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReliablePacket {
    Payload { msgid: u128, seq: u64, priority: u8, bytes: Vec<u8> },
    Report { bytes: Vec<u8> },
    Ack { msgid: u128 },
}

fn get_u8(buf: &[u8], pos: &mut usize) -> Result<u8, ProtocolError> {
    let b = *buf.get(*pos).ok_or(ProtocolError::Truncated)?;
    *pos += 1;
    Ok(b)
}

fn get_u64(buf: &[u8], pos: &mut usize) -> Result<u64, ProtocolError> {
    let end = *pos + 8;
    let bytes: [u8; 8] = buf.get(*pos..end).ok_or(ProtocolError::Truncated)?.try_into().unwrap();
    *pos = end;
    Ok(u64::from_be_bytes(bytes))
}

fn get_u128(buf: &[u8], pos: &mut usize) -> Result<u128, ProtocolError> {
    let end = *pos + 16;
    let bytes: [u8; 16] = buf.get(*pos..end).ok_or(ProtocolError::Truncated)?.try_into().unwrap();
    *pos = end;
    Ok(u128::from_be_bytes(bytes))
}

fn get_u32(buf: &[u8], pos: &mut usize) -> Result<u32, ProtocolError> {
    let end = *pos + 4;
    let bytes: [u8; 4] = buf.get(*pos..end).ok_or(ProtocolError::Truncated)?.try_into().unwrap();
    *pos = end;
    Ok(u32::from_be_bytes(bytes))
}

fn get_bytes<'a>(buf: &'a [u8], pos: &mut usize, len: usize) -> Result<&'a [u8], ProtocolError> {
    let end = *pos + len;
    let slice = buf.get(*pos..end).ok_or(ProtocolError::Truncated)?;
    *pos = end;
    Ok(slice)
}

impl ReliablePacket {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            ReliablePacket::Payload { msgid, seq, priority, bytes } => {
                out.push(SUB_TAG_PAYLOAD);
                out.extend_from_slice(&msgid.to_be_bytes());
                out.extend_from_slice(&seq.to_be_bytes());
                out.push(*priority);
                out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
                out.extend_from_slice(bytes);
            }
            ReliablePacket::Report { bytes } => {
                out.push(SUB_TAG_REPORT);
                out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
                out.extend_from_slice(bytes);
            }
            ReliablePacket::Ack { msgid } => {
                out.push(SUB_TAG_ACK);
                out.extend_from_slice(&msgid.to_be_bytes());
            }
        }
        out
    }

    pub fn decode(body: &[u8]) -> Result<ReliablePacket, ProtocolError> {
        let mut pos = 0;
        let tag = get_u8(body, &mut pos)?;
        let packet = match tag {
            SUB_TAG_PAYLOAD => {
                let msgid = get_u128(body, &mut pos)?;
                let seq = get_u64(body, &mut pos)?;
                let priority = get_u8(body, &mut pos)?;
                let len = get_u32(body, &mut pos)? as usize;
                let bytes = get_bytes(body, &mut pos, len)?.to_vec();
                ReliablePacket::Payload { msgid, seq, priority, bytes }
            }
            SUB_TAG_REPORT => {
                let len = get_u32(body, &mut pos)? as usize;
                let bytes = get_bytes(body, &mut pos, len)?.to_vec();
                ReliablePacket::Report { bytes }
            }
            SUB_TAG_ACK => {
                let msgid = get_u128(body, &mut pos)?;
                ReliablePacket::Ack { msgid }
            }
            other => return Err(ProtocolError::UnexpectedTag(other)),
        };
        Ok(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_round_trips() {
        let p = ReliablePacket::Payload { msgid: 42, seq: 7, priority: 1, bytes: b"hi".to_vec() };
        assert_eq!(ReliablePacket::decode(&p.encode()).unwrap(), p);
    }

    #[test]
    fn ack_round_trips() {
        let p = ReliablePacket::Ack { msgid: 99 };
        assert_eq!(ReliablePacket::decode(&p.encode()).unwrap(), p);
    }

    #[test]
    fn report_round_trips() {
        let p = ReliablePacket::Report { bytes: b"one-shot".to_vec() };
        assert_eq!(ReliablePacket::decode(&p.encode()).unwrap(), p);
    }
}
