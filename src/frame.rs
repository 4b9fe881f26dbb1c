//! Wire framing (§3, §6).
//!
//! ```text
//! +------+----------+----------+--------+------+
//! | 0xBE | prio: u8 | len: u16 |  body  | 0xED |
//! +------+----------+----------+--------+------+
//! ```
//!
//! `len` is the byte length of `body` only; the total frame size on the wire
//! is `len + 5`. An empty body is disallowed — the writer queue never hands
//! `acquire_frame` an empty lane item.

use crate::error::ProtocolError;

pub const BEGIN: u8 = 0xBE;
pub const END: u8 = 0xED;

/// Header + footer overhead of one frame.
pub const FRAME_OVERHEAD: usize = 5;

/// Largest `body` a frame can carry: `u16::MAX - 4`, per §3.
pub const MAX_BODY_LEN: usize = 65_531;

/// Encode `priority`/`body` as a single complete frame.
///
/// `body` must be non-empty and no longer than [`MAX_BODY_LEN`].
pub fn pack(priority: u8, body: &[u8]) -> Vec<u8> {
    debug_assert!(!body.is_empty(), "frame body must not be empty");
    debug_assert!(body.len() <= MAX_BODY_LEN);

    let mut out = Vec::with_capacity(body.len() + FRAME_OVERHEAD);
    out.push(BEGIN);
    out.push(priority);
    out.extend_from_slice(&(body.len() as u16).to_be_bytes());
    out.extend_from_slice(body);
    out.push(END);
    out
}

/// A frame successfully parsed from the front of a byte buffer.
pub struct Parsed<'a> {
    pub priority: u8,
    pub body: &'a [u8],
    /// Total number of bytes this frame consumed from the input buffer.
    pub consumed: usize,
}

/// Attempt to parse one complete frame from the front of `buf`.
///
/// Returns `Ok(None)` when `buf` holds an incomplete frame (the caller
/// should wait for more bytes); `Err` when the bytes present can never form
/// a valid frame (bad begin/end markers or an over-long declared length) —
/// this is a [`ProtocolError`] and is fatal for the channel per §7.
pub fn parse(buf: &[u8]) -> Result<Option<Parsed<'_>>, ProtocolError> {
    if buf.len() < FRAME_OVERHEAD {
        return Ok(None);
    }

    if buf[0] != BEGIN {
        return Err(ProtocolError::BadFrameFlags);
    }

    let priority = buf[1];
    let len = u16::from_be_bytes([buf[2], buf[3]]) as usize;

    if len == 0 || len > MAX_BODY_LEN {
        return Err(ProtocolError::BadFrameLength(len as u16));
    }

    let total = len + FRAME_OVERHEAD;
    if buf.len() < total {
        return Ok(None);
    }

    if buf[total - 1] != END {
        return Err(ProtocolError::BadFrameFlags);
    }

    Ok(Some(Parsed {
        priority,
        body: &buf[4..total - 1],
        consumed: total,
    }))
}

/// CRC-32 of `data`, used for the optional `force_checksum` data-packet check (§4.F, §8).
pub fn checksum(data: &[u8]) -> u32 {
    const CRC: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);
    CRC.checksum(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_small_payload() {
        let body = b"hello, mesh";
        let frame = pack(2, body);
        let parsed = parse(&frame).unwrap().unwrap();
        assert_eq!(parsed.priority, 2);
        assert_eq!(parsed.body, body);
        assert_eq!(parsed.consumed, frame.len());
    }

    #[test]
    fn round_trips_max_payload() {
        let body = vec![0xAB; MAX_BODY_LEN];
        let frame = pack(0, &body);
        let parsed = parse(&frame).unwrap().unwrap();
        assert_eq!(parsed.body, &body[..]);
    }

    #[test]
    fn incomplete_frame_yields_none() {
        let frame = pack(0, b"partial");
        assert!(parse(&frame[..frame.len() - 1]).unwrap().is_none());
        assert!(parse(&frame[..3]).unwrap().is_none());
    }

    #[test]
    fn bad_begin_marker_is_protocol_error() {
        let mut frame = pack(0, b"data");
        frame[0] = 0x00;
        assert_eq!(parse(&frame).unwrap_err(), ProtocolError::BadFrameFlags);
    }

    #[test]
    fn bad_end_marker_is_protocol_error() {
        let mut frame = pack(0, b"data");
        let last = frame.len() - 1;
        frame[last] = 0x00;
        assert_eq!(parse(&frame).unwrap_err(), ProtocolError::BadFrameFlags);
    }

    #[test]
    fn concatenated_frames_parse_one_at_a_time() {
        let mut buf = pack(1, b"first");
        buf.extend_from_slice(&pack(1, b"second"));

        let first = parse(&buf).unwrap().unwrap();
        assert_eq!(first.body, b"first");
        let rest = &buf[first.consumed..];

        let second = parse(rest).unwrap().unwrap();
        assert_eq!(second.body, b"second");
    }

    #[test]
    fn checksum_is_stable() {
        assert_eq!(checksum(b"abc"), checksum(b"abc"));
        assert_ne!(checksum(b"abc"), checksum(b"abd"));
    }
}
