use std::io;

use thiserror::Error;

use crate::node_id::NodeId;

/// Reason a handshake was refused (§4.E).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeFailure {
    /// A channel map entry for this peer is already `Established`.
    DuplicateLink,
    /// Peer reported an incompatible protocol/handshake payload.
    Incompatible,
    /// No handshake response within the handshake timeout.
    Timeout,
}

/// Reason a non-blocking connect failed to complete (§4.A `ConnectingPoller`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectFailure {
    Refused,
    Reset,
    Timeout,
    Unreachable,
    Other,
}

/// Top-level error surface (§7).
#[derive(Debug, Error)]
pub enum Error {
    #[error("socket error: {0}")]
    Socket(#[source] io::Error),

    #[error("poller error: {0}")]
    Poller(#[source] io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("handshake error with {peer:?}: {reason:?}")]
    Handshake {
        peer: Option<NodeId>,
        reason: HandshakeFailure,
    },

    #[error("no route to {0} and no default gateway configured")]
    UnreachableDestination(NodeId),

    #[error("writer queue exceeded its high-water mark")]
    ResourceExhausted,
}

/// Malformed or unexpected wire data (§4.F, §7). Fatal for the channel that
/// produced it; the peer is assumed malicious or desynchronised.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("frame flags invalid (begin/end markers not found)")]
    BadFrameFlags,
    #[error("frame length {0} exceeds the maximum payload size")]
    BadFrameLength(u16),
    #[error("frame priority {0} is outside the configured priority count")]
    BadPriority(u8),
    #[error("unexpected packet tag {0}")]
    UnexpectedTag(u8),
    #[error("checksum mismatch on data packet")]
    BadChecksum,
    #[error("truncated packet payload")]
    Truncated,
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Error {
        Error::Socket(e)
    }
}
