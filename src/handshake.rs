//! Pluggable handshake negotiation (§4.E, §9, §10.E).

use crate::error::HandshakeFailure;
use crate::node_id::NodeId;
use crate::packet::{HandshakeWay, Packet};

/// Builds outgoing handshake packets and decides whether to accept an
/// incoming one.
pub trait Handshake: std::fmt::Debug {
    fn build_request(&self, self_id: NodeId, is_gateway: bool, behind_nat: bool) -> Packet {
        Packet::Handshake { peer_id: self_id, is_gateway, behind_nat, way: HandshakeWay::Request }
    }

    fn build_response(&self, self_id: NodeId, is_gateway: bool, behind_nat: bool) -> Packet {
        Packet::Handshake { peer_id: self_id, is_gateway, behind_nat, way: HandshakeWay::Response }
    }

    /// Called when a handshake packet names `peer_id` and a `ChannelMap`
    /// entry for that peer is already `Established` elsewhere
    /// (`already_established`). The default refuses the new link (§4.E).
    fn accept(&self, peer_id: NodeId, already_established: bool) -> Result<(), HandshakeFailure> {
        let _ = peer_id;
        if already_established {
            Err(HandshakeFailure::DuplicateLink)
        } else {
            Ok(())
        }
    }

    /// Whether a simultaneous-connect race should be collapsed to one
    /// channel via [`wins_tie_break`]. `true` by default; [`WithoutHandshake`]
    /// turns this off to let tests keep every link they open.
    fn resolves_duplicates(&self) -> bool {
        true
    }
}

/// Single-link handshake following §4.E exactly.
#[derive(Debug, Default)]
pub struct DefaultHandshake;

impl Handshake for DefaultHandshake {}

/// Accepts every incoming link unconditionally, including would-be
/// duplicates — useful to assemble a minimal pool in tests that don't
/// exercise duplicate-link resolution (§10.E).
#[derive(Debug, Default)]
pub struct WithoutHandshake;

impl Handshake for WithoutHandshake {
    fn accept(&self, _peer_id: NodeId, _already_established: bool) -> Result<(), HandshakeFailure> {
        Ok(())
    }

    fn resolves_duplicates(&self) -> bool {
        false
    }
}

/// Deterministic duplicate-link tie-break (§4.E): the smaller `NodeId` wins
/// and keeps its existing channel; the loser closes its new attempt.
pub fn wins_tie_break(self_id: NodeId, peer_id: NodeId) -> bool {
    self_id < peer_id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_handshake_refuses_duplicate() {
        let h = DefaultHandshake;
        assert_eq!(
            h.accept(NodeId::from_u128(1), true).unwrap_err(),
            HandshakeFailure::DuplicateLink
        );
        assert!(h.accept(NodeId::from_u128(1), false).is_ok());
    }

    #[test]
    fn tie_break_favors_smaller_id() {
        assert!(wins_tie_break(NodeId::from_u128(1), NodeId::from_u128(2)));
        assert!(!wins_tie_break(NodeId::from_u128(2), NodeId::from_u128(1)));
    }
}
