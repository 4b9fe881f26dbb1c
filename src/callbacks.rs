//! Single trait-object callback seam (§9 "callback soup" re-architecture, §6).

use crate::node_id::NodeId;

/// Everything a [`crate::node_pool::NodePool`] reports to its owner, as one
/// trait instead of a handful of independent `std::function` slots. Default
/// methods log-and-drop, matching `without_callbacks.hpp`'s no-op stance.
pub trait Callbacks {
    fn channel_established(&mut self, peer: NodeId, is_gateway: bool) {
        log::debug!("channel established with {peer} (gateway={is_gateway})");
    }

    fn channel_destroyed(&mut self, peer: NodeId) {
        log::debug!("channel destroyed with {peer}");
    }

    fn node_alive(&mut self, peer: NodeId) {
        log::trace!("node alive: {peer}");
    }

    fn node_expired(&mut self, peer: NodeId) {
        log::debug!("node expired: {peer}");
    }

    fn message_received(&mut self, from: NodeId, priority: u8, bytes: &[u8]) {
        log::trace!("message received from {from} (priority={priority}, len={})", bytes.len());
    }

    fn message_delivered(&mut self, to: NodeId, msgid: u128) {
        log::trace!("message {msgid:032x} delivered to {to}");
    }

    fn message_lost(&mut self, to: NodeId, msgid: u128) {
        log::warn!("message {msgid:032x} lost for {to}");
    }

    fn unreachable(&mut self, gw: NodeId, sender: NodeId, receiver: NodeId) {
        log::warn!("{receiver} unreachable from {sender} via {gw}");
    }
}

/// No-op implementation for callers who only need a subset of events (mirrors
/// `without_callbacks.hpp`).
#[derive(Debug, Default)]
pub struct WithoutCallbacks;

impl Callbacks for WithoutCallbacks {}
