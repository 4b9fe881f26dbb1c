//! Gossip-maintained routing table (§3, §4.H).

use std::time::Instant;

use indexmap::IndexMap;

use crate::node_id::NodeId;

/// One route: the next-hop gateway and hop count to reach a destination.
#[derive(Debug, Clone, Copy)]
pub struct Route {
    pub gateway: NodeId,
    pub hops: u16,
    pub mtime: Instant,
}

/// `destination -> Route`, one current-best entry per destination (§3).
#[derive(Debug, Default)]
pub struct RoutingTable {
    routes: IndexMap<NodeId, Route>,
    default_gateway: Option<NodeId>,
}

impl RoutingTable {
    pub fn new() -> RoutingTable {
        RoutingTable::default()
    }

    pub fn get(&self, destination: NodeId) -> Option<&Route> {
        self.routes.get(&destination)
    }

    pub fn default_gateway(&self) -> Option<NodeId> {
        self.default_gateway
    }

    pub fn set_default_gateway(&mut self, gateway: Option<NodeId>) {
        self.default_gateway = gateway;
    }

    /// Install a direct route to a newly established peer (`hops == 0`).
    pub fn insert_direct(&mut self, peer: NodeId, now: Instant) {
        self.routes.insert(peer, Route { gateway: peer, hops: 0, mtime: now });
    }

    /// Consider a gossiped `(destination, via, hops)` candidate. Installs it
    /// only if there is no current entry or the candidate is strictly better
    /// (§4.H: smaller hops; ties broken by smaller gateway id). Returns
    /// `true` the first time any route to `destination` is installed — the
    /// edge for `on_node_alive` (see DESIGN.md open-question resolution).
    pub fn consider(&mut self, destination: NodeId, via: NodeId, hops: u16, now: Instant) -> bool {
        match self.routes.get_mut(&destination) {
            None => {
                self.routes.insert(destination, Route { gateway: via, hops, mtime: now });
                true
            }
            Some(existing) => {
                let better = hops < existing.hops || (hops == existing.hops && via < existing.gateway);
                if better {
                    existing.gateway = via;
                    existing.hops = hops;
                }
                // Idempotent re-announcement still refreshes mtime so expiry
                // tracks the most recent gossip, win or not.
                if hops <= existing.hops {
                    existing.mtime = now;
                }
                false
            }
        }
    }

    /// Remove every route whose next hop is `peer` (channel destruction,
    /// §4.H); clears the default gateway if it was `peer`. Returns the
    /// removed destinations.
    pub fn remove_via(&mut self, peer: NodeId) -> Vec<NodeId> {
        let removed: Vec<NodeId> = self
            .routes
            .iter()
            .filter(|(_, route)| route.gateway == peer)
            .map(|(dest, _)| *dest)
            .collect();

        for dest in &removed {
            self.routes.shift_remove(dest);
        }
        if self.default_gateway == Some(peer) {
            self.default_gateway = None;
        }
        removed
    }

    /// Destinations whose route has not been refreshed since `deadline`.
    pub fn expired_since(&self, deadline: Instant) -> Vec<NodeId> {
        self.routes
            .iter()
            .filter(|(_, route)| route.mtime < deadline)
            .map(|(dest, _)| *dest)
            .collect()
    }

    pub fn remove(&mut self, destination: NodeId) {
        self.routes.shift_remove(&destination);
        if self.default_gateway == Some(destination) {
            self.default_gateway = None;
        }
    }

    pub fn destinations(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.routes.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn nid(v: u128) -> NodeId {
        NodeId::from_u128(v)
    }

    #[test]
    fn direct_route_has_zero_hops() {
        let mut t = RoutingTable::new();
        let now = Instant::now();
        t.insert_direct(nid(1), now);
        assert_eq!(t.get(nid(1)).unwrap().hops, 0);
        assert_eq!(t.get(nid(1)).unwrap().gateway, nid(1));
    }

    #[test]
    fn gossip_installs_new_route_and_reports_first_install() {
        let mut t = RoutingTable::new();
        let now = Instant::now();
        let first = t.consider(nid(2), nid(1), 1, now);
        assert!(first);
        assert_eq!(t.get(nid(2)).unwrap().hops, 1);
    }

    #[test]
    fn gossip_prefers_strictly_fewer_hops() {
        let mut t = RoutingTable::new();
        let now = Instant::now();
        t.consider(nid(2), nid(1), 3, now);
        t.consider(nid(2), nid(9), 1, now);
        assert_eq!(t.get(nid(2)).unwrap().hops, 1);
        assert_eq!(t.get(nid(2)).unwrap().gateway, nid(9));
    }

    #[test]
    fn gossip_breaks_hop_tie_by_smaller_gateway_id() {
        let mut t = RoutingTable::new();
        let now = Instant::now();
        t.consider(nid(2), nid(9), 1, now);
        t.consider(nid(2), nid(3), 1, now);
        assert_eq!(t.get(nid(2)).unwrap().gateway, nid(3));
    }

    #[test]
    fn gossip_does_not_worsen_existing_route() {
        let mut t = RoutingTable::new();
        let now = Instant::now();
        t.consider(nid(2), nid(3), 1, now);
        let installed_again = t.consider(nid(2), nid(9), 5, now);
        assert!(!installed_again);
        assert_eq!(t.get(nid(2)).unwrap().hops, 1);
        assert_eq!(t.get(nid(2)).unwrap().gateway, nid(3));
    }

    #[test]
    fn remove_via_clears_routes_and_default_gateway() {
        let mut t = RoutingTable::new();
        let now = Instant::now();
        t.insert_direct(nid(1), now);
        t.consider(nid(2), nid(1), 1, now);
        t.set_default_gateway(Some(nid(1)));

        let removed = t.remove_via(nid(1));
        assert_eq!(removed.len(), 2);
        assert!(t.get(nid(1)).is_none());
        assert!(t.get(nid(2)).is_none());
        assert_eq!(t.default_gateway(), None);
    }

    #[test]
    fn expired_since_finds_stale_routes() {
        let mut t = RoutingTable::new();
        let now = Instant::now();
        t.insert_direct(nid(1), now);
        let deadline = now + Duration::from_secs(3);
        assert_eq!(t.expired_since(deadline), vec![nid(1)]);
        assert!(t.expired_since(now).is_empty());
    }
}
