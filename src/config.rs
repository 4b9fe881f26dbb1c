//! Runtime configuration (§6, §10.C).

use std::time::Duration;

/// Compile-time lane count (§6 `priority_count`). [`crate::writer_queue::WriterQueue`]
/// and [`crate::channel::Channel`] stay generic over this for testing; the
/// pool/node/node-pool layers are built against this one concrete value.
pub const PRIORITY_COUNT: usize = 3;

/// Tunables recognised by a [`crate::node_pool::NodePool`].
///
/// `priority_count` is deliberately absent: §6 specifies it as a
/// compile-time constant, carried as the `PRIORITIES` const generic on
/// [`crate::writer_queue::WriterQueue`] and [`crate::channel::Channel`]
/// (fixed crate-wide at [`PRIORITY_COUNT`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub heartbeat_interval: Duration,
    pub heartbeat_timeout: Duration,
    pub alive_interval: Duration,
    pub alive_timeout: Duration,
    pub max_hops: u16,
    pub reconnect_attempts: u32,
    pub reconnect_timeout: Duration,
    pub frame_mtu: u16,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            heartbeat_interval: Duration::from_secs(5),
            heartbeat_timeout: Duration::from_secs(15),
            alive_interval: Duration::from_secs(1),
            alive_timeout: Duration::from_secs(3),
            max_hops: 8,
            reconnect_attempts: 5,
            reconnect_timeout: Duration::from_secs(5),
            frame_mtu: 1460,
        }
    }
}

impl Config {
    pub fn new() -> Config {
        Config::default()
    }

    pub fn with_heartbeat_interval(mut self, d: Duration) -> Config {
        self.heartbeat_interval = d;
        self
    }

    pub fn with_heartbeat_timeout(mut self, d: Duration) -> Config {
        self.heartbeat_timeout = d;
        self
    }

    pub fn with_alive_interval(mut self, d: Duration) -> Config {
        self.alive_interval = d;
        self
    }

    pub fn with_alive_timeout(mut self, d: Duration) -> Config {
        self.alive_timeout = d;
        self
    }

    pub fn with_max_hops(mut self, hops: u16) -> Config {
        self.max_hops = hops;
        self
    }

    pub fn with_reconnect_attempts(mut self, attempts: u32) -> Config {
        self.reconnect_attempts = attempts;
        self
    }

    pub fn with_reconnect_timeout(mut self, d: Duration) -> Config {
        self.reconnect_timeout = d;
        self
    }

    pub fn with_frame_mtu(mut self, mtu: u16) -> Config {
        self.frame_mtu = mtu;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let c = Config::default();
        assert_eq!(c.heartbeat_interval, Duration::from_secs(5));
        assert_eq!(c.heartbeat_timeout, Duration::from_secs(15));
        assert_eq!(c.alive_interval, Duration::from_secs(1));
        assert_eq!(c.alive_timeout, Duration::from_secs(3));
        assert_eq!(c.max_hops, 8);
        assert_eq!(c.reconnect_attempts, 5);
        assert_eq!(c.reconnect_timeout, Duration::from_secs(5));
        assert_eq!(c.frame_mtu, 1460);
    }

    #[test]
    fn builder_overrides_fields() {
        let c = Config::new().with_max_hops(3).with_frame_mtu(512);
        assert_eq!(c.max_hops, 3);
        assert_eq!(c.frame_mtu, 512);
        assert_eq!(c.heartbeat_interval, Duration::from_secs(5));
    }
}
