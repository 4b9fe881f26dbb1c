//! A small peer-to-peer mesh networking library built on non-blocking TCP
//! and `epoll`, with gossip-based routing, gateway forwarding, and an
//! optional reliable-delivery layer.
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! meshnet-core = "0.1"
//! ```
//!
//! A minimal two-node setup looks like:
//!
//! ```no_run
//! use meshnet_core::addr::SocketAddress4;
//! use meshnet_core::callbacks::WithoutCallbacks;
//! use meshnet_core::node_id::NodeId;
//! use meshnet_core::node_pool::NodePool;
//!
//! let self_id = NodeId::from_u128(1);
//! let mut pool = NodePool::new(self_id, false, WithoutCallbacks);
//! let node = pool.add_node(vec![SocketAddress4::new(0x7f000001, 9000)]).unwrap();
//! pool.listen(node, 16).unwrap();
//! pool.step(Some(std::time::Duration::from_millis(100))).unwrap();
//! ```

pub mod addr;
pub mod callbacks;
pub mod channel;
pub mod config;
pub mod epoll;
pub mod error;
pub mod frame;
pub mod handshake;
pub mod heartbeat;
pub mod input_processor;
pub mod listener;
pub mod logger;
pub mod node;
pub mod node_id;
pub mod node_pool;
pub mod packet;
pub mod poller;
pub mod pool;
pub mod reconnect;
pub mod reliable;
pub mod routing;
pub mod socket;
mod sys;
mod waker;
pub mod writer_queue;

pub use addr::SocketAddress4;
pub use callbacks::Callbacks;
pub use config::Config;
pub use error::{Error, Result};
pub use node_id::NodeId;
pub use node_pool::NodePool;
pub use reliable::{ReliableCallbacks, ReliableDeliveryManager};
