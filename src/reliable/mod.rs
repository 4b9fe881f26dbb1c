//! Optional reliable-delivery layer on top of the unreliable gossip core
//! (§4.I). Everything here rides inside `DirectData`/`GatewayData` payloads;
//! the core has no knowledge of acks, retries, or sequence numbers.

pub mod manager;
pub mod store;
pub mod wire;

pub use manager::{ReliableCallbacks, ReliableDeliveryManager};
pub use store::{InMemoryStore, PendingMessage, PendingStore};
pub use wire::ReliablePacket;
