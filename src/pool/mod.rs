//! Pool managers: one per poller phase, owning the sockets currently in that
//! phase and driving their poller (§4.D).

pub mod connecting_pool;
pub mod listener_pool;
pub mod reader_pool;
pub mod writer_pool;

pub use connecting_pool::{ConnectingOutcome, ConnectingPool};
pub use listener_pool::ListenerPool;
pub use reader_pool::{ReaderOutcome, ReaderPool};
pub use writer_pool::{WriterOutcome, WriterPool};
