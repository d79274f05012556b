//! Upstream keepalive connection pool and its wait queue.
//!
//! Dialing, TLS, and which peer a balancer picks next are a host runtime's
//! job, exposed here only through the `Balancer` and `Reactor` traits;
//! this module owns connection caching, LRU eviction, idle-read
//! watching, and admission control only.

pub mod connection;
pub mod pool;
pub mod reactor;
pub mod wait_queue;

pub use connection::{Connection, PeekOutcome};
pub use pool::{Balancer, ExchangeState, FreeOutcome, GetPeerOutcome, Pool};
pub use reactor::Reactor;
pub use wait_queue::{WaitQueue, WaiterId, WakeReason};
