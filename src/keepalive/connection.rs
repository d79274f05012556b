//! The connection surface the keepalive pool needs from a host-runtime
//! socket, standing in for `ngx_connection_t`.

use std::net::SocketAddr;

/// Result of a nonblocking 1-byte `MSG_PEEK`, as done by the idle
/// close-watcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PeekOutcome {
    /// `EAGAIN`: no data, connection still idle and healthy.
    WouldBlock,
    /// Zero bytes read: the peer closed its write side.
    Fin,
    /// Unexpected data arrived on an idle connection.
    Data,
    /// The peek itself failed.
    Error,
}

/// A backend connection as the pool sees it. A host runtime's real socket
/// type implements this to let the pool cache, reuse, and idle-watch it
/// without knowing anything about sockets, TLS, or I/O scheduling beyond
/// this surface.
pub trait Connection {
    fn peer_addr(&self) -> SocketAddr;

    /// Number of requests this connection has served so far, compared
    /// against the `requests` cap at free time.
    fn request_count(&self) -> u64;

    /// Registers the read event with the reactor ahead of caching; failure
    /// here makes the connection non-cacheable (matches
    /// `ngx_handle_read_event`'s role in `free_keepalive_peer`).
    fn register_read_event(&mut self) -> std::io::Result<()>;

    /// Whether the read side is already readable at hand-off time (the
    /// source's `c->read->ready` check right after caching).
    fn is_read_ready(&self) -> bool;

    /// Nonblocking 1-byte `MSG_PEEK`, used by the idle close-watcher.
    fn peek_one_byte(&mut self) -> std::io::Result<PeekOutcome>;

    /// Tears the connection down. For a TLS-backed connection this is
    /// where the `{Open, ShuttingDown, Closed}` handshake-teardown state
    /// machine (design note in spec.md §9) would live; this crate's plain
    /// TCP test double just drops the socket.
    fn close(&mut self);
}
