//! The timer/event-registration surface the pool needs from a host event
//! loop. Registering interest in a readable socket and arming/cancelling a
//! timer are the only two primitives `ngx_event_t` provides that this
//! module actually uses.

use std::time::Duration;

pub trait Reactor<C> {
    /// Opaque handle to an armed timer, cancellable later.
    type Timer: Copy;

    fn add_timer(&mut self, after: Duration) -> Self::Timer;
    fn cancel_timer(&mut self, timer: Self::Timer);

    /// Arms (or re-arms) read-readiness notification for a cached, idle
    /// connection — the source's `ngx_handle_read_event`.
    fn register_read(&mut self, conn: &mut C) -> std::io::Result<()>;
}
