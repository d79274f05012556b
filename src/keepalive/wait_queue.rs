//! Suspends a caller when the keepalive pool is saturated, waking it once
//! a connection is returned.
//!
//! Modeled on the dynamic-resolve wait list grafted onto the keepalive
//! module (`T_NGX_HTTP_DYNAMIC_RESOLVE` branch of
//! `ngx_http_upstream_get_keepalive_peer`/`free_keepalive_peer`): a bounded
//! FIFO of waiters, each released in order as slots free up. A host event
//! loop has no callback registry here to hook into, so each waiter gets a
//! `tokio::sync::oneshot` channel instead of a raw continuation — the
//! caller awaits the receiver and the queue holds only the sender.

use std::collections::VecDeque;

use tokio::sync::oneshot;

use crate::config::{OverflowPolicy, WaitQueueConfig};

/// Why a waiter was woken.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WakeReason {
    /// A connection was returned; the waiter should retry `get_peer`.
    SlotAvailable,
    /// The queue was drained without a slot becoming available (pool
    /// shutdown, or the waiter's own timeout elapsing).
    Cancelled,
}

/// Identifies a queued waiter so its caller-armed timeout can find and
/// remove exactly that entry, without disturbing anyone else in line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WaiterId(u64);

pub struct WaitQueue {
    waiters: VecDeque<(WaiterId, oneshot::Sender<WakeReason>)>,
    next_id: u64,
    max_waiters: usize,
    pub overflow: OverflowPolicy,
}

impl WaitQueue {
    pub fn new(config: WaitQueueConfig) -> Self {
        WaitQueue {
            waiters: VecDeque::with_capacity(config.max_waiters),
            next_id: 0,
            max_waiters: config.max_waiters,
            overflow: config.overflow,
        }
    }

    pub fn is_full(&self) -> bool {
        self.waiters.len() >= self.max_waiters
    }

    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }

    /// Registers a new waiter, returning its id (for a caller-armed
    /// timeout to reference later) and the receiver half to await. Does
    /// not check capacity; callers must consult `is_full` first so the
    /// `Busy`-vs-`Yield` decision stays in `Pool::get_peer`.
    pub fn enqueue(&mut self) -> (WaiterId, oneshot::Receiver<WakeReason>) {
        let id = WaiterId(self.next_id);
        self.next_id += 1;
        let (tx, rx) = oneshot::channel();
        self.waiters.push_back((id, tx));
        (id, rx)
    }

    /// Wakes the longest-waiting entry, if any, to retry admission. A
    /// dropped receiver (the caller gave up) is simply skipped.
    pub fn wake_one(&mut self) -> bool {
        while let Some((_, tx)) = self.waiters.pop_front() {
            if tx.send(WakeReason::SlotAvailable).is_ok() {
                return true;
            }
        }
        false
    }

    /// Removes exactly the waiter named by `id` and wakes it with
    /// `Cancelled`, for when its own timer (armed by the caller at
    /// `enqueue` time with the configured `timeout_secs`) elapses first.
    /// A no-op if `id` already woke or was removed.
    pub fn timeout_waiter(&mut self, id: WaiterId) -> bool {
        if let Some(pos) = self.waiters.iter().position(|(w, _)| *w == id) {
            let (_, tx) = self.waiters.remove(pos).unwrap();
            let _ = tx.send(WakeReason::Cancelled);
            true
        } else {
            false
        }
    }

    /// Drains every waiter with `Cancelled`, e.g. on pool shutdown.
    pub fn cancel_all(&mut self) {
        while let Some((_, tx)) = self.waiters.pop_front() {
            let _ = tx.send(WakeReason::Cancelled);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_waiters: usize) -> WaitQueueConfig {
        WaitQueueConfig {
            max_waiters,
            timeout_secs: 60,
            overflow: OverflowPolicy::Reject,
        }
    }

    #[test]
    fn is_full_reflects_max_waiters() {
        let mut q = WaitQueue::new(config(1));
        assert!(!q.is_full());
        let _ = q.enqueue();
        assert!(q.is_full());
    }

    #[tokio::test]
    async fn wake_one_releases_oldest_waiter_first() {
        let mut q = WaitQueue::new(config(2));
        let (_, rx_a) = q.enqueue();
        let (_, rx_b) = q.enqueue();

        assert!(q.wake_one());
        assert_eq!(rx_a.await.unwrap(), WakeReason::SlotAvailable);

        assert!(q.wake_one());
        assert_eq!(rx_b.await.unwrap(), WakeReason::SlotAvailable);

        assert!(!q.wake_one());
    }

    #[tokio::test]
    async fn wake_one_skips_dropped_receivers() {
        let mut q = WaitQueue::new(config(2));
        let (_, rx_a) = q.enqueue();
        drop(rx_a);
        let (_, rx_b) = q.enqueue();

        assert!(q.wake_one());
        assert_eq!(rx_b.await.unwrap(), WakeReason::SlotAvailable);
    }

    #[tokio::test]
    async fn cancel_all_wakes_every_waiter_as_cancelled() {
        let mut q = WaitQueue::new(config(2));
        let (_, rx_a) = q.enqueue();
        let (_, rx_b) = q.enqueue();
        q.cancel_all();
        assert_eq!(rx_a.await.unwrap(), WakeReason::Cancelled);
        assert_eq!(rx_b.await.unwrap(), WakeReason::Cancelled);
        assert!(q.is_empty());
    }

    #[tokio::test]
    async fn timeout_waiter_removes_only_the_named_entry() {
        let mut q = WaitQueue::new(config(2));
        let (id_a, rx_a) = q.enqueue();
        let (_, rx_b) = q.enqueue();

        assert!(q.timeout_waiter(id_a));
        assert_eq!(rx_a.await.unwrap(), WakeReason::Cancelled);
        assert_eq!(q.len(), 1);

        assert!(q.wake_one());
        assert_eq!(rx_b.await.unwrap(), WakeReason::SlotAvailable);
    }
}
