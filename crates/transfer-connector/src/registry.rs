//! Per-connection wait registry.
//!
//! A suspended login registers a single-use waiter keyed by its
//! [`ConnectionId`] and parks on the receiving half. Whichever task resolves
//! the marker round trip removes the entry and wakes it. Insert and remove are
//! atomic per key (DashMap shard locks), and no shard lock is ever held
//! across an `.await`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::oneshot;

use crate::session::ConnectionId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("connection {0} already has a pending marker wait")]
    AlreadyWaiting(ConnectionId),
}

/// How a parked login was released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The round trip resolved and the waiter was signaled.
    Signaled,
    /// The entry was removed without a signal (interrupt or disconnect).
    Interrupted,
    /// The configured bound elapsed first.
    TimedOut,
}

struct Waiter {
    /// Distinguishes this registration from a later one under the same id.
    ticket: u64,
    wake: oneshot::Sender<()>,
}

#[derive(Default)]
struct RegistryInner {
    waiters: DashMap<ConnectionId, Waiter>,
    next_ticket: AtomicU64,
}

/// Concurrent map of pending waits. Cheap to clone (Arc).
#[derive(Clone, Default)]
pub struct WaitRegistry {
    inner: Arc<RegistryInner>,
}

impl WaitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter for `id` if none exists yet.
    ///
    /// The entry is in the map when this returns, so any signal issued after
    /// it (e.g. in response to a request sent afterwards) reaches it.
    pub fn register(&self, id: ConnectionId) -> Result<PendingWait, RegistryError> {
        match self.inner.waiters.entry(id) {
            Entry::Occupied(_) => Err(RegistryError::AlreadyWaiting(id)),
            Entry::Vacant(slot) => {
                let ticket = self.inner.next_ticket.fetch_add(1, Ordering::Relaxed);
                let (wake, parked) = oneshot::channel();
                slot.insert(Waiter { ticket, wake });
                Ok(PendingWait {
                    id,
                    ticket,
                    parked,
                    registry: self.clone(),
                })
            }
        }
    }

    /// Remove the waiter for `id` and wake it.
    ///
    /// Returns `false` when there was nothing to wake: the login never
    /// suspended, was already signaled, or has gone away. Never an error.
    pub fn signal(&self, id: ConnectionId) -> bool {
        self.signal_with(id, || {})
    }

    /// Like [`signal`](Self::signal), but runs `before_wake` first, only if a
    /// waiter is present, and while its entry is still locked.
    ///
    /// Anything `before_wake` records is visible to the woken login, and to
    /// any concurrent [`interrupt`](Self::interrupt) for the same id once it
    /// returns.
    pub fn signal_with(&self, id: ConnectionId, before_wake: impl FnOnce()) -> bool {
        let removed = self.inner.waiters.remove_if(&id, |_, _| {
            before_wake();
            true
        });
        match removed {
            Some((_, waiter)) => {
                // The receiver only goes away with a login that is being
                // dropped; the entry was still claimed.
                let _ = waiter.wake.send(());
                true
            }
            None => false,
        }
    }

    /// Remove the waiter for `id` without signaling it. The parked login
    /// observes [`WaitOutcome::Interrupted`].
    pub fn interrupt(&self, id: ConnectionId) -> bool {
        self.inner.waiters.remove(&id).is_some()
    }

    pub fn is_waiting(&self, id: ConnectionId) -> bool {
        self.inner.waiters.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.inner.waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.waiters.is_empty()
    }
}

/// The parked half of a registration.
///
/// Dropping it (including dropping the future of [`PendingWait::wait`]
/// mid-await) removes its own registry entry, so a cancelled login never
/// leaves a waiter behind.
pub struct PendingWait {
    id: ConnectionId,
    ticket: u64,
    parked: oneshot::Receiver<()>,
    registry: WaitRegistry,
}

impl PendingWait {
    /// Park until signaled, interrupted, or `limit` elapses.
    pub async fn wait(mut self, limit: Option<Duration>) -> WaitOutcome {
        let received = match limit {
            None => (&mut self.parked).await,
            Some(limit) => match tokio::time::timeout(limit, &mut self.parked).await {
                Ok(received) => received,
                Err(_) => {
                    if self.withdraw() {
                        return WaitOutcome::TimedOut;
                    }
                    // Claimed by a signal or interrupt at the deadline; its
                    // wake or drop is already on the way.
                    (&mut self.parked).await
                }
            },
        };
        match received {
            Ok(()) => WaitOutcome::Signaled,
            Err(_) => WaitOutcome::Interrupted,
        }
    }

    /// Remove this registration's own entry. Returns whether it was still
    /// there.
    fn withdraw(&self) -> bool {
        let ticket = self.ticket;
        self.registry
            .inner
            .waiters
            .remove_if(&self.id, |_, waiter| waiter.ticket == ticket)
            .is_some()
    }
}

impl Drop for PendingWait {
    fn drop(&mut self) {
        self.withdraw();
    }
}
