//! Atomic transfer statistics counters.
//!
//! Monotonic counters for logging and diagnostics. All atomics use `Relaxed`
//! ordering; nothing synchronizes on them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

#[derive(Default)]
struct StatsInner {
    logins_suspended: AtomicU64,
    logins_bypassed: AtomicU64,
    waits_interrupted: AtomicU64,
    waits_timed_out: AtomicU64,
    markers_confirmed: AtomicU64,
    redirects_marked: AtomicU64,
    redirects: AtomicU64,
    manual_transfers: AtomicU64,
}

/// Thread-safe transfer statistics. Cheap to clone (Arc).
#[derive(Clone, Default)]
pub struct TransferStats {
    inner: Arc<StatsInner>,
}

/// Snapshot of current counter values, serializable to JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub logins_suspended: u64,
    pub logins_bypassed: u64,
    pub waits_interrupted: u64,
    pub waits_timed_out: u64,
    pub markers_confirmed: u64,
    pub redirects_marked: u64,
    pub redirects: u64,
    pub manual_transfers: u64,
}

impl TransferStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_suspended(&self) {
        self.inner.logins_suspended.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_bypassed(&self) {
        self.inner.logins_bypassed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_interrupted(&self) {
        self.inner.waits_interrupted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_timed_out(&self) {
        self.inner.waits_timed_out.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_confirmed(&self) {
        self.inner.markers_confirmed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_marked(&self) {
        self.inner.redirects_marked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_redirects(&self) {
        self.inner.redirects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_manual(&self) {
        self.inner.manual_transfers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            logins_suspended: self.inner.logins_suspended.load(Ordering::Relaxed),
            logins_bypassed: self.inner.logins_bypassed.load(Ordering::Relaxed),
            waits_interrupted: self.inner.waits_interrupted.load(Ordering::Relaxed),
            waits_timed_out: self.inner.waits_timed_out.load(Ordering::Relaxed),
            markers_confirmed: self.inner.markers_confirmed.load(Ordering::Relaxed),
            redirects_marked: self.inner.redirects_marked.load(Ordering::Relaxed),
            redirects: self.inner.redirects.load(Ordering::Relaxed),
            manual_transfers: self.inner.manual_transfers.load(Ordering::Relaxed),
        }
    }
}
