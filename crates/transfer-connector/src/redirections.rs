//! Connections marked for redirection at their next first-hop connect.

use std::sync::Arc;

use dashmap::DashSet;

use crate::session::ConnectionId;

/// Concurrent set of redirection marks. Cheap to clone (Arc).
#[derive(Clone, Default)]
pub struct RedirectionSet {
    marks: Arc<DashSet<ConnectionId>>,
}

impl RedirectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the connection was already marked.
    pub fn mark(&self, id: ConnectionId) -> bool {
        self.marks.insert(id)
    }

    /// Atomically clear the mark, reporting whether it was set.
    pub fn take(&self, id: ConnectionId) -> bool {
        self.marks.remove(&id).is_some()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.marks.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }
}
