//! Host-facing types: connection identity, protocol version, and the
//! [`ClientSession`] seam the embedding proxy implements.

use std::fmt;

use bytes::Bytes;
use serde::Serialize;
use uuid::Uuid;

use crate::transfer::CONFIRMED_MARKER;

/// Opaque identifier of one connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generate a fresh random identifier (UUID v4).
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Protocol capability number declared by the client in its handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProtocolVersion(pub i32);

impl ProtocolVersion {
    /// First protocol version that supports stored markers and transfers.
    pub const MIN_TRANSFER: ProtocolVersion = ProtocolVersion(767);

    pub fn number(self) -> i32 {
        self.0
    }

    pub fn supports_transfer(self) -> bool {
        self >= Self::MIN_TRANSFER
    }
}

/// Endpoint a client is redirected to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TransferTarget {
    pub host: String,
    pub port: u16,
}

impl TransferTarget {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for TransferTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// What the client sent back for a marker request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerResponse {
    /// The client refused the request (or the platform cancelled it).
    Rejected,
    /// The client answered; `None` means it holds no value for the marker.
    Returned(Option<Bytes>),
}

impl MarkerResponse {
    /// Only the exact confirmed marker counts; anything else fails closed.
    pub fn is_confirmed(&self) -> bool {
        match self {
            MarkerResponse::Returned(Some(data)) => data.as_ref() == CONFIRMED_MARKER,
            _ => false,
        }
    }
}

/// A connected client as seen by the connector.
///
/// Implemented by the embedding proxy. Calls are fire-and-forget: the
/// answer to [`request_marker`](ClientSession::request_marker) arrives later
/// as a marker-response event, possibly on another thread.
pub trait ClientSession: Send + Sync {
    fn id(&self) -> ConnectionId;

    fn protocol_version(&self) -> ProtocolVersion;

    /// Ask the client to echo back the marker stored under `name`.
    fn request_marker(&self, name: &str);

    /// Store `value` under `name` on the client.
    fn store_marker(&self, name: &str, value: &[u8]);

    /// Tell the client to reconnect to `target`.
    fn transfer_to(&self, target: &TransferTarget);
}
