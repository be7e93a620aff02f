//! In-memory [`ClientSession`] used by the unit tests.

use std::sync::Mutex;

use crate::session::{ClientSession, ConnectionId, ProtocolVersion, TransferTarget};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCall {
    Request(String),
    Store(String, Vec<u8>),
    Transfer(TransferTarget),
}

type Responder = Box<dyn Fn(ConnectionId, &str) + Send + Sync>;

/// Records every call the connector makes on the client.
///
/// With a responder installed, `request_marker` hands the request straight
/// to it, which lets tests answer from inside the login handler before the
/// login has started waiting.
pub struct RecordingSession {
    id: ConnectionId,
    version: ProtocolVersion,
    calls: Mutex<Vec<SessionCall>>,
    responder: Option<Responder>,
}

impl RecordingSession {
    pub fn new(version: ProtocolVersion) -> Self {
        Self {
            id: ConnectionId::new(),
            version,
            calls: Mutex::new(Vec::new()),
            responder: None,
        }
    }

    pub fn with_responder(
        version: ProtocolVersion,
        responder: impl Fn(ConnectionId, &str) + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Some(Box::new(responder)),
            ..Self::new(version)
        }
    }

    pub fn calls(&self) -> Vec<SessionCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn requested(&self) -> bool {
        self.calls()
            .iter()
            .any(|c| matches!(c, SessionCall::Request(_)))
    }

    pub fn transfers(&self) -> Vec<TransferTarget> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                SessionCall::Transfer(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    pub fn stored(&self) -> Vec<(String, Vec<u8>)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                SessionCall::Store(name, value) => Some((name, value)),
                _ => None,
            })
            .collect()
    }
}

impl ClientSession for RecordingSession {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn protocol_version(&self) -> ProtocolVersion {
        self.version
    }

    fn request_marker(&self, name: &str) {
        self.calls
            .lock()
            .unwrap()
            .push(SessionCall::Request(name.to_string()));
        if let Some(responder) = &self.responder {
            responder(self.id, name);
        }
    }

    fn store_marker(&self, name: &str, value: &[u8]) {
        self.calls
            .lock()
            .unwrap()
            .push(SessionCall::Store(name.to_string(), value.to_vec()));
    }

    fn transfer_to(&self, target: &TransferTarget) {
        self.calls
            .lock()
            .unwrap()
            .push(SessionCall::Transfer(target.clone()));
    }
}
