//! transfer-connector: decides, per connecting client, whether the proxy
//! should transfer it to another endpoint, and performs that transfer once.
//!
//! The embedding proxy implements [`ClientSession`] and forwards its login,
//! marker-response, pre-connect, disconnect and plugin-message events to the
//! [`RedirectCoordinator`] and [`ManualTransferHandler`] built by
//! [`ServerTransfer`].

pub mod bootstrap;
pub mod config;
pub mod coordinator;
pub mod manual;
pub mod redirections;
pub mod registry;
pub mod session;
pub mod stats;
pub mod transfer;

#[cfg(test)]
mod testing;

pub use bootstrap::ServerTransfer;
pub use config::{ConfigError, TransferConfig};
pub use coordinator::{LoginOutcome, MarkerDecision, PreConnectDecision, RedirectCoordinator};
pub use manual::{ManualTransferHandler, ManualTransferOutcome, MessageSource};
pub use session::{ClientSession, ConnectionId, MarkerResponse, ProtocolVersion, TransferTarget};
pub use stats::{StatsSnapshot, TransferStats};
