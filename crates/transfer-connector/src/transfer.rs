//! The one operation shared by automatic and manual transfers.

use crate::session::{ClientSession, TransferTarget};

/// Marker value proving the client already went through a transfer.
pub const CONFIRMED_MARKER: &[u8] = &[0x01];

/// Marker value written for clients that cannot take part in the round trip.
pub const EMPTY_MARKER: &[u8] = &[];

/// Store the confirmed marker on the client, then redirect it to `target`.
///
/// The marker is written first so the client presents it when it arrives
/// at `target`.
pub fn transfer(session: &dyn ClientSession, marker_name: &str, target: &TransferTarget) {
    session.store_marker(marker_name, CONFIRMED_MARKER);
    session.transfer_to(target);
    tracing::info!(
        connection_id = %session.id(),
        target = %target,
        "Transferring client"
    );
}
