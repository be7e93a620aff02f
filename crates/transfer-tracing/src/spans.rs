//! Span builder helpers for connector instrumentation.
//!
//! Every span carries `connection_id` so the login, marker response and
//! pre-connect events of one connection attempt can be joined in a trace
//! backend even though they run on different tasks.

/// Span for a suspended (or bypassed) login.
///
/// Fields recorded later:
/// - `outcome`: how the wait ended (`bypassed`, `resolved`, `interrupted`, ...)
/// - `wait_ms`: milliseconds spent parked on the marker round trip
#[macro_export]
macro_rules! login_span {
    ($connection_id:expr, $protocol_version:expr) => {
        tracing::info_span!(
            "login",
            connection_id = %$connection_id,
            protocol_version = $protocol_version,
            outcome = tracing::field::Empty,
            wait_ms = tracing::field::Empty,
        )
    };
}

/// Span for a marker response delivered by the client.
#[macro_export]
macro_rules! marker_response_span {
    ($connection_id:expr, $marker:expr) => {
        tracing::debug_span!(
            "marker_response",
            connection_id = %$connection_id,
            marker = %$marker,
            decision = tracing::field::Empty,
        )
    };
}

/// Span for the routing decision taken just before a backend connect.
#[macro_export]
macro_rules! pre_connect_span {
    ($connection_id:expr) => {
        tracing::info_span!(
            "pre_connect",
            connection_id = %$connection_id,
            target = tracing::field::Empty,
        )
    };
}

/// Span for a transfer requested over the legacy plugin channel.
#[macro_export]
macro_rules! manual_transfer_span {
    ($channel:expr) => {
        tracing::info_span!(
            "manual_transfer",
            channel = %$channel,
            connection_id = tracing::field::Empty,
            target = tracing::field::Empty,
        )
    };
}
