//! Transfers requested by a backend over the legacy plugin channel.
//!
//! Frame layout: bytes `[0, MANUAL_PAYLOAD_OFFSET)` carry the channel name,
//! right-padded with NUL; everything after is the UTF-8 target server name.
//! The handler is stateless and never touches the coordinator.

use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};

use crate::config::TransferConfig;
use crate::session::{ClientSession, TransferTarget};
use crate::stats::TransferStats;
use crate::transfer;

/// Identifier of the legacy plugin channel.
pub const LEGACY_CHANNEL: &str = "BungeeCord";

/// Offset of the server name inside a manual transfer frame.
pub const MANUAL_PAYLOAD_OFFSET: usize = 32;

/// Port used for manual transfer targets.
pub const MANUAL_TRANSFER_PORT: u16 = 25565;

/// Who sent a plugin message.
pub enum MessageSource<'a> {
    Client(&'a dyn ClientSession),
    Backend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    NotAClient,
    ForeignChannel,
    UnsupportedProtocol,
    MalformedFrame,
    ChannelMismatch,
    EmptyServer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManualTransferOutcome {
    Transferred(TransferTarget),
    Ignored(IgnoreReason),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("channel name is {0} bytes, frames hold at most {}", MANUAL_PAYLOAD_OFFSET)]
    ChannelTooLong(usize),
}

/// Build a manual transfer frame, as a backend would send it.
pub fn encode_manual_frame(channel: &str, server: &str) -> Result<Bytes, FrameError> {
    if channel.len() > MANUAL_PAYLOAD_OFFSET {
        return Err(FrameError::ChannelTooLong(channel.len()));
    }
    let mut frame = BytesMut::with_capacity(MANUAL_PAYLOAD_OFFSET + server.len());
    frame.put_slice(channel.as_bytes());
    frame.put_bytes(0, MANUAL_PAYLOAD_OFFSET - channel.len());
    frame.put_slice(server.as_bytes());
    Ok(frame.freeze())
}

/// Handles inbound legacy-channel transfer requests.
#[derive(Clone)]
pub struct ManualTransferHandler {
    config: Arc<TransferConfig>,
    stats: TransferStats,
}

impl ManualTransferHandler {
    pub fn new(config: Arc<TransferConfig>, stats: TransferStats) -> Self {
        Self { config, stats }
    }

    /// Validate a plugin message and, if it is a transfer request for this
    /// connector, redirect the sending client immediately.
    pub fn on_plugin_message(
        &self,
        source: MessageSource<'_>,
        channel: &str,
        data: &[u8],
    ) -> ManualTransferOutcome {
        let span = transfer_tracing::manual_transfer_span!(channel);
        let _entered = span.enter();

        let outcome = self.handle(&span, source, channel, data);
        if let ManualTransferOutcome::Ignored(reason) = &outcome {
            tracing::trace!(reason = ?reason, "Ignoring plugin message");
        }
        outcome
    }

    fn handle(
        &self,
        span: &tracing::Span,
        source: MessageSource<'_>,
        channel: &str,
        data: &[u8],
    ) -> ManualTransferOutcome {
        use ManualTransferOutcome::Ignored;

        let MessageSource::Client(session) = source else {
            return Ignored(IgnoreReason::NotAClient);
        };
        span.record("connection_id", tracing::field::display(session.id()));

        if channel != LEGACY_CHANNEL {
            return Ignored(IgnoreReason::ForeignChannel);
        }
        if !session.protocol_version().supports_transfer() {
            return Ignored(IgnoreReason::UnsupportedProtocol);
        }
        if data.len() <= MANUAL_PAYLOAD_OFFSET {
            return Ignored(IgnoreReason::MalformedFrame);
        }

        let (name_field, payload) = data.split_at(MANUAL_PAYLOAD_OFFSET);
        let name_len = name_field
            .iter()
            .rposition(|&b| b != 0)
            .map_or(0, |last| last + 1);
        if &name_field[..name_len] != self.config.channel_name().as_bytes() {
            return Ignored(IgnoreReason::ChannelMismatch);
        }

        let server = match std::str::from_utf8(payload) {
            Ok(server) => server.trim(),
            Err(_) => return Ignored(IgnoreReason::MalformedFrame),
        };
        if server.is_empty() {
            return Ignored(IgnoreReason::EmptyServer);
        }

        let target = TransferTarget::new(server, MANUAL_TRANSFER_PORT);
        span.record("target", tracing::field::display(&target));
        transfer::transfer(session, self.config.cookie_name(), &target);
        self.stats.inc_manual();
        ManualTransferOutcome::Transferred(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_CHANNEL_NAME;
    use crate::session::ProtocolVersion;
    use crate::testing::{RecordingSession, SessionCall};

    fn handler() -> ManualTransferHandler {
        ManualTransferHandler::new(Arc::new(TransferConfig::default()), TransferStats::new())
    }

    #[test]
    fn test_transfers_to_payload_server() {
        let handler = handler();
        let session = RecordingSession::new(ProtocolVersion(767));
        let frame = encode_manual_frame(DEFAULT_CHANNEL_NAME, "play.example.com").unwrap();

        let outcome =
            handler.on_plugin_message(MessageSource::Client(&session), LEGACY_CHANNEL, &frame);

        let target = TransferTarget::new("play.example.com", 25565);
        assert_eq!(outcome, ManualTransferOutcome::Transferred(target.clone()));
        assert_eq!(
            session.calls(),
            vec![
                SessionCall::Store("namespace:transfer".to_string(), vec![0x01]),
                SessionCall::Transfer(target),
            ]
        );
        assert_eq!(handler.stats.snapshot().manual_transfers, 1);
    }

    #[test]
    fn test_works_without_direct_connect() {
        // Default config has direct connect off; manual transfers still apply.
        let handler = handler();
        let session = RecordingSession::new(ProtocolVersion(769));
        let frame = encode_manual_frame(DEFAULT_CHANNEL_NAME, "hub.example.com").unwrap();

        assert!(matches!(
            handler.on_plugin_message(MessageSource::Client(&session), LEGACY_CHANNEL, &frame),
            ManualTransferOutcome::Transferred(_)
        ));
    }

    #[test]
    fn test_ignored_messages_touch_nothing() {
        let handler = handler();
        let frame = encode_manual_frame(DEFAULT_CHANNEL_NAME, "play.example.com").unwrap();
        let modern = RecordingSession::new(ProtocolVersion(767));
        let legacy = RecordingSession::new(ProtocolVersion(766));
        let wrong_channel = encode_manual_frame("other:channel", "play.example.com").unwrap();
        let no_server = encode_manual_frame(DEFAULT_CHANNEL_NAME, "   ").unwrap();
        let mut bad_utf8 = BytesMut::from(&frame[..MANUAL_PAYLOAD_OFFSET]);
        bad_utf8.put_slice(&[0xff, 0xfe]);

        let check = |session: Option<&RecordingSession>, channel: &str, data: &[u8], reason| {
            let source = match session {
                Some(session) => MessageSource::Client(session),
                None => MessageSource::Backend,
            };
            assert_eq!(
                handler.on_plugin_message(source, channel, data),
                ManualTransferOutcome::Ignored(reason)
            );
        };

        check(None, LEGACY_CHANNEL, &frame, IgnoreReason::NotAClient);
        check(Some(&modern), "other:channel", &frame, IgnoreReason::ForeignChannel);
        check(Some(&legacy), LEGACY_CHANNEL, &frame, IgnoreReason::UnsupportedProtocol);
        check(Some(&modern), LEGACY_CHANNEL, &[], IgnoreReason::MalformedFrame);
        check(
            Some(&modern),
            LEGACY_CHANNEL,
            &frame[..MANUAL_PAYLOAD_OFFSET],
            IgnoreReason::MalformedFrame,
        );
        check(Some(&modern), LEGACY_CHANNEL, &bad_utf8, IgnoreReason::MalformedFrame);
        check(Some(&modern), LEGACY_CHANNEL, &wrong_channel, IgnoreReason::ChannelMismatch);
        check(Some(&modern), LEGACY_CHANNEL, &no_server, IgnoreReason::EmptyServer);

        assert!(modern.calls().is_empty());
        assert!(legacy.calls().is_empty());
        assert_eq!(handler.stats.snapshot().manual_transfers, 0);
    }

    #[test]
    fn test_channel_prefix_does_not_match() {
        let handler = handler();
        let session = RecordingSession::new(ProtocolVersion(767));
        let frame = encode_manual_frame("namespace:transfer", "play.example.com").unwrap();

        assert_eq!(
            handler.on_plugin_message(MessageSource::Client(&session), LEGACY_CHANNEL, &frame),
            ManualTransferOutcome::Ignored(IgnoreReason::ChannelMismatch)
        );
    }

    #[test]
    fn test_encode_rejects_long_channel() {
        let channel = "c".repeat(MANUAL_PAYLOAD_OFFSET + 1);
        assert_eq!(
            encode_manual_frame(&channel, "play.example.com"),
            Err(FrameError::ChannelTooLong(MANUAL_PAYLOAD_OFFSET + 1))
        );
    }
}
