//! Redirect coordinator: login suspension, marker resolution, and the
//! pre-connect routing decision.
//!
//! The three entry points run on independent tasks. A login parks on a
//! [`WaitRegistry`] entry until the marker response for the same connection
//! arrives. The response records its decision in the [`RedirectionSet`]
//! *before* waking the login, and only while it holds that login's registry
//! entry. A response with no parked login records nothing, so a mark never
//! outlives the attempt that asked for it. The first-hop pre-connect then
//! consumes that decision.

use std::sync::Arc;
use std::time::Instant;

use tracing::Instrument;

use crate::config::TransferConfig;
use crate::redirections::RedirectionSet;
use crate::registry::{WaitOutcome, WaitRegistry};
use crate::session::{ClientSession, ConnectionId, MarkerResponse, TransferTarget};
use crate::stats::TransferStats;
use crate::transfer::{self, EMPTY_MARKER};

/// How a login left the coordinator. Every variant resumes the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Direct connect disabled or client too old; nothing was requested.
    Bypassed,
    /// The marker round trip resolved.
    Resolved,
    /// Another login for the same connection is already waiting.
    Duplicate,
    /// Woken without a decision (interrupt or disconnect).
    Interrupted,
    /// The configured marker timeout elapsed.
    TimedOut,
}

impl LoginOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            LoginOutcome::Bypassed => "bypassed",
            LoginOutcome::Resolved => "resolved",
            LoginOutcome::Duplicate => "duplicate",
            LoginOutcome::Interrupted => "interrupted",
            LoginOutcome::TimedOut => "timed_out",
        }
    }
}

/// What a marker response decided for its connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerDecision {
    /// The client presented the confirmed marker.
    Stay,
    /// Anything else: the next first-hop connect is redirected.
    Redirect,
    /// Not ours (other marker name, or direct connect disabled).
    Ignored,
    /// No login was waiting (late, repeated, or after disconnect); nothing
    /// recorded.
    Unsolicited,
}

/// Routing result for a pre-connect event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreConnectDecision {
    /// Let the platform connect to the backend it chose.
    Proceed,
    /// The platform's choice must be denied; the client was sent here.
    Redirected(TransferTarget),
}

/// Coordinates the marker round trip across login, marker-response and
/// pre-connect events.
pub struct RedirectCoordinator {
    config: Arc<TransferConfig>,
    waits: WaitRegistry,
    redirections: RedirectionSet,
    stats: TransferStats,
}

impl RedirectCoordinator {
    pub fn new(config: Arc<TransferConfig>, stats: TransferStats) -> Self {
        Self {
            config,
            waits: WaitRegistry::new(),
            redirections: RedirectionSet::new(),
            stats,
        }
    }

    /// Handle a login. Resolves once the connection may continue.
    ///
    /// For eligible clients this requests the marker and parks until
    /// [`on_marker_response`](Self::on_marker_response) wakes it, the wait is
    /// interrupted, or the optional timeout elapses. The waiter is registered
    /// before the request is sent, so even an immediate response is seen.
    pub async fn on_login(&self, session: &dyn ClientSession) -> LoginOutcome {
        let id = session.id();
        let version = session.protocol_version();
        let span = transfer_tracing::login_span!(id, version.number());

        async {
            let outcome = self.suspend_login(session).await;
            tracing::Span::current().record("outcome", outcome.as_str());
            outcome
        }
        .instrument(span)
        .await
    }

    async fn suspend_login(&self, session: &dyn ClientSession) -> LoginOutcome {
        let id = session.id();

        if !self.config.direct_connect() || !session.protocol_version().supports_transfer() {
            self.stats.inc_bypassed();
            tracing::debug!("Login bypasses marker round trip");
            return LoginOutcome::Bypassed;
        }

        let pending = match self.waits.register(id) {
            Ok(pending) => pending,
            Err(e) => {
                tracing::warn!(error = %e, "Duplicate login while a marker wait is pending");
                return LoginOutcome::Duplicate;
            }
        };

        session.request_marker(self.config.cookie_name());
        self.stats.inc_suspended();
        tracing::debug!(marker = %self.config.cookie_name(), "Waiting for marker response");

        let start = Instant::now();
        let outcome = pending.wait(self.config.marker_timeout()).await;
        tracing::Span::current().record("wait_ms", start.elapsed().as_millis() as u64);

        match outcome {
            WaitOutcome::Signaled => LoginOutcome::Resolved,
            WaitOutcome::Interrupted => {
                self.stats.inc_interrupted();
                tracing::warn!("Interrupted while waiting for the marker response");
                LoginOutcome::Interrupted
            }
            WaitOutcome::TimedOut => {
                self.stats.inc_timed_out();
                tracing::warn!(
                    timeout_ms = ?self.config.marker_timeout().map(|t| t.as_millis()),
                    "Timed out waiting for the marker response"
                );
                LoginOutcome::TimedOut
            }
        }
    }

    /// Handle the client's answer to a marker request.
    ///
    /// Anything other than the exact confirmed marker marks the connection for
    /// redirection, then the pending login is woken exactly once. Without a
    /// pending login the response is unsolicited and leaves no mark.
    pub fn on_marker_response(
        &self,
        id: ConnectionId,
        marker: &str,
        response: &MarkerResponse,
    ) -> MarkerDecision {
        let span = transfer_tracing::marker_response_span!(id, marker);
        let _entered = span.enter();

        if marker != self.config.cookie_name() || !self.config.direct_connect() {
            tracing::trace!("Ignoring marker response");
            return MarkerDecision::Ignored;
        }

        let confirmed = response.is_confirmed();
        let signaled = self.waits.signal_with(id, || {
            if confirmed {
                self.stats.inc_confirmed();
            } else {
                self.redirections.mark(id);
                self.stats.inc_marked();
            }
        });

        let decision = match (signaled, confirmed) {
            (false, _) => {
                tracing::debug!("No pending login for marker response");
                MarkerDecision::Unsolicited
            }
            (true, true) => MarkerDecision::Stay,
            (true, false) => MarkerDecision::Redirect,
        };
        span.record("decision", tracing::field::debug(decision));
        decision
    }

    /// Decide routing just before the platform connects to a backend.
    ///
    /// Only the first hop (`previous_backend == None`) is considered. A
    /// redirection mark is consumed here and replaces the platform's choice.
    pub fn on_pre_connect(
        &self,
        session: &dyn ClientSession,
        previous_backend: Option<&str>,
    ) -> PreConnectDecision {
        let id = session.id();
        let span = transfer_tracing::pre_connect_span!(id);
        let _entered = span.enter();

        if let Some(previous) = previous_backend {
            tracing::trace!(previous_backend = %previous, "Backend hop, not redirecting");
            return PreConnectDecision::Proceed;
        }

        if !self.redirections.take(id) {
            if !session.protocol_version().supports_transfer() {
                session.store_marker(self.config.cookie_name(), EMPTY_MARKER);
            }
            return PreConnectDecision::Proceed;
        }

        let Some(target) = self.config.target() else {
            tracing::warn!("Redirection mark without a configured target, proceeding");
            return PreConnectDecision::Proceed;
        };

        span.record("target", tracing::field::display(target));
        transfer::transfer(session, self.config.cookie_name(), target);
        self.stats.inc_redirects();
        PreConnectDecision::Redirected(target.clone())
    }

    /// Release a parked login without a decision. Returns whether one was
    /// waiting.
    pub fn interrupt(&self, id: ConnectionId) -> bool {
        self.waits.interrupt(id)
    }

    /// Drop all state for a connection that went away.
    pub fn on_disconnect(&self, id: ConnectionId) {
        let interrupted = self.waits.interrupt(id);
        let marked = self.redirections.take(id);
        if interrupted || marked {
            tracing::debug!(
                connection_id = %id,
                interrupted,
                marked,
                "Cleared state for disconnected client"
            );
        }
    }

    pub fn is_waiting(&self, id: ConnectionId) -> bool {
        self.waits.is_waiting(id)
    }

    pub fn is_marked(&self, id: ConnectionId) -> bool {
        self.redirections.contains(id)
    }

    pub fn pending_waits(&self) -> usize {
        self.waits.len()
    }

    pub fn pending_marks(&self) -> usize {
        self.redirections.len()
    }
}
