//! The feed session state machine.
//!
//! [`FeedController`] is synchronous and owns nothing asynchronous; the
//! [`FeedRunner`](super::FeedRunner) drives it from a single task. Every URL
//! refresh bumps a generation, and asynchronous load results carry the
//! [`LoadTicket`] they were issued for so stale completions can be dropped.

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::FeedConfig;
use crate::device::{CaptureDevice, LocalCapture};
use crate::error::{Error, Result};
use crate::identity::SessionIdentity;

/// Observable state of a feed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedState {
    /// No session.
    Idle,
    /// Session active, no failure reported for the current source.
    Loading,
    /// Session active, the current source failed to load.
    Degraded,
}

impl std::fmt::Display for FeedState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Loading => write!(f, "loading"),
            Self::Degraded => write!(f, "degraded"),
        }
    }
}

/// Where the displayed feed comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum FeedSource {
    /// The remote streaming endpoint.
    Remote,
    /// A local capture device.
    Local {
        /// Device name.
        device: String,
    },
}

/// The data of a feed session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeedSession {
    /// Whether the session is running.
    pub active: bool,
    /// Current stream URL; only present while active on a remote source.
    pub source_url: Option<String>,
    /// Most recent load failure for the current source.
    pub last_error: Option<String>,
}

/// Identifies one load attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadTicket {
    generation: u64,
}

impl LoadTicket {
    /// The generation this ticket was issued for.
    #[must_use]
    pub fn generation(self) -> u64 {
        self.generation
    }
}

/// Maintains a single logical feed session and its health.
#[derive(Debug)]
pub struct FeedController {
    endpoint: Url,
    fallback_email: String,
    identity: Option<SessionIdentity>,
    session: FeedSession,
    source: Option<FeedSource>,
    local: Option<LocalCapture>,
    generation: u64,
    last_token: i64,
}

impl FeedController {
    /// Create a controller for the streaming backend at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is not an absolute http(s) URL.
    pub fn new(base_url: &str, fallback_email: impl Into<String>) -> Result<Self> {
        Ok(Self {
            endpoint: feed_endpoint(base_url)?,
            fallback_email: fallback_email.into(),
            identity: None,
            session: FeedSession::default(),
            source: None,
            local: None,
            generation: 0,
            last_token: 0,
        })
    }

    /// Create a controller from the feed configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured base URL is invalid.
    pub fn from_config(config: &FeedConfig) -> Result<Self> {
        Self::new(&config.base_url, config.fallback_email.clone())
    }

    /// The `/video_feed` endpoint all source URLs are built from.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Current session data.
    #[must_use]
    pub fn session(&self) -> &FeedSession {
        &self.session
    }

    /// Current source, if active.
    #[must_use]
    pub fn source(&self) -> Option<&FeedSource> {
        self.source.as_ref()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> FeedState {
        match (self.session.active, &self.session.last_error) {
            (false, _) => FeedState::Idle,
            (true, None) => FeedState::Loading,
            (true, Some(_)) => FeedState::Degraded,
        }
    }

    /// Ticket for the current load attempt.
    #[must_use]
    pub fn current_ticket(&self) -> LoadTicket {
        LoadTicket {
            generation: self.generation,
        }
    }

    /// Whether `ticket` still refers to the current load attempt.
    #[must_use]
    pub fn is_current(&self, ticket: LoadTicket) -> bool {
        self.session.active && ticket.generation == self.generation
    }

    /// Number of local tracks currently held.
    #[must_use]
    pub fn live_tracks(&self) -> usize {
        self.local.as_ref().map_or(0, LocalCapture::live_tracks)
    }

    /// Start (or restart) a remote session for `identity`.
    ///
    /// Without an identity the fallback address is used, so an active remote
    /// session always has a source URL.
    pub fn start(&mut self, identity: Option<&SessionIdentity>) -> LoadTicket {
        self.release_local();
        self.identity = identity.cloned();
        self.session.active = true;
        self.source = Some(FeedSource::Remote);
        let ticket = self.refresh();
        info!(
            url = self.session.source_url.as_deref().unwrap_or_default(),
            "Feed session started"
        );
        ticket
    }

    /// Start a session backed by a local capture device.
    ///
    /// # Errors
    ///
    /// Returns the device error (such as [`Error::DeviceAccessDenied`]); the
    /// controller is left exactly as it was.
    pub fn start_local(&mut self, device: &dyn CaptureDevice) -> Result<LoadTicket> {
        let capture = LocalCapture::acquire(device).map_err(|e| {
            warn!(device = %device.name(), error = %e, "Local capture failed to start");
            e
        })?;

        self.release_local();
        self.source = Some(FeedSource::Local {
            device: capture.device().to_string(),
        });
        self.local = Some(capture);
        self.session.active = true;
        let ticket = self.refresh();
        info!(device = %device.name(), "Local feed session started");
        Ok(ticket)
    }

    /// Record a load failure for the current source.
    ///
    /// Returns `true` only when this call moved the session into Degraded;
    /// repeated failures overwrite the message without a new transition.
    pub fn report_load_failure(&mut self, message: impl Into<String>) -> bool {
        if !self.session.active {
            debug!("Ignoring load failure for inactive session");
            return false;
        }

        let message = message.into();
        let entered = self.session.last_error.is_none();
        if entered {
            warn!(error = %message, "Feed degraded");
        } else {
            debug!(error = %message, "Feed still degraded");
        }
        self.session.last_error = Some(message);
        entered
    }

    /// Record a load failure for the attempt identified by `ticket`.
    ///
    /// Stale tickets (superseded by a refresh, or from before a stop) are
    /// ignored.
    pub fn report_load_failure_for(&mut self, ticket: LoadTicket, message: impl Into<String>) -> bool {
        if !self.is_current(ticket) {
            debug!(
                ticket = ticket.generation,
                current = self.generation,
                "Ignoring stale load failure"
            );
            return false;
        }
        self.report_load_failure(message)
    }

    /// Timer-driven retry: refresh the source only if it is degraded.
    pub fn retry_tick(&mut self) -> Option<LoadTicket> {
        if self.state() != FeedState::Degraded {
            return None;
        }
        debug!("Retrying degraded feed");
        Some(self.refresh())
    }

    /// User-driven retry: refresh the source now, degraded or not.
    ///
    /// Does nothing while idle.
    pub fn manual_retry(&mut self) -> Option<LoadTicket> {
        if !self.session.active {
            debug!("Manual retry ignored while idle");
            return None;
        }
        info!("Manual feed retry");
        Some(self.refresh())
    }

    /// End the session and release any local tracks.
    ///
    /// Returns `false` if there was nothing to stop.
    pub fn stop(&mut self) -> bool {
        let was_active = self.session.active;
        self.release_local();
        self.session = FeedSession::default();
        self.source = None;
        self.generation += 1;
        if was_active {
            info!("Feed session stopped");
        }
        was_active
    }

    fn release_local(&mut self) {
        if let Some(mut capture) = self.local.take() {
            capture.stop_all();
        }
    }

    fn refresh(&mut self) -> LoadTicket {
        self.generation += 1;
        self.session.last_error = None;
        self.session.source_url = match self.source {
            Some(FeedSource::Remote) => Some(self.build_url()),
            _ => None,
        };
        self.current_ticket()
    }

    fn build_url(&mut self) -> String {
        let email = self
            .identity
            .as_ref()
            .and_then(SessionIdentity::email)
            .unwrap_or(self.fallback_email.as_str())
            .to_string();
        let token = self.next_token();

        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("email", &email)
            .append_pair("t", &token.to_string());
        url.into()
    }

    /// Epoch milliseconds, strictly increasing per controller.
    fn next_token(&mut self) -> i64 {
        let token = Utc::now().timestamp_millis().max(self.last_token + 1);
        self.last_token = token;
        token
    }
}

impl Drop for FeedController {
    fn drop(&mut self) {
        self.release_local();
    }
}

fn feed_endpoint(base_url: &str) -> Result<Url> {
    let mut url = Url::parse(base_url).map_err(|source| Error::InvalidUrl {
        url: base_url.to_string(),
        source,
    })?;
    url.path_segments_mut()
        .map_err(|()| Error::ConfigValidation {
            message: format!("feed base URL cannot have a path: {base_url}"),
        })?
        .pop_if_empty()
        .push("video_feed");
    url.set_query(None);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::testing::FakeDevice;

    fn controller() -> FeedController {
        FeedController::new("http://localhost:5000", "default@example.com").unwrap()
    }

    fn token_of(url: &str) -> i64 {
        let parsed = Url::parse(url).unwrap();
        parsed
            .query_pairs()
            .find(|(k, _)| k == "t")
            .map(|(_, v)| v.parse().unwrap())
            .unwrap()
    }

    #[test]
    fn test_endpoint_appends_video_feed() {
        assert_eq!(
            controller().endpoint().as_str(),
            "http://localhost:5000/video_feed"
        );
        let nested = FeedController::new("https://cams.example.org/api/", "x@y.z").unwrap();
        assert_eq!(
            nested.endpoint().as_str(),
            "https://cams.example.org/api/video_feed"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let err = FeedController::new("not a url", "x@y.z").unwrap_err();
        assert!(matches!(err, Error::InvalidUrl { .. }));
    }

    #[test]
    fn test_initial_state_is_idle() {
        let c = controller();
        assert_eq!(c.state(), FeedState::Idle);
        assert!(c.session().source_url.is_none());
        assert!(c.source().is_none());
    }

    #[test]
    fn test_start_encodes_email() {
        let mut c = controller();
        c.start(Some(&SessionIdentity::new("ranger@example.com")));

        let url = c.session().source_url.clone().unwrap();
        assert!(url.starts_with("http://localhost:5000/video_feed?email=ranger%40example.com&t="));
        assert_eq!(url.matches("ranger%40example.com").count(), 1);
        assert!(token_of(&url) > 0);
        assert_eq!(c.state(), FeedState::Loading);
        assert_eq!(c.source(), Some(&FeedSource::Remote));
    }

    #[test]
    fn test_start_without_identity_uses_fallback() {
        let mut c = controller();
        c.start(None);

        let url = c.session().source_url.clone().unwrap();
        assert!(url.contains("email=default%40example.com"));
        assert!(c.session().active);
    }

    #[test]
    fn test_start_with_blank_email_uses_fallback() {
        let mut c = controller();
        c.start(Some(&SessionIdentity::new("  ")));
        assert!(c
            .session()
            .source_url
            .as_deref()
            .unwrap()
            .contains("default%40example.com"));
    }

    #[test]
    fn test_load_failure_degrades() {
        let mut c = controller();
        c.start(None);

        assert!(c.report_load_failure("Error loading video feed"));
        assert_eq!(c.state(), FeedState::Degraded);
        assert!(c.session().active);
        assert_eq!(
            c.session().last_error.as_deref(),
            Some("Error loading video feed")
        );
    }

    #[test]
    fn test_repeated_failures_degrade_once() {
        let mut c = controller();
        c.start(None);

        let transitions = (0..5)
            .filter(|i| c.report_load_failure(format!("failure {i}")))
            .count();

        assert_eq!(transitions, 1);
        assert_eq!(c.state(), FeedState::Degraded);
        assert_eq!(c.session().last_error.as_deref(), Some("failure 4"));
    }

    #[test]
    fn test_failure_while_idle_is_ignored() {
        let mut c = controller();
        assert!(!c.report_load_failure("late"));
        assert_eq!(c.state(), FeedState::Idle);
        assert!(c.session().last_error.is_none());
    }

    #[test]
    fn test_retry_tick_recovers_with_newer_token() {
        let mut c = controller();
        c.start(Some(&SessionIdentity::new("a@b.com")));
        let before = token_of(c.session().source_url.as_deref().unwrap());
        c.report_load_failure("boom");

        let ticket = c.retry_tick();

        assert!(ticket.is_some());
        assert_eq!(c.state(), FeedState::Loading);
        assert!(c.session().last_error.is_none());
        let after = token_of(c.session().source_url.as_deref().unwrap());
        assert!(after > before);
        assert!(c.session().source_url.as_deref().unwrap().contains("a%40b.com"));
    }

    #[test]
    fn test_retry_tick_noop_when_loading_or_idle() {
        let mut c = controller();
        assert!(c.retry_tick().is_none());

        c.start(None);
        let url = c.session().source_url.clone();
        assert!(c.retry_tick().is_none());
        assert_eq!(c.session().source_url, url);
    }

    #[test]
    fn test_manual_retry_refreshes_immediately() {
        let mut c = controller();
        c.start(None);
        let before = token_of(c.session().source_url.as_deref().unwrap());

        assert!(c.manual_retry().is_some());
        let after = token_of(c.session().source_url.as_deref().unwrap());
        assert!(after > before);

        c.report_load_failure("boom");
        c.manual_retry();
        assert_eq!(c.state(), FeedState::Loading);
    }

    #[test]
    fn test_manual_retry_while_idle_does_nothing() {
        let mut c = controller();
        assert!(c.manual_retry().is_none());
        assert!(c.session().source_url.is_none());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut c = controller();
        c.start(None);
        c.report_load_failure("boom");

        assert!(c.stop());
        let first = c.session().clone();
        assert!(!c.stop());

        assert_eq!(c.session(), &first);
        assert_eq!(c.state(), FeedState::Idle);
        assert!(c.session().source_url.is_none());
        assert!(c.session().last_error.is_none());
    }

    #[test]
    fn test_stale_ticket_is_ignored() {
        let mut c = controller();
        let first = c.start(None);
        let second = c.manual_retry().unwrap();

        assert!(!c.report_load_failure_for(first, "old attempt"));
        assert_eq!(c.state(), FeedState::Loading);

        assert!(c.report_load_failure_for(second, "current attempt"));
        assert_eq!(c.state(), FeedState::Degraded);
    }

    #[test]
    fn test_ticket_from_before_stop_is_ignored() {
        let mut c = controller();
        let ticket = c.start(None);
        c.stop();
        c.start(None);

        assert!(!c.report_load_failure_for(ticket, "late"));
        assert_eq!(c.state(), FeedState::Loading);
    }

    #[test]
    fn test_tokens_strictly_increase() {
        let mut c = controller();
        let mut last = 0;
        c.start(None);
        for _ in 0..50 {
            c.manual_retry();
            let token = token_of(c.session().source_url.as_deref().unwrap());
            assert!(token > last);
            last = token;
        }
    }

    #[test]
    fn test_start_local_holds_tracks() {
        let device = FakeDevice::with_tracks(2);
        let mut c = controller();

        c.start_local(&device).unwrap();

        assert_eq!(c.state(), FeedState::Loading);
        assert_eq!(c.live_tracks(), 2);
        assert!(c.session().source_url.is_none());
        assert_eq!(
            c.source(),
            Some(&FeedSource::Local {
                device: "fake-camera".to_string()
            })
        );
    }

    #[test]
    fn test_stop_releases_tracks_once() {
        let device = FakeDevice::with_tracks(2);
        let mut c = controller();
        c.start_local(&device).unwrap();

        c.stop();
        c.stop();
        drop(c);

        assert_eq!(device.stopped(), 2);
    }

    #[test]
    fn test_denied_device_does_not_start() {
        let mut c = controller();
        let err = c.start_local(&FakeDevice::denied()).unwrap_err();

        assert!(err.is_permission_error());
        assert_eq!(c.state(), FeedState::Idle);
    }

    #[test]
    fn test_switching_to_remote_releases_local() {
        let device = FakeDevice::with_tracks(1);
        let mut c = controller();
        c.start_local(&device).unwrap();

        c.start(None);

        assert_eq!(device.stopped(), 1);
        assert_eq!(c.live_tracks(), 0);
        assert!(c.session().source_url.is_some());
    }

    #[test]
    fn test_local_retry_clears_error() {
        let device = FakeDevice::with_tracks(1);
        let mut c = controller();
        c.start_local(&device).unwrap();
        c.report_load_failure("no frames");

        assert!(c.retry_tick().is_some());
        assert_eq!(c.state(), FeedState::Loading);
        assert_eq!(c.live_tracks(), 1);
    }
}
