//! The "alert sent" notice and its display window.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::trace;

use super::AlertOutcome;

/// Shows a successful send for a fixed window, then clears it.
///
/// A new [`show`](Self::show) while the window is open cancels the pending
/// clear and starts a fresh window, so the latest send is never hidden early.
/// Dropping the banner cancels any pending clear.
#[derive(Debug)]
pub struct AlertBanner {
    window: Duration,
    outcome: Arc<watch::Sender<AlertOutcome>>,
    clear_timer: Option<JoinHandle<()>>,
}

impl AlertBanner {
    /// Create a banner whose notice stays up for `window`.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        let (outcome, _) = watch::channel(AlertOutcome::default());
        Self {
            window,
            outcome: Arc::new(outcome),
            clear_timer: None,
        }
    }

    /// How long the notice stays up.
    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// The current outcome.
    #[must_use]
    pub fn outcome(&self) -> AlertOutcome {
        *self.outcome.borrow()
    }

    /// Subscribe to outcome changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AlertOutcome> {
        self.outcome.subscribe()
    }

    /// Show the notice and (re)start the clear timer.
    pub fn show(&mut self) {
        self.cancel_timer();
        self.outcome.send_replace(AlertOutcome::sent());

        let outcome = Arc::clone(&self.outcome);
        let window = self.window;
        self.clear_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            outcome.send_replace(AlertOutcome::cleared());
            trace!("Alert notice cleared");
        }));
    }

    /// Hide the notice now.
    pub fn dismiss(&mut self) {
        self.cancel_timer();
        self.outcome.send_replace(AlertOutcome::default());
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.clear_timer.take() {
            timer.abort();
        }
    }
}

impl Drop for AlertBanner {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}
