//! Manual alert sending.
//!
//! An [`AlertDispatcher`] sends one alert per call through an
//! [`AlertTransport`]; an [`AlertBanner`] keeps the "alert sent" notice up
//! for its display window. [`AlertPanel`] ties the two together.

mod banner;
mod transport;

pub use banner::AlertBanner;
#[cfg(test)]
pub use transport::MockAlertTransport;
pub use transport::{AlertTransport, HttpAlertTransport};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{DeliveryFailure, Error, Result};
use crate::identity::SessionIdentity;

/// Body of `POST /send_alert`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertRequest {
    /// Recipient address.
    pub email: String,
    /// What was spotted, e.g. `"lion"`.
    pub animal_type: String,
    /// Where it was spotted.
    pub location: String,
}

impl AlertRequest {
    /// Build a request.
    pub fn new(
        email: impl Into<String>,
        animal_type: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            animal_type: animal_type.into(),
            location: location.into(),
        }
    }
}

/// Answer from the alert service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AlertResponse {
    /// Whether the alert was accepted.
    pub success: bool,
    /// Optional explanation, usually present on rejection.
    #[serde(default)]
    pub message: Option<String>,
}

/// What the user sees after a send.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AlertOutcome {
    /// The "alert sent" notice is showing.
    pub sent: bool,
    /// The notice was shown and its window has since closed.
    pub timestamp_cleared: bool,
}

impl AlertOutcome {
    /// A freshly sent alert.
    #[must_use]
    pub fn sent() -> Self {
        Self {
            sent: true,
            timestamp_cleared: false,
        }
    }

    /// A notice whose display window has closed.
    #[must_use]
    pub fn cleared() -> Self {
        Self {
            sent: false,
            timestamp_cleared: true,
        }
    }
}

/// Sends manual alerts. Each call makes at most one request; failures are
/// reported to the caller and never retried.
#[derive(Clone)]
pub struct AlertDispatcher {
    transport: Arc<dyn AlertTransport>,
}

impl std::fmt::Debug for AlertDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertDispatcher").finish_non_exhaustive()
    }
}

impl AlertDispatcher {
    /// Create a dispatcher over `transport`.
    pub fn new(transport: Arc<dyn AlertTransport>) -> Self {
        Self { transport }
    }

    /// Create a dispatcher that posts to the configured alert service.
    ///
    /// # Errors
    ///
    /// Returns an error if the alert base URL is invalid.
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport =
            HttpAlertTransport::new(&config.alert.base_url, config.request_timeout())?;
        Ok(Self::new(Arc::new(transport)))
    }

    /// Send one alert on behalf of `identity`.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingIdentity`] if there is no identity or its email is
    ///   empty; nothing is sent.
    /// - [`Error::AlertDeliveryFailed`] if the service rejects the alert,
    ///   answers with an error, or cannot be reached.
    pub async fn send_alert(
        &self,
        identity: Option<&SessionIdentity>,
        animal_type: &str,
        location: &str,
    ) -> Result<AlertOutcome> {
        let email = identity
            .and_then(SessionIdentity::email)
            .ok_or(Error::MissingIdentity)?;

        let request = AlertRequest::new(email, animal_type, location);
        let response = self.transport.post_alert(&request).await.map_err(|e| {
            warn!(animal = animal_type, error = %e, "Alert delivery failed");
            e
        })?;

        if !response.success {
            let message = response
                .message
                .unwrap_or_else(|| "success: false".to_string());
            warn!(animal = animal_type, %message, "Alert rejected");
            return Err(Error::delivery(DeliveryFailure::Rejected, message));
        }

        info!(animal = animal_type, location, "Alert sent");
        Ok(AlertOutcome::sent())
    }
}

/// A dispatcher and its banner, as wired into the feed view.
#[derive(Debug)]
pub struct AlertPanel {
    dispatcher: AlertDispatcher,
    banner: AlertBanner,
}

impl AlertPanel {
    /// Combine a dispatcher with a banner.
    pub fn new(dispatcher: AlertDispatcher, banner: AlertBanner) -> Self {
        Self { dispatcher, banner }
    }

    /// The banner.
    pub fn banner(&self) -> &AlertBanner {
        &self.banner
    }

    /// Send an alert and show the notice on success. On failure the banner is
    /// left as it was.
    ///
    /// # Errors
    ///
    /// See [`AlertDispatcher::send_alert`].
    pub async fn trigger(
        &mut self,
        identity: Option<&SessionIdentity>,
        animal_type: &str,
        location: &str,
    ) -> Result<AlertOutcome> {
        let outcome = self
            .dispatcher
            .send_alert(identity, animal_type, location)
            .await?;
        self.banner.show();
        Ok(outcome)
    }
}
