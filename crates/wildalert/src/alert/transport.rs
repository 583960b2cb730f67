//! Delivering alert requests to the alert-ingestion service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

use super::{AlertRequest, AlertResponse};
use crate::error::{DeliveryFailure, Error, Result};

/// Sends one alert request and returns the service's answer.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AlertTransport: Send + Sync {
    /// Deliver `request`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlertDeliveryFailed`] with
    /// [`DeliveryFailure::Unreachable`] when the service cannot be reached,
    /// [`DeliveryFailure::Rejected`] when an error status carries
    /// `success: false`, and [`DeliveryFailure::ServerError`] for any other
    /// error status or an unreadable body.
    async fn post_alert(&self, request: &AlertRequest) -> Result<AlertResponse>;
}

/// `POST <base>/send_alert` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpAlertTransport {
    client: Client,
    endpoint: Url,
}

impl HttpAlertTransport {
    /// Create a transport for the service at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is invalid or the client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut endpoint = Url::parse(base_url).map_err(|source| Error::InvalidUrl {
            url: base_url.to_string(),
            source,
        })?;
        endpoint
            .path_segments_mut()
            .map_err(|()| Error::ConfigValidation {
                message: format!("alert base URL cannot have a path: {base_url}"),
            })?
            .pop_if_empty()
            .push("send_alert");

        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint })
    }

    /// The full `send_alert` endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl AlertTransport for HttpAlertTransport {
    async fn post_alert(&self, request: &AlertRequest) -> Result<AlertResponse> {
        debug!(endpoint = %self.endpoint, animal = %request.animal_type, "Posting alert");

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await
            .map_err(|e| Error::delivery(DeliveryFailure::Unreachable, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<AlertResponse>(&body) {
                Ok(AlertResponse {
                    success: false,
                    message,
                }) => Error::delivery(
                    DeliveryFailure::Rejected,
                    message.unwrap_or_else(|| format!("HTTP {status}")),
                ),
                _ => Error::delivery(
                    DeliveryFailure::ServerError,
                    format!("HTTP {status}: {}", body.trim()),
                ),
            });
        }

        response.json::<AlertResponse>().await.map_err(|e| {
            Error::delivery(
                DeliveryFailure::ServerError,
                format!("unreadable response: {e}"),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertDispatcher;
    use crate::canned_http::{json_response, serve_once};
    use crate::identity::SessionIdentity;
    use std::sync::Arc;

    fn transport(base: &str) -> HttpAlertTransport {
        crate::logging::init_test_logging();
        HttpAlertTransport::new(base, Duration::from_secs(5)).unwrap()
    }

    fn request() -> AlertRequest {
        AlertRequest::new("ranger@example.com", "lion", "Serengeti National Park")
    }

    #[test]
    fn test_endpoint() {
        let transport =
            HttpAlertTransport::new("http://localhost:5000", Duration::from_secs(1)).unwrap();
        assert_eq!(
            transport.endpoint().as_str(),
            "http://localhost:5000/send_alert"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let err = HttpAlertTransport::new("::nope", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, Error::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_service() {
        let transport =
            HttpAlertTransport::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        let request = AlertRequest::new("a@b.com", "lion", "Serengeti");

        let err = transport.post_alert(&request).await.unwrap_err();
        assert_eq!(err.delivery_failure(), Some(DeliveryFailure::Unreachable));
    }

    #[tokio::test]
    async fn test_accepted_alert() {
        let base = serve_once(json_response("200 OK", r#"{"success": true}"#)).await;

        let response = transport(&base).post_alert(&request()).await.unwrap();
        assert!(response.success);
        assert_eq!(response.message, None);
    }

    #[tokio::test]
    async fn test_success_false_over_the_wire_is_rejected() {
        let base = serve_once(json_response(
            "200 OK",
            r#"{"success": false, "message": "unknown ranger"}"#,
        ))
        .await;
        let dispatcher = AlertDispatcher::new(Arc::new(transport(&base)));
        let identity = SessionIdentity::new("ranger@example.com");

        let err = dispatcher
            .send_alert(Some(&identity), "lion", "Serengeti National Park")
            .await
            .unwrap_err();
        assert_eq!(err.delivery_failure(), Some(DeliveryFailure::Rejected));
        assert!(err.to_string().contains("unknown ranger"));
    }

    #[tokio::test]
    async fn test_error_status_with_rejection_body_is_rejected() {
        let base = serve_once(json_response(
            "403 Forbidden",
            r#"{"success": false, "message": "alerts disabled"}"#,
        ))
        .await;

        let err = transport(&base).post_alert(&request()).await.unwrap_err();
        assert_eq!(err.delivery_failure(), Some(DeliveryFailure::Rejected));
        assert!(err.to_string().contains("alerts disabled"));
    }

    #[tokio::test]
    async fn test_error_status_is_server_error() {
        let base = serve_once(json_response(
            "500 Internal Server Error",
            r#"{"error": "boom"}"#,
        ))
        .await;

        let err = transport(&base).post_alert(&request()).await.unwrap_err();
        assert_eq!(err.delivery_failure(), Some(DeliveryFailure::ServerError));
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_unreadable_body_is_server_error() {
        let base = serve_once(json_response("200 OK", "<html>oops</html>")).await;

        let err = transport(&base).post_alert(&request()).await.unwrap_err();
        assert_eq!(err.delivery_failure(), Some(DeliveryFailure::ServerError));
        assert!(err.to_string().contains("unreadable response"));
    }
}
