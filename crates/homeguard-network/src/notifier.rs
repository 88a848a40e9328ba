//! HTTP alert notifier.
//!
//! Every [`AlertEvent`] becomes one JSON `POST` to the configured alert URL.
//! The notifier is a plain transport:
//!
//! - **No retry**: a failed delivery is logged and dropped.
//! - **Short timeout**: a slow alert service never holds up a monitor loop.
//! - **Fire and forget**: [`Notifier::dispatch`] spawns the request and returns.
//!
//! Callers that need the outcome use [`HttpNotifier::send`] directly.

use homeguard_alarm::{AlertEvent, Notifier};
use homeguard_core::constants::{DEFAULT_ALERT_URL, DEFAULT_NOTIFY_TIMEOUT_MS};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Where and how patiently to deliver alerts.
///
/// # Example
///
/// ```
/// use homeguard_network::HttpNotifierConfig;
/// use std::time::Duration;
///
/// let config = HttpNotifierConfig {
///     url: "http://alerts.local:5000/api/events".to_string(),
///     timeout: Duration::from_millis(1500),
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpNotifierConfig {
    pub url: String,
    pub timeout: Duration,
}

impl Default for HttpNotifierConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_ALERT_URL.to_string(),
            timeout: Duration::from_millis(DEFAULT_NOTIFY_TIMEOUT_MS),
        }
    }
}

/// Errors from a single alert delivery.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The HTTP client could not be built
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// No response within the configured timeout
    #[error("Alert request timed out after {0}ms")]
    Timeout(u64),

    /// Connection refused, DNS failure, reset, ...
    #[error("Alert request failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// The alert service answered with a non-2xx status
    #[error("Alert service answered {status}")]
    Status { status: u16 },
}

/// Best-effort JSON poster for alert events.
#[derive(Debug, Clone)]
pub struct HttpNotifier {
    client: reqwest::Client,
    config: HttpNotifierConfig,
}

impl HttpNotifier {
    pub fn new(config: HttpNotifierConfig) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(NotifyError::Client)?;
        Ok(Self { client, config })
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// POST one event and wait for the answer.
    pub async fn send(&self, event: &AlertEvent) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.config.url)
            .json(event)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    NotifyError::Timeout(self.config.timeout.as_millis() as u64)
                } else {
                    NotifyError::Transport(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status {
                status: status.as_u16(),
            });
        }

        debug!(event = event.label(), %status, "Alert delivered");
        Ok(())
    }
}

impl Notifier for HttpNotifier {
    fn dispatch(&self, event: AlertEvent) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(event = event.label(), "No async runtime, alert dropped");
            return;
        };

        let notifier = self.clone();
        runtime.spawn(async move {
            if let Err(e) = notifier.send(&event).await {
                warn!(
                    event = event.label(),
                    url = %notifier.url(),
                    error = %e,
                    "Alert delivery failed"
                );
            }
        });
    }
}
