//! Fire-and-forget error reporting to an external monitoring sink.
//!
//! Handler failures are shipped as small JSON events to an HTTP collector.
//! Reporting never blocks the response path: events are posted from a
//! spawned task, and a collector that is down loses events rather than
//! slowing a delivery acknowledgement.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tracing::debug;

/// How long a single event post may take before it is abandoned.
const SHIP_TIMEOUT: Duration = Duration::from_secs(5);

/// Monitoring sink handle.
///
/// Cheap to clone. A handle built with [`Monitor::disabled`] drops every
/// event, which keeps call sites free of conditionals when no collector
/// is configured.
#[derive(Clone, Default)]
pub struct Monitor {
    inner: Option<Arc<Inner>>,
}

struct Inner {
    client: reqwest::Client,
    url: String,
}

impl Monitor {
    /// Creates a disabled handle that drops every event.
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    /// Creates a handle posting events to the given collector URL.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be constructed.
    pub fn new(url: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(SHIP_TIMEOUT)
            .user_agent(concat!("usersync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { inner: Some(Arc::new(Inner { client, url: url.into() })) })
    }

    /// Returns true when events will actually be shipped.
    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Reports an error event.
    ///
    /// Never blocks and never fails the caller; shipping happens on a
    /// spawned task and delivery errors are logged at debug.
    pub fn report(&self, kind: &'static str, message: impl Into<String>) {
        let Some(inner) = self.inner.clone() else { return };
        let message = message.into();

        tokio::spawn(async move {
            let event = serde_json::json!({
                "service": "usersync",
                "kind": kind,
                "message": message,
                "timestamp": Utc::now(),
            });

            if let Err(e) = inner.client.post(&inner.url).json(&event).send().await {
                debug!(error = %e, "failed to ship error event");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_monitor_reports_nothing() {
        let monitor = Monitor::disabled();
        assert!(!monitor.is_enabled());
    }

    #[tokio::test]
    async fn report_on_disabled_monitor_is_a_noop() {
        // Must not panic or spawn; there is no collector to reach.
        let monitor = Monitor::disabled();
        monitor.report("store", "database unavailable");
    }

    #[test]
    fn enabled_monitor_builds() {
        let monitor = Monitor::new("https://errors.example.com/ingest").unwrap();
        assert!(monitor.is_enabled());
    }

    #[tokio::test]
    async fn report_does_not_block_on_unreachable_collector() {
        let monitor = Monitor::new("http://127.0.0.1:1/ingest").unwrap();

        // report() returns immediately even though the collector port is
        // closed; the failure is absorbed by the background task.
        monitor.report("verification", "signature mismatch");
    }
}
