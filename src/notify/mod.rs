//! Alert formatting and delivery.
//!
//! Transports are fire-and-forget: a delivery failure is logged and never
//! rolls back throttle bookkeeping, so a flaky webhook can cost one alert
//! but can never cause a notify storm.

pub mod pushover;
pub mod slack;
pub mod throttle;

pub use pushover::PushoverNotifier;
pub use slack::SlackNotifier;
pub use throttle::SlotThrottle;

use anyhow::Result;

/// One formatted notification for one admitted slot.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotAlert {
    pub title: String,
    pub message: String,
    pub url: Option<String>,
    pub url_title: String,
    /// Transport priority, -2..2 (Pushover semantics).
    pub priority: i8,
    pub sound: Option<String>,
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, alert: &SlotAlert) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Fans one alert out to every configured transport.
pub struct NotifierMux {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl NotifierMux {
    pub fn new(notifiers: Vec<Box<dyn Notifier>>) -> Self {
        Self { notifiers }
    }

    /// Build from the environment: each transport is enabled only when its
    /// own variables are present.
    pub fn from_env() -> Self {
        let mut notifiers: Vec<Box<dyn Notifier>> = Vec::new();
        if let Some(p) = PushoverNotifier::from_env() {
            notifiers.push(Box::new(p));
        }
        if let Some(s) = SlackNotifier::from_env() {
            notifiers.push(Box::new(s));
        }
        if notifiers.is_empty() {
            tracing::debug!("no notification transports configured, alerts go to logs only");
        }
        Self::new(notifiers)
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    /// Deliver to every transport; failures are logged, not returned.
    pub async fn notify(&self, alert: &SlotAlert) {
        // Always echo to logs, even with no transports wired up.
        tracing::info!(title = %alert.title, message = %alert.message, "alert");
        for n in &self.notifiers {
            if let Err(e) = n.send(alert).await {
                tracing::warn!(transport = n.name(), error = ?e, "notification failed");
            }
        }
    }
}
