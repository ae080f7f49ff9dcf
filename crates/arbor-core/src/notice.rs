//! User-facing notification channel.
//!
//! Storage faults, structural inconsistencies and retry exhaustion are not
//! propagated as errors; they are reported here and the caller continues with
//! a fallback value.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Severity of a reported notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A single user-visible notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub severity: Severity,
    pub message: String,
}

/// Cloneable handle used to report notices.
///
/// Every report is also emitted as a `tracing` event. A detached notifier
/// (no receiver) only logs.
#[derive(Debug, Clone, Default)]
pub struct Notifier {
    sender: Option<mpsc::UnboundedSender<Notice>>,
}

impl Notifier {
    /// Creates a notifier together with the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender: Some(sender),
            },
            receiver,
        )
    }

    /// Creates a notifier that only logs.
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn info(&self, message: impl Into<String>) {
        self.report(Severity::Info, message.into());
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.report(Severity::Warning, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.report(Severity::Error, message.into());
    }

    fn report(&self, severity: Severity, message: String) {
        match severity {
            Severity::Info => tracing::info!("{}", message),
            Severity::Warning => tracing::warn!("{}", message),
            Severity::Error => tracing::error!("{}", message),
        }

        if let Some(sender) = &self.sender {
            // Receiver may be gone; reporting must never fail the caller.
            let _ = sender.send(Notice { severity, message });
        }
    }
}
