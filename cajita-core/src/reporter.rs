//! Error reporting.
//!
//! This module provides:
//! - [`ErrorReporter`] - Turns failed outcomes into notifications and log entries
//! - [`NotificationSink`] - Where notifications are displayed
//! - [`ToastQueue`] - In-memory sink whose notifications auto-dismiss
//! - [`LogSink`] / [`NoopSink`] - Trivial sinks

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use reqwest::{Method, StatusCode};
use uuid::Uuid;

use crate::client::outcome::{FailureKind, RequestOutcome, status_line};
use crate::config::DEFAULT_NOTIFICATION_DURATION_MS;

/// A transient user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub call_id: Uuid,
    pub message: String,
    /// How long the message stays visible.
    pub duration: Duration,
}

/// Displays notifications; the presentation layer decides how.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, notification: Notification) {
        tracing::info!(call_id = %notification.call_id, "{}", notification.message);
    }
}

/// Discards notifications.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl NotificationSink for NoopSink {
    fn notify(&self, _notification: Notification) {}
}

/// Queue of notifications, each visible until its duration elapses.
#[derive(Default)]
pub struct ToastQueue {
    entries: Mutex<Vec<(Instant, Notification)>>,
}

impl ToastQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications that have not yet been dismissed. Expired ones are dropped.
    pub fn active(&self) -> Vec<Notification> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        entries.retain(|(deadline, _)| *deadline > now);
        entries.iter().map(|(_, n)| n.clone()).collect()
    }

    /// Remove and return everything still visible.
    pub fn drain(&self) -> Vec<Notification> {
        let now = Instant::now();
        self.entries
            .lock()
            .drain(..)
            .filter(|(deadline, _)| *deadline > now)
            .map(|(_, n)| n)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl NotificationSink for ToastQueue {
    fn notify(&self, notification: Notification) {
        let deadline = Instant::now() + notification.duration;
        self.entries.lock().push((deadline, notification));
    }
}

impl fmt::Debug for ToastQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToastQueue").field("len", &self.len()).finish()
    }
}

/// Identifies the call being reported.
#[derive(Debug, Clone, Copy)]
pub struct CallContext<'a> {
    pub call_id: Uuid,
    pub method: &'a Method,
    pub endpoint: &'a str,
}

/// Surfaces failed calls to a [`NotificationSink`] and the log.
#[derive(Clone)]
pub struct ErrorReporter {
    sink: Arc<dyn NotificationSink>,
    duration: Duration,
}

impl ErrorReporter {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            sink,
            duration: Duration::from_millis(DEFAULT_NOTIFICATION_DURATION_MS),
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Report a failed outcome. Successful outcomes are ignored.
    pub fn report(&self, call: CallContext<'_>, outcome: &RequestOutcome) {
        let Some(kind) = outcome.kind else {
            return;
        };
        let message = outcome.message().unwrap_or_default();

        tracing::warn!(
            call_id = %call.call_id,
            method = %call.method,
            endpoint = call.endpoint,
            status = outcome.status,
            kind = ?kind,
            attempts = outcome.attempts,
            "API call failed: {}",
            message
        );

        self.sink.notify(Notification {
            call_id: call.call_id,
            message: format_notification(outcome),
            duration: self.duration,
        });
    }
}

impl fmt::Debug for ErrorReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorReporter")
            .field("duration", &self.duration)
            .finish()
    }
}

/// `"Error: <status> <reason>\n<message>"`.
pub fn format_notification(outcome: &RequestOutcome) -> String {
    let heading = match (outcome.status, outcome.kind) {
        (0, Some(FailureKind::Unauthenticated)) => "authentication".to_string(),
        (0, _) => "network".to_string(),
        (code, _) => match StatusCode::from_u16(code) {
            Ok(status) => status_line(status),
            Err(_) => code.to_string(),
        },
    };

    match outcome.message() {
        Some(message) if !message.is_empty() => format!("Error: {}\n{}", heading, message),
        _ => format!("Error: {}", heading),
    }
}
