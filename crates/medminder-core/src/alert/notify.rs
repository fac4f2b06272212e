//! Desktop notifications.
//!
//! Fire-and-forget: a notification that cannot reach the desktop is
//! printed to the console instead. Nothing here returns an error.

use std::process::{Command, Stdio};
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Notification priority as understood by the desktop notification daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Normal,
    Critical,
}

impl Urgency {
    pub fn as_str(self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Normal => "normal",
            Urgency::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub urgency: Urgency,
    /// `None` keeps the notification on screen until dismissed.
    pub expires_after: Option<Duration>,
    pub title: String,
    pub body: String,
}

impl Notification {
    pub fn new(urgency: Urgency, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            urgency,
            expires_after: None,
            title: title.into(),
            body: body.into(),
        }
    }

    pub fn expiring(mut self, after: Duration) -> Self {
        self.expires_after = Some(after);
        self
    }

    pub fn persistent(mut self) -> Self {
        self.expires_after = None;
        self
    }

    pub fn is_persistent(&self) -> bool {
        self.expires_after.is_none()
    }

    /// The line printed when no desktop is reachable.
    pub fn console_line(&self) -> String {
        format!("*** {}: {} ***", self.title, self.body)
    }
}

pub const DEFAULT_ICON: &str = "dialog-warning";

pub trait Notifier: Send + Sync {
    /// Show `notification`. Must not fail or panic.
    fn notify(&self, notification: &Notification);
}

/// Sends through `notify-send`.
#[derive(Debug, Clone)]
pub struct DesktopNotifier {
    program: String,
    icon: String,
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self::new("notify-send", DEFAULT_ICON)
    }
}

impl DesktopNotifier {
    pub fn new(program: impl Into<String>, icon: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            icon: icon.into(),
        }
    }

    fn args(&self, n: &Notification) -> Vec<String> {
        let timeout_ms = n.expires_after.map(|d| d.as_millis()).unwrap_or(0);
        vec![
            "-u".to_string(),
            n.urgency.as_str().to_string(),
            "-t".to_string(),
            timeout_ms.to_string(),
            "-i".to_string(),
            self.icon.clone(),
            n.title.clone(),
            n.body.clone(),
        ]
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&self, notification: &Notification) {
        let result = Command::new(&self.program)
            .args(self.args(notification))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match result {
            Ok(status) if status.success() => {
                tracing::debug!(title = %notification.title, urgency = notification.urgency.as_str(), "notification sent");
            }
            Ok(status) => {
                tracing::warn!(%status, "notification daemon refused message, printing instead");
                println!("{}", notification.console_line());
            }
            Err(e) => {
                tracing::warn!(program = %self.program, error = %e, "desktop notifications not available, printing instead");
                println!("{}", notification.console_line());
            }
        }
    }
}

/// Prints every notification; used when desktop notifications are disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notification: &Notification) {
        println!("{}", notification.console_line());
    }
}

/// Keeps every notification in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: &Notification) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(notification.clone());
        }
    }
}
