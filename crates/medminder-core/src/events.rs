use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::alert::Urgency;
use crate::reminder::escalation::UrgencyTier;

/// Every state change in a check or reminder cycle produces an Event.
/// The CLI prints them with `--json`; each one is also traced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Reminder cycle began for a period.
    ReminderStarted {
        period: String,
        day_key: String,
        max_reminders: u32,
        at: NaiveDateTime,
    },
    /// Period was already complete when the cycle began.
    AlreadyComplete {
        period: String,
        day_key: String,
        at: NaiveDateTime,
    },
    PromptShown {
        period: String,
        attempt: u32,
        urgency: Urgency,
        tier: UrgencyTier,
        at: NaiveDateTime,
    },
    /// Submission did not check every item; the same attempt is shown again.
    IncompleteSubmission {
        period: String,
        attempt: u32,
        missing: Vec<String>,
        at: NaiveDateTime,
    },
    Snoozed {
        period: String,
        attempt: u32,
        at: NaiveDateTime,
    },
    Dismissed {
        period: String,
        attempt: u32,
        at: NaiveDateTime,
    },
    WaitScheduled {
        period: String,
        next_attempt: u32,
        wait_secs: u64,
        at: NaiveDateTime,
    },
    /// Another process logged the dose while this cycle was running.
    CompletedElsewhere {
        period: String,
        attempt: u32,
        at: NaiveDateTime,
    },
    DoseConfirmed {
        period: String,
        attempts: u32,
        recorded: bool,
        at: NaiveDateTime,
    },
    /// Record could not be written; the user was told on the console.
    RecordFailed {
        period: String,
        error: String,
        at: NaiveDateTime,
    },
    RemindersExhausted {
        period: String,
        attempts: u32,
        at: NaiveDateTime,
    },
    /// Checker found an overdue period without a complete record.
    MissedDose {
        period: String,
        day_key: String,
        at: NaiveDateTime,
    },
    ReminderLaunched {
        period: String,
        at: NaiveDateTime,
    },
    LaunchFailed {
        period: String,
        error: String,
        at: NaiveDateTime,
    },
}

impl Event {
    /// Emit this event through `tracing`.
    pub fn trace(&self) {
        match self {
            Event::RecordFailed { period, error, .. } => {
                tracing::error!(%period, %error, "dose confirmed but not recorded");
            }
            Event::LaunchFailed { period, error, .. } => {
                tracing::error!(%period, %error, "could not launch reminder");
            }
            Event::RemindersExhausted { period, attempts, .. } => {
                tracing::warn!(%period, attempts, "maximum reminders reached");
            }
            Event::MissedDose { period, day_key, .. } => {
                tracing::warn!(%period, %day_key, "missed dose");
            }
            other => {
                tracing::info!(event = ?other, "reminder event");
            }
        }
    }
}
