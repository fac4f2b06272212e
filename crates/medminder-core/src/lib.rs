//! # medminder Core Library
//!
//! This library provides the core logic for medminder, a personal medication
//! reminder. Everything runs as short-lived processes started by the CLI
//! binary: a periodic checker and one reminder process per overdue dose.
//! The processes share no memory; the dose log file is their only
//! coordination point.
//!
//! ## Architecture
//!
//! - **Dose log**: day-key → period → record, stored as one JSON file
//! - **Day keys**: calendar dates shifted by a cutover hour so late-night
//!   doses count for the day they belong to
//! - **Checker**: stateless pass that alerts about overdue periods and
//!   launches reminders for them
//! - **Reminder engine**: escalating prompt loop that ends when the dose is
//!   confirmed or the reminder ceiling is reached
//!
//! ## Key Components
//!
//! - [`ReminderEngine`]: Reminder state machine
//! - [`MissedDoseChecker`]: One-shot overdue scan
//! - [`LogStore`]: Dose log persistence
//! - [`Config`]: Application configuration management
//! - [`InteractionSurface`]: Trait for the blocking confirmation prompt

pub mod alert;
pub mod checker;
pub mod day_key;
pub mod error;
pub mod events;
pub mod period;
pub mod reminder;
pub mod storage;

pub use alert::{AlarmPlayer, InteractionSurface, Notification, Notifier, Urgency, UserResponse};
pub use checker::{CheckReport, MissedDoseChecker, ProcessLauncher, ReminderLauncher};
pub use day_key::{DayKey, DayKeyResolver};
pub use error::{ConfigError, CoreError, StoreError};
pub use events::Event;
pub use period::{default_periods, DosePeriod};
pub use reminder::{
    EscalationPolicy, ReminderEngine, ReminderOutcome, ReminderReport, ReminderState, UrgencyTier,
};
pub use storage::{Config, DayLog, DoseRecord, JsonFileLogStore, LogStore};
