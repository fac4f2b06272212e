pub mod engine;
pub mod escalation;
pub mod scheduler;

pub use engine::{
    ReminderEngine, ReminderOutcome, ReminderReport, ReminderState, DEFAULT_MAX_REMINDERS,
};
pub use escalation::{EscalationPolicy, TierPalette, UrgencyTier, WaitTier};
pub use scheduler::{Clock, ManualClock, RecordingScheduler, Scheduler, SystemClock, TokioScheduler};
