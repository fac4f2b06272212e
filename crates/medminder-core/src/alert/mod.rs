//! OS-facing alert channels and the interaction surface contract.

pub mod notify;
pub mod sound;
pub mod surface;

pub use notify::{ConsoleNotifier, DesktopNotifier, Notification, Notifier, RecordingNotifier, Urgency};
pub use sound::{AlarmOutcome, AlarmPattern, AlarmPlayer};
pub use surface::{AlertSession, InteractionSurface, ScriptedSurface, UserResponse};
