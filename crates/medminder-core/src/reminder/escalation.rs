//! Escalation policy.
//!
//! Reminder intensity rises with every unanswered round:
//!
//! - **Notification urgency**: normal for the first rounds, critical after
//!   `critical_after` rounds.
//! - **Wait between rounds**: a fixed table, 5 min → 3 min → 1 min.
//! - **Urgency tier** (prompt colour and alarm pattern): low → medium → high.
//!
//! Attempts are 1-based: attempt 1 is the first prompt of an invocation.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::alert::notify::Urgency;
use crate::alert::sound::AlarmPattern;

/// Visual and audible intensity of a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrgencyTier {
    Low,
    Medium,
    High,
}

impl UrgencyTier {
    /// Tier for a 1-based attempt. Rounds 1-2 are low, 3-4 medium, 5+ high.
    pub fn for_attempt(attempt: u32) -> Self {
        let unanswered = attempt.saturating_sub(1);
        if unanswered > 3 {
            UrgencyTier::High
        } else if unanswered > 1 {
            UrgencyTier::Medium
        } else {
            UrgencyTier::Low
        }
    }

    /// Prompt colours as hex strings or colour names.
    pub fn palette(self) -> TierPalette {
        match self {
            UrgencyTier::Low => TierPalette {
                background: "#4a90e2",
                text: "white",
            },
            UrgencyTier::Medium => TierPalette {
                background: "#ff8800",
                text: "white",
            },
            UrgencyTier::High => TierPalette {
                background: "#ff4444",
                text: "white",
            },
        }
    }

    pub fn alarm_pattern(self) -> AlarmPattern {
        match self {
            UrgencyTier::Low => AlarmPattern::new(3, Duration::from_millis(500)),
            UrgencyTier::Medium => AlarmPattern::new(5, Duration::from_millis(400)),
            UrgencyTier::High => AlarmPattern::new(8, Duration::from_millis(300)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierPalette {
    pub background: &'static str,
    pub text: &'static str,
}

/// One row of the wait table: failed rounds up to `through_attempt` wait
/// `wait_secs` before the next prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitTier {
    pub through_attempt: u32,
    pub wait_secs: u64,
}

/// Escalation policy table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationPolicy {
    /// Rounds sent with normal urgency before switching to critical.
    #[serde(default = "default_critical_after")]
    pub critical_after: u32,
    /// Wait used once every tier is exhausted.
    #[serde(default = "default_final_wait_secs")]
    pub final_wait_secs: u64,
    /// Ordered by `through_attempt`.
    #[serde(default = "default_wait_tiers")]
    pub wait_tiers: Vec<WaitTier>,
}

fn default_critical_after() -> u32 {
    3
}
fn default_final_wait_secs() -> u64 {
    60
}
fn default_wait_tiers() -> Vec<WaitTier> {
    vec![
        WaitTier {
            through_attempt: 2,
            wait_secs: 5 * 60,
        },
        WaitTier {
            through_attempt: 5,
            wait_secs: 3 * 60,
        },
    ]
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            critical_after: default_critical_after(),
            final_wait_secs: default_final_wait_secs(),
            wait_tiers: default_wait_tiers(),
        }
    }
}

impl EscalationPolicy {
    /// Notification urgency for the reminder sent at the start of `attempt`.
    pub fn notification_urgency(&self, attempt: u32) -> Urgency {
        if attempt > self.critical_after {
            Urgency::Critical
        } else {
            Urgency::Normal
        }
    }

    /// Delay before the next prompt after `attempt` went unanswered.
    pub fn wait_after(&self, attempt: u32) -> Duration {
        let secs = self
            .wait_tiers
            .iter()
            .find(|tier| attempt <= tier.through_attempt)
            .map(|tier| tier.wait_secs)
            .unwrap_or(self.final_wait_secs);
        Duration::from_secs(secs)
    }
}
