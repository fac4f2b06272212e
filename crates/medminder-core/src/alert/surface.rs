//! Interaction surface: the blocking confirmation prompt.
//!
//! A surface shows the period's items as independently toggleable entries
//! and blocks until the user answers. While it is up, an [`AlertSession`]
//! plays the alarm and posts a passive desktop notification; the session is
//! stopped the moment the user responds so alarms never overlap.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::notify::{Notification, Notifier, Urgency};
use super::sound::{AlarmOutcome, AlarmPlayer};
use crate::period::DosePeriod;
use crate::reminder::escalation::UrgencyTier;

/// What the user did with a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "response", content = "items", rename_all = "snake_case")]
pub enum UserResponse {
    /// Submitted with these items checked. May be a partial set.
    Confirmed(Vec<String>),
    /// Explicitly asked to be reminded later.
    Snoozed,
    /// Closed without acting. Handled like a snooze.
    Dismissed,
}

pub trait InteractionSurface {
    /// Show the prompt for `attempt` (1-based) and block until answered.
    fn present(&mut self, period: &DosePeriod, attempt: u32) -> UserResponse;

    /// Tell the user a submission was missing `missing`.
    fn incomplete(&mut self, period: &DosePeriod, missing: &[String]);

    /// Tell the user the dose was logged.
    fn confirmed(&mut self, period: &DosePeriod);
}

/// Alarm and passive notification that accompany one prompt.
pub struct AlertSession {
    cancel: CancellationToken,
    alarm: Option<JoinHandle<AlarmOutcome>>,
}

impl AlertSession {
    /// Post the "window open" notification and start the alarm for the
    /// tier of `attempt`.
    pub fn begin(
        attempt: u32,
        notifier: &dyn Notifier,
        player: &AlarmPlayer,
        runtime: Option<&Handle>,
    ) -> Self {
        notifier.notify(
            &Notification::new(
                Urgency::Critical,
                "MEDICATION REMINDER WINDOW OPEN",
                "Please check your medication reminder window!",
            )
            .persistent(),
        );

        let cancel = CancellationToken::new();
        let pattern = UrgencyTier::for_attempt(attempt).alarm_pattern();
        let alarm = runtime.map(|handle| player.spawn(handle, pattern, cancel.child_token()));
        if alarm.is_none() {
            tracing::debug!("no async runtime, alarm skipped");
        }
        Self { cancel, alarm }
    }

    /// Stop the alarm without waiting for the player to exit. The returned
    /// handle resolves once it has.
    pub fn stop(&mut self) -> Option<JoinHandle<AlarmOutcome>> {
        self.cancel.cancel();
        self.alarm.take()
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for AlertSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Replays a fixed list of responses; everything it is shown is recorded.
///
/// When the script runs out every further prompt is dismissed.
#[derive(Debug, Default)]
pub struct ScriptedSurface {
    responses: VecDeque<UserResponse>,
    presented: Vec<u32>,
    incomplete: Vec<Vec<String>>,
    confirmations: usize,
}

impl ScriptedSurface {
    pub fn new(responses: impl IntoIterator<Item = UserResponse>) -> Self {
        Self {
            responses: responses.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Attempt numbers, in the order the prompts were shown.
    pub fn presented(&self) -> &[u32] {
        &self.presented
    }

    pub fn incomplete_reports(&self) -> &[Vec<String>] {
        &self.incomplete
    }

    pub fn confirmations(&self) -> usize {
        self.confirmations
    }
}

impl InteractionSurface for ScriptedSurface {
    fn present(&mut self, _period: &DosePeriod, attempt: u32) -> UserResponse {
        self.presented.push(attempt);
        self.responses.pop_front().unwrap_or(UserResponse::Dismissed)
    }

    fn incomplete(&mut self, _period: &DosePeriod, missing: &[String]) {
        self.incomplete.push(missing.to_vec());
    }

    fn confirmed(&mut self, _period: &DosePeriod) {
        self.confirmations += 1;
    }
}
