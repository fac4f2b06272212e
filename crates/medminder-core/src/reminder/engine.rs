//! Reminder escalation engine.
//!
//! An explicit state machine: one call to [`ReminderEngine::step`] performs
//! one transition. Waiting is delegated to a [`Scheduler`] and time comes
//! from a [`Clock`], so the engine itself never sleeps.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Prompting(1) -> Confirmed
//!                      -> Waiting(1) -> Prompting(2) -> ... -> Exhausted
//! Idle -> Confirmed            (already complete, nothing written)
//! Waiting(n) -> Confirmed      (logged by another process meanwhile)
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = ReminderEngine::new(period, 10, policy, resolver, store, notifier, clock);
//! let report = engine.run(&mut surface, &mut scheduler);
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::escalation::{EscalationPolicy, UrgencyTier};
use super::scheduler::{Clock, Scheduler};
use crate::alert::{InteractionSurface, Notification, Notifier, Urgency, UserResponse};
use crate::day_key::{DayKey, DayKeyResolver};
use crate::events::Event;
use crate::period::DosePeriod;
use crate::storage::{record_dose, DoseRecord, LogStore};

pub const DEFAULT_MAX_REMINDERS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ReminderState {
    Idle,
    /// Showing the prompt for `attempt` (1-based).
    Prompting { attempt: u32 },
    /// `attempt` went unanswered; the next prompt follows after `delay_secs`.
    Waiting { attempt: u32, delay_secs: u64 },
    Confirmed { attempts: u32 },
    Exhausted { attempts: u32 },
}

impl ReminderState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ReminderState::Confirmed { .. } | ReminderState::Exhausted { .. }
        )
    }
}

/// How a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReminderOutcome {
    /// Complete before the first prompt; nothing shown, nothing written.
    AlreadyComplete,
    /// User confirmed every item on round `attempts`. `recorded` is false when
    /// the record could not be written.
    Confirmed { attempts: u32, recorded: bool },
    /// Another process logged the dose while this cycle was waiting.
    CompletedElsewhere { attempts: u32 },
    Exhausted { attempts: u32 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderReport {
    pub period: String,
    pub day_key: Option<DayKey>,
    pub outcome: ReminderOutcome,
    pub events: Vec<Event>,
}

impl ReminderReport {
    /// Number of prompting rounds shown.
    pub fn rounds(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, Event::PromptShown { .. }))
            .count()
    }
}

/// One reminder cycle for one dose period.
pub struct ReminderEngine {
    period: DosePeriod,
    max_reminders: u32,
    policy: EscalationPolicy,
    resolver: DayKeyResolver,
    store: Arc<dyn LogStore>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    state: ReminderState,
    day_key: Option<DayKey>,
    outcome: Option<ReminderOutcome>,
    events: Vec<Event>,
}

impl ReminderEngine {
    pub fn new(
        period: DosePeriod,
        max_reminders: u32,
        policy: EscalationPolicy,
        resolver: DayKeyResolver,
        store: Arc<dyn LogStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            period,
            max_reminders: max_reminders.max(1),
            policy,
            resolver,
            store,
            notifier,
            clock,
            state: ReminderState::Idle,
            day_key: None,
            outcome: None,
            events: Vec::new(),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> ReminderState {
        self.state
    }

    pub fn period(&self) -> &DosePeriod {
        &self.period
    }

    pub fn max_reminders(&self) -> u32 {
        self.max_reminders
    }

    /// Day the cycle belongs to; fixed when the cycle leaves `Idle`.
    pub fn day_key(&self) -> Option<&DayKey> {
        self.day_key.as_ref()
    }

    pub fn outcome(&self) -> Option<ReminderOutcome> {
        self.outcome
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Step until a terminal state and report.
    pub fn run(
        &mut self,
        surface: &mut dyn InteractionSurface,
        scheduler: &mut dyn Scheduler,
    ) -> ReminderReport {
        while !self.state.is_terminal() {
            self.step(surface, scheduler);
        }
        ReminderReport {
            period: self.period.name.clone(),
            day_key: self.day_key.clone(),
            outcome: self.outcome.unwrap_or(ReminderOutcome::AlreadyComplete),
            events: self.events.clone(),
        }
    }

    /// Perform one transition. A no-op in a terminal state.
    pub fn step(
        &mut self,
        surface: &mut dyn InteractionSurface,
        scheduler: &mut dyn Scheduler,
    ) -> ReminderState {
        self.state = match self.state {
            ReminderState::Idle => self.begin(),
            ReminderState::Prompting { attempt } => self.prompt(attempt, surface),
            ReminderState::Waiting {
                attempt,
                delay_secs,
            } => self.wait(attempt, Duration::from_secs(delay_secs), scheduler),
            terminal => terminal,
        };
        self.state
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn begin(&mut self) -> ReminderState {
        let at = self.clock.now();
        let key = self.resolver.resolve(at);
        self.day_key = Some(key.clone());
        self.emit(Event::ReminderStarted {
            period: self.period.name.clone(),
            day_key: key.to_string(),
            max_reminders: self.max_reminders,
            at,
        });

        if self.is_complete() {
            self.emit(Event::AlreadyComplete {
                period: self.period.name.clone(),
                day_key: key.to_string(),
                at,
            });
            self.outcome = Some(ReminderOutcome::AlreadyComplete);
            return ReminderState::Confirmed { attempts: 0 };
        }
        ReminderState::Prompting { attempt: 1 }
    }

    fn prompt(&mut self, attempt: u32, surface: &mut dyn InteractionSurface) -> ReminderState {
        let urgency = self.policy.notification_urgency(attempt);
        self.notifier.notify(&self.reminder_notification(urgency));
        self.emit(Event::PromptShown {
            period: self.period.name.clone(),
            attempt,
            urgency,
            tier: UrgencyTier::for_attempt(attempt),
            at: self.clock.now(),
        });

        // Partial submissions re-show the same attempt.
        loop {
            match surface.present(&self.period, attempt) {
                UserResponse::Confirmed(items) if self.period.is_satisfied_by(items.as_slice()) => {
                    let recorded = self.save(items, attempt);
                    surface.confirmed(&self.period);
                    self.emit(Event::DoseConfirmed {
                        period: self.period.name.clone(),
                        attempts: attempt,
                        recorded,
                        at: self.clock.now(),
                    });
                    self.outcome = Some(ReminderOutcome::Confirmed {
                        attempts: attempt,
                        recorded,
                    });
                    return ReminderState::Confirmed { attempts: attempt };
                }
                UserResponse::Confirmed(items) => {
                    let missing = self.period.missing_from(items.as_slice());
                    self.emit(Event::IncompleteSubmission {
                        period: self.period.name.clone(),
                        attempt,
                        missing: missing.clone(),
                        at: self.clock.now(),
                    });
                    surface.incomplete(&self.period, &missing);
                }
                UserResponse::Snoozed => {
                    self.emit(Event::Snoozed {
                        period: self.period.name.clone(),
                        attempt,
                        at: self.clock.now(),
                    });
                    break;
                }
                UserResponse::Dismissed => {
                    self.emit(Event::Dismissed {
                        period: self.period.name.clone(),
                        attempt,
                        at: self.clock.now(),
                    });
                    break;
                }
            }
        }

        if let Some(done) = self.completed_elsewhere(attempt) {
            return done;
        }
        if attempt >= self.max_reminders {
            return self.exhaust(attempt);
        }

        let delay = self.policy.wait_after(attempt);
        self.emit(Event::WaitScheduled {
            period: self.period.name.clone(),
            next_attempt: attempt + 1,
            wait_secs: delay.as_secs(),
            at: self.clock.now(),
        });
        ReminderState::Waiting {
            attempt,
            delay_secs: delay.as_secs(),
        }
    }

    fn wait(
        &mut self,
        attempt: u32,
        delay: Duration,
        scheduler: &mut dyn Scheduler,
    ) -> ReminderState {
        scheduler.wait(delay);
        if let Some(done) = self.completed_elsewhere(attempt) {
            return done;
        }
        ReminderState::Prompting {
            attempt: attempt + 1,
        }
    }

    fn exhaust(&mut self, attempts: u32) -> ReminderState {
        self.notifier.notify(
            &Notification::new(
                Urgency::Critical,
                "Medication Reminder",
                format!(
                    "Maximum reminders reached. Please take your medication!\n\n{}",
                    self.period.bullet_list()
                ),
            )
            .persistent(),
        );
        self.emit(Event::RemindersExhausted {
            period: self.period.name.clone(),
            attempts,
            at: self.clock.now(),
        });
        self.outcome = Some(ReminderOutcome::Exhausted { attempts });
        ReminderState::Exhausted { attempts }
    }

    fn completed_elsewhere(&mut self, attempt: u32) -> Option<ReminderState> {
        if !self.is_complete() {
            return None;
        }
        self.emit(Event::CompletedElsewhere {
            period: self.period.name.clone(),
            attempt,
            at: self.clock.now(),
        });
        self.outcome = Some(ReminderOutcome::CompletedElsewhere { attempts: attempt });
        Some(ReminderState::Confirmed { attempts: attempt })
    }

    fn is_complete(&self) -> bool {
        match &self.day_key {
            Some(key) => self.store.load().is_complete(key, &self.period),
            None => false,
        }
    }

    /// Returns whether a record is now on disk for this cycle.
    fn save(&mut self, items: Vec<String>, attempt: u32) -> bool {
        let Some(key) = self.day_key.clone() else {
            return false;
        };
        let record = DoseRecord::new(items, self.clock.now(), attempt);
        match record_dose(self.store.as_ref(), &key, &self.period, record) {
            Ok(written) => {
                if !written {
                    tracing::info!(period = %self.period.name, "dose already recorded by another process");
                }
                true
            }
            Err(e) => {
                self.notifier.notify(&Notification::new(
                    Urgency::Critical,
                    "Medication log not saved",
                    format!("Your {} dose was confirmed but could not be saved: {e}", self.period.name),
                ));
                self.emit(Event::RecordFailed {
                    period: self.period.name.clone(),
                    error: e.to_string(),
                    at: self.clock.now(),
                });
                false
            }
        }
    }

    fn reminder_notification(&self, urgency: Urgency) -> Notification {
        let expires = match urgency {
            Urgency::Critical => Duration::from_secs(30),
            _ => Duration::from_secs(10),
        };
        Notification::new(
            urgency,
            "Medication Reminder",
            format!("🏥 MEDICATION TIME!\n\n{}", self.period.bullet_list()),
        )
        .expiring(expires)
    }

    fn emit(&mut self, event: Event) {
        event.trace();
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{RecordingNotifier, ScriptedSurface};
    use crate::period::default_periods;
    use crate::reminder::scheduler::{ManualClock, RecordingScheduler};
    use crate::storage::{DayLog, MemoryLogStore};
    use chrono::{NaiveDate, NaiveDateTime};

    fn nine_am() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    struct Harness {
        store: Arc<MemoryLogStore>,
        notifier: Arc<RecordingNotifier>,
        clock: Arc<ManualClock>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                store: Arc::new(MemoryLogStore::new()),
                notifier: Arc::new(RecordingNotifier::new()),
                clock: Arc::new(ManualClock::new(nine_am())),
            }
        }

        fn engine(&self, max: u32) -> ReminderEngine {
            ReminderEngine::new(
                default_periods().remove(0),
                max,
                EscalationPolicy::default(),
                DayKeyResolver::default(),
                self.store.clone(),
                self.notifier.clone(),
                self.clock.clone(),
            )
        }
    }

    fn all_items() -> Vec<String> {
        default_periods().remove(0).items
    }

    #[test]
    fn step_walks_through_states() {
        let h = Harness::new();
        let mut engine = h.engine(10);
        let mut surface = ScriptedSurface::new([UserResponse::Snoozed, UserResponse::Confirmed(all_items())]);
        let mut scheduler = RecordingScheduler::with_clock(h.clock.clone());

        assert_eq!(engine.state(), ReminderState::Idle);
        assert_eq!(engine.step(&mut surface, &mut scheduler), ReminderState::Prompting { attempt: 1 });
        assert_eq!(
            engine.step(&mut surface, &mut scheduler),
            ReminderState::Waiting { attempt: 1, delay_secs: 300 }
        );
        assert_eq!(engine.step(&mut surface, &mut scheduler), ReminderState::Prompting { attempt: 2 });
        assert_eq!(engine.step(&mut surface, &mut scheduler), ReminderState::Confirmed { attempts: 2 });
        assert_eq!(engine.step(&mut surface, &mut scheduler), ReminderState::Confirmed { attempts: 2 });
    }

    #[test]
    fn confirmation_on_first_round_records_once() {
        let h = Harness::new();
        let mut engine = h.engine(10);
        let mut surface = ScriptedSurface::new([UserResponse::Confirmed(all_items())]);
        let mut scheduler = RecordingScheduler::new();

        let report = engine.run(&mut surface, &mut scheduler);

        assert_eq!(report.outcome, ReminderOutcome::Confirmed { attempts: 1, recorded: true });
        assert_eq!(report.rounds(), 1);
        assert_eq!(surface.presented(), &[1]);
        assert_eq!(surface.confirmations(), 1);
        assert!(scheduler.waits().is_empty());
        assert_eq!(h.store.save_count(), 1);

        let key = DayKeyResolver::default().resolve(nine_am());
        let record = h.store.load().record(&key, "morning").cloned().unwrap();
        assert_eq!(record.attempts, 1);
        assert_eq!(record.confirmed_at, nine_am());
    }

    #[test]
    fn already_complete_is_a_no_op() {
        let h = Harness::new();
        let key = DayKeyResolver::default().resolve(nine_am());
        let mut log = DayLog::new();
        log.insert(key, "morning", DoseRecord::new(all_items(), nine_am(), 1));
        h.store.save(&log).unwrap();

        let mut surface = ScriptedSurface::default();
        let report = h.engine(10).run(&mut surface, &mut RecordingScheduler::new());

        assert_eq!(report.outcome, ReminderOutcome::AlreadyComplete);
        assert!(surface.presented().is_empty());
        assert!(h.notifier.sent().is_empty());
        assert_eq!(h.store.save_count(), 1);
    }

    #[test]
    fn partial_submission_reprompts_same_attempt() {
        let h = Harness::new();
        let partial = vec!["Elvanse 20mg".to_string()];
        let mut surface = ScriptedSurface::new([
            UserResponse::Confirmed(partial),
            UserResponse::Confirmed(all_items()),
        ]);
        let report = h.engine(10).run(&mut surface, &mut RecordingScheduler::new());

        assert_eq!(surface.presented(), &[1, 1]);
        assert_eq!(
            surface.incomplete_reports(),
            &[vec!["Escitalopram 5mg".to_string(), "Dexamfetamine 5mg".to_string()]]
        );
        assert_eq!(report.outcome, ReminderOutcome::Confirmed { attempts: 1, recorded: true });
        assert_eq!(report.rounds(), 1);
    }

    #[test]
    fn superset_is_not_accepted() {
        let h = Harness::new();
        let mut extra = all_items();
        extra.push("Ibuprofen 200mg".to_string());
        let mut surface = ScriptedSurface::new([UserResponse::Confirmed(extra)]);
        let report = h.engine(1).run(&mut surface, &mut RecordingScheduler::new());

        assert_eq!(surface.incomplete_reports(), &[Vec::<String>::new()]);
        assert_eq!(report.outcome, ReminderOutcome::Exhausted { attempts: 1 });
        assert_eq!(h.store.save_count(), 0);
    }

    #[test]
    fn exhausts_after_exactly_max_rounds() {
        let h = Harness::new();
        let mut surface = ScriptedSurface::default();
        let mut scheduler = RecordingScheduler::with_clock(h.clock.clone());
        let report = h.engine(4).run(&mut surface, &mut scheduler);

        assert_eq!(report.outcome, ReminderOutcome::Exhausted { attempts: 4 });
        assert_eq!(surface.presented(), &[1, 2, 3, 4]);
        assert_eq!(scheduler.waits().len(), 3);
        assert_eq!(h.store.save_count(), 0);

        let last = h.notifier.sent().pop().unwrap();
        assert!(last.body.contains("Maximum reminders reached"));
        assert_eq!(last.urgency, Urgency::Critical);
    }

    #[test]
    fn snooze_in_round_four_waits_three_minutes() {
        let h = Harness::new();
        let mut engine = h.engine(10);
        let mut surface = ScriptedSurface::default();
        let mut scheduler = RecordingScheduler::new();

        while engine.state() != (ReminderState::Prompting { attempt: 4 }) {
            engine.step(&mut surface, &mut scheduler);
        }
        surface = ScriptedSurface::new([UserResponse::Snoozed]);
        assert_eq!(
            engine.step(&mut surface, &mut scheduler),
            ReminderState::Waiting { attempt: 4, delay_secs: 180 }
        );
        assert_eq!(engine.step(&mut surface, &mut scheduler), ReminderState::Prompting { attempt: 5 });
        assert_eq!(h.store.save_count(), 0);

        let urgencies: Vec<Urgency> = h.notifier.sent().iter().map(|n| n.urgency).collect();
        assert_eq!(
            urgencies,
            vec![Urgency::Normal, Urgency::Normal, Urgency::Normal, Urgency::Critical]
        );
    }

    #[test]
    fn stops_when_logged_elsewhere_during_wait() {
        let h = Harness::new();
        let store = h.store.clone();
        let key = DayKeyResolver::default().resolve(nine_am());
        let mut scheduler = RecordingScheduler::new().on_wait(move |i| {
            if i == 1 {
                let mut log = store.load();
                log.insert(key.clone(), "morning", DoseRecord::new(all_items(), nine_am(), 9));
                store.save(&log).unwrap();
            }
        });
        let mut surface = ScriptedSurface::default();
        let report = h.engine(10).run(&mut surface, &mut scheduler);

        assert_eq!(report.outcome, ReminderOutcome::CompletedElsewhere { attempts: 2 });
        assert_eq!(surface.presented(), &[1, 2]);
        assert_eq!(h.store.save_count(), 1);
    }

    /// Logs the dose from "another process" while the prompt is up, then
    /// closes the prompt.
    struct LoggedMeanwhile {
        store: Arc<MemoryLogStore>,
        key: DayKey,
    }

    impl InteractionSurface for LoggedMeanwhile {
        fn present(&mut self, period: &DosePeriod, _attempt: u32) -> UserResponse {
            let mut log = self.store.load();
            log.insert(self.key.clone(), &period.name, DoseRecord::new(period.items.clone(), nine_am(), 1));
            self.store.save(&log).unwrap();
            UserResponse::Dismissed
        }

        fn incomplete(&mut self, _period: &DosePeriod, _missing: &[String]) {}

        fn confirmed(&mut self, _period: &DosePeriod) {}
    }

    #[test]
    fn final_round_logged_elsewhere_is_not_exhausted() {
        let h = Harness::new();
        let mut surface = LoggedMeanwhile {
            store: h.store.clone(),
            key: DayKeyResolver::default().resolve(nine_am()),
        };
        let report = h.engine(1).run(&mut surface, &mut RecordingScheduler::new());

        assert_eq!(report.outcome, ReminderOutcome::CompletedElsewhere { attempts: 1 });
        assert!(!report
            .events
            .iter()
            .any(|e| matches!(e, Event::RemindersExhausted { .. })));
        assert!(h.notifier.sent().iter().all(|n| !n.body.contains("Maximum reminders reached")));
    }

    #[test]
    fn max_reminders_zero_is_treated_as_one() {
        let h = Harness::new();
        assert_eq!(h.engine(0).max_reminders(), 1);
    }

    #[test]
    fn day_key_is_fixed_at_start() {
        let h = Harness::new();
        h.clock.set(
            NaiveDate::from_ymd_opt(2024, 3, 10)
                .unwrap()
                .and_hms_opt(23, 58, 0)
                .unwrap(),
        );
        let mut surface = ScriptedSurface::new([UserResponse::Snoozed, UserResponse::Confirmed(all_items())]);
        let mut scheduler = RecordingScheduler::with_clock(h.clock.clone());
        let report = h.engine(10).run(&mut surface, &mut scheduler);

        assert_eq!(report.day_key.as_ref().map(DayKey::as_str), Some("2024-03-10"));
        let log = h.store.load();
        assert_eq!(log.days().map(DayKey::as_str).collect::<Vec<_>>(), vec!["2024-03-10"]);
    }
}
