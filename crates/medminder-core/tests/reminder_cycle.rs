//! End-to-end reminder and checker cycles against a real log file.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use medminder_core::alert::{RecordingNotifier, ScriptedSurface};
use medminder_core::checker::RecordingLauncher;
use medminder_core::reminder::{ManualClock, RecordingScheduler};
use medminder_core::{
    default_periods, DayKeyResolver, DoseRecord, EscalationPolicy, JsonFileLogStore, LogStore,
    MissedDoseChecker, ReminderEngine, ReminderOutcome, Urgency, UserResponse,
};

fn at(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 10)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

struct Fixture {
    _dir: tempfile::TempDir,
    store: Arc<JsonFileLogStore>,
    notifier: Arc<RecordingNotifier>,
    clock: Arc<ManualClock>,
}

impl Fixture {
    fn new(now: NaiveDateTime) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileLogStore::new(dir.path().join("med_log.json")));
        Self {
            _dir: dir,
            store,
            notifier: Arc::new(RecordingNotifier::new()),
            clock: Arc::new(ManualClock::new(now)),
        }
    }

    fn engine(&self, period: usize, max_reminders: u32) -> ReminderEngine {
        ReminderEngine::new(
            default_periods().remove(period),
            max_reminders,
            EscalationPolicy::default(),
            DayKeyResolver::default(),
            self.store.clone(),
            self.notifier.clone(),
            self.clock.clone(),
        )
    }
}

#[test]
fn first_round_confirmation_writes_one_record() {
    let fx = Fixture::new(at(9, 0));
    let morning = default_periods().remove(0);
    let mut surface = ScriptedSurface::new([UserResponse::Confirmed(morning.items.clone())]);
    let mut scheduler = RecordingScheduler::with_clock(fx.clock.clone());

    let report = fx.engine(0, 10).run(&mut surface, &mut scheduler);

    assert_eq!(
        report.outcome,
        ReminderOutcome::Confirmed {
            attempts: 1,
            recorded: true
        }
    );
    assert_eq!(report.rounds(), 1);
    assert!(scheduler.waits().is_empty());

    let log = fx.store.load();
    let key = DayKeyResolver::default().resolve(at(9, 0));
    let record = log.record(&key, "morning").unwrap();
    assert_eq!(record.attempts, 1);
    assert_eq!(record.confirmed_at, at(9, 0));
    assert!(log.is_complete(&key, &morning));
}

#[test]
fn strict_subset_leaves_file_untouched() {
    let fx = Fixture::new(at(9, 0));
    let key = DayKeyResolver::default().resolve(at(9, 0));
    let afternoon = default_periods().remove(1);

    // A complete afternoon record from yesterday keeps the file non-empty.
    let mut seeded = fx.store.load();
    seeded.insert(
        DayKeyResolver::default().resolve(at(9, 0) - chrono::Duration::days(1)),
        "afternoon",
        DoseRecord::new(afternoon.items.clone(), at(17, 0), 2),
    );
    fx.store.save(&seeded).unwrap();
    let before = std::fs::read(fx.store.path()).unwrap();

    let mut surface = ScriptedSurface::new([
        UserResponse::Confirmed(vec!["Elvanse 20mg".into()]),
        UserResponse::Confirmed(vec!["Elvanse 20mg".into(), "Escitalopram 5mg".into()]),
    ]);
    let mut scheduler = RecordingScheduler::with_clock(fx.clock.clone());
    let report = fx.engine(0, 1).run(&mut surface, &mut scheduler);

    assert_eq!(report.outcome, ReminderOutcome::Exhausted { attempts: 1 });
    assert_eq!(surface.incomplete_reports().len(), 2);
    assert_eq!(std::fs::read(fx.store.path()).unwrap(), before);
    assert!(fx.store.load().record(&key, "morning").is_none());
}

#[test]
fn fourth_round_snooze_waits_three_minutes() {
    let fx = Fixture::new(at(9, 0));
    let morning = default_periods().remove(0);
    let mut surface = ScriptedSurface::new([
        UserResponse::Snoozed,
        UserResponse::Dismissed,
        UserResponse::Snoozed,
        UserResponse::Snoozed,
        UserResponse::Confirmed(morning.items.clone()),
    ]);
    let mut scheduler = RecordingScheduler::with_clock(fx.clock.clone());
    let report = fx.engine(0, 10).run(&mut surface, &mut scheduler);

    assert_eq!(surface.presented(), &[1, 2, 3, 4, 5]);
    assert_eq!(scheduler.waits()[3], Duration::from_secs(180));
    assert_eq!(
        report.outcome,
        ReminderOutcome::Confirmed {
            attempts: 5,
            recorded: true
        }
    );
    let key = DayKeyResolver::default().resolve(at(9, 0));
    assert_eq!(fx.store.load().record(&key, "morning").unwrap().attempts, 5);
}

#[test]
fn exhaustion_sends_final_critical_notification() {
    let fx = Fixture::new(at(17, 0));
    let mut surface = ScriptedSurface::default();
    let mut scheduler = RecordingScheduler::with_clock(fx.clock.clone());
    let report = fx.engine(1, 3).run(&mut surface, &mut scheduler);

    assert_eq!(report.outcome, ReminderOutcome::Exhausted { attempts: 3 });
    assert_eq!(report.rounds(), 3);
    assert_eq!(scheduler.waits().len(), 2);
    let last = fx.notifier.sent().pop().unwrap();
    assert_eq!(last.urgency, Urgency::Critical);
    assert!(last.body.contains("Maximum reminders reached"));
    assert!(fx.store.load().is_empty());
}

#[test]
fn checker_then_reminder_clears_the_miss() {
    let fx = Fixture::new(at(9, 0));
    let checker = MissedDoseChecker::new(default_periods(), DayKeyResolver::default());
    let launcher = RecordingLauncher::new();

    let report = checker.check(at(9, 0), fx.store.as_ref(), fx.notifier.as_ref(), &launcher);
    assert_eq!(report.launched, vec!["morning"]);
    assert_eq!(fx.notifier.sent().len(), 1);

    let morning = default_periods().remove(0);
    let mut surface = ScriptedSurface::new([UserResponse::Confirmed(morning.items.clone())]);
    fx.engine(0, 10)
        .run(&mut surface, &mut RecordingScheduler::with_clock(fx.clock.clone()));

    let again = checker.check(at(9, 30), fx.store.as_ref(), fx.notifier.as_ref(), &launcher);
    assert!(again.all_clear());
    assert_eq!(launcher.launched().len(), 1);
}

#[test]
fn rerun_after_confirmation_is_a_no_op() {
    let fx = Fixture::new(at(9, 0));
    let morning = default_periods().remove(0);
    let mut surface = ScriptedSurface::new([UserResponse::Confirmed(morning.items.clone())]);
    fx.engine(0, 10)
        .run(&mut surface, &mut RecordingScheduler::new());
    let before = std::fs::read(fx.store.path()).unwrap();

    let mut second = ScriptedSurface::default();
    let report = fx.engine(0, 10).run(&mut second, &mut RecordingScheduler::new());
    assert_eq!(report.outcome, ReminderOutcome::AlreadyComplete);
    assert!(second.presented().is_empty());
    assert_eq!(std::fs::read(fx.store.path()).unwrap(), before);
}
