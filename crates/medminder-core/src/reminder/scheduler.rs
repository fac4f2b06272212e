//! Time sources for the reminder engine.
//!
//! The engine never sleeps or reads the wall clock itself. It asks a
//! [`Clock`] for the time and hands every wait to a [`Scheduler`], so tests
//! drive whole reminder cycles without real delays.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use tokio::runtime::Handle;

pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Local wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::zero());
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        self.now
            .lock()
            .map(|guard| *guard)
            .unwrap_or_else(|poisoned| *poisoned.into_inner())
    }
}

/// Waits between reminder rounds.
pub trait Scheduler {
    /// Block the calling thread until `delay` has elapsed.
    fn wait(&mut self, delay: Duration);
}

/// Waits on a tokio timer.
///
/// Must be used from a blocking thread (`spawn_blocking` or a plain
/// thread), never from inside an async task.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }
}

impl Scheduler for TokioScheduler {
    fn wait(&mut self, delay: Duration) {
        tracing::debug!(secs = delay.as_secs(), "waiting before next reminder");
        self.handle.block_on(tokio::time::sleep(delay));
    }
}

/// Records every wait and returns at once, optionally advancing a
/// [`ManualClock`] by the requested delay.
#[derive(Default)]
pub struct RecordingScheduler {
    waits: Vec<Duration>,
    clock: Option<Arc<ManualClock>>,
    on_wait: Option<Box<dyn FnMut(usize) + Send>>,
}

impl std::fmt::Debug for RecordingScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingScheduler")
            .field("waits", &self.waits)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clock(clock: Arc<ManualClock>) -> Self {
        Self {
            clock: Some(clock),
            ..Self::default()
        }
    }

    /// Run `callback(n)` during the n-th wait (0-based). Lets tests change
    /// the outside world, e.g. log a dose from "another process".
    pub fn on_wait(mut self, callback: impl FnMut(usize) + Send + 'static) -> Self {
        self.on_wait = Some(Box::new(callback));
        self
    }

    pub fn waits(&self) -> &[Duration] {
        &self.waits
    }
}

impl Scheduler for RecordingScheduler {
    fn wait(&mut self, delay: Duration) {
        let index = self.waits.len();
        self.waits.push(delay);
        if let Some(clock) = &self.clock {
            clock.advance(delay);
        }
        if let Some(callback) = self.on_wait.as_mut() {
            callback(index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn nine_am() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    #[test]
    fn recording_scheduler_advances_clock() {
        let clock = Arc::new(ManualClock::new(nine_am()));
        let mut scheduler = RecordingScheduler::with_clock(clock.clone());
        scheduler.wait(Duration::from_secs(300));
        scheduler.wait(Duration::from_secs(60));
        assert_eq!(scheduler.waits().len(), 2);
        assert_eq!(clock.now(), nine_am() + chrono::Duration::minutes(6));
    }

    #[test]
    fn callback_sees_wait_index() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut scheduler = RecordingScheduler::new().on_wait(move |i| sink.lock().unwrap().push(i));
        scheduler.wait(Duration::ZERO);
        scheduler.wait(Duration::ZERO);
        assert_eq!(*seen.lock().unwrap(), vec![0, 1]);
    }

    #[test]
    fn tokio_scheduler_blocks_for_delay() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_time()
            .worker_threads(1)
            .build()
            .unwrap();
        let mut scheduler = TokioScheduler::new(runtime.handle().clone());
        let started = std::time::Instant::now();
        scheduler.wait(Duration::from_millis(20));
        assert!(started.elapsed() >= Duration::from_millis(20));
    }
}
