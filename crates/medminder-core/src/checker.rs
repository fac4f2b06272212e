//! Missed-dose checker.
//!
//! One stateless pass: every configured period whose window is open and
//! whose record for today is missing or incomplete gets a critical desktop
//! alert and a freshly launched reminder process. The log is only read.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Mutex;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::alert::notify::{Notification, Notifier, Urgency};
use crate::day_key::{DayKey, DayKeyResolver};
use crate::error::{CoreError, Result};
use crate::events::Event;
use crate::period::DosePeriod;
use crate::storage::{DayLog, LogStore};

/// Starts a reminder cycle for a period without waiting for it.
pub trait ReminderLauncher {
    /// # Errors
    /// Returns an error when the reminder could not be started.
    fn launch(&self, period: &DosePeriod) -> Result<()>;
}

/// Command prefix that opens the reminder prompt in a terminal window.
pub fn default_terminal() -> Vec<String> {
    vec!["x-terminal-emulator".to_string(), "-e".to_string()]
}

/// Runs `<current exe> remind <period>` as a detached child process,
/// inside a terminal emulator so the prompt has a TTY.
///
/// When the terminal cannot be started the reminder runs without one;
/// its notifications and alarm still fire.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    terminal: Vec<String>,
    program: Option<PathBuf>,
}

impl ProcessLauncher {
    /// `terminal` is a command prefix such as `["x-terminal-emulator", "-e"]`.
    pub fn new(terminal: Vec<String>) -> Self {
        Self {
            terminal,
            program: None,
        }
    }

    /// Launch `program` instead of the current executable.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = Some(program.into());
        self
    }

    fn program(&self) -> Result<PathBuf> {
        match &self.program {
            Some(program) => Ok(program.clone()),
            None => Ok(std::env::current_exe()?),
        }
    }

    fn command(&self, period: &DosePeriod) -> Result<Command> {
        let program = self.program()?;
        let mut command = match self.terminal.split_first() {
            Some((wrapper, wrapper_args)) => {
                let mut command = Command::new(wrapper);
                command.args(wrapper_args).arg(&program);
                command
            }
            None => Command::new(&program),
        };
        command.arg("remind").arg(&period.name);
        Ok(command)
    }
}

impl Default for ProcessLauncher {
    fn default() -> Self {
        Self::new(default_terminal())
    }
}

fn spawn_detached(command: &mut Command) -> std::io::Result<u32> {
    let child = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    Ok(child.id())
}

impl ReminderLauncher for ProcessLauncher {
    fn launch(&self, period: &DosePeriod) -> Result<()> {
        let pid = match spawn_detached(&mut self.command(period)?) {
            Ok(pid) => pid,
            Err(e) if !self.terminal.is_empty() => {
                tracing::warn!(terminal = ?self.terminal, error = %e, "terminal unavailable, starting reminder without one");
                let mut direct = Command::new(self.program()?);
                direct.arg("remind").arg(&period.name);
                spawn_detached(&mut direct)?
            }
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(period = %period.name, pid, "reminder process started");
        Ok(())
    }
}

/// Remembers launched periods instead of starting anything.
#[derive(Debug, Default)]
pub struct RecordingLauncher {
    launched: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every launch reports an error (still recorded).
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn launched(&self) -> Vec<String> {
        self.launched.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl ReminderLauncher for RecordingLauncher {
    fn launch(&self, period: &DosePeriod) -> Result<()> {
        if let Ok(mut launched) = self.launched.lock() {
            launched.push(period.name.clone());
        }
        if self.fail {
            Err(CoreError::Custom("launcher unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Result of one checker pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    pub day_key: DayKey,
    /// Periods that got a missed-dose alert.
    pub alerted: Vec<String>,
    /// Periods whose reminder process started.
    pub launched: Vec<String>,
    /// Periods whose reminder process could not be started.
    pub failed: Vec<String>,
    pub events: Vec<Event>,
}

impl CheckReport {
    pub fn all_clear(&self) -> bool {
        self.alerted.is_empty()
    }
}

pub struct MissedDoseChecker {
    periods: Vec<DosePeriod>,
    resolver: DayKeyResolver,
}

impl MissedDoseChecker {
    pub fn new(periods: Vec<DosePeriod>, resolver: DayKeyResolver) -> Self {
        Self { periods, resolver }
    }

    /// Periods overdue at `now` without a complete record under today's key.
    pub fn missed_periods<'a>(&'a self, now: NaiveDateTime, log: &DayLog) -> Vec<&'a DosePeriod> {
        let key = self.resolver.resolve(now);
        self.periods
            .iter()
            .filter(|p| p.is_overdue_at(now) && !log.is_complete(&key, p))
            .collect()
    }

    /// Alert about and launch a reminder for every missed period.
    ///
    /// Never fails: launch problems are reported in the returned
    /// [`CheckReport`] and on stdout.
    pub fn check(
        &self,
        now: NaiveDateTime,
        store: &dyn LogStore,
        notifier: &dyn Notifier,
        launcher: &dyn ReminderLauncher,
    ) -> CheckReport {
        let day_key = self.resolver.resolve(now);
        let log = store.load();
        let mut report = CheckReport {
            day_key: day_key.clone(),
            alerted: Vec::new(),
            launched: Vec::new(),
            failed: Vec::new(),
            events: Vec::new(),
        };

        for period in self.missed_periods(now, &log) {
            notifier.notify(&missed_notification(period));
            report.alerted.push(period.name.clone());
            push(
                &mut report.events,
                Event::MissedDose {
                    period: period.name.clone(),
                    day_key: day_key.to_string(),
                    at: now,
                },
            );

            match launcher.launch(period) {
                Ok(()) => {
                    report.launched.push(period.name.clone());
                    push(
                        &mut report.events,
                        Event::ReminderLaunched {
                            period: period.name.clone(),
                            at: now,
                        },
                    );
                }
                Err(error) => {
                    println!("Could not start {} reminder: {error}", period.name);
                    report.failed.push(period.name.clone());
                    push(
                        &mut report.events,
                        Event::LaunchFailed {
                            period: period.name.clone(),
                            error: error.to_string(),
                            at: now,
                        },
                    );
                }
            }
        }

        if report.all_clear() {
            tracing::debug!(day = %day_key, "no missed doses");
        }
        report
    }
}

fn push(events: &mut Vec<Event>, event: Event) {
    event.trace();
    events.push(event);
}

fn missed_notification(period: &DosePeriod) -> Notification {
    Notification::new(
        Urgency::Critical,
        "MISSED MEDICATION!",
        format!(
            "⚠️ {} MEDICATION MISSED!\n\n{}\n\nClick to take them now!",
            period.name.to_uppercase(),
            period.bullet_list()
        ),
    )
    .persistent()
}
