//! Day-key resolution.
//!
//! A dose taken at 00:30 still belongs to the day it was scheduled for, so
//! keys are derived with a cutover hour instead of the plain calendar date.

use std::fmt;

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CUTOVER_HOUR: u32 = 8;

const KEY_FORMAT: &str = "%Y-%m-%d";

/// Logical medication day, stored as `YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DayKey(String);

impl DayKey {
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date.format(KEY_FORMAT).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Maps wall-clock instants to day keys. Pure; no clock of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayKeyResolver {
    cutover_hour: u32,
}

impl Default for DayKeyResolver {
    fn default() -> Self {
        Self::new(DEFAULT_CUTOVER_HOUR)
    }
}

impl DayKeyResolver {
    /// Hours past 23 are clamped.
    pub fn new(cutover_hour: u32) -> Self {
        Self {
            cutover_hour: cutover_hour.min(23),
        }
    }

    pub fn cutover_hour(&self) -> u32 {
        self.cutover_hour
    }

    pub fn resolve(&self, now: NaiveDateTime) -> DayKey {
        let date = if now.hour() < self.cutover_hour {
            (now - Duration::days(1)).date()
        } else {
            now.date()
        };
        DayKey::from_date(date)
    }
}
