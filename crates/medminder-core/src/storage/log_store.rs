//! Persistent dose log.
//!
//! The log is one JSON document: day-key → period name → [`DoseRecord`].
//! It is read whole and written whole. Nothing coordinates concurrent
//! writers across processes, so two processes saving at once resolve as
//! last-write-wins.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::day_key::DayKey;
use crate::error::StoreError;
use crate::period::DosePeriod;

/// Proof that a period's medications were confirmed.
///
/// Field names match the on-disk format of existing logs; the newer names
/// are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoseRecord {
    #[serde(rename = "medicines", alias = "items", default)]
    pub items: Vec<String>,
    #[serde(rename = "time_taken", alias = "confirmed_at")]
    pub confirmed_at: NaiveDateTime,
    /// Prompting rounds up to and including the confirming one.
    #[serde(rename = "reminder_count", alias = "attempts", default)]
    pub attempts: u32,
}

impl DoseRecord {
    pub fn new(items: Vec<String>, confirmed_at: NaiveDateTime, attempts: u32) -> Self {
        Self {
            items,
            confirmed_at,
            attempts,
        }
    }
}

/// Day-key → period name → record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DayLog(BTreeMap<DayKey, BTreeMap<String, DoseRecord>>);

impl DayLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn record(&self, key: &DayKey, period: &str) -> Option<&DoseRecord> {
        self.0.get(key).and_then(|day| day.get(period))
    }

    /// A period is complete iff its record holds exactly the required items.
    pub fn is_complete(&self, key: &DayKey, period: &DosePeriod) -> bool {
        self.record(key, &period.name)
            .is_some_and(|r| period.is_satisfied_by(r.items.as_slice()))
    }

    pub fn insert(&mut self, key: DayKey, period: &str, record: DoseRecord) {
        self.0
            .entry(key)
            .or_default()
            .insert(period.to_string(), record);
    }

    pub fn days(&self) -> impl Iterator<Item = &DayKey> {
        self.0.keys()
    }
}

/// Backend for the dose log.
///
/// `load` never fails: a missing or unreadable backend is an empty log.
pub trait LogStore: Send + Sync {
    fn load(&self) -> DayLog;

    /// Overwrite the stored log with `log`.
    fn save(&self, log: &DayLog) -> Result<(), StoreError>;
}

/// Write `record` for `period` under `key` unless the period is already
/// complete for that day.
///
/// Reloads before writing so a record saved by another process since the
/// caller last looked is kept. Returns `Ok(false)` when nothing was written.
pub fn record_dose(
    store: &dyn LogStore,
    key: &DayKey,
    period: &DosePeriod,
    record: DoseRecord,
) -> Result<bool, StoreError> {
    let mut log = store.load();
    if log.is_complete(key, period) {
        tracing::debug!(day = %key, period = %period.name, "record already complete, not overwriting");
        return Ok(false);
    }
    log.insert(key.clone(), &period.name, record);
    store.save(&log)?;
    Ok(true)
}

/// JSON file backend (`~/med_log.json` by default).
#[derive(Debug, Clone)]
pub struct JsonFileLogStore {
    path: PathBuf,
}

impl JsonFileLogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/med_log.json`, or `./med_log.json` without a home directory.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("med_log.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogStore for JsonFileLogStore {
    fn load(&self) -> DayLog {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %self.path.display(), error = %e, "cannot read dose log, using empty log");
                }
                return DayLog::new();
            }
        };
        if content.trim().is_empty() {
            return DayLog::new();
        }
        match serde_json::from_str(&content) {
            Ok(log) => log,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "dose log is not valid, using empty log");
                DayLog::new()
            }
        }
    }

    fn save(&self, log: &DayLog) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(log)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::WriteFailed {
                path: self.path.clone(),
                source,
            })?;
        }
        std::fs::write(&self.path, content).map_err(|source| StoreError::WriteFailed {
            path: self.path.clone(),
            source,
        })
    }
}

/// In-process backend.
#[derive(Debug, Default)]
pub struct MemoryLogStore {
    log: Mutex<DayLog>,
    saves: Mutex<usize>,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log(log: DayLog) -> Self {
        Self {
            log: Mutex::new(log),
            saves: Mutex::new(0),
        }
    }

    /// Number of successful `save` calls.
    pub fn save_count(&self) -> usize {
        self.saves.lock().map(|n| *n).unwrap_or(0)
    }
}

impl LogStore for MemoryLogStore {
    fn load(&self) -> DayLog {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    fn save(&self, log: &DayLog) -> Result<(), StoreError> {
        let mut guard = self.log.lock().map_err(|_| StoreError::Unavailable)?;
        *guard = log.clone();
        if let Ok(mut saves) = self.saves.lock() {
            *saves += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::default_periods;
    use chrono::NaiveDate;

    fn key() -> DayKey {
        DayKey::from_date(NaiveDate::from_ymd_opt(2024, 3, 10).unwrap())
    }

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(9, 15, 0)
            .unwrap()
    }

    #[test]
    fn missing_file_is_empty_log() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileLogStore::new(dir.path().join("absent.json"));
        assert!(store.load().is_empty());
    }

    #[test]
    fn corrupt_file_is_empty_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("med_log.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(JsonFileLogStore::new(&path).load().is_empty());
    }

    #[test]
    fn reads_existing_log_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("med_log.json");
        std::fs::write(
            &path,
            r#"{
  "2024-03-10": {
    "morning": {
      "medicines": ["Elvanse 20mg", "Escitalopram 5mg", "Dexamfetamine 5mg"],
      "time_taken": "2024-03-10T09:15:02.123456",
      "reminder_count": 0
    }
  }
}"#,
        )
        .unwrap();
        let log = JsonFileLogStore::new(&path).load();
        let morning = &default_periods()[0];
        assert!(log.is_complete(&key(), morning));
        assert_eq!(log.record(&key(), "morning").unwrap().attempts, 0);
    }

    #[test]
    fn accepts_new_field_names() {
        let json = r#"{"2024-03-10":{"afternoon":{"items":["Dexamfetamine 5mg (afternoon dose)"],"confirmed_at":"2024-03-10T17:00:00","attempts":2}}}"#;
        let log: DayLog = serde_json::from_str(json).unwrap();
        assert!(log.is_complete(&key(), &default_periods()[1]));
    }

    #[test]
    fn save_writes_legacy_field_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileLogStore::new(dir.path().join("med_log.json"));
        let mut log = DayLog::new();
        log.insert(key(), "afternoon", DoseRecord::new(vec!["x".into()], ts(), 1));
        store.save(&log).unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"medicines\""));
        assert!(raw.contains("\"time_taken\""));
        assert!(raw.contains("\"reminder_count\": 1"));
        assert_eq!(store.load(), log);
    }

    #[test]
    fn partial_record_is_not_complete() {
        let morning = &default_periods()[0];
        let mut log = DayLog::new();
        log.insert(key(), "morning", DoseRecord::new(vec!["Elvanse 20mg".into()], ts(), 1));
        assert!(!log.is_complete(&key(), morning));
    }

    #[test]
    fn record_dose_does_not_overwrite_complete_record() {
        let morning = &default_periods()[0];
        let store = MemoryLogStore::new();
        let first = DoseRecord::new(morning.items.clone(), ts(), 1);
        assert!(record_dose(&store, &key(), morning, first.clone()).unwrap());

        let second = DoseRecord::new(morning.items.clone(), ts(), 7);
        assert!(!record_dose(&store, &key(), morning, second).unwrap());
        assert_eq!(store.load().record(&key(), "morning"), Some(&first));
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn record_dose_keeps_other_periods() {
        let periods = default_periods();
        let store = MemoryLogStore::new();
        record_dose(&store, &key(), &periods[0], DoseRecord::new(periods[0].items.clone(), ts(), 1)).unwrap();
        record_dose(&store, &key(), &periods[1], DoseRecord::new(periods[1].items.clone(), ts(), 3)).unwrap();
        let log = store.load();
        assert!(log.is_complete(&key(), &periods[0]));
        assert!(log.is_complete(&key(), &periods[1]));
    }
}
