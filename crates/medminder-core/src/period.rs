//! Dose periods: named time-of-day medication slots.

use std::collections::BTreeSet;

use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// A named schedule slot ("morning", "afternoon") with its items and window.
///
/// Items are opaque display strings ("Escitalopram 5mg"); nothing here
/// parses names or strengths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DosePeriod {
    pub name: String,
    /// Heading shown on the prompt.
    #[serde(default)]
    pub title: String,
    pub items: Vec<String>,
    /// Start of the overdue window. The window closes at end of day.
    #[serde(with = "hhmm")]
    pub due_after: NaiveTime,
    /// Per-period override of the global reminder ceiling.
    #[serde(default)]
    pub max_reminders: Option<u32>,
}

impl DosePeriod {
    pub fn new(name: &str, title: &str, items: &[&str], due_after: NaiveTime) -> Self {
        Self {
            name: name.to_string(),
            title: title.to_string(),
            items: items.iter().map(|s| s.to_string()).collect(),
            due_after,
            max_reminders: None,
        }
    }

    /// Prompt heading, falling back to the period name.
    pub fn display_title(&self) -> String {
        if self.title.is_empty() {
            format!("{} medication time", self.name)
        } else {
            self.title.clone()
        }
    }

    /// True when `now` lies in `due_after ..= 23:59:59` of its calendar day.
    pub fn is_overdue_at(&self, now: NaiveDateTime) -> bool {
        now.time() >= self.due_after
    }

    /// Exact set equality against the required items: no subset, no superset.
    pub fn is_satisfied_by<S: AsRef<str>>(&self, confirmed: &[S]) -> bool {
        let required: BTreeSet<&str> = self.items.iter().map(String::as_str).collect();
        let given: BTreeSet<&str> = confirmed.iter().map(AsRef::as_ref).collect();
        required == given
    }

    /// Required items not present in `confirmed`, in display order.
    pub fn missing_from<S: AsRef<str>>(&self, confirmed: &[S]) -> Vec<String> {
        self.items
            .iter()
            .filter(|item| !confirmed.iter().any(|c| c.as_ref() == item.as_str()))
            .cloned()
            .collect()
    }

    /// Bullet list used in notification bodies.
    pub fn bullet_list(&self) -> String {
        self.items
            .iter()
            .map(|item| format!("• {item}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// The two slots the utility ships with.
pub fn default_periods() -> Vec<DosePeriod> {
    vec![
        DosePeriod::new(
            "morning",
            "🌅 MORNING MEDICATION TIME!",
            &["Elvanse 20mg", "Escitalopram 5mg", "Dexamfetamine 5mg"],
            NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default(),
        ),
        DosePeriod::new(
            "afternoon",
            "🌆 AFTERNOON MEDICATION TIME!",
            &["Dexamfetamine 5mg (afternoon dose)"],
            NaiveTime::from_hms_opt(16, 30, 0).unwrap_or_default(),
        ),
    ]
}

/// `HH:MM` in config files.
mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveTime::parse_from_str(&raw, FORMAT)
            .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M:%S"))
            .map_err(serde::de::Error::custom)
    }
}
