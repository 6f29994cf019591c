//! Localized status headings.
//!
//! # Responsibility
//! - Map board heading text to a `TaskStatus` for the configured locales.
//!
//! # Invariants
//! - Lookup ignores surrounding whitespace and letter case.
//! - Earlier locales win when two locales share a heading.

use crate::model::status::TaskStatus;
use log::warn;
use std::collections::BTreeMap;

/// Translates heading text into a task status.
pub trait StatusTranslator {
    fn heading_to_status(&self, heading: &str) -> Option<TaskStatus>;
}

const EN_HEADINGS: &[(&str, TaskStatus)] = &[
    ("Active", TaskStatus::Active),
    ("Waiting", TaskStatus::Waiting),
    ("Later", TaskStatus::Later),
    ("Someday", TaskStatus::Someday),
    ("Done", TaskStatus::Done),
];

const DE_HEADINGS: &[(&str, TaskStatus)] = &[
    ("Aktiv", TaskStatus::Active),
    ("Warten", TaskStatus::Waiting),
    ("Später", TaskStatus::Later),
    ("Irgendwann", TaskStatus::Someday),
    ("Erledigt", TaskStatus::Done),
];

/// Returns the heading table for a locale code (`en`, `de`).
pub fn locale_headings(locale: &str) -> Option<&'static [(&'static str, TaskStatus)]> {
    match locale.trim().to_ascii_lowercase().as_str() {
        "en" => Some(EN_HEADINGS),
        "de" => Some(DE_HEADINGS),
        _ => None,
    }
}

/// Table-driven translator built from locale tables.
#[derive(Debug, Clone, Default)]
pub struct LocaleTranslator {
    headings: BTreeMap<String, TaskStatus>,
}

impl LocaleTranslator {
    /// Builds a translator from locale codes; unknown codes are skipped.
    pub fn new<S: AsRef<str>>(locales: &[S]) -> Self {
        let mut translator = Self::default();
        for locale in locales {
            let Some(table) = locale_headings(locale.as_ref()) else {
                warn!(
                    "event=locale_load module=i18n status=skipped locale={}",
                    locale.as_ref()
                );
                continue;
            };
            for (heading, status) in table {
                translator
                    .headings
                    .entry(normalize_heading(heading))
                    .or_insert(*status);
            }
        }
        translator
    }

    /// Adds or overrides one heading.
    pub fn with_heading(mut self, heading: &str, status: TaskStatus) -> Self {
        self.headings.insert(normalize_heading(heading), status);
        self
    }
}

impl StatusTranslator for LocaleTranslator {
    fn heading_to_status(&self, heading: &str) -> Option<TaskStatus> {
        self.headings.get(&normalize_heading(heading)).copied()
    }
}

fn normalize_heading(heading: &str) -> String {
    heading.trim().to_lowercase()
}
