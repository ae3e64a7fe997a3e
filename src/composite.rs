//! Cross-game aggregate.
//!
//! The weighting is placeholder arithmetic. It is reported as a number and
//! never interpreted.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::StorageKeys;
use crate::session::SessionRecord;
use crate::store::{SessionStore, load_record};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile
{
    pub name: String,
    pub age: Option<u32>,
    pub education: Option<String>,
}

impl Profile
{
    fn age_adjustment(&self) -> f64
    {
        match self.age {
            Some(age) if age <= 12 => 0.95,
            _ => 1.0,
        }
    }

    fn education_adjustment(&self) -> f64
    {
        match self.education.as_deref() {
            Some(level) if level.eq_ignore_ascii_case("illiterate") => 0.9,
            _ => 1.0,
        }
    }
}

pub fn load_profile<S: SessionStore + ?Sized>(store: &S, key: &str) -> Option<Profile>
{
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(err) => {
            warn!("Failed to read {key}: {err}");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(profile) => Some(profile),
        Err(err) => {
            warn!("Ignoring unparsable profile under {key}: {err}");
            None
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Records
{
    pub kohs: Option<SessionRecord>,
    pub digit_span: Option<SessionRecord>,
    pub puzzle: Option<SessionRecord>,
    pub trace: Option<SessionRecord>,
    pub pass_along: Option<SessionRecord>,
}

impl Records
{
    pub fn iter(&self) -> impl Iterator<Item = &SessionRecord>
    {
        [
            &self.kohs,
            &self.digit_span,
            &self.puzzle,
            &self.trace,
            &self.pass_along,
        ]
        .into_iter()
        .flatten()
    }
}

/// Reads every game's record. Missing or unparsable keys come back `None`.
pub fn gather<S: SessionStore + ?Sized>(store: &S, keys: &StorageKeys) -> Records
{
    Records {
        kohs: load_record(store, &keys.kohs),
        digit_span: load_record(store, &keys.digit_span),
        puzzle: load_record(store, &keys.puzzle),
        trace: load_record(store, &keys.trace),
        pass_along: load_record(store, &keys.pass_along),
    }
}

pub fn raw_total(records: &Records) -> f64
{
    records
        .iter()
        .flat_map(|record| record.questions.iter())
        .map(|question| question.score)
        .sum()
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Composite
{
    pub kohs_percent: f64,
    pub pass_along_percent: f64,
    pub pattern_percent: f64,
    pub weighted: f64,
    pub index: i64,
    pub raw_total: f64,
}

pub fn composite_index(records: &Records, profile: &Profile) -> Composite
{
    let kohs_percent = match &records.kohs {
        Some(record) if !record.is_empty() => {
            record.correct_count() as f64 / record.len() as f64 * 100.0
        }
        _ => 0.0,
    };
    let pass_along_percent = match &records.pass_along {
        Some(record) if !record.is_empty() => {
            score_sum(record) / (record.len() as f64 * 5.0) * 100.0
        }
        _ => 0.0,
    };
    let pattern_percent = match &records.trace {
        Some(record) => score_sum(record) / 50.0 * 100.0,
        None => 0.0,
    };

    let weighted = (kohs_percent * 0.3 + pass_along_percent * 0.3 + pattern_percent * 0.4)
        * profile.age_adjustment()
        * profile.education_adjustment();

    Composite {
        kohs_percent,
        pass_along_percent,
        pattern_percent,
        weighted,
        index: (weighted / 100.0 * 60.0 + 70.0).round() as i64,
        raw_total: raw_total(records),
    }
}

fn score_sum(record: &SessionRecord) -> f64
{
    record.questions.iter().map(|question| question.score).sum()
}
