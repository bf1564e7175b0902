//! Course change merging for log entries.
//!
//! Autopilot logs record a "Course change: X° → Y°" entry every time the
//! heading settles, which produces long runs of near-identical entries while
//! the helmsman hunts for a course. Successive course changes that start from
//! the same heading are collapsed into one entry that ends on the final
//! heading and keeps the run's extremes and averages.

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::geo_utils::circular_mean;
use crate::points::{lenient_f64, lenient_or_default, lenient_string};

static COURSE_CHANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Course change:\s*([0-9]+(?:\.[0-9]+)?)\s*[°º]?\s*(?:→|->)\s*([0-9]+(?:\.[0-9]+)?)")
        .expect("course change pattern is valid")
});

/// Wind reading on a log entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogWind {
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub direction: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A raw log entry. Fields this module does not touch are carried in `extra`.
///
/// Typed fields are read the way track points are: a value of the wrong type
/// is treated as missing instead of failing the whole log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Value>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub max_speed: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub max_wind: Option<f64>,
    #[serde(default, deserialize_with = "lenient_or_default", skip_serializing_if = "Option::is_none")]
    pub wind: Option<LogWind>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Extract `(from, to)` headings from an entry's text, if it is a course change.
pub fn parse_course_change(entry: &LogEntry) -> Option<(f64, f64)> {
    let caps = COURSE_CHANGE.captures(entry.text.as_deref()?)?;
    let from = caps.get(1)?.as_str().parse().ok()?;
    let to = caps.get(2)?.as_str().parse().ok()?;
    Some((from, to))
}

fn max_of(values: impl Iterator<Item = f64>) -> Option<f64> {
    values.fold(None, |best, v| Some(best.map_or(v, |b: f64| b.max(v))))
}

/// Combine a run of two or more course changes sharing a starting heading.
fn combine(group: &[LogEntry], from: f64, to: f64) -> LogEntry {
    let mut combined = group[0].clone();
    let last = &group[group.len() - 1];

    combined.text = Some(format!("Course change: {}° → {}°", from, to));
    if last.position.is_some() {
        combined.position = last.position.clone();
    }
    if let Some(max_speed) = max_of(group.iter().filter_map(|e| e.max_speed)) {
        combined.max_speed = Some(max_speed);
    }
    if let Some(max_wind) = max_of(group.iter().filter_map(|e| e.max_wind)) {
        combined.max_wind = Some(max_wind);
    }

    let speeds: Vec<f64> = group
        .iter()
        .filter_map(|e| e.wind.as_ref().and_then(|w| w.speed))
        .collect();
    let directions: Vec<f64> = group
        .iter()
        .filter_map(|e| e.wind.as_ref().and_then(|w| w.direction))
        .collect();

    if !speeds.is_empty() || !directions.is_empty() {
        let wind = combined.wind.get_or_insert_with(LogWind::default);
        if !speeds.is_empty() {
            wind.speed = Some(speeds.iter().sum::<f64>() / speeds.len() as f64);
        }
        if let Some(mean) = circular_mean(&directions) {
            wind.direction = Some(mean);
        }
    }
    combined
}

/// Merge successive course change entries that share the same starting course.
///
/// Entries that are not course changes, and course changes that are not
/// followed by another with the same start, pass through unchanged.
pub fn merge_course_changes(entries: &[LogEntry]) -> Vec<LogEntry> {
    let mut merged = Vec::with_capacity(entries.len());
    let mut i = 0;

    while i < entries.len() {
        let entry = &entries[i];
        let Some((from, _)) = parse_course_change(entry) else {
            merged.push(entry.clone());
            i += 1;
            continue;
        };

        let mut end = i + 1;
        let mut final_to = None;
        while end < entries.len() {
            match parse_course_change(&entries[end]) {
                Some((next_from, next_to)) if next_from == from => {
                    final_to = Some(next_to);
                    end += 1;
                }
                _ => break,
            }
        }

        match final_to {
            Some(to) => merged.push(combine(&entries[i..end], from, to)),
            None => merged.push(entry.clone()),
        }
        i = end;
    }

    debug!(
        "[Course] Merged {} log entries into {}",
        entries.len(),
        merged.len()
    );
    merged
}
