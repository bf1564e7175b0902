//! Track point normalization and accessors.
//!
//! Log exports are heterogeneous: a field may sit on the point itself or in a
//! nested `entry` object, numbers occasionally arrive as strings, and any
//! field may be missing. [`TrackPoint::from_raw`] resolves all of that once,
//! so every algorithm downstream works on the flat [`TrackPoint`] shape.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{Result, VoyageError};
use crate::{Activity, Coordinate, Wind};

/// Note fragments that signal the boat was stopped.
const STOPPED_CUES: &[&str] = &[
    "anchored",
    "at anchor",
    "dropped anchor",
    "moored",
    "docked",
    "berthed",
    "stopped",
    "arrived",
];

/// Note fragments that signal the boat was moving.
const SAILING_CUES: &[&str] = &[
    "sailing",
    "under sail",
    "underway",
    "under way",
    "motoring",
    "departed",
    "weighed anchor",
    "cast off",
];

// ============================================================================
// Raw Records
// ============================================================================

/// Position object as found in log exports.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPosition {
    #[serde(default, deserialize_with = "lenient_f64", alias = "latitude")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", alias = "lng", alias = "longitude")]
    pub lon: Option<f64>,
}

/// Speed object (`{sog, stw}`) as found in log exports.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSpeed {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub sog: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub stw: Option<f64>,
}

/// Wind object (`{speed, direction}`) as found in log exports.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawWind {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub speed: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub direction: Option<f64>,
}

/// A point record as supplied by the log ingestion layer.
///
/// Every field is optional and tolerant of wrong types; a field that cannot
/// be read is treated as missing. The nested `entry` carries the original log
/// entry and is consulted when the point itself lacks a field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPoint {
    #[serde(default, deserialize_with = "lenient_string", alias = "timestamp", alias = "time")]
    pub datetime: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64", alias = "latitude")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", alias = "lng", alias = "longitude")]
    pub lon: Option<f64>,
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub position: Option<RawPosition>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub activity: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64", alias = "sog")]
    pub speed_over_ground: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", alias = "stw")]
    pub speed_through_water: Option<f64>,
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub speed: Option<RawSpeed>,
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub wind: Option<RawWind>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub course: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub skip_connection_to_next: Option<bool>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub skip_connection_from_prev: Option<bool>,
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub entry: Option<Box<RawPoint>>,
}

impl RawPoint {
    /// Look a field up on the point, falling back to the nested entry.
    fn lookup<T>(&self, get: impl Fn(&RawPoint) -> Option<T>) -> Option<T> {
        get(self).or_else(|| self.entry.as_deref().and_then(|e| get(e)))
    }

    fn own_position(&self) -> Option<Coordinate> {
        let (lat, lon) = match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => {
                let pos = self.position.as_ref()?;
                (pos.lat?, pos.lon?)
            }
        };
        let coord = Coordinate::new(lat, lon);
        coord.is_valid().then_some(coord)
    }

    fn own_sog(&self) -> Option<f64> {
        self.speed_over_ground
            .or_else(|| self.speed.as_ref().and_then(|s| s.sog))
    }

    fn own_stw(&self) -> Option<f64> {
        self.speed_through_water
            .or_else(|| self.speed.as_ref().and_then(|s| s.stw))
    }

    fn own_wind(&self) -> Option<Wind> {
        let raw = self.wind.as_ref()?;
        let wind = Wind {
            speed: raw.speed.filter(|v| v.is_finite()),
            direction: raw.direction.filter(|v| v.is_finite()),
        };
        (wind.speed.is_some() || wind.direction.is_some()).then_some(wind)
    }
}

// ============================================================================
// Canonical Point
// ============================================================================

/// A normalized track point. Downstream code assumes this flat shape only.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackPoint {
    /// UTC epoch milliseconds, `None` when the record had no parseable time
    pub timestamp_ms: Option<i64>,
    pub position: Option<Coordinate>,
    /// Explicit activity tag, lowercased; empty when the record had none
    pub raw_activity: String,
    pub speed_over_ground: Option<f64>,
    pub speed_through_water: Option<f64>,
    pub wind: Option<Wind>,
    /// Course over ground in degrees
    pub course: Option<f64>,
    /// Free-text note from the log entry
    pub text: Option<String>,
    pub skip_connection_to_next: bool,
    pub skip_connection_from_prev: bool,
    /// Synthesized from a manual voyage rather than logged
    pub manual: bool,
}

impl TrackPoint {
    /// Create a point with a timestamp and position and nothing else.
    pub fn new(timestamp_ms: Option<i64>, position: Option<Coordinate>) -> Self {
        Self {
            timestamp_ms,
            position,
            ..Default::default()
        }
    }

    /// Normalize a raw record, resolving the point/entry fallback chain.
    pub fn from_raw(raw: &RawPoint) -> Self {
        let timestamp_ms = raw
            .lookup(|p| p.datetime.clone())
            .and_then(|s| parse_timestamp_ms(&s));
        let raw_activity = raw
            .lookup(|p| {
                p.activity
                    .as_deref()
                    .map(|a| a.trim().to_lowercase())
                    .filter(|a| !a.is_empty())
            })
            .unwrap_or_default();

        Self {
            timestamp_ms,
            position: raw.lookup(RawPoint::own_position),
            raw_activity,
            speed_over_ground: raw.lookup(RawPoint::own_sog).filter(|v| v.is_finite()),
            speed_through_water: raw.lookup(RawPoint::own_stw).filter(|v| v.is_finite()),
            wind: raw.lookup(RawPoint::own_wind),
            course: raw.lookup(|p| p.course).filter(|v| v.is_finite()),
            text: raw.lookup(|p| p.text.clone()),
            skip_connection_to_next: flag_set(raw, |p| p.skip_connection_to_next),
            skip_connection_from_prev: flag_set(raw, |p| p.skip_connection_from_prev),
            manual: false,
        }
    }

    /// Activity with the display default applied.
    pub fn activity(&self) -> Activity {
        Activity::parse(&self.raw_activity).unwrap_or(Activity::Sailing)
    }

    /// Whether the point counts as a stop for leg splitting.
    ///
    /// An explicit `anchored` tag wins. Without any tag, a "stopped" cue in the
    /// note counts unless the note also carries a "sailing" cue.
    pub fn is_anchored(&self) -> bool {
        if !self.raw_activity.is_empty() {
            return self.raw_activity == "anchored";
        }
        text_indicates_stopped(self) && !text_indicates_sailing(self)
    }

    /// Fastest reported speed, preferring the larger of SOG and STW.
    pub fn best_speed(&self) -> Option<f64> {
        match (self.speed_over_ground, self.speed_through_water) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }

    /// Timestamp formatted as RFC 3339 (UTC), if present.
    pub fn datetime_string(&self) -> Option<String> {
        self.timestamp_ms.and_then(format_timestamp_ms)
    }
}

fn flag_set(raw: &RawPoint, get: impl Fn(&RawPoint) -> Option<bool>) -> bool {
    get(raw).unwrap_or(false) || raw.entry.as_deref().and_then(get).unwrap_or(false)
}

// ============================================================================
// Accessors
// ============================================================================

/// Activity of a point, defaulting to sailing for absent or unknown tags.
pub fn activity_of(point: &TrackPoint) -> Activity {
    point.activity()
}

/// Explicit activity tag of a point, empty when the record had none.
///
/// Unlike [`activity_of`] this keeps "no tag" distinct from "sailing".
pub fn raw_activity_of(point: &TrackPoint) -> &str {
    &point.raw_activity
}

/// True when the link from `a` to `b` must not be treated as continuous travel.
pub fn should_skip_connection(a: &TrackPoint, b: &TrackPoint) -> bool {
    a.skip_connection_to_next || b.skip_connection_from_prev
}

/// Wind speed reported at a point.
pub fn wind_speed_of(point: &TrackPoint) -> Option<f64> {
    point.wind.and_then(|w| w.speed)
}

/// Wind direction reported at a point.
pub fn wind_direction_of(point: &TrackPoint) -> Option<f64> {
    point.wind.and_then(|w| w.direction)
}

/// Timestamp of a point in UTC epoch milliseconds.
pub fn point_timestamp_ms(point: &TrackPoint) -> Option<i64> {
    point.timestamp_ms
}

/// True when the free-text note mentions a stop.
pub fn text_indicates_stopped(point: &TrackPoint) -> bool {
    text_contains_any(point, STOPPED_CUES)
}

/// True when the free-text note mentions being underway.
pub fn text_indicates_sailing(point: &TrackPoint) -> bool {
    text_contains_any(point, SAILING_CUES)
}

fn text_contains_any(point: &TrackPoint, cues: &[&str]) -> bool {
    match point.text.as_deref() {
        Some(text) => {
            let lower = text.to_lowercase();
            cues.iter().any(|cue| lower.contains(cue))
        }
        None => false,
    }
}

// ============================================================================
// Timestamps
// ============================================================================

/// Parse an ISO-like datetime into UTC epoch milliseconds.
///
/// Accepts RFC 3339 with offset, naive date-times (read as UTC) with `T` or a
/// space separator, bare dates, and integer epoch milliseconds.
pub fn parse_timestamp_ms(value: &str) -> Option<i64> {
    let s = value.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().timestamp_millis());
    }
    if s.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse().ok();
    }
    None
}

/// Format UTC epoch milliseconds as an RFC 3339 string with a `Z` suffix.
///
/// Fractional seconds are printed only when non-zero, so the value parses
/// back to the same millisecond.
pub fn format_timestamp_ms(ms: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(ms).map(|dt| dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

// ============================================================================
// Batch Helpers
// ============================================================================

/// Normalize a batch of raw records.
pub fn normalize_points(raw: &[RawPoint]) -> Vec<TrackPoint> {
    raw.iter().map(TrackPoint::from_raw).collect()
}

/// Decode a JSON array of raw point records and normalize it.
pub fn parse_points_json(json: &str) -> Result<Vec<TrackPoint>> {
    let raw: Vec<RawPoint> = serde_json::from_str(json).map_err(|source| VoyageError::Parse {
        what: "track points",
        source,
    })?;
    Ok(normalize_points(&raw))
}

/// Stable ascending sort by timestamp; points without a timestamp go last.
pub fn sort_by_timestamp(points: &[TrackPoint]) -> Vec<TrackPoint> {
    let mut sorted = points.to_vec();
    sorted.sort_by_key(|p| match p.timestamp_ms {
        Some(ts) => (0u8, ts),
        None => (1u8, 0),
    });
    sorted
}

// ============================================================================
// Lenient Deserializers
// ============================================================================

pub(crate) fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<f64>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

pub(crate) fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<bool>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => Some(b),
        Value::String(s) => Some(s.eq_ignore_ascii_case("true")),
        _ => None,
    })
}

/// Decode a nested object, treating anything of the wrong shape as missing.
pub(crate) fn lenient_or_default<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}
