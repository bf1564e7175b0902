//! Leg segmentation for logged voyages.
//!
//! A voyage's points are split into legs wherever the track is deliberately
//! broken (a skip-connection marker) or the boat sat at anchor for at least
//! `min_gap_ms`. Each run of points is then summarized into a [`LegSummary`];
//! runs shorter than `min_leg_distance_nm` are drift at anchor and dropped.
//!
//! ## Example
//! ```rust
//! use voyage_analytics::{Coordinate, SegmentConfig, TrackPoint};
//! use voyage_analytics::segments::compute_day_segments;
//!
//! let points: Vec<TrackPoint> = (0..4)
//!     .map(|i| TrackPoint::new(
//!         Some(i * 600_000),
//!         Some(Coordinate::new(54.0 + i as f64 / 60.0, 10.0)),
//!     ))
//!     .collect();
//!
//! let legs = compute_day_segments(&points, &SegmentConfig::default());
//! assert_eq!(legs.len(), 1);
//! assert!((legs[0].distance_nm - 3.0).abs() < 0.11);
//! ```

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{ensure_positive, Result, VoyageError};
use crate::geo_utils::{circular_mean, distance_between, round_to_tenth};
use crate::points::{should_skip_connection, sort_by_timestamp, wind_direction_of, wind_speed_of, TrackPoint};
use crate::Coordinate;

const MS_PER_HOUR: f64 = 3_600_000.0;

/// Configuration for leg segmentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentConfig {
    /// Legs shorter than this are discarded as drift at anchor.
    /// Default: 1.0 nm
    pub min_leg_distance_nm: f64,
    /// Minimum time at anchor before a new leg starts.
    /// Default: 3_600_000 ms (1 hour)
    pub min_gap_ms: i64,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            min_leg_distance_nm: 1.0,
            min_gap_ms: 3_600_000,
        }
    }
}

impl SegmentConfig {
    /// Check that thresholds are usable.
    pub fn validate(&self) -> Result<()> {
        if !self.min_leg_distance_nm.is_finite() || self.min_leg_distance_nm < 0.0 {
            return Err(VoyageError::InvalidConfig {
                field: "min_leg_distance_nm",
                message: format!("expected a non-negative number, got {}", self.min_leg_distance_nm),
            });
        }
        ensure_positive("min_gap_ms", self.min_gap_ms as f64)
    }
}

/// Summary of one leg: a contiguous run of points within a voyage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegSummary {
    /// Earliest timestamp in the leg (UTC ms)
    pub start_time_ms: Option<i64>,
    /// Latest timestamp in the leg (UTC ms)
    pub end_time_ms: Option<i64>,
    /// Distance over valid links, rounded to 0.1 nm
    pub distance_nm: f64,
    /// Fastest SOG/STW reported in the leg (knots)
    pub max_speed: f64,
    /// Where the fastest speed was reported
    pub max_speed_coord: Option<Coordinate>,
    /// Distance over moving hours (knots), 0 when no time elapsed
    pub avg_speed: f64,
    pub max_wind_speed: f64,
    pub avg_wind_speed: f64,
    /// Circular mean of reported wind directions
    pub avg_wind_heading: Option<f64>,
    /// Sum of positive, non-skipped gaps between consecutive points
    pub total_hours: f64,
    pub points: Vec<TrackPoint>,
}

/// Decide whether a new leg starts after `point`.
///
/// Splits on an explicit skip-connection marker regardless of timing, or when
/// either point is anchored and the gap to `next` is at least `min_gap_ms`.
/// A missing timestamp never triggers a time-based split.
pub fn should_split_after(point: &TrackPoint, next: &TrackPoint, min_gap_ms: i64) -> bool {
    if should_skip_connection(point, next) {
        return true;
    }
    if !(point.is_anchored() || next.is_anchored()) {
        return false;
    }
    match (point.timestamp_ms, next.timestamp_ms) {
        (Some(a), Some(b)) => b - a >= min_gap_ms,
        _ => false,
    }
}

/// Summarize a run of points into a leg.
///
/// Returns `None` for an empty run or when the leg covers less than
/// `min_leg_distance_nm`. The rounded distance is used both for that check and
/// for the emitted field, so a leg never flips between kept and dropped on
/// rounding.
pub fn build_leg_summary(points: &[TrackPoint], min_leg_distance_nm: f64) -> Option<LegSummary> {
    if points.is_empty() {
        return None;
    }

    let mut distance = 0.0;
    let mut elapsed_ms = 0.0;
    for pair in points.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if should_skip_connection(a, b) {
            continue;
        }
        if let (Some(pa), Some(pb)) = (&a.position, &b.position) {
            distance += distance_between(pa, pb).unwrap_or(0.0);
        }
        if let (Some(ta), Some(tb)) = (a.timestamp_ms, b.timestamp_ms) {
            let gap = (tb - ta) as f64;
            if gap > 0.0 && gap.is_finite() {
                elapsed_ms += gap;
            }
        }
    }

    let mut max_speed = 0.0;
    let mut max_speed_coord = None;
    let mut max_wind_speed = 0.0;
    let mut wind_sum = 0.0;
    let mut wind_count = 0usize;
    let mut headings = Vec::new();

    for point in points {
        if let Some(speed) = point.best_speed() {
            if speed > max_speed {
                max_speed = speed;
                max_speed_coord = point.position;
            }
        }
        if let Some(wind) = wind_speed_of(point) {
            if wind > max_wind_speed {
                max_wind_speed = wind;
            }
            wind_sum += wind;
            wind_count += 1;
        }
        if let Some(direction) = wind_direction_of(point) {
            headings.push(direction);
        }
    }

    let distance_nm = round_to_tenth(distance);
    if distance_nm < min_leg_distance_nm {
        debug!(
            "[Segments] Dropping leg of {} points: {:.1} nm < {:.1} nm",
            points.len(),
            distance_nm,
            min_leg_distance_nm
        );
        return None;
    }

    let total_hours = elapsed_ms / MS_PER_HOUR;
    let avg_speed = if total_hours > 0.0 { distance_nm / total_hours } else { 0.0 };
    let avg_wind_speed = if wind_count > 0 { wind_sum / wind_count as f64 } else { 0.0 };

    Some(LegSummary {
        start_time_ms: points.iter().find_map(|p| p.timestamp_ms),
        end_time_ms: points.iter().rev().find_map(|p| p.timestamp_ms),
        distance_nm,
        max_speed,
        max_speed_coord,
        avg_speed,
        max_wind_speed,
        avg_wind_speed,
        avg_wind_heading: circular_mean(&headings),
        total_hours,
        points: points.to_vec(),
    })
}

/// Split a voyage's points into legs, oldest first.
///
/// Points are sorted by timestamp first (untimed points last, otherwise
/// stable), so the result does not depend on input order and repeated calls
/// give identical legs.
pub fn compute_day_segments(points: &[TrackPoint], config: &SegmentConfig) -> Vec<LegSummary> {
    let sorted = sort_by_timestamp(points);
    let mut legs = Vec::new();
    let mut run: Vec<TrackPoint> = Vec::new();

    for (i, point) in sorted.iter().enumerate() {
        run.push(point.clone());
        let split = sorted
            .get(i + 1)
            .map(|next| should_split_after(point, next, config.min_gap_ms))
            .unwrap_or(false);
        if split {
            debug!("[Segments] Split after point {} of {}", i, sorted.len());
            if let Some(leg) = build_leg_summary(&run, config.min_leg_distance_nm) {
                legs.push(leg);
            }
            run.clear();
        }
    }

    if let Some(leg) = build_leg_summary(&run, config.min_leg_distance_nm) {
        legs.push(leg);
    }

    legs
}
