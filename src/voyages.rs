//! Voyage assembly and fleet-wide totals.
//!
//! ## Features
//! - Build a [`Voyage`] record from a logged point track
//! - Per-voyage time metrics (`total_hours`, `avg_speed`) derived from legs
//! - Fleet totals: distance, active time, sailing time, night time
//! - Parallel batch variants behind the `parallel` feature
//!
//! ## Example
//! ```rust
//! use voyage_analytics::voyages::compute_voyage_totals;
//!
//! let totals = compute_voyage_totals(&[]);
//! assert_eq!(totals.total_distance_nm, 0.0);
//! assert_eq!(totals.total_active_ms, 0);
//! ```

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{OptionExt, Result};
use crate::geo_utils::{compute_bounds, midpoint, round_to_tenth};
use crate::points::{should_skip_connection, sort_by_timestamp, wind_speed_of, TrackPoint};
use crate::segments::{compute_day_segments, LegSummary, SegmentConfig};
use crate::solar::night_overlap_ms;
use crate::{Activity, Bounds, Coordinate};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

const MS_PER_HOUR: f64 = 3_600_000.0;

/// Points with both a timestamp and a position needed to build a voyage.
const MIN_VOYAGE_POINTS: usize = 2;

/// A logged or manual voyage with its legs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Voyage {
    pub id: String,
    pub start_time_ms: Option<i64>,
    pub end_time_ms: Option<i64>,
    /// Voyage distance in nautical miles
    pub nm: f64,
    /// Sum of leg hours; `None` until legs exist
    pub total_hours: Option<f64>,
    pub avg_speed: Option<f64>,
    pub max_speed: f64,
    pub max_wind_speed: f64,
    pub avg_wind_speed: f64,
    /// Synthesized from user-entered stops rather than logged
    pub manual: bool,
    pub return_trip: bool,
    pub bounds: Option<Bounds>,
    pub points: Vec<TrackPoint>,
    #[serde(rename = "_segments", default)]
    pub segments: Vec<LegSummary>,
}

impl Voyage {
    /// Recompute this voyage's legs from its points.
    pub fn compute_day_segments(&self, config: &SegmentConfig) -> Vec<LegSummary> {
        compute_day_segments(&self.points, config)
    }
}

/// Aggregate totals over a list of voyages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoyageTotals {
    pub total_distance_nm: f64,
    /// Time sailing, motoring or at anchor as part of a trip
    pub total_active_ms: i64,
    pub total_sailing_ms: i64,
    /// Sailing or motoring between civil dusk and dawn
    pub total_night_ms: i64,
}

impl VoyageTotals {
    fn add(self, other: VoyageTotals) -> VoyageTotals {
        VoyageTotals {
            total_distance_nm: self.total_distance_nm + other.total_distance_nm,
            total_active_ms: self.total_active_ms + other.total_active_ms,
            total_sailing_ms: self.total_sailing_ms + other.total_sailing_ms,
            total_night_ms: self.total_night_ms + other.total_night_ms,
        }
    }

    /// Active time in hours.
    pub fn active_hours(&self) -> f64 {
        self.total_active_ms as f64 / MS_PER_HOUR
    }

    /// Night time in hours.
    pub fn night_hours(&self) -> f64 {
        self.total_night_ms as f64 / MS_PER_HOUR
    }
}

// ============================================================================
// Totals
// ============================================================================

/// Positive time gap of a continuous link, if any.
fn link_gap_ms(a: &TrackPoint, b: &TrackPoint) -> Option<i64> {
    if should_skip_connection(a, b) {
        return None;
    }
    match (a.timestamp_ms, b.timestamp_ms) {
        (Some(ta), Some(tb)) if tb > ta => Some(tb - ta),
        _ => None,
    }
}

fn hours_to_ms(hours: f64) -> i64 {
    (hours * MS_PER_HOUR).round().max(0.0) as i64
}

/// Active duration of a voyage in ms.
///
/// Precedence: the voyage's stated `total_hours`, then the sum of its legs'
/// hours, then a scan of its raw points.
fn active_ms(voyage: &Voyage, sorted: &[TrackPoint]) -> i64 {
    if let Some(hours) = voyage.total_hours.filter(|h| h.is_finite()) {
        return hours_to_ms(hours);
    }
    if !voyage.segments.is_empty() {
        let hours: f64 = voyage
            .segments
            .iter()
            .map(|s| s.total_hours)
            .filter(|h| h.is_finite())
            .sum();
        return hours_to_ms(hours);
    }
    sorted
        .windows(2)
        .filter_map(|w| link_gap_ms(&w[0], &w[1]))
        .sum()
}

fn sailing_ms(sorted: &[TrackPoint]) -> i64 {
    sorted
        .windows(2)
        .filter(|w| w[0].activity() == Activity::Sailing && w[1].activity() == Activity::Sailing)
        .filter_map(|w| link_gap_ms(&w[0], &w[1]))
        .sum()
}

fn link_location(a: &TrackPoint, b: &TrackPoint) -> Option<Coordinate> {
    match (&a.position, &b.position) {
        (Some(pa), Some(pb)) => Some(midpoint(pa, pb)),
        (Some(p), None) | (None, Some(p)) => Some(*p),
        (None, None) => None,
    }
}

fn night_ms(sorted: &[TrackPoint]) -> i64 {
    let underway = |p: &TrackPoint| matches!(p.activity(), Activity::Sailing | Activity::Motoring);
    sorted
        .windows(2)
        .filter(|w| underway(&w[0]) && underway(&w[1]))
        .filter_map(|w| {
            let (a, b) = (&w[0], &w[1]);
            link_gap_ms(a, b)?;
            let location = link_location(a, b)?;
            let (start, end) = (a.timestamp_ms?, b.timestamp_ms?);
            Some(night_overlap_ms(start, end, location.lat, location.lon))
        })
        .sum()
}

/// Totals for a single voyage.
///
/// Sailing and night time are clamped to the active duration. Manual voyages
/// contribute no night time since they lack real intermediate samples.
pub fn voyage_totals(voyage: &Voyage) -> VoyageTotals {
    let sorted = sort_by_timestamp(&voyage.points);
    let active = active_ms(voyage, &sorted).max(0);
    let sailing = sailing_ms(&sorted).clamp(0, active);
    let night = if voyage.manual { 0 } else { night_ms(&sorted).clamp(0, active) };
    let distance = if voyage.nm.is_finite() { voyage.nm.max(0.0) } else { 0.0 };

    debug!(
        "[Totals] Voyage {}: {:.1} nm, active={}ms sailing={}ms night={}ms",
        voyage.id, distance, active, sailing, night
    );

    VoyageTotals {
        total_distance_nm: distance,
        total_active_ms: active,
        total_sailing_ms: sailing,
        total_night_ms: night,
    }
}

/// Compute fleet totals over a list of voyages.
///
/// Recomputed from scratch on every call.
pub fn compute_voyage_totals(voyages: &[Voyage]) -> VoyageTotals {
    let totals = voyages
        .iter()
        .map(voyage_totals)
        .fold(VoyageTotals::default(), VoyageTotals::add);
    info!(
        "[Totals] {} voyages: {:.1} nm, {:.1}h active, {:.1}h night",
        voyages.len(),
        totals.total_distance_nm,
        totals.active_hours(),
        totals.night_hours()
    );
    totals
}

/// Compute fleet totals using parallel processing.
#[cfg(feature = "parallel")]
pub fn compute_voyage_totals_parallel(voyages: &[Voyage]) -> VoyageTotals {
    if voyages.len() < 10 {
        return compute_voyage_totals(voyages);
    }
    voyages
        .par_iter()
        .map(voyage_totals)
        .reduce(VoyageTotals::default, VoyageTotals::add)
}

// ============================================================================
// Time Metrics
// ============================================================================

/// Derive a voyage's `total_hours` and `avg_speed` from its legs.
///
/// With one leg, `avg_speed` is distance over hours. With several legs it is
/// the unweighted mean of the legs' average speeds, not a distance-weighted
/// mean. With no legs, `total_hours` is cleared and `avg_speed` left as is.
pub fn apply_voyage_time_metrics(voyage: &mut Voyage) {
    if voyage.segments.is_empty() {
        voyage.total_hours = None;
        return;
    }

    let hours: f64 = voyage.segments.iter().map(|s| s.total_hours).sum();
    voyage.total_hours = Some(hours);

    voyage.avg_speed = if voyage.segments.len() == 1 {
        Some(if hours > 0.0 { voyage.nm / hours } else { 0.0 })
    } else {
        let sum: f64 = voyage.segments.iter().map(|s| s.avg_speed).sum();
        Some(sum / voyage.segments.len() as f64)
    };
}

// ============================================================================
// Voyage Assembly
// ============================================================================

/// Build a voyage record from a logged point track.
///
/// Returns `None` when fewer than two points carry both a timestamp and a
/// position.
pub fn build_voyage(id: &str, points: &[TrackPoint], config: &SegmentConfig) -> Option<Voyage> {
    let usable = usable_point_count(points);
    if usable < MIN_VOYAGE_POINTS {
        debug!("[Totals] Voyage {} has {} usable points, skipping", id, usable);
        return None;
    }

    let sorted = sort_by_timestamp(points);
    let segments = compute_day_segments(&sorted, config);
    let nm = round_to_tenth(segments.iter().map(|s| s.distance_nm).sum());

    let winds: Vec<f64> = sorted.iter().filter_map(wind_speed_of).collect();
    let avg_wind_speed = if winds.is_empty() {
        0.0
    } else {
        winds.iter().sum::<f64>() / winds.len() as f64
    };
    let coords: Vec<Coordinate> = sorted.iter().filter_map(|p| p.position).collect();

    let mut voyage = Voyage {
        id: id.to_string(),
        start_time_ms: sorted.iter().find_map(|p| p.timestamp_ms),
        end_time_ms: sorted.iter().rev().find_map(|p| p.timestamp_ms),
        nm,
        total_hours: None,
        avg_speed: None,
        max_speed: segments.iter().map(|s| s.max_speed).fold(0.0, f64::max),
        max_wind_speed: winds.iter().copied().fold(0.0, f64::max),
        avg_wind_speed,
        manual: false,
        return_trip: false,
        bounds: compute_bounds(&coords),
        points: sorted,
        segments,
    };
    apply_voyage_time_metrics(&mut voyage);
    Some(voyage)
}

/// Validate `config`, then build a voyage.
///
/// Unlike [`build_voyage`], a track that is too sparse is reported as
/// [`VoyageError::InsufficientPoints`](crate::VoyageError::InsufficientPoints).
pub fn try_build_voyage(id: &str, points: &[TrackPoint], config: &SegmentConfig) -> Result<Voyage> {
    config.validate()?;
    build_voyage(id, points, config).ok_or_insufficient_points(
        id,
        usable_point_count(points),
        MIN_VOYAGE_POINTS,
    )
}

fn usable_point_count(points: &[TrackPoint]) -> usize {
    points
        .iter()
        .filter(|p| p.timestamp_ms.is_some() && p.position.is_some())
        .count()
}

/// Build voyages for a batch of `(id, points)` tracks, dropping unusable ones.
pub fn build_voyages(tracks: &[(String, Vec<TrackPoint>)], config: &SegmentConfig) -> Vec<Voyage> {
    tracks
        .iter()
        .filter_map(|(id, points)| build_voyage(id, points, config))
        .collect()
}

/// Build voyages for a batch of tracks using parallel processing.
///
/// Output order matches input order.
#[cfg(feature = "parallel")]
pub fn build_voyages_parallel(
    tracks: &[(String, Vec<TrackPoint>)],
    config: &SegmentConfig,
) -> Vec<Voyage> {
    tracks
        .par_iter()
        .filter_map(|(id, points)| build_voyage(id, points, config))
        .collect()
}
