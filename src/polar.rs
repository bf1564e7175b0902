//! # Polar Diagrams
//!
//! Builds boat speed polars from logged voyages, one curve per true wind
//! speed band.
//!
//! ## Algorithm
//! 1. Collect sailing samples: points with speed through water, speed over
//!    ground, wind and course, away from the harbour manoeuvres at either end
//!    of a voyage. Each sample is mirrored onto the other tack.
//! 2. Bucket samples by true wind angle.
//! 3. Drop outliers per bucket (IQR), then take a percentile of what is left.
//! 4. Pin the curve to zero head to wind and smooth it with a moving average.
//!
//! ## Example
//! ```
//! use voyage_analytics::polar::{build_polar_diagram, polar_table, PolarConfig};
//!
//! let diagram = build_polar_diagram(&[], &PolarConfig::default());
//! assert_eq!(diagram.curves.len(), 4);
//! assert!(polar_table(&diagram).starts_with("TWS\t"));
//! ```

use std::collections::BTreeMap;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VoyageError};
use crate::points::{wind_direction_of, wind_speed_of};
use crate::voyages::Voyage;

// ============================================================================
// Configuration
// ============================================================================

/// Points this close to a voyage's start or end are harbour manoeuvres.
const EXCLUSION_WINDOW_MS: i64 = 3_600_000;

/// Samples faster over ground than this fraction of the wind are motoring.
const MAX_SOG_TO_WIND_RATIO: f64 = 0.8;

/// Closest angle to the wind that still counts as sailing.
const MIN_TRUE_WIND_ANGLE_DEG: f64 = 30.0;

/// Mirrored samples beyond this angle are discarded.
const MAX_MIRRORED_ANGLE_DEG: f64 = 330.0;

/// Curve end points are extended or held when a target is this close.
const EDGE_TOLERANCE_DEG: f64 = 10.0;

/// Moving-average half width, in curve points.
const SMOOTHING_WINDOW: usize = 2;

/// Configuration for polar curve aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolarConfig {
    /// Width of each true wind angle bucket.
    /// Default: 10 degrees
    pub bin_size_deg: u32,
    /// Percentile of bucket speeds plotted on the curve (0-100).
    /// Default: 80
    pub percentile: f64,
    /// Buckets with fewer samples after outlier removal are left out.
    /// Default: 3
    pub min_samples: usize,
}

impl Default for PolarConfig {
    fn default() -> Self {
        Self {
            bin_size_deg: 10,
            percentile: 80.0,
            min_samples: 3,
        }
    }
}

impl PolarConfig {
    pub fn validate(&self) -> Result<()> {
        if self.bin_size_deg == 0 || self.bin_size_deg > 360 {
            return Err(VoyageError::InvalidConfig {
                field: "bin_size_deg",
                message: format!("expected 1-360 degrees, got {}", self.bin_size_deg),
            });
        }
        if !(0.0..=100.0).contains(&self.percentile) {
            return Err(VoyageError::InvalidConfig {
                field: "percentile",
                message: format!("expected 0-100, got {}", self.percentile),
            });
        }
        Ok(())
    }
}

/// A true wind speed band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindBand {
    pub label: &'static str,
    /// Inclusive lower bound in knots
    pub lower_kn: f64,
    /// Exclusive upper bound in knots, open-ended when `None`
    pub upper_kn: Option<f64>,
    /// Representative wind speed written to the polar table
    pub tws_kn: f64,
}

impl WindBand {
    pub fn contains(&self, speed_kn: f64) -> bool {
        speed_kn >= self.lower_kn && self.upper_kn.map_or(true, |upper| speed_kn < upper)
    }
}

pub const WIND_BANDS: [WindBand; 4] = [
    WindBand { label: "2.5-7.5 kn", lower_kn: 2.5, upper_kn: Some(7.5), tws_kn: 5.0 },
    WindBand { label: "7.5-12.5 kn", lower_kn: 7.5, upper_kn: Some(12.5), tws_kn: 10.0 },
    WindBand { label: "12.5-17.5 kn", lower_kn: 12.5, upper_kn: Some(17.5), tws_kn: 15.0 },
    WindBand { label: ">17.5 kn", lower_kn: 17.5, upper_kn: None, tws_kn: 20.0 },
];

/// Index into [`WIND_BANDS`] for a wind speed.
pub fn categorize_wind_speed(speed_kn: f64) -> Option<usize> {
    WIND_BANDS.iter().position(|band| band.contains(speed_kn))
}

// ============================================================================
// Types
// ============================================================================

/// Boat speed at a true wind angle. Used for raw samples and curve points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolarPoint {
    /// 0-360, 0 is head to wind
    pub angle_deg: f64,
    /// Speed through water in knots
    pub stw: f64,
}

/// Aggregated curve for one wind band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolarCurve {
    pub label: String,
    pub tws_kn: f64,
    pub sample_count: usize,
    /// Sorted by angle. Empty when the band had no samples.
    pub points: Vec<PolarPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolarDiagram {
    pub percentile: f64,
    /// One curve per entry of [`WIND_BANDS`], in band order
    pub curves: Vec<PolarCurve>,
}

// ============================================================================
// Sample collection
// ============================================================================

/// Absolute true wind angle in 0-180 degrees, 0 meaning head to wind.
pub fn true_wind_angle(course_deg: f64, wind_direction_deg: f64) -> f64 {
    let angle = (wind_direction_deg - course_deg).rem_euclid(360.0);
    if angle > 180.0 {
        360.0 - angle
    } else {
        angle
    }
}

/// Collect sailing samples from voyages, grouped by wind band.
///
/// The returned vector is indexed like [`WIND_BANDS`].
pub fn collect_sailing_samples(voyages: &[Voyage]) -> Vec<Vec<PolarPoint>> {
    let mut by_band: Vec<Vec<PolarPoint>> = vec![Vec::new(); WIND_BANDS.len()];

    for voyage in voyages {
        let (Some(start), Some(end)) = (voyage.start_time_ms, voyage.end_time_ms) else {
            continue;
        };

        for point in &voyage.points {
            let Some(t) = point.timestamp_ms else {
                continue;
            };
            if t - start < EXCLUSION_WINDOW_MS || end - t < EXCLUSION_WINDOW_MS {
                continue;
            }
            let (Some(stw), Some(sog), Some(wind_speed), Some(wind_dir), Some(course)) = (
                point.speed_through_water,
                point.speed_over_ground,
                wind_speed_of(point),
                wind_direction_of(point),
                point.course,
            ) else {
                continue;
            };
            if wind_speed <= 0.0 || sog > MAX_SOG_TO_WIND_RATIO * wind_speed {
                continue;
            }
            let Some(band) = categorize_wind_speed(wind_speed) else {
                continue;
            };
            let angle = true_wind_angle(course, wind_dir);
            if angle < MIN_TRUE_WIND_ANGLE_DEG {
                continue;
            }

            by_band[band].push(PolarPoint { angle_deg: angle, stw });
            if angle > 0.0 && angle < 180.0 {
                let mirrored = (360.0 - angle).rem_euclid(360.0);
                if mirrored <= MAX_MIRRORED_ANGLE_DEG {
                    by_band[band].push(PolarPoint { angle_deg: mirrored, stw });
                }
            }
        }
    }

    debug!(
        "[Polar] Collected {} samples from {} voyages",
        by_band.iter().map(Vec::len).sum::<usize>(),
        voyages.len()
    );
    by_band
}

// ============================================================================
// Statistics
// ============================================================================

/// Linear-interpolated percentile. `pct` is clamped to 0-100.
pub fn percentile(values: &[f64], pct: f64) -> Option<f64> {
    let mut ordered = values.to_vec();
    ordered.sort_by(|a, b| a.total_cmp(b));
    match ordered.len() {
        0 => None,
        1 => Some(ordered[0]),
        n => {
            let rank = (n - 1) as f64 * (pct.clamp(0.0, 100.0) / 100.0);
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let fraction = rank - lower as f64;
            Some(ordered[lower] + (ordered[upper] - ordered[lower]) * fraction)
        }
    }
}

/// Drop values outside 1.5 IQR of the quartiles.
///
/// Fewer than four values are returned untouched. With a zero spread only
/// the values between the quartiles survive.
pub fn remove_outliers(values: &[f64]) -> Vec<f64> {
    if values.len() < 4 {
        return values.to_vec();
    }
    let (Some(q1), Some(q3)) = (percentile(values, 25.0), percentile(values, 75.0)) else {
        return values.to_vec();
    };
    let iqr = q3 - q1;
    let (lower, upper) = if iqr <= 0.0 {
        (q1, q3)
    } else {
        (q1 - 1.5 * iqr, q3 + 1.5 * iqr)
    };
    values.iter().copied().filter(|v| (lower..=upper).contains(v)).collect()
}

/// Group sample speeds by the center of their angle bucket.
pub fn bucket_by_angle(samples: &[PolarPoint], bin_size_deg: u32) -> BTreeMap<u32, Vec<f64>> {
    let bin = bin_size_deg.max(1) as f64;
    let mut buckets: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    for sample in samples {
        let shifted = (sample.angle_deg + bin / 2.0).rem_euclid(360.0);
        let center = ((shifted / bin).floor() * bin) as u32;
        buckets.entry(center).or_default().push(sample.stw);
    }
    buckets
}

/// Moving average over `window` neighbours on each side. End points are kept.
pub fn smooth_curve(points: &[PolarPoint], window: usize) -> Vec<PolarPoint> {
    let n = points.len();
    if n <= 3 || window == 0 {
        return points.to_vec();
    }
    points
        .iter()
        .enumerate()
        .map(|(idx, point)| {
            if idx == 0 || idx == n - 1 {
                return *point;
            }
            let neighbours = &points[idx.saturating_sub(window)..(idx + window + 1).min(n)];
            let mean = neighbours.iter().map(|p| p.stw).sum::<f64>() / neighbours.len() as f64;
            PolarPoint { angle_deg: point.angle_deg, stw: mean }
        })
        .collect()
}

/// Aggregate samples of one band into a smoothed curve from 0 to 360 degrees.
pub fn aggregated_curve(samples: &[PolarPoint], config: &PolarConfig) -> Vec<PolarPoint> {
    let mut curve: Vec<PolarPoint> = bucket_by_angle(samples, config.bin_size_deg)
        .into_iter()
        .filter_map(|(center, speeds)| {
            let filtered = remove_outliers(&speeds);
            if filtered.len() < config.min_samples {
                return None;
            }
            percentile(&filtered, config.percentile).map(|stw| PolarPoint {
                angle_deg: center as f64,
                stw,
            })
        })
        .collect();

    let origin = PolarPoint { angle_deg: 0.0, stw: 0.0 };
    let closing = PolarPoint { angle_deg: 360.0, stw: 0.0 };

    match (curve.first().copied(), curve.last().copied()) {
        (Some(first), Some(last)) => {
            if first.angle_deg > 0.0 {
                curve.insert(0, origin);
            } else {
                curve[0] = origin;
            }
            if last.angle_deg < 360.0 {
                curve.push(closing);
            } else if let Some(end) = curve.last_mut() {
                *end = closing;
            }
        }
        _ => curve = vec![origin, closing],
    }

    smooth_curve(&curve, SMOOTHING_WINDOW)
}

/// Speed at `target_deg` on a curve sorted by angle.
///
/// Linear between neighbours. Beyond either end the end value is held for up
/// to 10 degrees, after which there is no value.
pub fn interpolate_speed(points: &[PolarPoint], target_deg: f64) -> Option<f64> {
    let idx = points.partition_point(|p| p.angle_deg < target_deg);

    if let Some(point) = points.get(idx) {
        if (point.angle_deg - target_deg).abs() <= 1e-6 {
            return Some(point.stw);
        }
    }
    if idx == 0 {
        let first = points.first()?;
        return (first.angle_deg - target_deg <= EDGE_TOLERANCE_DEG).then_some(first.stw);
    }
    if idx == points.len() {
        let last = points.last()?;
        return (target_deg - last.angle_deg <= EDGE_TOLERANCE_DEG).then_some(last.stw);
    }

    let left = points[idx - 1];
    let right = points[idx];
    if (right.angle_deg - left.angle_deg).abs() <= 1e-6 {
        return Some(left.stw);
    }
    let proportion = (target_deg - left.angle_deg) / (right.angle_deg - left.angle_deg);
    Some(left.stw + proportion * (right.stw - left.stw))
}

// ============================================================================
// Diagram and table
// ============================================================================

/// Build one curve per wind band from the sailing samples of `voyages`.
pub fn build_polar_diagram(voyages: &[Voyage], config: &PolarConfig) -> PolarDiagram {
    let samples = collect_sailing_samples(voyages);

    let curves: Vec<PolarCurve> = WIND_BANDS
        .iter()
        .zip(samples.iter())
        .map(|(band, band_samples)| PolarCurve {
            label: band.label.to_string(),
            tws_kn: band.tws_kn,
            sample_count: band_samples.len(),
            points: if band_samples.is_empty() {
                Vec::new()
            } else {
                aggregated_curve(band_samples, config)
            },
        })
        .collect();

    info!(
        "[Polar] Built {} curves ({} with data) from {} voyages",
        curves.len(),
        curves.iter().filter(|c| !c.points.is_empty()).count(),
        voyages.len()
    );

    PolarDiagram {
        percentile: config.percentile,
        curves,
    }
}

/// Tab-separated polar table: one row per curve, with `TWA`/`STW` column
/// pairs for angle centers 35 to 175.
pub fn polar_table(diagram: &PolarDiagram) -> String {
    if diagram.curves.is_empty() {
        return "TWS\n".to_string();
    }
    let centers: Vec<u32> = (35..=175).step_by(10).collect();

    let mut header = vec!["TWS".to_string()];
    for center in &centers {
        header.push(format!("TWA{}", center));
        header.push(format!("STW{}", center));
    }
    let mut lines = vec![header.join("\t")];

    for curve in &diagram.curves {
        let visible: Vec<PolarPoint> = curve
            .points
            .iter()
            .copied()
            .filter(|p| (MIN_TRUE_WIND_ANGLE_DEG..=MAX_MIRRORED_ANGLE_DEG).contains(&p.angle_deg))
            .collect();

        let mut row = vec![format!("{:.1}", curve.tws_kn)];
        for &center in &centers {
            row.push(center.to_string());
            row.push(
                interpolate_speed(&visible, center as f64)
                    .map(|stw| format!("{:.2}", stw))
                    .unwrap_or_default(),
            );
        }
        lines.push(row.join("\t"));
    }

    lines.join("\n") + "\n"
}
