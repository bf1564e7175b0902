//! # Voyage Analytics
//!
//! Leg segmentation and voyage statistics for sailing logbooks.
//!
//! This library provides:
//! - Normalization of heterogeneous logbook point records into one flat type
//! - Leg segmentation (anchor stops, time gaps, skip-connection markers)
//! - Per-leg and per-voyage distance, speed, wind and duration statistics
//! - Night-time exposure from civil twilight at each link's position
//! - Synthesized voyages for manually entered stops
//! - Course change merging and sailing polars from logged voyages
//!
//! ## Features
//!
//! - **`parallel`** - Enable parallel batch processing with rayon
//!
//! ## Quick Start
//!
//! ```rust
//! use voyage_analytics::{build_voyage, compute_voyage_totals, Coordinate, SegmentConfig, TrackPoint};
//!
//! // One point per minute, heading north at one nautical mile per minute
//! let points: Vec<TrackPoint> = (0..30)
//!     .map(|i| {
//!         TrackPoint::new(
//!             Some(1_710_000_000_000 + i * 60_000),
//!             Some(Coordinate::new(54.0 + i as f64 / 60.0, 10.0)),
//!         )
//!     })
//!     .collect();
//!
//! let voyage = build_voyage("kiel-run", &points, &SegmentConfig::default()).unwrap();
//! assert_eq!(voyage.segments.len(), 1);
//!
//! let totals = compute_voyage_totals(&[voyage]);
//! assert!(totals.total_distance_nm > 28.0);
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{OptionExt, Result, VoyageError};

// Geographic utilities (distance, circular mean, bounds, midpoints)
pub mod geo_utils;

// Raw record normalization and point accessors
pub mod points;
pub use points::{parse_points_json, RawPoint, TrackPoint};

// Civil twilight and night overlap
pub mod solar;
pub use solar::{civil_twilight, night_overlap_ms, CivilTwilight};

// Leg segmentation
pub mod segments;
pub use segments::{build_leg_summary, compute_day_segments, LegSummary, SegmentConfig};

// Voyage assembly and fleet totals
pub mod voyages;
#[cfg(feature = "parallel")]
pub use voyages::{build_voyages_parallel, compute_voyage_totals_parallel};
pub use voyages::{
    apply_voyage_time_metrics, build_voyage, build_voyages, compute_voyage_totals,
    try_build_voyage, voyage_totals, Voyage, VoyageTotals,
};

// Manually entered voyages
pub mod manual;
pub use manual::{
    build_manual_segments_from_stops, parse_manual_record_json, synthesize_manual_voyage,
    try_synthesize_manual_voyage, ManualConfig, ManualStop, ManualVoyageRecord,
};

// Log entry course change merging
pub mod course;
pub use course::{merge_course_changes, LogEntry};

// Sailing polars
pub mod polar;
pub use polar::{build_polar_diagram, polar_table, PolarConfig, PolarCurve, PolarDiagram};

// Algorithm toolbox - flat access to the standalone algorithms
pub mod algorithms;

/// A geographic coordinate in decimal degrees.
///
/// # Example
/// ```
/// use voyage_analytics::Coordinate;
/// let kiel = Coordinate::new(54.3233, 10.1228);
/// assert!(kiel.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    #[serde(alias = "lng")]
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Check if the coordinate is finite and within range.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

/// Bounding box of a track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl Bounds {
    /// Get the center point of the bounds.
    pub fn center(&self) -> Coordinate {
        Coordinate::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }
}

/// What the boat was doing at a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activity {
    Sailing,
    Motoring,
    Anchored,
}

impl Activity {
    /// Parse an activity tag, ignoring case and surrounding whitespace.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "sailing" => Some(Activity::Sailing),
            "motoring" => Some(Activity::Motoring),
            "anchored" => Some(Activity::Anchored),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Activity::Sailing => "sailing",
            Activity::Motoring => "motoring",
            Activity::Anchored => "anchored",
        }
    }
}

/// Wind observation: speed in knots, direction in degrees true.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    pub speed: Option<f64>,
    pub direction: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_validation() {
        assert!(Coordinate::new(54.3, 10.1).is_valid());
        assert!(Coordinate::new(-90.0, 180.0).is_valid());
        assert!(!Coordinate::new(91.0, 0.0).is_valid());
        assert!(!Coordinate::new(0.0, 181.0).is_valid());
        assert!(!Coordinate::new(f64::NAN, 0.0).is_valid());
        assert!(!Coordinate::new(0.0, f64::INFINITY).is_valid());
    }

    #[test]
    fn test_coordinate_accepts_lng_alias() {
        let c: Coordinate = serde_json::from_str(r#"{"lat": 1.5, "lng": 2.5}"#).unwrap();
        assert_eq!(c, Coordinate::new(1.5, 2.5));
    }

    #[test]
    fn test_activity_parse() {
        assert_eq!(Activity::parse("Sailing"), Some(Activity::Sailing));
        assert_eq!(Activity::parse(" motoring "), Some(Activity::Motoring));
        assert_eq!(Activity::parse("anchored"), Some(Activity::Anchored));
        assert_eq!(Activity::parse("drifting"), None);
        assert_eq!(Activity::parse(""), None);
        assert_eq!(Activity::Motoring.as_str(), "motoring");
    }

    #[test]
    fn test_bounds_center() {
        let bounds = Bounds {
            min_lat: 54.0,
            max_lat: 55.0,
            min_lon: 10.0,
            max_lon: 12.0,
        };
        assert_eq!(bounds.center(), Coordinate::new(54.5, 11.0));
    }

    #[test]
    fn test_activity_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Activity::Anchored).unwrap(), "\"anchored\"");
    }
}
