//! # Algorithm Toolbox
//!
//! Direct access to the standalone voyage algorithms, for callers that want
//! the functions without going through voyage assembly.
//!
//! ## Geometry
//!
//! - **Great-circle distance**: haversine in nautical miles
//! - **Circular mean**: average of compass bearings
//! - **Path length**: sum of valid links along a track
//!
//! ## Time and light
//!
//! - **Civil twilight**: dawn and dusk for a local solar day
//! - **Night overlap**: milliseconds of an interval spent in darkness
//!
//! # Example
//!
//! ```rust
//! use voyage_analytics::algorithms::{circular_mean, great_circle_distance_nm};
//!
//! let nm = great_circle_distance_nm(54.0, 10.0, 55.0, 10.0).unwrap();
//! assert!((nm - 60.0).abs() < 0.1);
//!
//! let heading = circular_mean(&[350.0, 10.0]).unwrap();
//! assert!(heading < 1e-6 || heading > 360.0 - 1e-6);
//! ```

// =============================================================================
// Core Types (re-exported from lib)
// =============================================================================

pub use crate::{Activity, Bounds, Coordinate, LegSummary, TrackPoint, Voyage, VoyageTotals, Wind};

// =============================================================================
// Geographic Utilities
// =============================================================================

pub use crate::geo_utils::{
    circular_mean, compute_bounds, cumulative_distances_nm, distance_between,
    great_circle_distance_nm, midpoint, path_length_nm, round_to_tenth, EARTH_RADIUS_M,
    METERS_PER_NM,
};

// =============================================================================
// Point Accessors
// =============================================================================

pub use crate::points::{
    activity_of, format_timestamp_ms, parse_timestamp_ms, should_skip_connection,
    sort_by_timestamp, wind_direction_of, wind_speed_of,
};

// =============================================================================
// Solar
// =============================================================================

pub use crate::solar::{civil_twilight, night_overlap_ms, solar_day_start_ms, CivilTwilight};

// =============================================================================
// Segmentation and Totals
// =============================================================================

pub use crate::segments::{build_leg_summary, compute_day_segments, should_split_after};
pub use crate::voyages::voyage_totals;

// =============================================================================
// Polars
// =============================================================================

pub use crate::polar::{
    aggregated_curve, interpolate_speed, percentile, remove_outliers, true_wind_angle,
};
