//! Geographic utilities: great-circle distance, circular mean and path helpers.
//!
//! Distances are in nautical miles throughout. The haversine uses a fixed mean
//! Earth radius of 6,371,000 m so results match the logbook's published figures.

use geo::{BoundingRect, Centroid, LineString, MultiPoint};

use crate::{Bounds, Coordinate};

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Meters per nautical mile.
pub const METERS_PER_NM: f64 = 1852.0;

/// Great-circle distance between two coordinates in nautical miles.
///
/// Returns `None` if any coordinate is non-finite.
///
/// # Example
/// ```
/// use voyage_analytics::geo_utils::great_circle_distance_nm;
///
/// // One arc-minute of latitude is roughly one nautical mile
/// let d = great_circle_distance_nm(0.0, 0.0, 1.0 / 60.0, 0.0).unwrap();
/// assert!((d - 1.0).abs() < 0.01);
/// ```
pub fn great_circle_distance_nm(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> Option<f64> {
    if !(lat1.is_finite() && lon1.is_finite() && lat2.is_finite() && lon2.is_finite()) {
        return None;
    }

    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    // Rounding can push `a` marginally outside [0, 1] for antipodal points
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    Some(EARTH_RADIUS_M * c / METERS_PER_NM)
}

/// Great-circle distance between two [`Coordinate`]s in nautical miles.
pub fn distance_between(a: &Coordinate, b: &Coordinate) -> Option<f64> {
    great_circle_distance_nm(a.lat, a.lon, b.lat, b.lon)
}

/// Circular (angular) mean of directions in degrees, normalized into [0, 360).
///
/// Returns `None` for an empty slice.
pub fn circular_mean(degrees: &[f64]) -> Option<f64> {
    if degrees.is_empty() {
        return None;
    }

    let (sin_sum, cos_sum) = degrees.iter().fold((0.0, 0.0), |(s, c), &deg| {
        let rad = deg.to_radians();
        (s + rad.sin(), c + rad.cos())
    });
    let n = degrees.len() as f64;
    let mean = (sin_sum / n).atan2(cos_sum / n).to_degrees();

    let normalized = mean.rem_euclid(360.0);
    // rem_euclid can return exactly 360.0 for tiny negative inputs
    Some(if normalized >= 360.0 { 0.0 } else { normalized })
}

/// Total length of a path in nautical miles.
///
/// Sums consecutive legs without closing the loop. Pairs with invalid
/// coordinates contribute nothing.
pub fn path_length_nm(coords: &[Coordinate]) -> f64 {
    coords
        .windows(2)
        .filter_map(|w| distance_between(&w[0], &w[1]))
        .sum()
}

/// Cumulative distance (nm) at each vertex of a path, starting at 0.
pub fn cumulative_distances_nm(coords: &[Coordinate]) -> Vec<f64> {
    let mut cumulative = Vec::with_capacity(coords.len());
    let mut total = 0.0;
    for (i, coord) in coords.iter().enumerate() {
        if i > 0 {
            total += distance_between(&coords[i - 1], coord).unwrap_or(0.0);
        }
        cumulative.push(total);
    }
    cumulative
}

/// Representative coordinate for the link between two points.
///
/// Uses the planar centroid of the two-point line. When the link crosses the
/// antimeridian the planar midpoint lands on the wrong side of the globe, so
/// the first endpoint is used instead.
pub fn midpoint(a: &Coordinate, b: &Coordinate) -> Coordinate {
    if (a.lon - b.lon).abs() > 180.0 {
        return *a;
    }
    let line = LineString::from(vec![(a.lon, a.lat), (b.lon, b.lat)]);
    line.centroid()
        .map(|p| Coordinate::new(p.y(), p.x()))
        .unwrap_or(*a)
}

/// Bounding box of a set of coordinates, `None` when empty.
pub fn compute_bounds(coords: &[Coordinate]) -> Option<Bounds> {
    let valid: Vec<(f64, f64)> = coords
        .iter()
        .filter(|c| c.is_valid())
        .map(|c| (c.lon, c.lat))
        .collect();
    let rect = MultiPoint::from(valid).bounding_rect()?;
    Some(Bounds {
        min_lat: rect.min().y,
        max_lat: rect.max().y,
        min_lon: rect.min().x,
        max_lon: rect.max().x,
    })
}

/// Round to one decimal place (0.1 nm resolution).
pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
