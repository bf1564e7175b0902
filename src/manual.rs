//! Manual voyage synthesis.
//!
//! A manual voyage is a handful of user-entered stops rather than a logged
//! track. This module expands the stops into the same point list, leg
//! summaries and voyage record that segmentation produces for logged voyages,
//! so totals and rendering code treat both alike.
//!
//! Speed is not measured for manual voyages: every leg is assumed to be sailed
//! at [`ManualConfig::speed_kn`] (5 kn by default).

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{ensure_positive, OptionExt, Result, VoyageError};
use crate::geo_utils::{compute_bounds, cumulative_distances_nm, path_length_nm, round_to_tenth};
use crate::points::{format_timestamp_ms, parse_timestamp_ms, TrackPoint};
use crate::segments::LegSummary;
use crate::voyages::Voyage;
use crate::Coordinate;

const MS_PER_HOUR: f64 = 3_600_000.0;

/// Stops with usable coordinates needed for a voyage.
const MIN_MANUAL_STOPS: usize = 2;

/// Configuration for manual voyage synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualConfig {
    /// Assumed boat speed for every manual leg.
    /// Default: 5.0 knots
    pub speed_kn: f64,
}

impl Default for ManualConfig {
    fn default() -> Self {
        Self { speed_kn: 5.0 }
    }
}

impl ManualConfig {
    pub fn validate(&self) -> Result<()> {
        ensure_positive("speed_kn", self.speed_kn)
    }
}

/// A named stop of a manual voyage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualStop {
    #[serde(default)]
    pub name: String,
    pub lat: f64,
    #[serde(alias = "lng")]
    pub lon: f64,
    /// Departure/arrival time as an ISO datetime
    #[serde(default)]
    pub time: Option<String>,
    /// Finer path from this stop to the next one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_points: Option<Vec<Coordinate>>,
}

impl ManualStop {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lon)
    }

    fn route(&self) -> Option<&[Coordinate]> {
        self.route_points.as_deref().filter(|r| !r.is_empty())
    }
}

/// Stored shape of a manual voyage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualVoyageRecord {
    pub id: String,
    #[serde(default)]
    pub return_trip: bool,
    #[serde(default)]
    pub locations: Vec<ManualStop>,
}

/// Decode a manual voyage record from JSON.
pub fn parse_manual_record_json(json: &str) -> Result<ManualVoyageRecord> {
    serde_json::from_str(json).map_err(|source| VoyageError::Parse {
        what: "manual voyage",
        source,
    })
}

// ============================================================================
// Leg Geometry
// ============================================================================

/// Full path of the leg from `from` to `to`.
///
/// Route points are framed by the two named stops; a route point that
/// duplicates its neighbouring stop is not repeated.
fn leg_path(from: &ManualStop, to: &ManualStop) -> Vec<Coordinate> {
    let start = from.coordinate();
    let end = to.coordinate();
    let mut path = vec![start];
    if let Some(route) = from.route() {
        for coord in route.iter().filter(|c| c.is_valid()) {
            if path.last() != Some(coord) {
                path.push(*coord);
            }
        }
    }
    if path.last() != Some(&end) || path.len() == 1 {
        path.push(end);
    }
    path
}

/// Distance of one leg: route path length if present, else direct distance.
pub fn manual_leg_distance_nm(from: &ManualStop, to: &ManualStop) -> f64 {
    path_length_nm(&leg_path(from, to))
}

/// Timestamps for every vertex of a path, proportional to cumulative distance.
fn interpolate_times(path: &[Coordinate], start_ms: Option<i64>, end_ms: Option<i64>) -> Vec<Option<i64>> {
    let cumulative = cumulative_distances_nm(path);
    let total = cumulative.last().copied().unwrap_or(0.0);
    cumulative
        .iter()
        .enumerate()
        .map(|(i, &d)| match (start_ms, end_ms) {
            (Some(t0), Some(t1)) if total > 0.0 => {
                Some(t0 + ((t1 - t0) as f64 * d / total).round() as i64)
            }
            (Some(t0), Some(t1)) => Some(if i + 1 == path.len() { t1 } else { t0 }),
            (t0, _) => t0,
        })
        .collect()
}

fn leg_points(path: &[Coordinate], start_ms: Option<i64>, end_ms: Option<i64>) -> Vec<TrackPoint> {
    path.iter()
        .zip(interpolate_times(path, start_ms, end_ms))
        .map(|(coord, ts)| TrackPoint {
            raw_activity: "sailing".to_string(),
            manual: true,
            ..TrackPoint::new(ts, Some(*coord))
        })
        .collect()
}

// ============================================================================
// Stops
// ============================================================================

/// Stops with usable coordinates.
fn valid_stops(stops: &[ManualStop]) -> Vec<ManualStop> {
    stops
        .iter()
        .filter(|s| s.coordinate().is_valid())
        .cloned()
        .collect()
}

/// Time to cover `distance_nm` at `speed_kn`, `None` when it is not finite.
fn travel_ms(distance_nm: f64, speed_kn: f64) -> Option<i64> {
    let ms = (distance_nm / speed_kn * MS_PER_HOUR).round();
    (ms.is_finite() && ms.abs() < i64::MAX as f64).then_some(ms as i64)
}

/// Resolve each stop's time; a stop without a parseable time is reached from
/// the previous stop at the configured speed.
fn resolve_stop_times(stops: &[ManualStop], speed_kn: f64) -> Vec<Option<i64>> {
    let mut times: Vec<Option<i64>> = Vec::with_capacity(stops.len());
    for (i, stop) in stops.iter().enumerate() {
        let parsed = stop.time.as_deref().and_then(parse_timestamp_ms);
        let resolved = parsed.or_else(|| {
            let prev_time = times.get(i.checked_sub(1)?).copied().flatten()?;
            prev_time.checked_add(travel_ms(manual_leg_distance_nm(&stops[i - 1], stop), speed_kn)?)
        });
        times.push(resolved);
    }
    times
}

/// Append the synthetic "return to start" stop of a two-stop round trip.
///
/// The back leg follows the far stop's own route if it has one, otherwise
/// the outbound route reversed, otherwise the direct line.
fn close_loop(stops: &[ManualStop], speed_kn: f64) -> Vec<ManualStop> {
    let mut closed = stops.to_vec();
    let origin = &stops[0];

    if closed[1].route().is_none() {
        closed[1].route_points = origin.route().map(|route| route.iter().rev().copied().collect());
    }

    let back_nm = path_length_nm(&leg_path(&closed[1], origin));
    let far_time = resolve_stop_times(stops, speed_kn)[1];
    let return_time = far_time.and_then(|t| t.checked_add(travel_ms(back_nm, speed_kn)?));

    closed.push(ManualStop {
        name: origin.name.clone(),
        lat: origin.lat,
        lon: origin.lon,
        time: return_time.and_then(format_timestamp_ms),
        route_points: None,
    });
    closed
}

// ============================================================================
// Segments and Voyage
// ============================================================================

/// Build one leg summary per consecutive pair of stops.
///
/// The legs have the same shape as segmentation output: distance rounded to
/// 0.1 nm, hours at the configured speed, and the interpolated points.
/// An invalid config yields no legs.
pub fn build_manual_segments_from_stops(stops: &[ManualStop], config: &ManualConfig) -> Vec<LegSummary> {
    if let Err(err) = config.validate() {
        debug!("[Manual] Not building legs: {}", err);
        return Vec::new();
    }
    let stops = valid_stops(stops);
    let times = resolve_stop_times(&stops, config.speed_kn);

    stops
        .windows(2)
        .enumerate()
        .map(|(i, pair)| {
            let path = leg_path(&pair[0], &pair[1]);
            let distance = path_length_nm(&path);
            let total_hours = distance / config.speed_kn;
            let avg_speed = if distance > 0.0 { config.speed_kn } else { 0.0 };
            LegSummary {
                start_time_ms: times[i],
                end_time_ms: times[i + 1],
                distance_nm: round_to_tenth(distance),
                max_speed: avg_speed,
                max_speed_coord: None,
                avg_speed,
                max_wind_speed: 0.0,
                avg_wind_speed: 0.0,
                avg_wind_heading: None,
                total_hours,
                points: leg_points(&path, times[i], times[i + 1]),
            }
        })
        .collect()
}

/// Stitch leg point lists into one, dropping a repeated coordinate at each
/// leg boundary.
fn stitch_points(legs: &[LegSummary]) -> Vec<TrackPoint> {
    let mut points: Vec<TrackPoint> = Vec::new();
    for leg in legs {
        let mut leg_iter = leg.points.iter();
        if let (Some(last), Some(first)) = (points.last(), leg.points.first()) {
            if last.position == first.position {
                leg_iter.next();
            }
        }
        points.extend(leg_iter.cloned());
    }
    points
}

/// Expand a manual voyage record into a full voyage.
///
/// Returns `None` when the config is invalid or fewer than two stops have
/// usable coordinates.
pub fn synthesize_manual_voyage(record: &ManualVoyageRecord, config: &ManualConfig) -> Option<Voyage> {
    if let Err(err) = config.validate() {
        debug!("[Manual] Voyage {} skipped: {}", record.id, err);
        return None;
    }
    let mut stops = valid_stops(&record.locations);
    if stops.len() < MIN_MANUAL_STOPS {
        debug!(
            "[Manual] Voyage {} has {} usable stops, skipping",
            record.id,
            stops.len()
        );
        return None;
    }
    if record.return_trip && stops.len() == 2 {
        stops = close_loop(&stops, config.speed_kn);
    }

    let segments = build_manual_segments_from_stops(&stops, config);
    let distance: f64 = stops
        .windows(2)
        .map(|pair| manual_leg_distance_nm(&pair[0], &pair[1]))
        .sum();
    let points = stitch_points(&segments);
    let coords: Vec<Coordinate> = points.iter().filter_map(|p| p.position).collect();
    let speed = if distance > 0.0 { config.speed_kn } else { 0.0 };

    info!(
        "[Manual] Voyage {}: {} stops, {} legs, {:.1} nm",
        record.id,
        stops.len(),
        segments.len(),
        distance
    );

    Some(Voyage {
        id: record.id.clone(),
        start_time_ms: segments.first().and_then(|s| s.start_time_ms),
        end_time_ms: segments.last().and_then(|s| s.end_time_ms),
        nm: round_to_tenth(distance),
        total_hours: Some(distance / config.speed_kn),
        avg_speed: (distance > 0.0).then_some(speed),
        max_speed: speed,
        max_wind_speed: 0.0,
        avg_wind_speed: 0.0,
        manual: true,
        return_trip: record.return_trip,
        bounds: compute_bounds(&coords),
        points,
        segments,
    })
}

/// Validate `config`, then expand a manual voyage record.
///
/// Unlike [`synthesize_manual_voyage`], an invalid speed is reported as
/// [`VoyageError::InvalidConfig`] and a record with too few usable stops as
/// [`VoyageError::InsufficientPoints`].
pub fn try_synthesize_manual_voyage(record: &ManualVoyageRecord, config: &ManualConfig) -> Result<Voyage> {
    config.validate()?;
    synthesize_manual_voyage(record, config).ok_or_insufficient_points(
        &record.id,
        valid_stops(&record.locations).len(),
        MIN_MANUAL_STOPS,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo_utils::distance_between;

    const HOUR: i64 = 3_600_000;

    fn stop(name: &str, lat: f64, lon: f64, time: Option<&str>) -> ManualStop {
        ManualStop {
            name: name.to_string(),
            lat,
            lon,
            time: time.map(str::to_string),
            route_points: None,
        }
    }

    fn record(stops: Vec<ManualStop>, return_trip: bool) -> ManualVoyageRecord {
        ManualVoyageRecord {
            id: "m-1".to_string(),
            return_trip,
            locations: stops,
        }
    }

    #[test]
    fn test_direct_leg_distance() {
        let a = stop("A", 54.0, 10.0, None);
        let b = stop("B", 54.5, 10.0, None);
        let d = manual_leg_distance_nm(&a, &b);
        assert!((d - 30.02).abs() < 0.05);
    }

    #[test]
    fn test_route_points_lengthen_leg() {
        let mut a = stop("A", 54.0, 10.0, None);
        let b = stop("B", 54.5, 10.0, None);
        a.route_points = Some(vec![Coordinate::new(54.25, 10.3)]);
        assert!(manual_leg_distance_nm(&a, &b) > manual_leg_distance_nm(&stop("A", 54.0, 10.0, None), &b));
    }

    #[test]
    fn test_route_points_including_endpoints_not_doubled() {
        let mut a = stop("A", 54.0, 10.0, None);
        let b = stop("B", 54.5, 10.0, None);
        a.route_points = Some(vec![Coordinate::new(54.0, 10.0), Coordinate::new(54.5, 10.0)]);
        assert_eq!(leg_path(&a, &b).len(), 2);
    }

    #[test]
    fn test_single_leg_voyage() {
        let voyage = synthesize_manual_voyage(
            &record(
                vec![
                    stop("Kiel", 54.0, 10.0, Some("2024-06-01T08:00:00Z")),
                    stop("Sønderborg", 54.5, 10.0, Some("2024-06-01T14:00:00Z")),
                ],
                false,
            ),
            &ManualConfig::default(),
        )
        .unwrap();

        assert!(voyage.manual);
        assert_eq!(voyage.nm, 30.0);
        assert_eq!(voyage.avg_speed, Some(5.0));
        assert!((voyage.total_hours.unwrap() - voyage.nm / 5.0).abs() < 0.01);
        assert_eq!(voyage.segments.len(), 1);
        assert_eq!(voyage.points.len(), 2);
        assert_eq!(voyage.start_time_ms, parse_timestamp_ms("2024-06-01T08:00:00Z"));
        assert_eq!(voyage.end_time_ms, parse_timestamp_ms("2024-06-01T14:00:00Z"));
    }

    #[test]
    fn test_route_point_times_interpolated() {
        let mut a = stop("A", 0.0, 0.0, Some("2024-06-01T00:00:00Z"));
        a.route_points = Some(vec![Coordinate::new(1.0 / 60.0, 0.0), Coordinate::new(2.0 / 60.0, 0.0)]);
        let b = stop("B", 4.0 / 60.0, 0.0, Some("2024-06-01T04:00:00Z"));

        let legs = build_manual_segments_from_stops(&[a, b], &ManualConfig::default());
        let times: Vec<i64> = legs[0].points.iter().map(|p| p.timestamp_ms.unwrap()).collect();
        let t0 = times[0];
        assert_eq!(times.len(), 4);
        assert!((times[1] - t0 - HOUR).abs() < 60_000);
        assert!((times[2] - t0 - 2 * HOUR).abs() < 60_000);
        assert_eq!(times[3] - t0, 4 * HOUR);
        assert!(legs[0].points.iter().all(|p| p.manual));
    }

    #[test]
    fn test_multi_leg_round_trip_distance() {
        let stops = vec![
            stop("A", 54.0, 10.0, Some("2024-06-01T08:00:00Z")),
            stop("B", 54.3, 10.4, Some("2024-06-01T14:00:00Z")),
            stop("C", 54.6, 10.1, Some("2024-06-02T09:00:00Z")),
            stop("D", 54.9, 9.8, Some("2024-06-02T15:00:00Z")),
        ];
        let config = ManualConfig::default();
        let voyage = synthesize_manual_voyage(&record(stops.clone(), false), &config).unwrap();
        let legs = build_manual_segments_from_stops(&stops, &config);

        let leg_sum: f64 = legs.iter().map(|l| l.distance_nm).sum();
        assert_eq!(legs.len(), 3);
        assert!((leg_sum - voyage.nm).abs() <= 0.2 + 1e-9);
    }

    #[test]
    fn test_multi_leg_points_deduplicated() {
        let stops = vec![
            stop("A", 54.0, 10.0, Some("2024-06-01T08:00:00Z")),
            stop("B", 54.3, 10.4, Some("2024-06-01T14:00:00Z")),
            stop("C", 54.6, 10.1, Some("2024-06-02T09:00:00Z")),
        ];
        let voyage = synthesize_manual_voyage(&record(stops, false), &ManualConfig::default()).unwrap();
        // A, B, C: the shared stop B is only listed once
        assert_eq!(voyage.points.len(), 3);
        assert_eq!(voyage.segments.len(), 2);
        assert_eq!(voyage.avg_speed, Some(5.0));
    }

    #[test]
    fn test_return_trip_closes_loop() {
        let a = stop("Harbour", 54.0, 10.0, Some("2024-06-01T08:00:00Z"));
        let b = stop("Island", 54.5, 10.0, Some("2024-06-01T14:00:00Z"));
        let direct = distance_between(&a.coordinate(), &b.coordinate()).unwrap();

        let voyage = synthesize_manual_voyage(&record(vec![a.clone(), b], true), &ManualConfig::default()).unwrap();
        assert!(voyage.return_trip);
        assert_eq!(voyage.nm, round_to_tenth(2.0 * direct));
        assert_eq!(voyage.segments.len(), 2);

        let last = voyage.points.last().unwrap();
        assert_eq!(last.position, Some(a.coordinate()));
        // Back leg at 5 kn: ~30 nm takes ~6 hours after leaving the island
        let back_ms = last.timestamp_ms.unwrap() - parse_timestamp_ms("2024-06-01T14:00:00Z").unwrap();
        assert!((back_ms - (direct / 5.0 * HOUR as f64) as i64).abs() < 1000);
    }

    #[test]
    fn test_return_trip_reuses_reversed_route() {
        let mut a = stop("Harbour", 54.0, 10.0, Some("2024-06-01T08:00:00Z"));
        a.route_points = Some(vec![Coordinate::new(54.2, 10.3), Coordinate::new(54.4, 10.2)]);
        let b = stop("Island", 54.5, 10.0, Some("2024-06-01T14:00:00Z"));
        let out = manual_leg_distance_nm(&a, &b);

        let voyage = synthesize_manual_voyage(&record(vec![a, b], true), &ManualConfig::default()).unwrap();
        assert_eq!(voyage.nm, round_to_tenth(2.0 * out));
    }

    #[test]
    fn test_missing_time_derived_from_speed() {
        let stops = vec![
            stop("A", 0.0, 0.0, Some("2024-06-01T00:00:00Z")),
            stop("B", 10.0 / 60.0, 0.0, None),
        ];
        let times = resolve_stop_times(&stops, 5.0);
        // ~10 nm at 5 kn
        assert!((times[1].unwrap() - times[0].unwrap() - 2 * HOUR).abs() < 60_000);
    }

    #[test]
    fn test_too_few_stops() {
        let config = ManualConfig::default();
        assert!(synthesize_manual_voyage(&record(vec![], false), &config).is_none());
        assert!(synthesize_manual_voyage(
            &record(vec![stop("A", 0.0, 0.0, None), stop("B", f64::NAN, 0.0, None)], false),
            &config
        )
        .is_none());
    }

    #[test]
    fn test_zero_distance_voyage() {
        let voyage = synthesize_manual_voyage(
            &record(vec![stop("A", 1.0, 1.0, None), stop("A", 1.0, 1.0, None)], false),
            &ManualConfig::default(),
        )
        .unwrap();
        assert_eq!(voyage.nm, 0.0);
        assert_eq!(voyage.avg_speed, None);
        assert_eq!(voyage.segments[0].avg_speed, 0.0);
    }

    #[test]
    fn test_parse_manual_record_json() {
        let rec = parse_manual_record_json(
            r#"{"id": "m-7", "returnTrip": true, "locations": [
                {"name": "A", "lat": 54.0, "lng": 10.0, "time": "2024-06-01T08:00:00Z"},
                {"name": "B", "lat": 54.5, "lon": 10.0, "routePoints": [{"lat": 54.2, "lon": 10.1}]}
            ]}"#,
        )
        .unwrap();
        assert!(rec.return_trip);
        assert_eq!(rec.locations.len(), 2);
        assert_eq!(rec.locations[1].route_points.as_ref().map(Vec::len), Some(1));
        assert!(parse_manual_record_json("[]").is_err());
    }

    #[test]
    fn test_config_validation() {
        assert!(ManualConfig::default().validate().is_ok());
        assert!(ManualConfig { speed_kn: 0.0 }.validate().is_err());
    }

    #[test]
    fn test_non_positive_speed_is_rejected() {
        let stops = vec![
            stop("A", 54.0, 10.0, Some("2024-06-01T08:00:00Z")),
            stop("B", 54.5, 10.0, None),
        ];
        for speed_kn in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            let config = ManualConfig { speed_kn };
            assert!(synthesize_manual_voyage(&record(stops.clone(), false), &config).is_none());
            assert!(synthesize_manual_voyage(&record(stops.clone(), true), &config).is_none());
            assert!(build_manual_segments_from_stops(&stops, &config).is_empty());
            assert!(matches!(
                try_synthesize_manual_voyage(&record(stops.clone(), false), &config),
                Err(VoyageError::InvalidConfig { field: "speed_kn", .. })
            ));
        }
    }

    #[test]
    fn test_unreachable_stop_time_stays_unset() {
        let stops = vec![
            stop("A", 54.0, 10.0, Some("2024-06-01T08:00:00Z")),
            stop("B", 54.5, 10.0, None),
        ];
        // Thirty miles at a crawl overflows the millisecond clock
        let times = resolve_stop_times(&stops, 1e-300);
        assert!(times[0].is_some());
        assert_eq!(times[1], None);
        assert_eq!(travel_ms(30.0, 1e-300), None);
        assert_eq!(travel_ms(30.0, 5.0), Some(6 * 3_600_000));
    }

    #[test]
    fn test_try_synthesize_reports_too_few_stops() {
        let config = ManualConfig::default();
        match try_synthesize_manual_voyage(&record(vec![stop("A", 0.0, 0.0, None)], false), &config) {
            Err(VoyageError::InsufficientPoints { point_count, minimum_required, .. }) => {
                assert_eq!(point_count, 1);
                assert_eq!(minimum_required, 2);
            }
            other => panic!("expected insufficient points, got {:?}", other),
        }
        let two = vec![
            stop("A", 54.0, 10.0, Some("2024-06-01T08:00:00Z")),
            stop("B", 54.5, 10.0, None),
        ];
        assert!(try_synthesize_manual_voyage(&record(two, false), &config).is_ok());
    }
}
