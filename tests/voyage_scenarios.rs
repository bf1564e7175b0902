//! End-to-end voyage scenarios.
//!
//! Tests the full pipeline: raw JSON records -> normalized points -> legs ->
//! voyage -> fleet totals, plus manual voyage synthesis.
//!
//! Run with: `cargo test --test voyage_scenarios`

use serde_json::{json, Value};
use voyage_analytics::points::format_timestamp_ms;
use voyage_analytics::{
    build_voyage, compute_voyage_totals, merge_course_changes, parse_manual_record_json,
    parse_points_json, synthesize_manual_voyage, try_synthesize_manual_voyage, LogEntry,
    ManualConfig, SegmentConfig, VoyageError,
};

const MINUTE: i64 = 60_000;
const HOUR: i64 = 3_600_000;

/// 2024-06-01T10:00:00Z
const SUMMER_MORNING: i64 = 1_717_236_000_000;
/// 2024-12-01T00:00:00Z
const WINTER_MIDNIGHT: i64 = 1_733_011_200_000;
/// 2024-07-01T08:00:00Z
const JULY_MORNING: i64 = 1_719_820_800_000;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn iso(ms: i64) -> String {
    format_timestamp_ms(ms).expect("timestamp in range")
}

/// Two legs off Kiel separated by a two-hour anchor stop. Records alternate
/// between flat fields and a nested log entry.
fn kiel_records() -> Value {
    let mut records = Vec::new();

    // Leg 1: sailing north, one arc-minute per minute
    for i in 0..=30 {
        let t = SUMMER_MORNING + i * MINUTE;
        let lat = 54.0 + i as f64 / 60.0;
        if i % 2 == 0 {
            records.push(json!({"datetime": iso(t), "lat": lat, "lon": 10.0, "activity": "sailing"}));
        } else {
            records.push(json!({
                "activity": "sailing",
                "entry": {"datetime": iso(t), "position": {"lat": lat, "lng": 10.0}}
            }));
        }
    }

    // Anchored at the end of leg 1, then weighs anchor two hours later
    records.push(json!({
        "datetime": iso(SUMMER_MORNING + 40 * MINUTE),
        "lat": 54.5, "lon": 10.0, "activity": "anchored"
    }));

    // Leg 2: motoring north
    for i in 0..=30 {
        let t = SUMMER_MORNING + (160 + i) * MINUTE;
        records.push(json!({
            "datetime": iso(t),
            "lat": 54.5 + i as f64 / 60.0,
            "lon": 10.0,
            "activity": "motoring"
        }));
    }

    Value::Array(records)
}

// ============================================================================
// Logged voyages
// ============================================================================

#[test]
fn test_logged_voyage_pipeline() {
    init_logging();
    let points = parse_points_json(&kiel_records().to_string()).unwrap();
    assert_eq!(points.len(), 63);

    let voyage = build_voyage("kiel", &points, &SegmentConfig::default()).unwrap();
    assert_eq!(voyage.segments.len(), 2);
    assert_eq!(voyage.segments[0].distance_nm, 30.0);
    assert_eq!(voyage.segments[1].distance_nm, 30.0);
    assert_eq!(voyage.nm, 60.0);
    assert_eq!(voyage.start_time_ms, Some(SUMMER_MORNING));
    assert_eq!(voyage.end_time_ms, Some(SUMMER_MORNING + 190 * MINUTE));

    // Leg 1 runs 40 minutes including the approach to anchor, leg 2 runs 30
    let hours = voyage.total_hours.unwrap();
    assert!((hours - 70.0 / 60.0).abs() < 1e-9);
    // Unweighted mean of 45 kn and 60 kn
    assert!((voyage.avg_speed.unwrap() - 52.5).abs() < 1e-9);

    let bounds = voyage.bounds.unwrap();
    assert_eq!(bounds.min_lat, 54.0);
    assert!((bounds.max_lat - 55.0).abs() < 1e-9);

    let totals = compute_voyage_totals(&[voyage]);
    assert_eq!(totals.total_distance_nm, 60.0);
    assert_eq!(totals.total_active_ms, 70 * MINUTE);
    assert_eq!(totals.total_sailing_ms, 30 * MINUTE);
    // Midday in June at 54N
    assert_eq!(totals.total_night_ms, 0);
}

#[test]
fn test_segmentation_is_idempotent() {
    let points = parse_points_json(&kiel_records().to_string()).unwrap();
    let config = SegmentConfig::default();
    let voyage = build_voyage("kiel", &points, &config).unwrap();

    assert_eq!(voyage.compute_day_segments(&config), voyage.segments);

    // Input order does not matter
    let mut shuffled = points.clone();
    shuffled.reverse();
    let again = build_voyage("kiel", &shuffled, &config).unwrap();
    assert_eq!(again.segments, voyage.segments);
}

#[test]
fn test_night_passage_at_equator() {
    init_logging();
    let records: Vec<Value> = (0..=12)
        .map(|i| {
            json!({
                "datetime": iso(WINTER_MIDNIGHT + i * 10 * MINUTE),
                "lat": i as f64 * 2.0 / 60.0,
                "lon": 0.0
            })
        })
        .collect();
    let points = parse_points_json(&Value::Array(records).to_string()).unwrap();
    let voyage = build_voyage("equator", &points, &SegmentConfig::default()).unwrap();

    let totals = compute_voyage_totals(&[voyage]);
    assert_eq!(totals.total_active_ms, 2 * HOUR);
    assert_eq!(totals.total_sailing_ms, 2 * HOUR);
    assert_eq!(totals.total_night_ms, 2 * HOUR);
}

#[test]
fn test_fleet_totals_add_up() {
    let config = SegmentConfig::default();
    let kiel = parse_points_json(&kiel_records().to_string()).unwrap();
    let voyage = build_voyage("kiel", &kiel, &config).unwrap();

    let single = compute_voyage_totals(std::slice::from_ref(&voyage));
    let double = compute_voyage_totals(&[voyage.clone(), voyage]);
    assert_eq!(double.total_active_ms, 2 * single.total_active_ms);
    assert!((double.total_distance_nm - 2.0 * single.total_distance_nm).abs() < 1e-9);
    assert!(double.total_sailing_ms <= double.total_active_ms);
}

#[test]
fn test_malformed_input_is_an_error() {
    match parse_points_json("{not json") {
        Err(VoyageError::Parse { what, .. }) => assert_eq!(what, "track points"),
        other => panic!("expected parse error, got {:?}", other),
    }
    assert!(SegmentConfig {
        min_gap_ms: 0,
        ..Default::default()
    }
    .validate()
    .is_err());
}

// ============================================================================
// Manual voyages
// ============================================================================

#[test]
fn test_manual_round_trip() {
    init_logging();
    let record = parse_manual_record_json(
        &json!({
            "id": "day-sail",
            "returnTrip": true,
            "locations": [
                {"name": "Kiel", "lat": 54.0, "lng": 10.0, "time": iso(JULY_MORNING)},
                {"name": "Offshore", "lat": 54.5, "lon": 10.0}
            ]
        })
        .to_string(),
    )
    .unwrap();

    let config = ManualConfig::default();
    let voyage = synthesize_manual_voyage(&record, &config).unwrap();
    assert!(voyage.manual);
    assert!(voyage.return_trip);
    assert_eq!(voyage.segments.len(), 2);
    assert_eq!(voyage.nm, 60.0);
    assert_eq!(voyage.avg_speed, Some(5.0));
    assert_eq!(voyage.start_time_ms, Some(JULY_MORNING));

    let hours = voyage.total_hours.unwrap();
    let elapsed = (voyage.end_time_ms.unwrap() - JULY_MORNING) as f64 / HOUR as f64;
    assert!((elapsed - hours).abs() < 0.001);

    // Back at the start
    let last = voyage.points.last().unwrap().position.unwrap();
    assert_eq!((last.lat, last.lon), (54.0, 10.0));
    assert!(voyage.points.iter().all(|p| p.manual));

    let totals = compute_voyage_totals(&[voyage]);
    assert_eq!(totals.total_night_ms, 0);
    assert_eq!(totals.total_distance_nm, 60.0);
}

#[test]
fn test_manual_record_with_too_few_stops() {
    let record = parse_manual_record_json(r#"{"id": "x", "locations": [{"lat": 1.0, "lon": 1.0}]}"#).unwrap();
    assert!(synthesize_manual_voyage(&record, &ManualConfig::default()).is_none());
}

#[test]
fn test_manual_voyage_with_zero_speed_is_rejected() {
    let record = parse_manual_record_json(
        &json!({
            "id": "becalmed",
            "returnTrip": true,
            "locations": [
                {"name": "Kiel", "lat": 54.0, "lon": 10.0, "time": iso(JULY_MORNING)},
                {"name": "Offshore", "lat": 54.5, "lon": 10.0}
            ]
        })
        .to_string(),
    )
    .unwrap();

    let config = ManualConfig { speed_kn: 0.0 };
    assert!(synthesize_manual_voyage(&record, &config).is_none());
    match try_synthesize_manual_voyage(&record, &config) {
        Err(VoyageError::InvalidConfig { field, .. }) => assert_eq!(field, "speed_kn"),
        other => panic!("expected invalid config, got {:?}", other),
    }
    assert!(try_synthesize_manual_voyage(&record, &ManualConfig::default()).is_ok());
}

// ============================================================================
// Log entries
// ============================================================================

#[test]
fn test_course_changes_merge_from_json() {
    let log: Vec<LogEntry> = serde_json::from_value(json!([
        {"text": "Course change: 270° → 280°", "maxSpeed": 6.1},
        {"text": "Course change: 270° → 285°", "maxSpeed": 6.8},
        {"text": "Course change: 285° → 300°"}
    ]))
    .unwrap();

    let merged = merge_course_changes(&log);
    assert_eq!(merged.len(), 2);
    assert_eq!(merged[0].text.as_deref(), Some("Course change: 270° → 285°"));
    assert_eq!(merged[0].max_speed, Some(6.8));

    let out = serde_json::to_value(&merged[1]).unwrap();
    assert_eq!(out, json!({"text": "Course change: 285° → 300°"}));
}
