//! Civil twilight and night-time overlap.
//!
//! Uses the standard low-precision sunrise equation (mean anomaly, equation of
//! center, ecliptic longitude, declination, transit). Results are good to a
//! few minutes, which is plenty for logbook statistics.
//!
//! Days are *local solar days*: UTC shifted by `longitude × 4 minutes`, so a
//! day runs from local apparent midnight to the next.
//!
//! ## Example
//! ```rust
//! use voyage_analytics::solar::night_overlap_ms;
//!
//! let day_ms = 24 * 3_600_000;
//! let night = night_overlap_ms(0, day_ms, 0.0, 0.0);
//! // Civil twilight at the equator leaves a little under 12h of night
//! assert!(night > 10 * 3_600_000 && night < 12 * 3_600_000);
//! ```

use log::debug;
use serde::{Deserialize, Serialize};

/// Sun altitude at the civil twilight boundary, in degrees.
pub const CIVIL_TWILIGHT_ALTITUDE_DEG: f64 = -6.0;

/// Upper bound on days walked by [`night_overlap_ms`].
pub const MAX_DAY_ITERATIONS: usize = 5000;

const MS_PER_DAY: i64 = 86_400_000;
/// Longitude offset of local solar time: 4 minutes per degree.
const MS_PER_DEGREE_LON: f64 = 240_000.0;
const J2000: f64 = 2_451_545.0;
/// Julian date of the Unix epoch.
const UNIX_EPOCH_JD: f64 = 2_440_587.5;
/// Days between the Unix epoch (midnight) and J2000 (noon), minus the half day.
const DAYS_UNIX_TO_J2000: i64 = 10_957;
const EARTH_OBLIQUITY_DEG: f64 = 23.4397;

/// Civil dawn and dusk for one local solar day.
///
/// When the sun never crosses −6° that day, exactly one of the flags is set and
/// `dawn_ms`/`dusk_ms` are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CivilTwilight {
    pub dawn_ms: Option<i64>,
    pub dusk_ms: Option<i64>,
    pub always_day: bool,
    pub always_night: bool,
}

/// Returned for a location outside the valid coordinate range.
const NO_TWILIGHT: CivilTwilight = CivilTwilight {
    dawn_ms: None,
    dusk_ms: None,
    always_day: false,
    always_night: false,
};

/// Local solar time offset of a longitude, `None` outside -180..=180.
fn solar_offset_ms(lon: f64) -> Option<i64> {
    (-180.0..=180.0)
        .contains(&lon)
        .then(|| (lon * MS_PER_DEGREE_LON).round() as i64)
}

/// Whole local solar days since the Unix epoch for an instant.
fn solar_day_index(instant_ms: i64, lon: f64) -> Option<i64> {
    let local = instant_ms.checked_add(solar_offset_ms(lon)?)?;
    Some(local.div_euclid(MS_PER_DAY))
}

/// Start (UTC ms) of the local solar day that contains `instant_ms`.
///
/// `None` for a longitude outside -180..=180 or an instant at the edge of
/// the `i64` range.
pub fn solar_day_start_ms(instant_ms: i64, lon: f64) -> Option<i64> {
    let offset = solar_offset_ms(lon)?;
    solar_day_index(instant_ms, lon)?
        .checked_mul(MS_PER_DAY)?
        .checked_sub(offset)
}

/// Civil dawn and dusk for the local solar day containing `instant_ms`.
///
/// An out-of-range location yields no dawn, no dusk and neither flag set.
pub fn civil_twilight(instant_ms: i64, lat: f64, lon: f64) -> CivilTwilight {
    if !(-90.0..=90.0).contains(&lat) {
        return NO_TWILIGHT;
    }
    match solar_day_index(instant_ms, lon) {
        Some(day_index) => twilight_for_day(day_index, lat, lon),
        None => NO_TWILIGHT,
    }
}

/// Twilight for a local solar day given as whole days since the Unix epoch.
fn twilight_for_day(day_index: i64, lat: f64, lon: f64) -> CivilTwilight {
    // Mean solar noon of this local day, in days since J2000
    let n = (day_index - DAYS_UNIX_TO_J2000) as f64;
    let j_star = n - lon / 360.0;

    let m = (357.5291 + 0.985_600_28 * j_star).rem_euclid(360.0);
    let m_rad = m.to_radians();
    let center = 1.9148 * m_rad.sin() + 0.0200 * (2.0 * m_rad).sin() + 0.0003 * (3.0 * m_rad).sin();
    let ecliptic = (m + center + 180.0 + 102.9372).rem_euclid(360.0);
    let ecliptic_rad = ecliptic.to_radians();

    let j_transit = J2000 + j_star + 0.0053 * m_rad.sin() - 0.0069 * (2.0 * ecliptic_rad).sin();

    let sin_dec = ecliptic_rad.sin() * EARTH_OBLIQUITY_DEG.to_radians().sin();
    let cos_dec = (1.0 - sin_dec * sin_dec).sqrt();
    let lat_rad = lat.to_radians();

    let cos_h = (CIVIL_TWILIGHT_ALTITUDE_DEG.to_radians().sin() - lat_rad.sin() * sin_dec)
        / (lat_rad.cos() * cos_dec);

    if cos_h > 1.0 {
        return CivilTwilight {
            dawn_ms: None,
            dusk_ms: None,
            always_day: false,
            always_night: true,
        };
    }
    if cos_h < -1.0 {
        return CivilTwilight {
            dawn_ms: None,
            dusk_ms: None,
            always_day: true,
            always_night: false,
        };
    }

    let half_day = cos_h.acos().to_degrees() / 360.0;
    CivilTwilight {
        dawn_ms: Some(julian_to_ms(j_transit - half_day)),
        dusk_ms: Some(julian_to_ms(j_transit + half_day)),
        always_day: false,
        always_night: false,
    }
}

fn julian_to_ms(jd: f64) -> i64 {
    ((jd - UNIX_EPOCH_JD) * MS_PER_DAY as f64).round() as i64
}

/// Length of the overlap between `[a_start, a_end)` and `[b_start, b_end)`.
fn overlap(a_start: i64, a_end: i64, b_start: i64, b_end: i64) -> i64 {
    (a_end.min(b_end) - a_start.max(b_start)).max(0)
}

/// Milliseconds of `[start_ms, end_ms)` that fall in civil night at a location.
///
/// Walks local solar days from the one containing `start_ms`, adding the part
/// of each day before dawn or after dusk. Returns 0 when `end_ms <= start_ms`
/// or the location is outside the valid coordinate range.
pub fn night_overlap_ms(start_ms: i64, end_ms: i64, lat: f64, lon: f64) -> i64 {
    if end_ms <= start_ms || !(-90.0..=90.0).contains(&lat) {
        return 0;
    }
    let (Some(offset), Some(mut day_index)) = (solar_offset_ms(lon), solar_day_index(start_ms, lon)) else {
        return 0;
    };
    let mut total = 0i64;

    for _ in 0..MAX_DAY_ITERATIONS {
        let Some(day_start) = day_index
            .checked_mul(MS_PER_DAY)
            .and_then(|t| t.checked_sub(offset))
        else {
            return total;
        };
        if day_start >= end_ms {
            return total;
        }
        let day_end = day_start.saturating_add(MS_PER_DAY);
        let clip_start = start_ms.max(day_start);
        let clip_end = end_ms.min(day_end);

        if clip_end > clip_start {
            let twilight = twilight_for_day(day_index, lat, lon);
            if twilight.always_night {
                total += clip_end - clip_start;
            } else if let (Some(dawn), Some(dusk)) = (twilight.dawn_ms, twilight.dusk_ms) {
                total += overlap(clip_start, clip_end, day_start, dawn);
                total += overlap(clip_start, clip_end, dusk, day_end);
            }
        }
        day_index += 1;
    }

    debug!(
        "[Solar] Night overlap stopped after {} days ({} -> {})",
        MAX_DAY_ITERATIONS, start_ms, end_ms
    );
    total
}
