use chrono::{DateTime, TimeZone, Utc};

use crate::astro::error::CalculationError;
use crate::astro::types::{round_bearing, round_to, MoonPosition};

/// Mean length of a lunation, in days.
pub const SYNODIC_MONTH_DAYS: f64 = 29.530_588_67;

/// Phase reported when the calculation cannot run.
pub const FALLBACK_PHASE: f64 = 0.25;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// A known new moon: 2000-01-06 18:14 UTC.
fn reference_new_moon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2000, 1, 6, 18, 14, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// J2000.0: 2000-01-01 12:00 UTC.
fn j2000() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 1000.0 / SECONDS_PER_DAY
}

/// Fraction of the current lunation elapsed at `at`, in [0, 1).
///
/// 0 is new moon, 0.5 full moon.
pub fn moon_phase(at: DateTime<Utc>) -> f64 {
    let days_since = days_between(reference_new_moon(), at);
    let phase = days_since.rem_euclid(SYNODIC_MONTH_DAYS) / SYNODIC_MONTH_DAYS;
    if !phase.is_finite() {
        return FALLBACK_PHASE;
    }

    let phase = round_to(phase, 4);
    if phase >= 1.0 {
        0.0
    } else {
        phase
    }
}

/// Mean orbital elements of the moon, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeanElements {
    pub longitude: f64,
    #[allow(dead_code)]
    pub anomaly: f64,
}

pub fn mean_elements(at: DateTime<Utc>) -> MeanElements {
    let d = days_between(j2000(), at);
    MeanElements {
        longitude: (218.316 + 13.176_396 * d).rem_euclid(360.0),
        anomaly: (134.963 + 13.064_993 * d).rem_euclid(360.0),
    }
}

pub fn moon_position(latitude: f64, longitude: f64, at: DateTime<Utc>) -> MoonPosition {
    try_moon_position(latitude, longitude, at).unwrap_or_else(|e| {
        log::debug!("Moon position fell back to neutral default: {}", e);
        MoonPosition::NEUTRAL
    })
}

/// Visual approximation of where the moon sits in the sky.
///
/// This is not an ephemeris. Elevation is a sinusoid of the mean longitude
/// biased by latitude and azimuth trails the mean longitude by half a turn, so
/// the output only tracks the real moon in a loose, qualitative way. Display
/// code depends on this shape; keep it unless the display changes with it.
/// `longitude` is checked but does not move the result.
pub fn try_moon_position(
    latitude: f64,
    longitude: f64,
    at: DateTime<Utc>,
) -> Result<MoonPosition, CalculationError> {
    if !latitude.is_finite() {
        return Err(CalculationError::NonFinite("latitude"));
    }
    if !longitude.is_finite() {
        return Err(CalculationError::NonFinite("longitude"));
    }

    let elements = mean_elements(at);
    let elevation = 30.0 * elements.longitude.to_radians().sin() + latitude / 4.0;
    let azimuth = elements.longitude + 180.0;

    Ok(MoonPosition {
        elevation: round_to(elevation.clamp(-90.0, 90.0), 2),
        azimuth: round_bearing(azimuth),
        longitude: round_bearing(elements.longitude),
    })
}
