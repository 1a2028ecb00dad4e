use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::astro::error::CalculationError;
use crate::astro::types::{round_bearing, round_to, SunPosition};

const AXIAL_TILT_DEG: f64 = 23.45;
const DEGREES_PER_HOUR: f64 = 15.0;

/// Sun position for an observer, or the neutral position when the input is unusable.
pub fn sun_position(latitude: f64, longitude: f64, at: DateTime<Utc>) -> SunPosition {
    try_sun_position(latitude, longitude, at).unwrap_or_else(|e| {
        log::debug!("Sun position fell back to neutral default: {}", e);
        SunPosition::NEUTRAL
    })
}

/// Low-precision solar geometry from day of year and clock time.
///
/// Uses the Cooper declination approximation and a pure longitude time
/// correction (no equation of time), so results are good to a degree or two.
pub fn try_sun_position(
    latitude: f64,
    longitude: f64,
    at: DateTime<Utc>,
) -> Result<SunPosition, CalculationError> {
    if !latitude.is_finite() {
        return Err(CalculationError::NonFinite("latitude"));
    }
    if !longitude.is_finite() {
        return Err(CalculationError::NonFinite("longitude"));
    }

    let day_of_year = at.ordinal() as f64;
    let declination =
        AXIAL_TILT_DEG * (360.0 * (284.0 + day_of_year) / 365.0).to_radians().sin();

    let time_correction = longitude / DEGREES_PER_HOUR;
    let hours = at.hour() as f64 + at.minute() as f64 / 60.0;
    let hour_angle = DEGREES_PER_HOUR * (hours + time_correction - 12.0);

    let lat = latitude.to_radians();
    let dec = declination.to_radians();
    let ha = hour_angle.to_radians();

    let sin_elevation = lat.sin() * dec.sin() + lat.cos() * dec.cos() * ha.cos();
    let elevation = sin_elevation.clamp(-1.0, 1.0).asin().to_degrees();

    let azimuth = ha
        .sin()
        .atan2(ha.cos() * lat.sin() - dec.tan() * lat.cos())
        .to_degrees();
    let azimuth = if azimuth < 0.0 { azimuth + 360.0 } else { azimuth };

    if !elevation.is_finite() || !azimuth.is_finite() {
        return Err(CalculationError::NonFinite("sun position"));
    }

    Ok(SunPosition {
        elevation: round_to(elevation.max(-90.0), 2),
        azimuth: round_bearing(azimuth),
        hour_angle: round_to(hour_angle, 2),
        declination: round_to(declination, 2),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn equinox_noon_on_the_equator_is_nearly_overhead() {
        let at = Utc.with_ymd_and_hms(2024, 3, 20, 12, 0, 0).unwrap();
        let pos = sun_position(0.0, 0.0, at);
        assert!(pos.elevation > 89.0, "elevation {}", pos.elevation);
        assert_eq!(pos.hour_angle, 0.0);
        assert!(pos.declination.abs() < 1.0);
    }

    #[test]
    fn midnight_sun_is_below_the_horizon_at_mid_latitudes() {
        let at = Utc.with_ymd_and_hms(2024, 12, 21, 0, 0, 0).unwrap();
        let pos = sun_position(51.5, 0.0, at);
        assert!(pos.elevation < -50.0, "elevation {}", pos.elevation);
        assert!(pos.declination < -23.0);
    }

    #[test]
    fn longitude_shifts_the_hour_angle() {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        assert_eq!(sun_position(0.0, 90.0, at).hour_angle, 90.0);
        assert_eq!(sun_position(0.0, -45.0, at).hour_angle, -45.0);
    }

    #[test]
    fn stays_in_range_across_the_globe() {
        for month in [1, 3, 6, 9, 12] {
            for hour in (0..24).step_by(3) {
                let at = Utc.with_ymd_and_hms(2024, month, 15, hour, 30, 0).unwrap();
                for lat in (-90..=90).step_by(15) {
                    for lon in (-180..=180).step_by(30) {
                        let pos = sun_position(lat as f64, lon as f64, at);
                        assert!(
                            (-90.0..=90.0).contains(&pos.elevation),
                            "elevation {} at {lat},{lon} {at}",
                            pos.elevation
                        );
                        assert!(
                            (0.0..360.0).contains(&pos.azimuth),
                            "azimuth {} at {lat},{lon} {at}",
                            pos.azimuth
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn non_finite_input_yields_neutral_default() {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        assert!(matches!(
            try_sun_position(f64::NAN, 0.0, at),
            Err(CalculationError::NonFinite("latitude"))
        ));
        assert_eq!(sun_position(0.0, f64::INFINITY, at), SunPosition::NEUTRAL);
    }
}
