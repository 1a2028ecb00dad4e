use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A point on the Earth's surface, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Returns `None` unless latitude is within [-90, 90] and longitude within [-180, 180].
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return None;
        }
        Some(Self {
            latitude,
            longitude,
        })
    }

    /// Calendar date at this place on mean solar time, four minutes per degree east.
    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        let offset = Duration::seconds((self.longitude * 240.0).round() as i64);
        (at + offset).date_naive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SunPosition {
    pub elevation: f64,
    pub azimuth: f64,
    pub hour_angle: f64,
    pub declination: f64,
}

impl SunPosition {
    /// Sun halfway up the southern sky.
    pub const NEUTRAL: SunPosition = SunPosition {
        elevation: 45.0,
        azimuth: 180.0,
        hour_angle: 0.0,
        declination: 0.0,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MoonPosition {
    pub elevation: f64,
    pub azimuth: f64,
    /// Ecliptic mean longitude of the moon, not a geographic longitude.
    pub longitude: f64,
}

impl MoonPosition {
    pub const NEUTRAL: MoonPosition = MoonPosition {
        elevation: 30.0,
        azimuth: 90.0,
        longitude: 0.0,
    };
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Rounds an angle to two decimals while keeping it inside [0, 360).
pub(crate) fn round_bearing(value: f64) -> f64 {
    let rounded = round_to(value.rem_euclid(360.0), 2);
    if rounded >= 360.0 {
        0.0
    } else {
        rounded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn coordinates_reject_out_of_range() {
        assert!(Coordinates::new(91.0, 0.0).is_none());
        assert!(Coordinates::new(0.0, -180.5).is_none());
        assert!(Coordinates::new(f64::NAN, 0.0).is_none());
        assert!(Coordinates::new(-90.0, 180.0).is_some());
    }

    #[test]
    fn bearing_never_rounds_up_to_full_circle() {
        assert_eq!(round_bearing(359.999), 0.0);
        assert_eq!(round_bearing(-0.5), 359.5);
        assert_eq!(round_bearing(720.25), 0.25);
    }

    #[test]
    fn local_date_follows_longitude() {
        // 04:00Z is already afternoon in Tokyo and still evening in Los Angeles.
        let at = Utc.with_ymd_and_hms(2024, 1, 16, 4, 0, 0).unwrap();
        let tokyo = Coordinates::new(35.6762, 139.6503).unwrap();
        let los_angeles = Coordinates::new(34.0522, -118.2437).unwrap();
        assert_eq!(tokyo.local_date(at), NaiveDate::from_ymd_opt(2024, 1, 16).unwrap());
        assert_eq!(los_angeles.local_date(at), NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
    }
}
