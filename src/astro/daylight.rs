use chrono::{
    DateTime, Datelike, Duration, FixedOffset, Local, NaiveDate, Offset, Timelike, Utc,
};
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use utoipa::ToSchema;

use crate::astro::error::CalculationError;
use crate::astro::types::round_to;

/// Placeholder shown for times that cannot be computed.
pub const NOT_AVAILABLE: &str = "N/A";

const TIME_FORMAT: &str = "%H:%M";
const GOLDEN_HOUR: Duration = Duration::hours(1);

/// Time zone used to render clock times and to judge the local hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayZone {
    #[default]
    Local,
    Fixed(FixedOffset),
}

impl DisplayZone {
    pub fn utc() -> Self {
        DisplayZone::Fixed(FixedOffset::east_opt(0).unwrap_or_else(|| Utc.fix()))
    }

    /// Parses `+02:00`-style offsets; `local` selects the system zone.
    pub fn parse(value: &str) -> Result<Self, CalculationError> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("local") {
            return Ok(DisplayZone::Local);
        }
        if value.eq_ignore_ascii_case("utc") || value == "Z" {
            return Ok(DisplayZone::utc());
        }
        value
            .parse::<FixedOffset>()
            .map(DisplayZone::Fixed)
            .map_err(|e| CalculationError::InvalidTimestamp {
                value: value.to_string(),
                message: e.to_string(),
            })
    }

    pub fn format(&self, instant: DateTime<Utc>) -> String {
        match self {
            DisplayZone::Local => instant
                .with_timezone(&Local)
                .format(TIME_FORMAT)
                .to_string(),
            DisplayZone::Fixed(offset) => instant
                .with_timezone(offset)
                .format(TIME_FORMAT)
                .to_string(),
        }
    }

    pub fn hour(&self, instant: DateTime<Utc>) -> u32 {
        match self {
            DisplayZone::Local => instant.with_timezone(&Local).hour(),
            DisplayZone::Fixed(offset) => instant.with_timezone(offset).hour(),
        }
    }

    pub fn date(&self, instant: DateTime<Utc>) -> NaiveDate {
        match self {
            DisplayZone::Local => instant.with_timezone(&Local).date_naive(),
            DisplayZone::Fixed(offset) => instant.with_timezone(offset).date_naive(),
        }
    }
}

/// Parses an ISO-8601 instant with an explicit offset (`Z` or `+hh:mm`).
pub fn parse_instant(value: &str) -> Result<DateTime<Utc>, CalculationError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CalculationError::InvalidTimestamp {
            value: value.to_string(),
            message: e.to_string(),
        })
}

fn parse_pair(
    sunrise: Option<&str>,
    sunset: Option<&str>,
) -> Result<(DateTime<Utc>, DateTime<Utc>), CalculationError> {
    match (sunrise, sunset) {
        (Some(rise), Some(set)) if !rise.is_empty() && !set.is_empty() => {
            Ok((parse_instant(rise)?, parse_instant(set)?))
        }
        _ => Err(CalculationError::MissingSunTimes),
    }
}

/// `HH:MM` in the display zone, or `N/A`.
pub fn format_time(value: Option<&str>, zone: &DisplayZone) -> String {
    value
        .and_then(|v| parse_instant(v).ok())
        .map(|instant| zone.format(instant))
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// Whether the sun is up at `now`.
///
/// Uses the sunrise/sunset pair when both parse, otherwise guesses daytime as
/// 06:00 to 18:00 in the display zone.
pub fn is_daytime(
    sunrise: Option<&str>,
    sunset: Option<&str>,
    now: DateTime<Utc>,
    zone: &DisplayZone,
) -> bool {
    match parse_pair(sunrise, sunset) {
        Ok((rise, set)) => rise <= now && now <= set,
        Err(e) => {
            log::debug!("Day/night falling back to clock heuristic: {}", e);
            daytime_by_clock(now, zone)
        }
    }
}

pub fn daytime_by_clock(now: DateTime<Utc>, zone: &DisplayZone) -> bool {
    (6..18).contains(&zone.hour(now))
}

/// Morning and evening golden-hour windows, already formatted for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GoldenHour {
    pub morning_start: String,
    pub morning_end: String,
    pub evening_start: String,
    pub evening_end: String,
}

impl GoldenHour {
    pub fn not_available() -> Self {
        Self {
            morning_start: NOT_AVAILABLE.to_string(),
            morning_end: NOT_AVAILABLE.to_string(),
            evening_start: NOT_AVAILABLE.to_string(),
            evening_end: NOT_AVAILABLE.to_string(),
        }
    }
}

pub fn golden_hour(
    sunrise: Option<&str>,
    sunset: Option<&str>,
    zone: &DisplayZone,
) -> GoldenHour {
    match parse_pair(sunrise, sunset) {
        Ok((rise, set)) => GoldenHour {
            morning_start: zone.format(rise),
            morning_end: zone.format(rise + GOLDEN_HOUR),
            evening_start: zone.format(set - GOLDEN_HOUR),
            evening_end: zone.format(set),
        },
        Err(_) => GoldenHour::not_available(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize, ToSchema)]
pub enum Season {
    Spring,
    Summer,
    Fall,
    Winter,
}

impl Season {
    /// Northern-hemisphere astronomical season by day of year.
    pub fn from_date(date: NaiveDate) -> Self {
        match date.ordinal() {
            80..=171 => Season::Spring,
            172..=265 => Season::Summer,
            266..=354 => Season::Fall,
            _ => Season::Winter,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SunEvent {
    Sunrise,
    Sunset,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DaylightInfo {
    pub daylight_hours: f64,
    pub solar_noon: String,
    pub is_daytime: bool,
    pub next_event: SunEvent,
    pub hours_until_next_event: f64,
    pub season: Season,
}

pub fn daylight_info(
    sunrise: Option<&str>,
    sunset: Option<&str>,
    now: DateTime<Utc>,
    zone: &DisplayZone,
) -> Result<DaylightInfo, CalculationError> {
    let (rise, set) = parse_pair(sunrise, sunset)?;
    let length = set - rise;
    let solar_noon = rise + length / 2;
    let is_day = rise <= now && now <= set;

    let (next_event, until) = if is_day {
        (SunEvent::Sunset, set - now)
    } else if now < rise {
        (SunEvent::Sunrise, rise - now)
    } else {
        (SunEvent::Sunrise, rise + Duration::days(1) - now)
    };

    Ok(DaylightInfo {
        daylight_hours: round_to(hours(length), 2),
        solar_noon: zone.format(solar_noon),
        is_daytime: is_day,
        next_event,
        hours_until_next_event: round_to(hours(until), 1),
        season: Season::from_date(zone.date(now)),
    })
}

fn hours(duration: Duration) -> f64 {
    duration.num_seconds() as f64 / 3600.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, h, m, 0).unwrap()
    }

    #[test]
    fn golden_hour_offsets_by_one_hour() {
        let golden = golden_hour(
            Some("2024-01-15T07:30:00Z"),
            Some("2024-01-15T17:45:00Z"),
            &DisplayZone::utc(),
        );
        assert_eq!(golden.morning_start, "07:30");
        assert_eq!(golden.morning_end, "08:30");
        assert_eq!(golden.evening_start, "16:45");
        assert_eq!(golden.evening_end, "17:45");
    }

    #[test]
    fn golden_hour_uses_the_display_zone() {
        let zone = DisplayZone::parse("+02:00").unwrap();
        let golden = golden_hour(
            Some("2024-01-15T07:30:00+00:00"),
            Some("2024-01-15T17:45:00+00:00"),
            &zone,
        );
        assert_eq!(golden.morning_start, "09:30");
        assert_eq!(golden.evening_end, "19:45");
    }

    #[test]
    fn golden_hour_without_input_is_not_available() {
        let zone = DisplayZone::utc();
        let sunset = Some("2024-01-15T17:45:00Z");
        assert_eq!(golden_hour(None, sunset, &zone), GoldenHour::not_available());
        assert_eq!(
            golden_hour(Some("garbage"), sunset, &zone),
            GoldenHour::not_available()
        );
    }

    #[test]
    fn daytime_between_sunrise_and_sunset() {
        let zone = DisplayZone::utc();
        let rise = Some("2024-01-15T07:00:00Z");
        let set = Some("2024-01-15T19:00:00Z");
        assert!(is_daytime(rise, set, at(12, 0), &zone));
        assert!(!is_daytime(rise, set, at(22, 0), &zone));
        assert!(is_daytime(rise, set, at(7, 0), &zone));
    }

    #[test]
    fn daytime_falls_back_to_clock_hours() {
        let zone = DisplayZone::utc();
        assert!(is_daytime(None, None, at(12, 0), &zone));
        assert!(!is_daytime(None, None, at(18, 0), &zone));
        assert!(is_daytime(None, None, at(6, 0), &zone));
        assert!(!is_daytime(Some("not a time"), Some("2024-01-15T19:00:00Z"), at(3, 0), &zone));
    }

    #[test]
    fn format_time_handles_missing_values() {
        let zone = DisplayZone::utc();
        assert_eq!(format_time(None, &zone), NOT_AVAILABLE);
        assert_eq!(format_time(Some(""), &zone), NOT_AVAILABLE);
        assert_eq!(format_time(Some("2024-01-15T05:05:35+00:00"), &zone), "05:05");
    }

    #[test]
    fn seasons_follow_day_of_year() {
        let d = |m, day| NaiveDate::from_ymd_opt(2023, m, day).unwrap();
        assert_eq!(Season::from_date(d(1, 10)), Season::Winter);
        assert_eq!(Season::from_date(d(3, 21)), Season::Spring);
        assert_eq!(Season::from_date(d(7, 1)), Season::Summer);
        assert_eq!(Season::from_date(d(10, 1)), Season::Fall);
        assert_eq!(Season::from_date(d(12, 25)), Season::Winter);
    }

    #[test]
    fn daylight_info_points_at_the_next_event() {
        let zone = DisplayZone::utc();
        let rise = Some("2024-01-15T07:00:00Z");
        let set = Some("2024-01-15T19:00:00Z");

        let noon = daylight_info(rise, set, at(12, 0), &zone).unwrap();
        assert_eq!(noon.daylight_hours, 12.0);
        assert_eq!(noon.solar_noon, "13:00");
        assert!(noon.is_daytime);
        assert_eq!(noon.next_event, SunEvent::Sunset);
        assert_eq!(noon.hours_until_next_event, 7.0);
        assert_eq!(noon.season, Season::Winter);

        let early = daylight_info(rise, set, at(5, 30), &zone).unwrap();
        assert_eq!(early.next_event, SunEvent::Sunrise);
        assert_eq!(early.hours_until_next_event, 1.5);

        let late = daylight_info(rise, set, at(22, 0), &zone).unwrap();
        assert_eq!(late.next_event, SunEvent::Sunrise);
        assert_eq!(late.hours_until_next_event, 9.0);
    }

    #[test]
    fn daylight_info_requires_both_times() {
        assert_eq!(
            daylight_info(None, None, at(12, 0), &DisplayZone::utc()),
            Err(CalculationError::MissingSunTimes)
        );
    }

    #[test]
    fn display_zone_parsing() {
        assert_eq!(DisplayZone::parse("local").unwrap(), DisplayZone::Local);
        assert_eq!(DisplayZone::parse("UTC").unwrap(), DisplayZone::utc());
        assert!(DisplayZone::parse("+05:30").is_ok());
        assert!(DisplayZone::parse("tomorrow").is_err());
    }
}
