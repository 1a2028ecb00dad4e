use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::astro::{
    self, Clock, Coordinates, DaylightInfo, DisplayZone, GoldenHour, MoonPosition, PhaseInfo,
    PhaseName, SunPosition, FALLBACK_PHASE,
};
use crate::fetch::error::{ErrorKind, FetchError};
use crate::fetch::geocode::CoordinateResolver;
use crate::fetch::sun_times::{SunTimes, SunTimesSource};

/// Why a snapshot holds placeholder data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SnapshotError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&FetchError> for SnapshotError {
    fn from(err: &FetchError) -> Self {
        SnapshotError {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Everything known about the sky over one city at one instant.
///
/// Always structurally complete. When `error` is set the numeric fields hold
/// neutral defaults and should not be trusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AstronomicalSnapshot {
    pub city: String,
    pub coordinates: Option<Coordinates>,
    pub sunrise: Option<String>,
    pub sunset: Option<String>,
    pub solar_noon: Option<String>,
    pub day_length: Option<i64>,
    pub sun_position: SunPosition,
    pub moon_phase: f64,
    pub moon_phase_name: PhaseName,
    pub moon_illumination: f64,
    pub moon_position: MoonPosition,
    pub is_daytime: bool,
    pub fetched_at: DateTime<Utc>,
    pub error: Option<SnapshotError>,
}

impl AstronomicalSnapshot {
    /// Runs the calculators for a resolved city and its sun times.
    pub fn compose(
        city: &str,
        coordinates: Coordinates,
        times: SunTimes,
        now: DateTime<Utc>,
        zone: &DisplayZone,
    ) -> Self {
        let sun_position = astro::sun_position(coordinates.latitude, coordinates.longitude, now);
        let moon_phase = astro::moon_phase(now);
        let phase = astro::classify(moon_phase);
        let moon_position =
            astro::moon_position(coordinates.latitude, coordinates.longitude, now);
        let is_daytime =
            astro::is_daytime(times.sunrise.as_deref(), times.sunset.as_deref(), now, zone);

        AstronomicalSnapshot {
            city: city.to_string(),
            coordinates: Some(coordinates),
            sunrise: times.sunrise,
            sunset: times.sunset,
            solar_noon: times.solar_noon,
            day_length: times.day_length,
            sun_position,
            moon_phase,
            moon_phase_name: phase.name,
            moon_illumination: phase.illumination,
            moon_position,
            is_daytime,
            fetched_at: now,
            error: None,
        }
    }

    /// Placeholder snapshot for a failed lookup.
    pub fn fallback(
        city: &str,
        error: &FetchError,
        now: DateTime<Utc>,
        zone: &DisplayZone,
    ) -> Self {
        AstronomicalSnapshot {
            city: city.to_string(),
            coordinates: None,
            sunrise: None,
            sunset: None,
            solar_noon: None,
            day_length: None,
            sun_position: SunPosition::NEUTRAL,
            moon_phase: FALLBACK_PHASE,
            moon_phase_name: PhaseName::WaxingCrescent,
            moon_illumination: 50.0,
            moon_position: MoonPosition::NEUTRAL,
            is_daytime: astro::daytime_by_clock(now, zone),
            fetched_at: now,
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn phase_info(&self) -> PhaseInfo {
        PhaseInfo {
            phase: self.moon_phase,
            name: self.moon_phase_name,
            symbol: self.moon_phase_name.symbol().to_string(),
            illumination: self.moon_illumination,
        }
    }

    pub fn golden_hour(&self, zone: &DisplayZone) -> GoldenHour {
        astro::golden_hour(self.sunrise.as_deref(), self.sunset.as_deref(), zone)
    }

    pub fn daylight_info(
        &self,
        now: DateTime<Utc>,
        zone: &DisplayZone,
    ) -> Result<DaylightInfo, FetchError> {
        Ok(astro::daylight_info(
            self.sunrise.as_deref(),
            self.sunset.as_deref(),
            now,
            zone,
        )?)
    }

    /// Flat string record for sharing and export.
    pub fn export(&self, zone: &DisplayZone) -> BTreeMap<String, String> {
        let golden = self.golden_hour(zone);
        let mut record = BTreeMap::new();
        let mut put = |key: &str, value: String| {
            record.insert(key.to_string(), value);
        };

        put("city", self.city.clone());
        put(
            "latitude",
            self.coordinates
                .map(|c| format!("{:.4}", c.latitude))
                .unwrap_or_default(),
        );
        put(
            "longitude",
            self.coordinates
                .map(|c| format!("{:.4}", c.longitude))
                .unwrap_or_default(),
        );
        put("sunrise", astro::format_time(self.sunrise.as_deref(), zone));
        put("sunset", astro::format_time(self.sunset.as_deref(), zone));
        put("solar_noon", astro::format_time(self.solar_noon.as_deref(), zone));
        put(
            "day_length_hours",
            self.day_length
                .map(|s| format!("{:.2}", s as f64 / 3600.0))
                .unwrap_or_else(|| astro::NOT_AVAILABLE.to_string()),
        );
        put("sun_elevation", format!("{:.2}", self.sun_position.elevation));
        put("sun_azimuth", format!("{:.2}", self.sun_position.azimuth));
        put("moon_phase", format!("{:.4}", self.moon_phase));
        put("moon_phase_name", self.moon_phase_name.to_string());
        put("moon_symbol", self.moon_phase_name.symbol().to_string());
        put("moon_illumination", format!("{:.1}", self.moon_illumination));
        put("moon_elevation", format!("{:.2}", self.moon_position.elevation));
        put("moon_azimuth", format!("{:.2}", self.moon_position.azimuth));
        put("is_daytime", self.is_daytime.to_string());
        put("golden_morning", format!("{}-{}", golden.morning_start, golden.morning_end));
        put("golden_evening", format!("{}-{}", golden.evening_start, golden.evening_end));
        put("fetched_at", self.fetched_at.to_rfc3339());
        put(
            "error",
            self.error
                .as_ref()
                .map(|e| e.message.clone())
                .unwrap_or_default(),
        );
        record
    }
}

/// Anything that can produce a snapshot for a city name.
pub trait SnapshotSource: Send + Sync + 'static {
    fn fetch_snapshot(
        &self,
        city: &str,
    ) -> impl Future<Output = Result<AstronomicalSnapshot, FetchError>> + Send;
}

/// Geocodes a city, asks the sun-times service about it and runs the calculators.
pub struct SnapshotFetcher<R, S> {
    resolver: R,
    sun_times: S,
    clock: Arc<dyn Clock>,
    zone: DisplayZone,
}

impl<R, S> SnapshotFetcher<R, S>
where
    R: CoordinateResolver,
    S: SunTimesSource,
{
    pub fn new(resolver: R, sun_times: S, clock: Arc<dyn Clock>, zone: DisplayZone) -> Self {
        Self {
            resolver,
            sun_times,
            clock,
            zone,
        }
    }
}

impl<R, S> SnapshotSource for SnapshotFetcher<R, S>
where
    R: CoordinateResolver,
    S: SunTimesSource,
{
    async fn fetch_snapshot(&self, city: &str) -> Result<AstronomicalSnapshot, FetchError> {
        let coordinates = self.resolver.resolve(city).await?;
        let now = self.clock.now();
        let times = self
            .sun_times
            .sun_times(coordinates, coordinates.local_date(now))
            .await?;
        Ok(AstronomicalSnapshot::compose(
            city.trim(),
            coordinates,
            times,
            now,
            &self.zone,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::astro::FixedClock;
    use chrono::{FixedOffset, NaiveDate, TimeZone};
    use std::sync::Mutex;

    struct StaticResolver(Option<Coordinates>);

    impl CoordinateResolver for StaticResolver {
        async fn resolve(&self, city: &str) -> Result<Coordinates, FetchError> {
            self.0.ok_or_else(|| FetchError::CityNotFound(city.to_string()))
        }
    }

    struct StaticSunTimes(Result<SunTimes, u16>, Mutex<Option<NaiveDate>>);

    impl StaticSunTimes {
        fn new(times: Result<SunTimes, u16>) -> Self {
            StaticSunTimes(times, Mutex::new(None))
        }
    }

    impl SunTimesSource for StaticSunTimes {
        async fn sun_times(&self, _: Coordinates, date: NaiveDate) -> Result<SunTimes, FetchError> {
            *self.1.lock().unwrap() = Some(date);
            self.0.clone().map_err(FetchError::Status)
        }
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
    }

    fn london_times() -> SunTimes {
        SunTimes {
            sunrise: Some("2024-01-15T07:58:00+00:00".into()),
            sunset: Some("2024-01-15T16:23:00+00:00".into()),
            solar_noon: Some("2024-01-15T12:10:30+00:00".into()),
            day_length: Some(30300),
        }
    }

    fn fetcher(
        coords: Option<Coordinates>,
        times: Result<SunTimes, u16>,
    ) -> SnapshotFetcher<StaticResolver, StaticSunTimes> {
        SnapshotFetcher::new(
            StaticResolver(coords),
            StaticSunTimes::new(times),
            Arc::new(FixedClock(noon())),
            DisplayZone::utc(),
        )
    }

    async fn fetch_or_fallback(
        fetcher: &SnapshotFetcher<StaticResolver, StaticSunTimes>,
        city: &str,
    ) -> AstronomicalSnapshot {
        match fetcher.fetch_snapshot(city).await {
            Ok(snapshot) => snapshot,
            Err(e) => AstronomicalSnapshot::fallback(city, &e, noon(), &DisplayZone::utc()),
        }
    }

    fn assert_in_range(snapshot: &AstronomicalSnapshot) {
        assert!((-90.0..=90.0).contains(&snapshot.sun_position.elevation));
        assert!((0.0..360.0).contains(&snapshot.sun_position.azimuth));
        assert!((-90.0..=90.0).contains(&snapshot.moon_position.elevation));
        assert!((0.0..360.0).contains(&snapshot.moon_position.azimuth));
        assert!((0.0..1.0).contains(&snapshot.moon_phase));
        assert!((0.0..=100.0).contains(&snapshot.moon_illumination));
    }

    #[tokio::test]
    async fn composes_a_full_snapshot() {
        let london = Coordinates::new(51.5074, -0.1278);
        let snapshot = fetcher(london, Ok(london_times()))
            .fetch_snapshot(" London ")
            .await
            .unwrap();

        assert!(snapshot.is_ok());
        assert_eq!(snapshot.city, "London");
        assert_eq!(snapshot.coordinates, london);
        assert!(snapshot.is_daytime);
        assert_eq!(snapshot.fetched_at, noon());
        assert_eq!(snapshot.day_length, Some(30300));
        assert_eq!(snapshot.moon_phase_name, PhaseName::from_phase(snapshot.moon_phase));
        assert!(snapshot.sun_position.elevation > 0.0);
        assert_in_range(&snapshot);
    }

    #[tokio::test]
    async fn sun_times_are_asked_for_the_city_date() {
        // Still Jan 15 in a UTC-8 display zone, already Jan 16 in Tokyo.
        let at = Utc.with_ymd_and_hms(2024, 1, 16, 4, 0, 0).unwrap();
        let fetcher = SnapshotFetcher::new(
            StaticResolver(Coordinates::new(35.6762, 139.6503)),
            StaticSunTimes::new(Ok(london_times())),
            Arc::new(FixedClock(at)),
            DisplayZone::Fixed(FixedOffset::west_opt(8 * 3600).unwrap()),
        );

        fetcher.fetch_snapshot("Tokyo").await.unwrap();
        let asked = *fetcher.sun_times.1.lock().unwrap();
        assert_eq!(asked, NaiveDate::from_ymd_opt(2024, 1, 16));
    }

    #[tokio::test]
    async fn unknown_city_becomes_resolution_fallback() {
        let snapshot = fetch_or_fallback(&fetcher(None, Ok(london_times())), "Atlantis").await;

        let error = snapshot.error.as_ref().unwrap();
        assert_eq!(error.kind, ErrorKind::Resolution);
        assert_eq!(snapshot.city, "Atlantis");
        assert_eq!(snapshot.sun_position, SunPosition::NEUTRAL);
        assert_eq!(snapshot.moon_phase, FALLBACK_PHASE);
        assert_eq!(snapshot.moon_illumination, 50.0);
        assert!(snapshot.is_daytime);
        assert_in_range(&snapshot);
    }

    #[tokio::test]
    async fn sun_times_outage_becomes_fetch_fallback() {
        let snapshot =
            fetch_or_fallback(&fetcher(Coordinates::new(10.0, 10.0), Err(503)), "Somewhere").await;
        let error = snapshot.error.unwrap();
        assert_eq!(error.kind, ErrorKind::Fetch);
        assert!(error.message.contains("503"));
    }

    #[test]
    fn export_is_flat_and_complete() {
        let snapshot = AstronomicalSnapshot::compose(
            "London",
            Coordinates::new(51.5074, -0.1278).unwrap(),
            london_times(),
            noon(),
            &DisplayZone::utc(),
        );
        let record = snapshot.export(&DisplayZone::utc());
        assert_eq!(record["city"], "London");
        assert_eq!(record["sunrise"], "07:58");
        assert_eq!(record["golden_morning"], "07:58-08:58");
        assert_eq!(record["golden_evening"], "15:23-16:23");
        assert_eq!(record["day_length_hours"], "8.42");
        assert_eq!(record["is_daytime"], "true");
        assert_eq!(record["error"], "");
    }

    #[test]
    fn fallback_export_uses_placeholders() {
        let err = FetchError::CityNotFound("Atlantis".into());
        let snapshot =
            AstronomicalSnapshot::fallback("Atlantis", &err, noon(), &DisplayZone::utc());
        let record = snapshot.export(&DisplayZone::utc());
        assert_eq!(record["sunrise"], "N/A");
        assert_eq!(record["golden_morning"], "N/A-N/A");
        assert_eq!(record["latitude"], "");
        assert_eq!(record["error"], "city not found: Atlantis");
    }
}
