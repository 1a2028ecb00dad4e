use std::future::Future;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::astro::Coordinates;
use crate::fetch::error::FetchError;

/// Sunrise, sunset and solar noon as ISO-8601 instants with explicit offsets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SunTimes {
    #[serde(default)]
    pub sunrise: Option<String>,
    #[serde(default)]
    pub sunset: Option<String>,
    #[serde(default)]
    pub solar_noon: Option<String>,
    /// Seconds of daylight.
    #[serde(default)]
    pub day_length: Option<i64>,
}

/// Remote service that knows sunrise and sunset for a coordinate and date.
pub trait SunTimesSource: Send + Sync + 'static {
    fn sun_times(
        &self,
        coordinates: Coordinates,
        date: NaiveDate,
    ) -> impl Future<Output = Result<SunTimes, FetchError>> + Send;
}

/// Client for api.sunrise-sunset.org.
pub struct SunriseSunsetClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SunTimesResponse {
    results: Option<SunTimes>,
    #[serde(default)]
    status: Option<String>,
}

impl SunriseSunsetClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

impl SunTimesSource for SunriseSunsetClient {
    async fn sun_times(
        &self,
        coordinates: Coordinates,
        date: NaiveDate,
    ) -> Result<SunTimes, FetchError> {
        // formatted=0 makes the service return ISO-8601 instants instead of 12h clock strings.
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("lat", coordinates.latitude.to_string()),
                ("lng", coordinates.longitude.to_string()),
                ("date", date.format("%Y-%m-%d").to_string()),
                ("formatted", "0".to_string()),
            ])
            .send()
            .await
            .map_err(|e| FetchError::SunTimes(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::SunTimes(format!("failed to read response: {e}")))?;

        parse_sun_times(&body)
    }
}

fn parse_sun_times(body: &str) -> Result<SunTimes, FetchError> {
    let parsed: SunTimesResponse = serde_json::from_str(body)
        .map_err(|e| FetchError::SunTimes(format!("malformed response: {e}")))?;

    if let Some(status) = parsed.status.as_deref() {
        if status != "OK" {
            return Err(FetchError::SunTimes(format!("service status {status}")));
        }
    }

    parsed
        .results
        .ok_or_else(|| FetchError::SunTimes("response has no results".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::error::ErrorKind;

    #[test]
    fn parses_unformatted_response() {
        let body = r#"{
            "results": {
                "sunrise": "2024-01-15T07:30:00+00:00",
                "sunset": "2024-01-15T17:45:00+00:00",
                "solar_noon": "2024-01-15T12:37:30+00:00",
                "day_length": 36900,
                "civil_twilight_begin": "2024-01-15T06:55:00+00:00"
            },
            "status": "OK",
            "tzid": "UTC"
        }"#;
        let times = parse_sun_times(body).unwrap();
        assert_eq!(times.sunrise.as_deref(), Some("2024-01-15T07:30:00+00:00"));
        assert_eq!(times.day_length, Some(36900));
    }

    #[test]
    fn non_ok_status_is_a_fetch_failure() {
        let err = parse_sun_times(r#"{"status":"INVALID_REQUEST"}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Fetch);
    }

    #[test]
    fn malformed_payload_is_a_fetch_failure() {
        let err = parse_sun_times("not json").unwrap_err();
        assert!(matches!(err, FetchError::SunTimes(_)));
    }
}
