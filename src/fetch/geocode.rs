use std::future::Future;

use serde::Deserialize;

use crate::astro::Coordinates;
use crate::fetch::error::FetchError;

/// Turns a place name into coordinates.
pub trait CoordinateResolver: Send + Sync + 'static {
    fn resolve(&self, city: &str) -> impl Future<Output = Result<Coordinates, FetchError>> + Send;
}

/// Client for the Open-Meteo geocoding search endpoint.
pub struct OpenMeteoGeocoder {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Option<Vec<GeocodingResult>>,
}

#[derive(Debug, Deserialize)]
struct GeocodingResult {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

impl OpenMeteoGeocoder {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

impl CoordinateResolver for OpenMeteoGeocoder {
    async fn resolve(&self, city: &str) -> Result<Coordinates, FetchError> {
        let city = city.trim();
        if city.is_empty() {
            return Err(FetchError::InvalidCity(city.to_string()));
        }

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("name", city),
                ("count", "1"),
                ("language", "en"),
                ("format", "json"),
            ])
            .send()
            .await
            .map_err(|e| FetchError::Geocoding(format!("HTTP request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(FetchError::Geocoding(format!("HTTP {}", response.status())));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Geocoding(format!("failed to read response: {e}")))?;

        let coordinates = parse_geocoding(city, &body)?;
        log::debug!(
            "Resolved {} to {:.4},{:.4}",
            city,
            coordinates.latitude,
            coordinates.longitude
        );
        Ok(coordinates)
    }
}

fn parse_geocoding(city: &str, body: &str) -> Result<Coordinates, FetchError> {
    let parsed: GeocodingResponse = serde_json::from_str(body)
        .map_err(|e| FetchError::Geocoding(format!("malformed response: {e}")))?;

    let first = parsed
        .results
        .and_then(|results| results.into_iter().next())
        .ok_or_else(|| FetchError::CityNotFound(city.to_string()))?;

    match (first.latitude, first.longitude) {
        (Some(lat), Some(lon)) => Coordinates::new(lat, lon)
            .ok_or_else(|| FetchError::Geocoding(format!("coordinates out of range: {lat},{lon}"))),
        _ => Err(FetchError::CityNotFound(city.to_string())),
    }
}
