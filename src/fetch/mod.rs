mod error;
mod geocode;
mod snapshot;
mod sun_times;

use std::sync::Arc;

pub use error::{ErrorKind, FetchError};
pub use geocode::OpenMeteoGeocoder;
pub use snapshot::{AstronomicalSnapshot, SnapshotError, SnapshotFetcher, SnapshotSource};
pub use sun_times::SunriseSunsetClient;
#[cfg(test)]
pub use sun_times::SunTimes;

use crate::astro::{Clock, DisplayZone};
use crate::config::ServicesConfig;

pub type LiveFetcher = SnapshotFetcher<OpenMeteoGeocoder, SunriseSunsetClient>;

/// Builds a fetcher that talks to the configured geocoding and sun-times services.
pub fn live_fetcher(
    services: &ServicesConfig,
    clock: Arc<dyn Clock>,
    zone: DisplayZone,
) -> Result<LiveFetcher, FetchError> {
    let client = reqwest::Client::builder()
        .timeout(services.timeout)
        .user_agent(concat!("sky-o-mat/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| FetchError::Task(format!("failed to create HTTP client: {e}")))?;

    Ok(SnapshotFetcher::new(
        OpenMeteoGeocoder::new(client.clone(), services.geocoding_url.clone()),
        SunriseSunsetClient::new(client, services.sunrise_sunset_url.clone()),
        clock,
        zone,
    ))
}
