use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

use super::api::auto_refresh::{AutoRefreshStatus, StartAutoRefresh};
use super::api::current::DaytimeResponse;
use super::api::error::ErrorResponse;
use super::api::sky::{CityStateResponse, LookupResponse};

#[derive(OpenApi)]
#[openapi(
    paths(
        super::api::sky::get_sky,
        super::api::sky::get_cached,
        super::api::sky::get_state,
        super::api::sky::refresh,
        super::api::current::sun,
        super::api::current::moon,
        super::api::current::daytime,
        super::api::current::golden_hour,
        super::api::current::daylight,
        super::api::current::export,
        super::api::auto_refresh::status,
        super::api::auto_refresh::start,
        super::api::auto_refresh::stop,
    ),
    components(
        schemas(
            LookupResponse,
            CityStateResponse,
            DaytimeResponse,
            AutoRefreshStatus,
            StartAutoRefresh,
            ErrorResponse,
            crate::fetch::AstronomicalSnapshot,
            crate::fetch::SnapshotError,
            crate::fetch::ErrorKind,
            crate::orchestrator::CityState,
            crate::astro::Coordinates,
            crate::astro::SunPosition,
            crate::astro::MoonPosition,
            crate::astro::PhaseInfo,
            crate::astro::PhaseName,
            crate::astro::GoldenHour,
            crate::astro::DaylightInfo,
            crate::astro::Season,
            crate::astro::SunEvent,
        )
    ),
    modifiers(&SecurityAddon),
    info(
        title = "Sky-O-Mat API",
        description = "Sun and moon positions, lunar phase and daylight for any city",
        version = "0.1.0"
    ),
    tags(
        (name = "sky", description = "Per-city snapshots and cache control"),
        (name = "current", description = "Views of the current city"),
        (name = "auto-refresh", description = "Periodic refresh of the current city")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}
