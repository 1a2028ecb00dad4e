use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::config::Permission;
use crate::fetch::AstronomicalSnapshot;
use crate::orchestrator::{CityState, Lookup};
use crate::web::api::error::{validate_city, ApiError, ApiResult, ErrorResponse};
use crate::web::auth::{require_permission, AppState, AuthenticatedUser};

#[derive(Debug, Serialize, ToSchema)]
pub struct LookupResponse {
    pub snapshot: AstronomicalSnapshot,
    /// Served from the cache rather than fetched for this request.
    pub from_cache: bool,
    /// A background fetch is replacing this stale copy.
    pub refreshing: bool,
}

impl From<Lookup> for LookupResponse {
    fn from(lookup: Lookup) -> Self {
        LookupResponse {
            snapshot: (*lookup.snapshot).clone(),
            from_cache: lookup.from_cache,
            refreshing: lookup.refreshing,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CityStateResponse {
    pub city: String,
    pub state: CityState,
    pub consecutive_failures: u32,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct RefreshQuery {
    /// Wait for the fetch and return the new snapshot.
    #[serde(default)]
    pub wait: bool,
}

#[utoipa::path(
    get,
    path = "/api/sky/{city}",
    tag = "sky",
    params(("city" = String, Path, description = "City name")),
    responses(
        (status = 200, description = "Snapshot for the city", body = LookupResponse),
        (status = 400, description = "Invalid city name", body = ErrorResponse)
    )
)]
pub async fn get_sky(
    State(state): State<AppState>,
    Path(city): Path<String>,
) -> ApiResult<Json<LookupResponse>> {
    let city = validate_city(&city)?;
    let lookup = state.orchestrator.request(city).await;
    Ok(Json(lookup.into()))
}

#[utoipa::path(
    get,
    path = "/api/sky/{city}/cached",
    tag = "sky",
    params(("city" = String, Path, description = "City name")),
    responses(
        (status = 200, description = "Cached snapshot, fresh or stale", body = AstronomicalSnapshot),
        (status = 404, description = "Nothing cached for the city", body = ErrorResponse)
    )
)]
pub async fn get_cached(
    State(state): State<AppState>,
    Path(city): Path<String>,
) -> ApiResult<Json<AstronomicalSnapshot>> {
    let city = validate_city(&city)?;
    state
        .orchestrator
        .get_cached(city)
        .map(|snapshot| Json((*snapshot).clone()))
        .ok_or(ApiError::NotFound("not_cached"))
}

#[utoipa::path(
    get,
    path = "/api/sky/{city}/state",
    tag = "sky",
    params(("city" = String, Path, description = "City name")),
    responses(
        (status = 200, description = "Cache state of the city", body = CityStateResponse)
    )
)]
pub async fn get_state(
    State(state): State<AppState>,
    Path(city): Path<String>,
) -> ApiResult<Json<CityStateResponse>> {
    let city = validate_city(&city)?;
    Ok(Json(city_state(&state, city)))
}

#[utoipa::path(
    post,
    path = "/api/sky/{city}/refresh",
    tag = "sky",
    params(
        ("city" = String, Path, description = "City name"),
        RefreshQuery
    ),
    responses(
        (status = 200, description = "Refreshed snapshot (wait=true)", body = AstronomicalSnapshot),
        (status = 202, description = "Refresh started", body = CityStateResponse),
        (status = 401, description = "Missing or invalid API key"),
        (status = 403, description = "Insufficient permissions")
    ),
    security(("api_key" = []))
)]
pub async fn refresh(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(city): Path<String>,
    Query(query): Query<RefreshQuery>,
) -> ApiResult<Response> {
    require_permission(&user, Permission::Refresh)?;
    let city = validate_city(&city)?;
    let pending = state.orchestrator.refresh(city);
    log::info!("{} requested a refresh of {}", user.name, pending.city());
    if query.wait {
        let snapshot = pending.wait().await;
        return Ok(Json((*snapshot).clone()).into_response());
    }
    Ok((StatusCode::ACCEPTED, Json(city_state(&state, city))).into_response())
}

fn city_state(state: &AppState, city: &str) -> CityStateResponse {
    CityStateResponse {
        city: city.to_string(),
        state: state.orchestrator.state_of(city),
        consecutive_failures: state.orchestrator.consecutive_failures(city),
    }
}
