//! Read-only views of the current city's snapshot.

use std::collections::BTreeMap;

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::astro::{DaylightInfo, GoldenHour, PhaseInfo, SunPosition};
use crate::web::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::web::auth::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct DaytimeResponse {
    pub city: String,
    pub is_daytime: bool,
    /// False when the answer comes from the clock rule rather than sun times.
    pub data_available: bool,
}

#[utoipa::path(
    get,
    path = "/api/current/sun",
    tag = "current",
    responses(
        (status = 200, description = "Sun position for the current city", body = SunPosition),
        (status = 404, description = "No usable snapshot yet", body = ErrorResponse)
    )
)]
pub async fn sun(State(state): State<AppState>) -> ApiResult<Json<SunPosition>> {
    state
        .orchestrator
        .sun_position()
        .map(Json)
        .ok_or(ApiError::NotFound("no_data"))
}

#[utoipa::path(
    get,
    path = "/api/current/moon",
    tag = "current",
    responses(
        (status = 200, description = "Moon phase for the current city", body = PhaseInfo),
        (status = 404, description = "No usable snapshot yet", body = ErrorResponse)
    )
)]
pub async fn moon(State(state): State<AppState>) -> ApiResult<Json<PhaseInfo>> {
    state
        .orchestrator
        .moon_phase()
        .map(Json)
        .ok_or(ApiError::NotFound("no_data"))
}

#[utoipa::path(
    get,
    path = "/api/current/daytime",
    tag = "current",
    responses(
        (status = 200, description = "Whether the sun is up", body = DaytimeResponse)
    )
)]
pub async fn daytime(State(state): State<AppState>) -> Json<DaytimeResponse> {
    let orchestrator = &state.orchestrator;
    Json(DaytimeResponse {
        city: orchestrator.current_city(),
        is_daytime: orchestrator.is_daytime(),
        data_available: orchestrator.is_data_available(),
    })
}

#[utoipa::path(
    get,
    path = "/api/current/golden-hour",
    tag = "current",
    responses(
        (status = 200, description = "Golden-hour windows", body = GoldenHour),
        (status = 404, description = "No usable snapshot yet", body = ErrorResponse)
    )
)]
pub async fn golden_hour(State(state): State<AppState>) -> ApiResult<Json<GoldenHour>> {
    state
        .orchestrator
        .golden_hour_info()
        .map(Json)
        .ok_or(ApiError::NotFound("no_data"))
}

#[utoipa::path(
    get,
    path = "/api/current/daylight",
    tag = "current",
    responses(
        (status = 200, description = "Daylight summary", body = DaylightInfo),
        (status = 404, description = "No usable snapshot yet", body = ErrorResponse)
    )
)]
pub async fn daylight(State(state): State<AppState>) -> ApiResult<Json<DaylightInfo>> {
    state
        .orchestrator
        .daylight_info()
        .map(Json)
        .ok_or(ApiError::NotFound("no_data"))
}

#[utoipa::path(
    get,
    path = "/api/current/export",
    tag = "current",
    responses(
        (status = 200, description = "Flat string record of the snapshot", body = BTreeMap<String, String>),
        (status = 404, description = "Nothing cached for the current city", body = ErrorResponse)
    )
)]
pub async fn export(State(state): State<AppState>) -> ApiResult<Json<BTreeMap<String, String>>> {
    let record = state.orchestrator.export_snapshot();
    if record.is_empty() {
        return Err(ApiError::NotFound("no_data"));
    }
    Ok(Json(record))
}
