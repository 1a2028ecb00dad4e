use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::Permission;
use crate::web::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::web::auth::{require_permission, AppState, AuthenticatedUser};

#[derive(Debug, Deserialize, ToSchema)]
pub struct StartAutoRefresh {
    /// Refresh period, e.g. `5m` or `90s`.
    #[schema(example = "5m")]
    pub interval: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AutoRefreshStatus {
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    pub city: String,
    /// Whether this request changed anything.
    pub changed: bool,
}

#[utoipa::path(
    get,
    path = "/api/auto-refresh",
    tag = "auto-refresh",
    responses(
        (status = 200, description = "Auto-refresh status", body = AutoRefreshStatus)
    )
)]
pub async fn status(State(state): State<AppState>) -> Json<AutoRefreshStatus> {
    Json(describe(&state, false))
}

#[utoipa::path(
    post,
    path = "/api/auto-refresh",
    tag = "auto-refresh",
    request_body = StartAutoRefresh,
    responses(
        (status = 200, description = "Auto-refresh running", body = AutoRefreshStatus),
        (status = 400, description = "Invalid interval", body = ErrorResponse),
        (status = 401, description = "Missing or invalid API key"),
        (status = 403, description = "Insufficient permissions")
    ),
    security(("api_key" = []))
)]
pub async fn start(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<StartAutoRefresh>,
) -> ApiResult<Json<AutoRefreshStatus>> {
    require_permission(&user, Permission::ManageAutoRefresh)?;
    let interval = humantime::parse_duration(request.interval.trim())
        .map_err(|e| ApiError::Validation(format!("invalid interval: {e}")))?;

    let started = state.orchestrator.start_auto_refresh(interval)?;
    Ok(Json(describe(&state, started)))
}

#[utoipa::path(
    delete,
    path = "/api/auto-refresh",
    tag = "auto-refresh",
    responses(
        (status = 200, description = "Auto-refresh stopped", body = AutoRefreshStatus),
        (status = 401, description = "Missing or invalid API key"),
        (status = 403, description = "Insufficient permissions")
    ),
    security(("api_key" = []))
)]
pub async fn stop(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<Json<AutoRefreshStatus>> {
    require_permission(&user, Permission::ManageAutoRefresh)?;
    let stopped = state.orchestrator.stop_auto_refresh();
    Ok(Json(describe(&state, stopped)))
}

fn describe(state: &AppState, changed: bool) -> AutoRefreshStatus {
    let interval = state.orchestrator.auto_refresh_interval();
    AutoRefreshStatus {
        running: interval.is_some(),
        interval: interval.map(|i| humantime::format_duration(i).to_string()),
        city: state.orchestrator.current_city(),
        changed,
    }
}
