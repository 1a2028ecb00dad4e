use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::orchestrator::OrchestratorError;
use crate::web::auth::PermissionError;

pub enum ApiError {
    Permission(PermissionError),
    Validation(String),
    NotFound(&'static str),
    Internal(String),
}

impl From<PermissionError> for ApiError {
    fn from(e: PermissionError) -> Self {
        ApiError::Permission(e)
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(e: OrchestratorError) -> Self {
        match e {
            OrchestratorError::InvalidInterval => ApiError::Validation(e.to_string()),
            OrchestratorError::NoRuntime(_) => ApiError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Permission(e) => e.into_response(),
            ApiError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::with_message("validation_failed", &msg)),
            )
                .into_response(),
            ApiError::NotFound(reason) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse::new(reason))).into_response()
            }
            ApiError::Internal(msg) => {
                log::warn!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse::with_message("internal_error", &msg)),
                )
                    .into_response()
            }
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: &str) -> Self {
        ErrorResponse {
            error: error.to_string(),
            message: None,
        }
    }

    pub fn with_message(error: &str, message: &str) -> Self {
        ErrorResponse {
            error: error.to_string(),
            message: Some(message.to_string()),
        }
    }
}

/// Rejects city names that are empty once trimmed.
pub fn validate_city(city: &str) -> ApiResult<&str> {
    let city = city.trim();
    if city.is_empty() {
        return Err(ApiError::Validation("city name must not be empty".to_string()));
    }
    Ok(city)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_cities_are_rejected() {
        assert!(validate_city("   ").is_err());
        assert_eq!(validate_city(" Lima ").ok(), Some("Lima"));
    }

    #[test]
    fn errors_map_to_status_codes() {
        let bad = ApiError::from(OrchestratorError::InvalidInterval).into_response();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
        let missing = ApiError::NotFound("no_data").into_response();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }
}
