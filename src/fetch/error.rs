use serde::{Deserialize, Serialize};
use strum_macros::Display;
use thiserror::Error;
use utoipa::ToSchema;

use crate::astro::CalculationError;

/// Coarse classification of a failed snapshot, carried on fallback snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    Resolution,
    Fetch,
    Calculation,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid city name {0:?}")]
    InvalidCity(String),
    #[error("city not found: {0}")]
    CityNotFound(String),
    #[error("geocoding failed: {0}")]
    Geocoding(String),
    #[error("sun times service returned HTTP {0}")]
    Status(u16),
    #[error("sun times request failed: {0}")]
    SunTimes(String),
    #[error("calculation failed: {0}")]
    Calculation(#[from] CalculationError),
    #[error("fetch task failed: {0}")]
    Task(String),
}

impl FetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::InvalidCity(_) | FetchError::CityNotFound(_) | FetchError::Geocoding(_) => {
                ErrorKind::Resolution
            }
            FetchError::Status(_) | FetchError::SunTimes(_) | FetchError::Task(_) => {
                ErrorKind::Fetch
            }
            FetchError::Calculation(_) => ErrorKind::Calculation,
        }
    }
}
