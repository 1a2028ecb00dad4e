use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalculationError {
    #[error("non-finite input: {0}")]
    NonFinite(&'static str),
    #[error("missing sunrise/sunset data")]
    MissingSunTimes,
    #[error("invalid timestamp {value:?}: {message}")]
    InvalidTimestamp { value: String, message: String },
}
