use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("auto-refresh interval must be greater than zero")]
    InvalidInterval,
    #[error("no tokio runtime available: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}
