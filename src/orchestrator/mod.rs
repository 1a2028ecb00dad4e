mod cache;
mod error;
pub mod handoff;
mod orchestrator;

pub use cache::CityState;
pub use error::OrchestratorError;
pub use orchestrator::{Lookup, OrchestratorOptions, RefreshOrchestrator};
