//! Batch execution engine

pub mod executor;
pub mod rate_limiter;

pub use executor::{
    ConsoleProgress, NoOpProgress, Orchestrator, OrchestratorConfig, ProgressCallback, RunState,
};
pub use rate_limiter::RateLimiter;
