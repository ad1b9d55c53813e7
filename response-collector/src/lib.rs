//! Multi-backend response collector
//!
//! Sends each task of a batch to a fixed set of AI assistant backends,
//! normalizes their answers, scores them against an optional expected output
//! with TF-IDF cosine similarity, and reports per-task statistics.
//!
//! # Features
//!
//! - OpenAI-compatible chat clients (ChatGPT, Mistral), Gemini, and
//!   command-line assistants (Copilot, Llama via ollama)
//! - Bounded concurrent fan-out per task with timeouts and retries
//! - Per-task min/max/mean/median/stddev and most-similar selection
//! - CSV report, JSON summary and a cross-backend leaderboard
//!
//! # Example
//!
//! ```no_run
//! use response_collector::{
//!     backends::BackendRegistry,
//!     config::Config,
//!     runner::Orchestrator,
//!     tasks::Task,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_or_default();
//!     let built = BackendRegistry::from_config(&config).instantiate();
//!
//!     let orchestrator = Orchestrator::new(built.backends, config.orchestrator_settings())?;
//!     let tasks = vec![Task::new("Translate 'hello' to Portuguese").with_expected("olá")];
//!
//!     for record in orchestrator.run(&tasks).await {
//!         println!("{} -> {}", record.task, record.most_similar_backend);
//!     }
//!     Ok(())
//! }
//! ```

pub mod analysis;
pub mod backends;
pub mod config;
pub mod reporting;
pub mod runner;
pub mod tasks;

pub use config::Config;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::analysis::{
        most_similar, normalize, similarity, Leaderboard, MostSimilar, SimilarityStats,
    };
    pub use crate::backends::{
        Backend, BackendError, BackendRegistry, ConfigurationError,
    };
    pub use crate::config::{BackendConfig, BackendKind, Config};
    pub use crate::reporting::{print_console_report, CsvReportWriter, JsonSummary, ReportError};
    pub use crate::runner::{Orchestrator, OrchestratorConfig, ProgressCallback, RunState};
    pub use crate::tasks::{BackendResult, BackendStatus, Task, TaskRecord};
}
