//! Batch orchestrator: fans each task out to every backend and folds the
//! answers into task records

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::sleep;

use crate::analysis::{normalize, similarity};
use crate::backends::{duplicate_name, Backend, BackendError, ConfigurationError};
use crate::config::Config;
use crate::tasks::{BackendResult, Task, TaskRecord};

/// Settings passed to the orchestrator at construction
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Score answers against the expected output
    pub similarity_enabled: bool,
    /// Maximum concurrent backend calls within one task
    pub fan_out_limit: usize,
    /// Per-attempt timeout
    pub timeout: Duration,
    /// Number of retries on a retryable failure
    pub retry_count: u32,
    /// Initial retry delay in milliseconds
    pub retry_delay_ms: u64,
    /// Maximum retry delay in milliseconds
    pub max_retry_delay_ms: u64,
    /// When set, every raw answer is also written to this directory
    pub responses_dir: Option<PathBuf>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            similarity_enabled: true,
            fan_out_limit: 5,
            timeout: Duration::from_secs(120),
            retry_count: 2,
            retry_delay_ms: 1000,
            max_retry_delay_ms: 30_000,
            responses_dir: None,
        }
    }
}

impl Config {
    /// Project the run settings into an orchestrator configuration
    pub fn orchestrator_settings(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            similarity_enabled: self.run.similarity_enabled,
            fan_out_limit: self.run.fan_out_limit,
            timeout: self.run.timeout(),
            retry_count: self.run.retry_count,
            retry_delay_ms: self.run.retry_delay_ms,
            max_retry_delay_ms: self.run.max_retry_delay_ms,
            responses_dir: self
                .output
                .save_responses
                .then(|| PathBuf::from(&self.output.output_dir).join("responses")),
        }
    }
}

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running(usize),
    Done,
}

#[derive(Debug, Clone, Copy)]
struct RetryPolicy {
    timeout: Duration,
    retry_count: u32,
    retry_delay_ms: u64,
    max_retry_delay_ms: u64,
}

/// Drives a batch of tasks through a fixed, ordered set of backends
pub struct Orchestrator {
    config: OrchestratorConfig,
    backends: Vec<Arc<dyn Backend>>,
    semaphore: Arc<Semaphore>,
    progress: Arc<dyn ProgressCallback>,
}

impl Orchestrator {
    /// Create an orchestrator; the order of `backends` is fixed for the run
    pub fn new(
        backends: Vec<Arc<dyn Backend>>,
        config: OrchestratorConfig,
    ) -> Result<Self, ConfigurationError> {
        if backends.is_empty() {
            return Err(ConfigurationError::NoBackends);
        }
        // Backend names key every record, so they must be unique
        for (i, backend) in backends.iter().enumerate() {
            if backends[..i].iter().any(|b| b.name() == backend.name()) {
                return Err(duplicate_name(backend.name()));
            }
        }
        let semaphore = Arc::new(Semaphore::new(config.fan_out_limit.max(1)));
        Ok(Self {
            config,
            backends,
            semaphore,
            progress: Arc::new(NoOpProgress),
        })
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Backend names in report column order
    pub fn backend_names(&self) -> Vec<String> {
        self.backends.iter().map(|b| b.name().to_string()).collect()
    }

    /// Run every task in order and return one record per task
    pub async fn run(&self, tasks: &[Task]) -> Vec<TaskRecord> {
        self.progress.on_state(RunState::Idle);
        tracing::info!(
            "Running {} tasks on {} backends",
            tasks.len(),
            self.backends.len()
        );

        let mut records = Vec::with_capacity(tasks.len());
        for (index, task) in tasks.iter().enumerate() {
            self.progress.on_state(RunState::Running(index));
            records.push(self.run_task(index, task).await);
            self.progress.on_progress(index + 1, tasks.len());
        }

        self.progress.on_state(RunState::Done);
        records
    }

    /// Run one task on every backend and build its record
    pub async fn run_task(&self, index: usize, task: &Task) -> TaskRecord {
        self.progress.on_task_start(index, task);

        let mut results = self.collect_answers(index, task).await;
        if self.config.similarity_enabled {
            for result in results.iter_mut().filter(|r| r.is_success()) {
                result.similarity = similarity(&result.normalized_text, &task.expected_output);
            }
        }

        if let Some(dir) = &self.config.responses_dir {
            save_responses(dir, index, &results).await;
        }

        TaskRecord::from_results(task, &results)
    }

    /// Fan out to all backends and wait until each reaches a terminal state.
    /// Results come back in backend order regardless of completion order.
    async fn collect_answers(&self, index: usize, task: &Task) -> Vec<BackendResult> {
        let policy = RetryPolicy {
            timeout: self.config.timeout,
            retry_count: self.config.retry_count,
            retry_delay_ms: self.config.retry_delay_ms,
            max_retry_delay_ms: self.config.max_retry_delay_ms,
        };

        let mut handles = Vec::with_capacity(self.backends.len());
        for backend in &self.backends {
            let backend = backend.clone();
            let semaphore = self.semaphore.clone();
            let progress = self.progress.clone();
            let description = task.description.clone();

            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                progress.on_backend_start(index, backend.name());
                let outcome = call_with_retry(backend.as_ref(), &description, policy).await;
                progress.on_backend_complete(index, backend.name(), outcome.is_ok());
                outcome
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (backend, handle) in self.backends.iter().zip(handles) {
            let name = backend.name();
            let result = match handle.await {
                Ok(Ok(raw)) => {
                    let normalized = normalize(&raw);
                    BackendResult::success(name, raw, normalized)
                }
                Ok(Err(e)) => BackendResult::failure(name, e),
                Err(e) => {
                    tracing::error!("Backend {} panicked on task {}: {}", name, index + 1, e);
                    BackendResult::failure(name, format!("backend task aborted: {}", e))
                }
            };
            results.push(result);
        }
        results
    }
}

/// One backend call with per-attempt timeout and exponential backoff
async fn call_with_retry(
    backend: &dyn Backend,
    task: &str,
    policy: RetryPolicy,
) -> Result<String, BackendError> {
    let mut delay = policy.retry_delay_ms.min(policy.max_retry_delay_ms);
    let mut attempt = 0;

    loop {
        let outcome = match tokio::time::timeout(policy.timeout, backend.run(task)).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout {
                timeout_ms: policy.timeout.as_millis() as u64,
            }),
        };

        let error = match outcome {
            Ok(answer) => return Ok(answer),
            Err(e) => e,
        };

        if attempt >= policy.retry_count || !error.is_retryable() {
            tracing::error!("Backend {} failed: {}", backend.name(), error);
            return Err(error);
        }
        attempt += 1;

        let wait = match &error {
            BackendError::RateLimited { retry_after_ms } => {
                tracing::warn!("Rate limited on {}, waiting {}ms", backend.name(), retry_after_ms);
                (*retry_after_ms).min(policy.max_retry_delay_ms)
            }
            other => {
                tracing::info!("Retry {} on {} after: {}", attempt, backend.name(), other);
                delay
            }
        };
        sleep(Duration::from_millis(wait)).await;
        delay = next_delay(delay, policy.max_retry_delay_ms);
    }
}

/// Exponential backoff step, capped at `max_ms`
fn next_delay(delay: u64, max_ms: u64) -> u64 {
    delay.saturating_mul(2).min(max_ms)
}

fn file_safe(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

async fn save_responses(dir: &std::path::Path, index: usize, results: &[BackendResult]) {
    if let Err(e) = tokio::fs::create_dir_all(dir).await {
        tracing::warn!("Cannot create {}: {}", dir.display(), e);
        return;
    }
    for result in results {
        let path = dir.join(format!("{:02}_{}_output.txt", index + 1, file_safe(&result.backend_name)));
        if let Err(e) = tokio::fs::write(&path, &result.raw_text).await {
            tracing::warn!("Cannot save response to {}: {}", path.display(), e);
        }
    }
}

/// Progress callback for tracking execution
pub trait ProgressCallback: Send + Sync {
    fn on_state(&self, state: RunState);
    fn on_task_start(&self, index: usize, task: &Task);
    fn on_backend_start(&self, index: usize, backend: &str);
    fn on_backend_complete(&self, index: usize, backend: &str, success: bool);
    fn on_progress(&self, completed: usize, total: usize);
}

/// Default no-op progress callback
pub struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_state(&self, _state: RunState) {}
    fn on_task_start(&self, _index: usize, _task: &Task) {}
    fn on_backend_start(&self, _index: usize, _backend: &str) {}
    fn on_backend_complete(&self, _index: usize, _backend: &str, _success: bool) {}
    fn on_progress(&self, _completed: usize, _total: usize) {}
}

/// Console progress callback
pub struct ConsoleProgress;

impl ProgressCallback for ConsoleProgress {
    fn on_state(&self, state: RunState) {
        if state == RunState::Done {
            println!("All tasks finished.");
        }
    }

    fn on_task_start(&self, index: usize, task: &Task) {
        println!("Task {:02}:", index + 1);
        println!(" - Task Message: {}", task.description);
        println!(" - Expected Output: {}", task.expected_output);
    }

    fn on_backend_start(&self, _index: usize, backend: &str) {
        println!("   Running {}...", backend);
    }

    fn on_backend_complete(&self, _index: usize, backend: &str, success: bool) {
        let status = if success { "OK" } else { "FAILED" };
        println!("   {} {}", status, backend);
    }

    fn on_progress(&self, completed: usize, total: usize) {
        println!("Progress: {}/{} tasks complete\n", completed, total);
    }
}
