//! Tasks, per-backend results and the finalized per-task record

pub mod loader;

pub use loader::{load_tasks_from_csv, load_tasks_from_reader, LoadError};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::analysis::{MostSimilar, SimilarityStats};

/// Prefix of the output cell of a backend whose call failed
pub const FAILURE_MARKER: &str = "ERROR:";

/// One instruction to send to every backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub description: String,
    /// Empty when there is no ground truth
    #[serde(default)]
    pub expected_output: String,
}

impl Task {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            expected_output: String::new(),
        }
    }

    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.expected_output = expected.into();
        self
    }

    pub fn has_ground_truth(&self) -> bool {
        !self.expected_output.trim().is_empty()
    }
}

/// Terminal state of one backend call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendStatus {
    Success,
    Failed,
}

/// What one backend produced for one task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendResult {
    pub backend_name: String,
    pub status: BackendStatus,
    /// Raw answer, or the failure marker when the call failed
    pub raw_text: String,
    pub normalized_text: String,
    /// `None` is "not applicable"
    pub similarity: Option<f64>,
}

impl BackendResult {
    pub fn success(backend_name: impl Into<String>, raw_text: String, normalized_text: String) -> Self {
        Self {
            backend_name: backend_name.into(),
            status: BackendStatus::Success,
            raw_text,
            normalized_text,
            similarity: None,
        }
    }

    /// A failed call: marker text, never scored
    pub fn failure(backend_name: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        let marker = format!("{} {}", FAILURE_MARKER, cause);
        Self {
            backend_name: backend_name.into(),
            status: BackendStatus::Failed,
            raw_text: marker.clone(),
            normalized_text: crate::analysis::normalize(&marker),
            similarity: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == BackendStatus::Success
    }
}

/// One row of the final report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task: String,
    pub expected_output: String,
    /// Normalized answer (or failure marker) per backend, in backend order
    pub per_backend_output: IndexMap<String, String>,
    /// Score per backend, `None` meaning not applicable
    pub per_backend_similarity: IndexMap<String, Option<f64>>,
    pub most_similar_backend: String,
    /// Score of the most similar backend, zero when it has none
    pub similarity_score: f64,
    #[serde(flatten)]
    pub stats: SimilarityStats,
    /// Backends whose call failed for this task
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_backends: Vec<String>,
}

impl TaskRecord {
    /// Fold the per-backend results of `task` into a record
    pub fn from_results(task: &Task, results: &[BackendResult]) -> Self {
        let scores: Vec<(&str, Option<f64>)> = results
            .iter()
            .map(|r| (r.backend_name.as_str(), r.similarity))
            .collect();
        let stats = SimilarityStats::from_scores(scores.iter().map(|(_, s)| *s));
        let winner = crate::analysis::most_similar(&scores).unwrap_or(MostSimilar {
            backend: String::new(),
            score: None,
        });

        Self {
            task: task.description.clone(),
            expected_output: task.expected_output.clone(),
            per_backend_output: results
                .iter()
                .map(|r| (r.backend_name.clone(), r.normalized_text.clone()))
                .collect(),
            per_backend_similarity: results
                .iter()
                .map(|r| (r.backend_name.clone(), r.similarity))
                .collect(),
            most_similar_backend: winner.backend,
            similarity_score: winner.score.unwrap_or(0.0),
            stats,
            failed_backends: results
                .iter()
                .filter(|r| !r.is_success())
                .map(|r| r.backend_name.clone())
                .collect(),
        }
    }

    /// Whether the most similar backend actually has a score
    pub fn winner_scored(&self) -> bool {
        self.per_backend_similarity
            .get(&self.most_similar_backend)
            .is_some_and(Option::is_some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(name: &str, text: &str, similarity: Option<f64>) -> BackendResult {
        let mut r = BackendResult::success(name, text.to_string(), text.to_string());
        r.similarity = similarity;
        r
    }

    #[test]
    fn test_failure_result_carries_marker() {
        let r = BackendResult::failure("Gemini", "Timeout after 100ms");
        assert!(!r.is_success());
        assert_eq!(r.raw_text, "ERROR: Timeout after 100ms");
        assert_eq!(r.similarity, None);
    }

    #[test]
    fn test_record_from_results() {
        let task = Task::new("Translate 'hello'").with_expected("olá");
        let results = vec![
            scored("A", "oi", Some(40.0)),
            scored("B", "olá", Some(90.0)),
            BackendResult::failure("C", "boom"),
        ];

        let record = TaskRecord::from_results(&task, &results);
        assert_eq!(record.per_backend_output.keys().collect::<Vec<_>>(), vec!["A", "B", "C"]);
        assert_eq!(record.per_backend_similarity["C"], None);
        assert_eq!(record.most_similar_backend, "B");
        assert_eq!(record.similarity_score, 90.0);
        assert!(record.winner_scored());
        assert_eq!(record.stats.min, 40.0);
        assert_eq!(record.stats.max, 90.0);
        assert_eq!(record.failed_backends, vec!["C"]);
    }

    #[test]
    fn test_record_without_ground_truth() {
        let task = Task::new("Say hello");
        assert!(!task.has_ground_truth());
        let results = vec![scored("A", "hello", None), scored("B", "hi", None)];

        let record = TaskRecord::from_results(&task, &results);
        assert_eq!(record.stats, SimilarityStats::default());
        assert_eq!(record.most_similar_backend, "A");
        assert_eq!(record.similarity_score, 0.0);
        assert!(!record.winner_scored());
    }
}
