//! Cross-backend comparison over a whole run

use serde::{Deserialize, Serialize};

use super::similarity::round2;
use crate::tasks::TaskRecord;

/// How one backend fared across every task of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendStanding {
    pub backend: String,
    /// Tasks where this backend was most similar with a defined score
    pub wins: u32,
    /// Tasks where the backend call failed
    pub failures: u32,
    /// Tasks that produced a similarity score for this backend
    pub scored_tasks: u32,
    /// Mean similarity over scored tasks, zero when none
    pub avg_similarity: f64,
}

/// Backends ranked by average similarity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leaderboard {
    pub total_tasks: usize,
    pub standings: Vec<BackendStanding>,
}

impl Leaderboard {
    /// Rank `backend_order` over `records`.
    ///
    /// Sorted by average similarity descending; equal averages keep
    /// backend order.
    pub fn from_records<S: AsRef<str>>(records: &[TaskRecord], backend_order: &[S]) -> Self {
        let mut standings: Vec<BackendStanding> = backend_order
            .iter()
            .map(|name| {
                let name = name.as_ref();
                let mut wins = 0;
                let mut failures = 0;
                let mut scores = Vec::new();

                for record in records {
                    if record.most_similar_backend == name && record.winner_scored() {
                        wins += 1;
                    }
                    if record.failed_backends.iter().any(|b| b == name) {
                        failures += 1;
                    }
                    if let Some(Some(score)) = record.per_backend_similarity.get(name) {
                        scores.push(*score);
                    }
                }

                let avg_similarity = if scores.is_empty() {
                    0.0
                } else {
                    round2(scores.iter().sum::<f64>() / scores.len() as f64)
                };

                BackendStanding {
                    backend: name.to_string(),
                    wins,
                    failures,
                    scored_tasks: scores.len() as u32,
                    avg_similarity,
                }
            })
            .collect();

        // Stable sort keeps backend order among ties
        standings.sort_by(|a, b| b.avg_similarity.total_cmp(&a.avg_similarity));

        Self {
            total_tasks: records.len(),
            standings,
        }
    }

    pub fn leader(&self) -> Option<&BackendStanding> {
        self.standings.first().filter(|s| s.scored_tasks > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::{BackendResult, Task};

    fn result(name: &str, similarity: Option<f64>) -> BackendResult {
        let mut r = BackendResult::success(name, "x".into(), "x".into());
        r.similarity = similarity;
        r
    }

    #[test]
    fn test_rank_by_average_similarity() {
        let task = Task::new("t").with_expected("e");
        let records = vec![
            TaskRecord::from_results(&task, &[result("A", Some(90.0)), result("B", Some(80.0))]),
            TaskRecord::from_results(&task, &[result("A", Some(10.0)), result("B", Some(70.0))]),
            TaskRecord::from_results(&task, &[result("A", Some(20.0)), BackendResult::failure("B", "down")]),
        ];

        let board = Leaderboard::from_records(&records, &["A", "B"]);
        assert_eq!(board.total_tasks, 3);
        assert_eq!(board.standings[0].backend, "B");
        assert_eq!(board.standings[0].avg_similarity, 75.0);
        assert_eq!(board.standings[0].wins, 1);
        assert_eq!(board.standings[0].failures, 1);
        assert_eq!(board.standings[0].scored_tasks, 2);
        assert_eq!(board.standings[1].backend, "A");
        assert_eq!(board.standings[1].wins, 2);
        assert_eq!(board.standings[1].avg_similarity, 40.0);
        assert_eq!(board.leader().unwrap().backend, "B");
    }

    #[test]
    fn test_unscored_run_has_no_leader_or_wins() {
        let task = Task::new("Say hello");
        let records = vec![TaskRecord::from_results(&task, &[result("A", None), result("B", None)])];

        let board = Leaderboard::from_records(&records, &["A", "B"]);
        assert_eq!(board.standings[0].backend, "A");
        assert_eq!(board.standings[0].wins, 0);
        assert!(board.leader().is_none());
    }
}
