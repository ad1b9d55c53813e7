//! Results reporting

pub mod csv_writer;

pub use csv_writer::{format_score, CsvReportWriter, NOT_APPLICABLE};

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::analysis::{BackendStanding, Leaderboard};

/// Errors writing a report
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// JSON summary export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonSummary {
    pub run_id: String,
    pub timestamp: String,
    pub total_tasks: usize,
    pub leader: Option<String>,
    pub standings: Vec<BackendStanding>,
    pub report_file: String,
}

impl JsonSummary {
    /// Create from a run leaderboard
    pub fn from_leaderboard(
        run_id: impl Into<String>,
        leaderboard: &Leaderboard,
        report_file: impl Into<String>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            total_tasks: leaderboard.total_tasks,
            leader: leaderboard.leader().map(|s| s.backend.clone()),
            standings: leaderboard.standings.clone(),
            report_file: report_file.into(),
        }
    }

    /// Write to JSON file
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), ReportError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Dump values as pretty JSON, used when the CSV report cannot be written
pub fn write_json_fallback<T: Serialize + ?Sized>(
    value: &T,
    path: impl AsRef<Path>,
) -> Result<(), ReportError> {
    if let Some(parent) = path.as_ref().parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Generate a console report
pub fn print_console_report(leaderboard: &Leaderboard) {
    println!("\n=== Response Collector Results ===\n");
    println!("Total Tasks: {}\n", leaderboard.total_tasks);

    println!("Backend Rankings:");
    println!("{:-<50}", "");

    for (i, standing) in leaderboard.standings.iter().enumerate() {
        let avg = if standing.scored_tasks > 0 {
            format!("{:.2}%", standing.avg_similarity)
        } else {
            NOT_APPLICABLE.to_string()
        };
        println!(
            "  {}. {} - Avg Similarity: {}, Wins: {}, Failures: {}",
            i + 1,
            standing.backend,
            avg,
            standing.wins,
            standing.failures
        );
    }

    match leaderboard.leader() {
        Some(leader) => println!("\nMost similar overall: {}", leader.backend),
        None => println!("\nNo expected outputs were scored"),
    }

    println!("\n{:=<50}", "");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::{BackendResult, Task, TaskRecord};

    fn sample_records() -> Vec<TaskRecord> {
        let mut a = BackendResult::success("A", "x".into(), "x".into());
        a.similarity = Some(20.0);
        let mut b = BackendResult::success("B", "y".into(), "y".into());
        b.similarity = Some(80.0);
        vec![TaskRecord::from_results(
            &Task::new("t").with_expected("y"),
            &[a, b],
        )]
    }

    #[test]
    fn test_json_summary_from_leaderboard() {
        let leaderboard = Leaderboard::from_records(&sample_records(), &["A", "B"]);
        let summary = JsonSummary::from_leaderboard("run-1", &leaderboard, "output.csv");
        assert_eq!(summary.total_tasks, 1);
        assert_eq!(summary.leader.as_deref(), Some("B"));
        assert_eq!(summary.standings[0].backend, "B");
    }

    #[test]
    fn test_json_summary_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        let leaderboard = Leaderboard::from_records(&sample_records(), &["A", "B"]);
        JsonSummary::from_leaderboard("run-1", &leaderboard, "output.csv")
            .write_to_file(&path)
            .unwrap();

        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed["run_id"], "run-1");
        assert_eq!(parsed["standings"][0]["wins"], 1);
    }

    #[test]
    fn test_json_fallback_dumps_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("records.json");
        write_json_fallback(&sample_records(), &path).unwrap();

        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed[0]["task"], "t");
        assert_eq!(parsed[0]["most_similar_backend"], "B");
    }
}
