//! Tabular CSV report, one row per task

use std::io::Write;
use std::path::Path;

use super::ReportError;
use crate::tasks::TaskRecord;

/// Cell text for a missing similarity
pub const NOT_APPLICABLE: &str = "N/A";

const FIXED_COLUMNS: [&str; 8] = [
    "Task",
    "Expected Output",
    "Most Similar Model",
    "Minimum Similarity",
    "Maximum Similarity",
    "Average Similarity",
    "Median Similarity",
    "Standard Deviation Similarity",
];

/// Format a score the way the report shows it: `90.0`, `33.61`
pub fn format_score(score: f64) -> String {
    if score.fract() == 0.0 {
        format!("{:.1}", score)
    } else {
        format!("{}", score)
    }
}

fn similarity_cell(score: Option<f64>) -> String {
    score.map(format_score).unwrap_or_else(|| NOT_APPLICABLE.to_string())
}

fn most_similar_cell(record: &TaskRecord) -> String {
    if record.most_similar_backend.is_empty() {
        return String::new();
    }
    let score = if record.winner_scored() {
        format!("{}%", format_score(record.similarity_score))
    } else {
        NOT_APPLICABLE.to_string()
    };
    format!("{} ({})", record.most_similar_backend, score)
}

/// Writes task records as CSV with backend columns in orchestrator order
pub struct CsvReportWriter;

impl CsvReportWriter {
    /// Header row: fixed columns, then `<Name>` and `<Name> Similarity` per backend
    pub fn header<S: AsRef<str>>(backend_order: &[S]) -> Vec<String> {
        let mut header: Vec<String> = FIXED_COLUMNS.iter().map(|c| c.to_string()).collect();
        for name in backend_order {
            header.push(name.as_ref().to_string());
            header.push(format!("{} Similarity", name.as_ref()));
        }
        header
    }

    /// Write the report to `path`, creating parent directories
    pub fn write_records<S: AsRef<str>>(
        path: impl AsRef<Path>,
        backend_order: &[S],
        records: &[TaskRecord],
    ) -> Result<(), ReportError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(path.as_ref())?;
        Self::write_to(file, backend_order, records)?;
        tracing::info!("Report written to {}", path.as_ref().display());
        Ok(())
    }

    /// Write the report to any sink
    pub fn write_to<W: Write, S: AsRef<str>>(
        sink: W,
        backend_order: &[S],
        records: &[TaskRecord],
    ) -> Result<(), ReportError> {
        let mut writer = csv::Writer::from_writer(sink);
        writer.write_record(Self::header(backend_order))?;

        for record in records {
            let mut row = vec![
                record.task.clone(),
                record.expected_output.clone(),
                most_similar_cell(record),
                format_score(record.stats.min),
                format_score(record.stats.max),
                format_score(record.stats.mean),
                format_score(record.stats.median),
                format_score(record.stats.stddev),
            ];
            for name in backend_order {
                let name = name.as_ref();
                row.push(record.per_backend_output.get(name).cloned().unwrap_or_default());
                row.push(similarity_cell(record.per_backend_similarity.get(name).copied().flatten()));
            }
            writer.write_record(&row)?;
        }

        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::{BackendResult, Task};

    fn record(task: Task, results: &[(&str, &str, Option<f64>)]) -> TaskRecord {
        let results: Vec<BackendResult> = results
            .iter()
            .map(|(name, text, score)| {
                let mut r = BackendResult::success(*name, text.to_string(), text.to_string());
                r.similarity = *score;
                r
            })
            .collect();
        TaskRecord::from_results(&task, &results)
    }

    fn render(order: &[&str], records: &[TaskRecord]) -> String {
        let mut buf = Vec::new();
        CsvReportWriter::write_to(&mut buf, order, records).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_header_follows_backend_order() {
        let header = CsvReportWriter::header(&["Mistral", "ChatGPT"]);
        assert_eq!(header.len(), 12);
        assert_eq!(header[8], "Mistral");
        assert_eq!(header[9], "Mistral Similarity");
        assert_eq!(header[10], "ChatGPT");
    }

    #[test]
    fn test_scored_row() {
        let r = record(
            Task::new("Greet").with_expected("hello"),
            &[("A", "hi", Some(40.0)), ("B", "hello // there", Some(90.5))],
        );
        let out = render(&["A", "B"], &[r]);
        let row = out.lines().nth(1).unwrap();
        assert_eq!(row, "Greet,hello,B (90.5%),40.0,90.5,65.25,65.25,25.25,hi,40.0,hello // there,90.5");
    }

    #[test]
    fn test_unscored_row_uses_not_applicable() {
        let r = record(Task::new("Say hello"), &[("A", "Hello!", None)]);
        let out = render(&["A"], &[r]);
        let row = out.lines().nth(1).unwrap();
        assert_eq!(row, "Say hello,,A (N/A),0.0,0.0,0.0,0.0,0.0,Hello!,N/A");
    }

    #[test]
    fn test_disjoint_answer_reported_as_positive_zero() {
        let task = Task::new("Capital of France?").with_expected("paris");
        let mut exact = BackendResult::success("A", "paris".into(), "paris".into());
        exact.similarity = crate::analysis::similarity("paris", &task.expected_output);
        let mut wrong = BackendResult::success("B", "london".into(), "london".into());
        wrong.similarity = crate::analysis::similarity("london", &task.expected_output);

        let record = TaskRecord::from_results(&task, &[exact, wrong]);
        let out = render(&["A", "B"], &[record]);
        let row = out.lines().nth(1).unwrap();
        assert_eq!(row, "Capital of France?,paris,A (100.0%),0.0,100.0,50.0,50.0,50.0,paris,100.0,london,0.0");
        assert!(!row.contains("-0.0"));
    }

    #[test]
    fn test_write_records_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Outputs").join("output.csv");
        let r = record(Task::new("t"), &[("A", "x", None)]);
        CsvReportWriter::write_records(&path, &["A"], &[r]).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().starts_with("Task,Expected Output"));
    }

    #[test]
    fn test_format_score() {
        assert_eq!(format_score(90.0), "90.0");
        assert_eq!(format_score(33.61), "33.61");
        assert_eq!(format_score(0.0), "0.0");
    }
}
