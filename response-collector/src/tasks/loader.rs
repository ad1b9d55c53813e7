//! Task loading from CSV files

use std::io::Read;
use std::path::Path;

use super::Task;
use crate::config::InputConfig;

/// Error type for task loading
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Missing column: {0}")]
    MissingColumn(String),
}

/// Load tasks from a CSV file with a header row
pub fn load_tasks_from_csv(path: impl AsRef<Path>, input: &InputConfig) -> Result<Vec<Task>, LoadError> {
    let file = std::fs::File::open(path)?;
    load_tasks_from_reader(file, input)
}

/// Load tasks from any CSV source.
///
/// The task column is required. The expected-output column may be absent
/// entirely or empty per row; either way the task simply has no ground
/// truth. Rows with a blank task are skipped.
pub fn load_tasks_from_reader<R: Read>(reader: R, input: &InputConfig) -> Result<Vec<Task>, LoadError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let column = |name: &str| headers.iter().position(|h| h.trim() == name);
    let task_idx = column(&input.task_column)
        .ok_or_else(|| LoadError::MissingColumn(input.task_column.clone()))?;
    let expected_idx = column(&input.expected_column);
    if expected_idx.is_none() {
        tracing::warn!(
            "Column '{}' not found; similarity will be N/A for every task",
            input.expected_column
        );
    }

    let mut tasks = Vec::new();
    for (row, record) in rdr.records().enumerate() {
        let record = record?;
        let description = record.get(task_idx).unwrap_or("").trim();
        if description.is_empty() {
            tracing::debug!("Skipping row {} with an empty task", row + 1);
            continue;
        }
        let expected = expected_idx
            .and_then(|i| record.get(i))
            .unwrap_or("")
            .to_string();
        tasks.push(Task::new(description).with_expected(expected));
    }

    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_with_expected_column() {
        let csv = "Task,Expected Output (Optional)\n\
                   \"Translate 'Hello, how are you?' to Portuguese\",\"Olá, como vai?\"\n\
                   Say hello,\n";
        let tasks = load_tasks_from_reader(csv.as_bytes(), &InputConfig::default()).unwrap();

        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].description, "Translate 'Hello, how are you?' to Portuguese");
        assert_eq!(tasks[0].expected_output, "Olá, como vai?");
        assert!(tasks[1].expected_output.is_empty());
    }

    #[test]
    fn test_missing_expected_column_is_not_an_error() {
        let csv = "Task\nExplain git rebase\n";
        let tasks = load_tasks_from_reader(csv.as_bytes(), &InputConfig::default()).unwrap();
        assert_eq!(tasks, vec![Task::new("Explain git rebase")]);
    }

    #[test]
    fn test_missing_task_column() {
        let csv = "Prompt\nExplain git rebase\n";
        let err = load_tasks_from_reader(csv.as_bytes(), &InputConfig::default()).unwrap_err();
        assert!(matches!(err, LoadError::MissingColumn(c) if c == "Task"));
    }

    #[test]
    fn test_blank_rows_skipped_and_short_rows_tolerated() {
        let csv = "Expected Output (Optional),Task\n,\nfoo\nbar,Do it\n";
        let tasks = load_tasks_from_reader(csv.as_bytes(), &InputConfig::default()).unwrap();
        assert_eq!(tasks, vec![Task::new("Do it").with_expected("bar")]);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.csv");
        std::fs::write(&path, "Task\nOne\nTwo\n").unwrap();
        let tasks = load_tasks_from_csv(&path, &InputConfig::default()).unwrap();
        assert_eq!(tasks.len(), 2);
    }
}
