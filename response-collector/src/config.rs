//! Configuration for the response collector
//!
//! Loads backend definitions and run settings from TOML files. Backends are
//! declared as an array of tables so their order in the file is the column
//! order of every report.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::backends::ConfigurationError;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default = "default_backends")]
    pub backends: Vec<BackendConfig>,
}

/// How a backend is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// OpenAI chat completions API
    OpenAI,
    /// Mistral chat API (OpenAI dialect)
    Mistral,
    /// Google Gemini generateContent API
    Gemini,
    /// A local program whose stdout is the answer
    Command,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::OpenAI => "openai",
            BackendKind::Mistral => "mistral",
            BackendKind::Gemini => "gemini",
            BackendKind::Command => "command",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One configured assistant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Display name, also the report column header
    pub name: String,
    pub kind: BackendKind,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Environment variable holding the API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Requests per minute
    #[serde(default = "default_rpm")]
    pub rpm: u32,
    /// Tokens per minute
    #[serde(default = "default_tpm")]
    pub tpm: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Executable for `command` backends
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
    /// Arguments for `command` backends; `{task}` is replaced by the task
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

impl BackendConfig {
    fn api(name: &str, kind: BackendKind, model: &str, api_key_env: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            enabled: true,
            model: Some(model.to_string()),
            api_key_env: Some(api_key_env.to_string()),
            base_url: None,
            rpm: default_rpm(),
            tpm: default_tpm(),
            max_tokens: None,
            temperature: None,
            program: None,
            args: Vec::new(),
        }
    }

    fn command(name: &str, program: &str, args: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            kind: BackendKind::Command,
            enabled: true,
            model: None,
            api_key_env: None,
            base_url: None,
            rpm: default_rpm(),
            tpm: default_tpm(),
            max_tokens: None,
            temperature: None,
            program: Some(program.to_string()),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// Orchestration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Score answers against the expected output
    #[serde(default = "default_true")]
    pub similarity_enabled: bool,
    /// Maximum concurrent backend calls per task
    #[serde(default = "default_fan_out_limit")]
    pub fan_out_limit: usize,
    /// Per-call timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,
}

/// Where tasks are read from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    #[serde(default = "default_tasks_file")]
    pub tasks_file: String,
    #[serde(default = "default_task_column")]
    pub task_column: String,
    #[serde(default = "default_expected_column")]
    pub expected_column: String,
}

/// Where results go
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_report_file")]
    pub report_file: String,
    /// Also write each raw answer to its own text file
    #[serde(default)]
    pub save_responses: bool,
    #[serde(default = "default_true")]
    pub generate_json: bool,
}

// Default value functions
fn default_true() -> bool { true }
fn default_rpm() -> u32 { 60 }
fn default_tpm() -> u32 { 100_000 }
fn default_fan_out_limit() -> usize { 5 }
fn default_timeout_ms() -> u64 { 120_000 }
fn default_retry_count() -> u32 { 2 }
fn default_retry_delay_ms() -> u64 { 1000 }
fn default_max_retry_delay_ms() -> u64 { 30_000 }
fn default_tasks_file() -> String { "Inputs/input.csv".to_string() }
fn default_task_column() -> String { "Task".to_string() }
fn default_expected_column() -> String { "Expected Output (Optional)".to_string() }
fn default_output_dir() -> String { "Outputs".to_string() }
fn default_report_file() -> String { "output.csv".to_string() }

fn default_backends() -> Vec<BackendConfig> {
    let mut gemini = BackendConfig::api("Gemini", BackendKind::Gemini, "gemini-1.5-flash", "GEMINI_API_KEY");
    gemini.temperature = Some(0.1);
    gemini.max_tokens = Some(8192);
    gemini.rpm = 15;

    vec![
        BackendConfig::api("ChatGPT", BackendKind::OpenAI, "gpt-4o-mini", "CHATGPT_API_KEY"),
        BackendConfig::command("Copilot", "gh", &["copilot", "explain", "{task}"]),
        gemini,
        BackendConfig::command("Llama", "ollama", &["run", "llama3", "{task}"]),
        BackendConfig::api("Mistral", BackendKind::Mistral, "mistral-large-latest", "MISTRAL_API_KEY"),
    ]
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            similarity_enabled: true,
            fan_out_limit: default_fan_out_limit(),
            timeout_ms: default_timeout_ms(),
            retry_count: default_retry_count(),
            retry_delay_ms: default_retry_delay_ms(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            tasks_file: default_tasks_file(),
            task_column: default_task_column(),
            expected_column: default_expected_column(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            report_file: default_report_file(),
            save_responses: false,
            generate_json: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            run: RunConfig::default(),
            input: InputConfig::default(),
            output: OutputConfig::default(),
            backends: default_backends(),
        }
    }
}

impl RunConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load from the default config location or return defaults
    pub fn load_or_default() -> Self {
        let config_paths = [
            "config/collector.toml",
            "../config/collector.toml",
            "response-collector/config/collector.toml",
        ];

        for path in &config_paths {
            if let Ok(config) = Self::from_file(path) {
                tracing::info!("Loaded configuration from {}", path);
                return config;
            }
        }

        tracing::info!("Using default configuration");
        Self::default()
    }

    /// Save configuration to a TOML file
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Enabled backends in declaration order
    pub fn enabled_backends(&self) -> impl Iterator<Item = &BackendConfig> {
        self.backends.iter().filter(|b| b.enabled)
    }

    /// Keep only the named backends (case-insensitive), preserving file order.
    /// Named backends are enabled even if the file disables them.
    pub fn retain_backends(&mut self, names: &[&str]) -> Result<(), ConfigurationError> {
        if let Some(unknown) = names.iter().find(|n| self.get_backend(n).is_none()) {
            return Err(ConfigurationError::UnknownBackend {
                name: unknown.to_string(),
            });
        }
        self.backends
            .retain(|b| names.iter().any(|n| n.eq_ignore_ascii_case(&b.name)));
        for backend in &mut self.backends {
            backend.enabled = true;
        }
        Ok(())
    }

    pub fn get_backend(&self, name: &str) -> Option<&BackendConfig> {
        self.backends.iter().find(|b| b.name.eq_ignore_ascii_case(name))
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_lineup() {
        let config = Config::default();
        let names: Vec<&str> = config.backends.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["ChatGPT", "Copilot", "Gemini", "Llama", "Mistral"]);
        assert!(config.run.similarity_enabled);
        assert_eq!(config.input.expected_column, "Expected Output (Optional)");
    }

    #[test]
    fn test_parse_toml_preserves_backend_order() {
        let toml = r#"
[run]
fan_out_limit = 2
timeout_ms = 5000

[[backends]]
name = "Zeta"
kind = "command"
program = "echo"

[[backends]]
name = "Alpha"
kind = "openai"
model = "gpt-4o-mini"
api_key_env = "ALPHA_KEY"
enabled = false
"#;
        let config = Config::from_toml(toml).unwrap();
        assert_eq!(config.backends[0].name, "Zeta");
        assert_eq!(config.backends[1].kind, BackendKind::OpenAI);
        assert_eq!(config.run.fan_out_limit, 2);
        assert_eq!(config.run.timeout(), Duration::from_secs(5));
        assert_eq!(config.run.retry_count, 2);
        assert_eq!(config.enabled_backends().count(), 1);
    }

    #[test]
    fn test_missing_backends_table_uses_defaults() {
        let config = Config::from_toml("[run]\nsimilarity_enabled = false\n").unwrap();
        assert!(!config.run.similarity_enabled);
        assert_eq!(config.backends.len(), 5);
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let toml = "[[backends]]\nname = \"X\"\nkind = \"carrier-pigeon\"\n";
        assert!(matches!(Config::from_toml(toml), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_retain_backends() {
        let mut config = Config::default();
        config.retain_backends(&["mistral", "chatgpt"]).unwrap();
        let names: Vec<&str> = config.backends.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["ChatGPT", "Mistral"]);
    }

    #[test]
    fn test_retain_unknown_backend_is_rejected() {
        let mut config = Config::default();
        let err = config.retain_backends(&["Mistral", "Claude"]).unwrap_err();
        assert_eq!(err, ConfigurationError::UnknownBackend { name: "Claude".into() });
        assert_eq!(config.backends.len(), 5);
    }

    #[test]
    fn test_toml_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("collector.toml");
        Config::default().save_toml(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.backends.len(), 5);
        assert_eq!(loaded.get_backend("copilot").unwrap().args, vec!["copilot", "explain", "{task}"]);
    }
}
