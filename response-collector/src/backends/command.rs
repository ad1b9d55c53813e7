//! Backends that shell out to a local CLI (GitHub Copilot, Ollama)

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use super::traits::{Backend, BackendError, ConfigurationError};

/// Placeholder replaced by the task text in command arguments
pub const TASK_PLACEHOLDER: &str = "{task}";

/// Runs an external program per task and returns its standard output.
pub struct CommandBackend {
    name: String,
    program: PathBuf,
    args: Vec<String>,
}

impl CommandBackend {
    /// Resolve `program` on `PATH` and build the backend.
    ///
    /// When no argument contains `{task}`, the task is appended as the last
    /// argument.
    pub fn new(
        name: impl Into<String>,
        program: &str,
        args: Vec<String>,
    ) -> Result<Self, ConfigurationError> {
        let name = name.into();
        let resolved = find_program(program).ok_or_else(|| ConfigurationError::MissingTool {
            backend: name.clone(),
            program: program.to_string(),
        })?;
        Ok(Self {
            name,
            program: resolved,
            args,
        })
    }

    fn render_args(&self, task: &str) -> Vec<String> {
        let mut substituted = false;
        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|arg| {
                if arg.contains(TASK_PLACEHOLDER) {
                    substituted = true;
                    arg.replace(TASK_PLACEHOLDER, task)
                } else {
                    arg.clone()
                }
            })
            .collect();
        if !substituted {
            args.push(task.to_string());
        }
        args
    }
}

/// Look a program up the way a shell would
pub fn find_program(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }

    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths).find_map(|dir| {
        let full = dir.join(program);
        if full.is_file() {
            return Some(full);
        }
        if cfg!(windows) {
            let exe = dir.join(format!("{}.exe", program));
            if exe.is_file() {
                return Some(exe);
            }
        }
        None
    })
}

#[async_trait]
impl Backend for CommandBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, task: &str) -> Result<String, BackendError> {
        let output = Command::new(&self.program)
            .args(self.render_args(task))
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(BackendError::Command {
                program: self.program.display().to_string(),
                code: output
                    .status
                    .code()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "signal".to_string()),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}
