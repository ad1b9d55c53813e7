//! Assistant backends and the registry that builds them

pub mod command;
pub mod gemini;
pub mod openai;
pub mod traits;

pub use command::CommandBackend;
pub use gemini::{GeminiClient, GenerationConfig};
pub use openai::ChatCompletionsClient;
pub use traits::{Backend, BackendError, ConfigurationError};

use indexmap::IndexMap;
use std::sync::Arc;

use crate::config::{BackendConfig, BackendKind, Config};

/// Builds one backend, validating its credentials or tooling
pub type BackendFactory =
    Box<dyn Fn() -> Result<Arc<dyn Backend>, ConfigurationError> + Send + Sync>;

/// Name-to-factory table, iterated in registration order.
///
/// The order established here is the column order of every report.
#[derive(Default)]
pub struct BackendRegistry {
    factories: IndexMap<String, BackendFactory>,
    /// Names registered more than once; only the first registration is kept
    duplicates: Vec<String>,
}

/// Outcome of building every registered backend
pub struct Instantiated {
    pub backends: Vec<Arc<dyn Backend>>,
    pub failures: Vec<(String, ConfigurationError)>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every enabled backend of `config`, in file order
    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::new();
        for backend in config.enabled_backends() {
            let backend = backend.clone();
            registry.register(backend.name.clone(), move || build_backend(&backend));
        }
        registry
    }

    /// Add a factory under `name`.
    ///
    /// A name already taken is not replaced; `instantiate` reports it as a
    /// configuration failure.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Result<Arc<dyn Backend>, ConfigurationError> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.factories.contains_key(&name) {
            tracing::warn!("Backend name {} registered twice, keeping the first", name);
            self.duplicates.push(name);
        } else {
            self.factories.insert(name, Box::new(factory));
        }
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Build every backend; failures are collected, not fatal
    pub fn instantiate(&self) -> Instantiated {
        let mut backends = Vec::new();
        let mut failures = Vec::new();

        for (name, factory) in &self.factories {
            match factory() {
                Ok(backend) => backends.push(backend),
                Err(e) => {
                    tracing::warn!("Backend {} unavailable: {}", name, e);
                    failures.push((name.clone(), e));
                }
            }
        }

        for name in &self.duplicates {
            failures.push((name.clone(), duplicate_name(name)));
        }

        Instantiated { backends, failures }
    }
}

/// Error for a backend name that is already in use
pub fn duplicate_name(name: &str) -> ConfigurationError {
    ConfigurationError::InvalidSetting {
        backend: name.to_string(),
        message: "duplicate backend name".to_string(),
    }
}

fn api_key(config: &BackendConfig, fallback_env: &str) -> Result<String, ConfigurationError> {
    let variable = config.api_key_env.as_deref().unwrap_or(fallback_env);
    match std::env::var(variable) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(ConfigurationError::MissingCredential {
            backend: config.name.clone(),
            variable: variable.to_string(),
        }),
    }
}

/// Construct the adapter described by one `[[backends]]` entry
pub fn build_backend(config: &BackendConfig) -> Result<Arc<dyn Backend>, ConfigurationError> {
    match config.kind {
        BackendKind::OpenAI | BackendKind::Mistral => {
            let (fallback_env, base_url, model) = if config.kind == BackendKind::OpenAI {
                ("OPENAI_API_KEY", openai::OPENAI_BASE_URL, "gpt-4o-mini")
            } else {
                ("MISTRAL_API_KEY", openai::MISTRAL_BASE_URL, "mistral-large-latest")
            };
            let key = api_key(config, fallback_env)?;
            let client = ChatCompletionsClient::new(
                config.name.clone(),
                key,
                config.model.clone().unwrap_or_else(|| model.to_string()),
            )
            .with_base_url(config.base_url.as_deref().unwrap_or(base_url))
            .with_rate_limits(config.rpm, config.tpm)
            .with_max_tokens(config.max_tokens)
            .with_temperature(config.temperature);
            Ok(Arc::new(client))
        }
        BackendKind::Gemini => {
            let key = api_key(config, "GEMINI_API_KEY")?;
            let mut generation = GenerationConfig::default();
            if let Some(t) = config.temperature {
                generation.temperature = t;
            }
            if let Some(max) = config.max_tokens {
                generation.max_output_tokens = max;
            }
            let mut client = GeminiClient::new(key)
                .with_name(config.name.clone())
                .with_generation(generation)
                .with_rate_limits(config.rpm, config.tpm);
            if let Some(model) = &config.model {
                client = client.with_model(model.clone());
            }
            if let Some(url) = &config.base_url {
                client = client.with_base_url(url.clone());
            }
            Ok(Arc::new(client))
        }
        BackendKind::Command => {
            let program = config.program.as_deref().ok_or_else(|| ConfigurationError::InvalidSetting {
                backend: config.name.clone(),
                message: "command backends need a `program`".to_string(),
            })?;
            Ok(Arc::new(CommandBackend::new(
                config.name.clone(),
                program,
                config.args.clone(),
            )?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Fixed(&'static str);

    #[async_trait]
    impl Backend for Fixed {
        fn name(&self) -> &str {
            self.0
        }

        async fn run(&self, _task: &str) -> Result<String, BackendError> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn test_instantiate_keeps_registration_order_and_collects_failures() {
        let mut registry = BackendRegistry::new();
        registry
            .register("B", || Ok(Arc::new(Fixed("B")) as Arc<dyn Backend>))
            .register("Broken", || {
                Err(ConfigurationError::MissingCredential {
                    backend: "Broken".into(),
                    variable: "BROKEN_KEY".into(),
                })
            })
            .register("A", || Ok(Arc::new(Fixed("A")) as Arc<dyn Backend>));

        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["B", "Broken", "A"]);

        let built = registry.instantiate();
        let names: Vec<&str> = built.backends.iter().map(|b| b.name()).collect();
        assert_eq!(names, vec!["B", "A"]);
        assert_eq!(built.failures.len(), 1);
        assert_eq!(built.failures[0].0, "Broken");
    }

    #[test]
    fn test_duplicate_name_is_reported_not_replaced() {
        let mut registry = BackendRegistry::new();
        registry
            .register("Echo", || Ok(Arc::new(Fixed("first")) as Arc<dyn Backend>))
            .register("Echo", || Ok(Arc::new(Fixed("second")) as Arc<dyn Backend>));
        assert_eq!(registry.len(), 1);

        let built = registry.instantiate();
        assert_eq!(built.backends.len(), 1);
        assert_eq!(built.backends[0].name(), "first");
        assert_eq!(built.failures, vec![("Echo".to_string(), duplicate_name("Echo"))]);
    }

    #[cfg(unix)]
    #[test]
    fn test_duplicate_names_in_config_are_reported() {
        let toml = r#"
[[backends]]
name = "Echo"
kind = "command"
program = "echo"

[[backends]]
name = "Echo"
kind = "command"
program = "echo"
"#;
        let registry = BackendRegistry::from_config(&Config::from_toml(toml).unwrap());
        let built = registry.instantiate();
        assert_eq!(built.failures.len(), 1);
        assert_eq!(built.failures[0].0, "Echo");
    }

    #[test]
    fn test_missing_credential_reported() {
        let toml = r#"
[[backends]]
name = "NoKey"
kind = "openai"
api_key_env = "RESPONSE_COLLECTOR_TEST_UNSET_KEY"
"#;
        let config = Config::from_toml(toml).unwrap();
        let err = build_backend(&config.backends[0]).err();
        assert_eq!(
            err,
            Some(ConfigurationError::MissingCredential {
                backend: "NoKey".into(),
                variable: "RESPONSE_COLLECTOR_TEST_UNSET_KEY".into(),
            })
        );
    }

    #[test]
    fn test_command_without_program_is_invalid() {
        let config = Config::from_toml("[[backends]]\nname = \"Cli\"\nkind = \"command\"\n").unwrap();
        assert!(matches!(
            build_backend(&config.backends[0]),
            Err(ConfigurationError::InvalidSetting { .. })
        ));
    }

    #[test]
    fn test_from_config_skips_disabled() {
        let toml = r#"
[[backends]]
name = "On"
kind = "command"
program = "echo"

[[backends]]
name = "Off"
kind = "command"
program = "echo"
enabled = false
"#;
        let registry = BackendRegistry::from_config(&Config::from_toml(toml).unwrap());
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["On"]);
    }
}
