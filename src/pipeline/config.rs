//! Pipeline configuration for the stage-2 service.
//!
//! Holds model selection and sampling settings for the agents, the
//! per-request question cap, the optional shuffle seed and the block
//! store location.

use std::path::PathBuf;

use thiserror::Error;

use crate::agents::AgentConfig;
use crate::llm::DEFAULT_MODEL;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration for the stage-2 pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    // Model settings
    pub generator_model: String,
    pub verifier_model: String,
    pub editor_model: String,

    // Sampling settings
    pub generator_temperature: f64,
    pub verifier_temperature: f64,
    pub editor_temperature: f64,
    /// Maximum tokens for every agent response.
    pub max_tokens: u32,

    // Generation settings
    /// Upper bound on the number of questions a single request may ask for.
    pub max_questions: usize,
    /// Seed for the per-run choice shuffler. `None` draws from entropy.
    pub shuffle_seed: Option<u64>,

    // Storage settings
    /// SQLite block store path.
    pub database_path: PathBuf,

    /// Course language used when a request does not name one.
    pub course_language: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            generator_model: DEFAULT_MODEL.to_string(),
            verifier_model: DEFAULT_MODEL.to_string(),
            editor_model: DEFAULT_MODEL.to_string(),

            generator_temperature: 0.8,
            verifier_temperature: 0.3,
            editor_temperature: 0.7,
            max_tokens: 2000,

            max_questions: 20,
            shuffle_seed: None,

            database_path: PathBuf::from("lessonforge.db"),

            course_language: "he".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `LESSONFORGE_GENERATOR_MODEL`: Question generator model (default: gpt-4.1)
    /// - `LESSONFORGE_VERIFIER_MODEL`: Verifier model (default: gpt-4.1)
    /// - `LESSONFORGE_EDITOR_MODEL`: Text editor model (default: gpt-4.1)
    /// - `LESSONFORGE_GENERATOR_TEMPERATURE`: Generator temperature (default: 0.8)
    /// - `LESSONFORGE_VERIFIER_TEMPERATURE`: Verifier temperature (default: 0.3)
    /// - `LESSONFORGE_EDITOR_TEMPERATURE`: Editor temperature (default: 0.7)
    /// - `LESSONFORGE_MAX_TOKENS`: Maximum response tokens (default: 2000)
    /// - `LESSONFORGE_MAX_QUESTIONS`: Per-request question cap (default: 20)
    /// - `LESSONFORGE_SHUFFLE_SEED`: Choice shuffle seed (default: unset)
    /// - `LESSONFORGE_DATABASE`: SQLite block store path (default: lessonforge.db)
    /// - `LESSONFORGE_COURSE_LANGUAGE`: Fallback course language (default: he)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable has an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Model settings
        if let Ok(val) = std::env::var("LESSONFORGE_GENERATOR_MODEL") {
            config.generator_model = val;
        }

        if let Ok(val) = std::env::var("LESSONFORGE_VERIFIER_MODEL") {
            config.verifier_model = val;
        }

        if let Ok(val) = std::env::var("LESSONFORGE_EDITOR_MODEL") {
            config.editor_model = val;
        }

        // Sampling settings
        if let Ok(val) = std::env::var("LESSONFORGE_GENERATOR_TEMPERATURE") {
            config.generator_temperature =
                parse_env_value(&val, "LESSONFORGE_GENERATOR_TEMPERATURE")?;
        }

        if let Ok(val) = std::env::var("LESSONFORGE_VERIFIER_TEMPERATURE") {
            config.verifier_temperature =
                parse_env_value(&val, "LESSONFORGE_VERIFIER_TEMPERATURE")?;
        }

        if let Ok(val) = std::env::var("LESSONFORGE_EDITOR_TEMPERATURE") {
            config.editor_temperature = parse_env_value(&val, "LESSONFORGE_EDITOR_TEMPERATURE")?;
        }

        if let Ok(val) = std::env::var("LESSONFORGE_MAX_TOKENS") {
            config.max_tokens = parse_env_value(&val, "LESSONFORGE_MAX_TOKENS")?;
        }

        // Generation settings
        if let Ok(val) = std::env::var("LESSONFORGE_MAX_QUESTIONS") {
            config.max_questions = parse_env_value(&val, "LESSONFORGE_MAX_QUESTIONS")?;
        }

        if let Ok(val) = std::env::var("LESSONFORGE_SHUFFLE_SEED") {
            if !val.trim().is_empty() {
                config.shuffle_seed = Some(parse_env_value(val.trim(), "LESSONFORGE_SHUFFLE_SEED")?);
            }
        }

        // Storage settings
        if let Ok(val) = std::env::var("LESSONFORGE_DATABASE") {
            config.database_path = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("LESSONFORGE_COURSE_LANGUAGE") {
            config.course_language = val;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, temperature) in [
            ("generator_temperature", self.generator_temperature),
            ("verifier_temperature", self.verifier_temperature),
            ("editor_temperature", self.editor_temperature),
        ] {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ConfigError::ValidationFailed(format!(
                    "{} must be between 0.0 and 2.0",
                    name
                )));
            }
        }

        if self.max_tokens == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_tokens must be greater than 0".to_string(),
            ));
        }

        if self.max_questions == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_questions must be at least 1".to_string(),
            ));
        }

        if self.database_path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "database_path cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Agent settings for the question generator.
    pub fn generator_agent(&self) -> AgentConfig {
        AgentConfig::generator()
            .with_model(self.generator_model.clone())
            .with_temperature(self.generator_temperature)
            .with_max_tokens(self.max_tokens)
    }

    /// Agent settings shared by the three verifiers.
    pub fn verifier_agent(&self) -> AgentConfig {
        AgentConfig::verifier()
            .with_model(self.verifier_model.clone())
            .with_temperature(self.verifier_temperature)
            .with_max_tokens(self.max_tokens)
    }

    /// Agent settings for the text editor.
    pub fn editor_agent(&self) -> AgentConfig {
        AgentConfig::editor()
            .with_model(self.editor_model.clone())
            .with_temperature(self.editor_temperature)
            .with_max_tokens(self.max_tokens)
    }

    /// Builder method to use one model for every agent.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        self.generator_model = model.clone();
        self.verifier_model = model.clone();
        self.editor_model = model;
        self
    }

    /// Builder method to set the generator temperature.
    pub fn with_generator_temperature(mut self, temp: f64) -> Self {
        self.generator_temperature = temp;
        self
    }

    /// Builder method to set the per-request question cap.
    pub fn with_max_questions(mut self, max: usize) -> Self {
        self.max_questions = max;
        self
    }

    /// Builder method to set the shuffle seed.
    pub fn with_shuffle_seed(mut self, seed: Option<u64>) -> Self {
        self.shuffle_seed = seed;
        self
    }

    /// Builder method to set the block store path.
    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = path.into();
        self
    }
}

/// Parse an environment variable value into a type.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}
