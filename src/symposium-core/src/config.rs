//! Configuration module for loading TOML config files.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::DebateError;
use crate::retry::{DEFAULT_MAX_ATTEMPTS, RetryPolicy};
use crate::session::SessionConfig;
use crate::speaker::SpeakerSpec;

/// Root configuration structure. Every section is optional.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub debate: DebateSettings,
    #[serde(default)]
    pub inference: InferenceSettings,
    #[serde(default = "default_speakers")]
    pub speakers: Vec<SpeakerSpec>,
}

/// The `[debate]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DebateSettings {
    pub topic: String,
    pub rounds: u32,
    pub analyze_turns: bool,
}

impl Default for DebateSettings {
    fn default() -> Self {
        Self {
            topic: "What is the true source of human morality?".to_string(),
            rounds: 4,
            analyze_turns: true,
        }
    }
}

/// The `[inference]` section: where the model lives and how calls behave.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InferenceSettings {
    pub api_base: String,
    pub api_key: Option<String>,
    pub model: String,
    pub moderator_model: Option<String>,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:11434/v1".to_string(),
            api_key: None,
            model: "gpt-oss".to_string(),
            moderator_model: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay_ms: 0,
            request_timeout_secs: 120,
            connect_timeout_secs: 30,
        }
    }
}

impl InferenceSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts).with_delay(Duration::from_millis(self.retry_delay_ms))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DebateError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| DebateError::ConfigError(format!("Failed to read config: {}", e)))?;

        Self::from_toml(&content)
    }

    /// Load configuration from string content.
    pub fn from_toml(content: &str) -> Result<Self, DebateError> {
        toml::from_str(content)
            .map_err(|e| DebateError::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Session settings derived from this configuration.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::new(self.debate.topic.clone(), self.debate.rounds)
            .with_analysis(self.debate.analyze_turns)
            .with_retry(self.inference.retry_policy())
            .with_moderator_model(self.inference.moderator_model.clone())
    }

    /// Parse a `Name=stance` command-line speaker.
    pub fn parse_speaker(arg: &str) -> Result<SpeakerSpec, DebateError> {
        match arg.split_once('=') {
            Some((name, stance)) if !stance.trim().is_empty() => {
                Ok(SpeakerSpec::new(name.trim(), stance.trim()))
            }
            _ => Err(DebateError::ConfigError(format!(
                "Invalid speaker '{}': expected NAME=STANCE",
                arg
            ))),
        }
    }
}

fn default_speakers() -> Vec<SpeakerSpec> {
    vec![
        SpeakerSpec::new("Plato", "idealism and forms"),
        SpeakerSpec::new("Nietzsche", "existentialism and will to power"),
        SpeakerSpec::new("Kant", "categorical imperative and ethics"),
    ]
}

/// Default configuration embedded in the binary.
pub fn default_config() -> Config {
    Config {
        debate: DebateSettings::default(),
        inference: InferenceSettings::default(),
        speakers: default_speakers(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speaker::Roster;

    #[test]
    fn test_default_config_is_a_valid_debate() {
        let config = default_config();
        assert!(config.session_config().validate().is_ok());
        assert_eq!(Roster::new(config.speakers.clone()).unwrap().len(), 3);
        assert_eq!(config.inference.api_base, "http://localhost:11434/v1");
        assert_eq!(config.inference.retry_policy(), RetryPolicy::new(3));
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.debate.rounds, 4);
        assert_eq!(config.speakers, default_config().speakers);
    }

    #[test]
    fn test_full_file() {
        let config = Config::from_toml(
            r#"
            [debate]
            topic = "Is the unexamined life worth living?"
            rounds = 6
            analyze_turns = false

            [inference]
            api_base = "https://api.openai.com/v1"
            model = "gpt-4o-mini"
            moderator_model = "gpt-4o"
            max_attempts = 5
            retry_delay_ms = 250

            [[speakers]]
            name = "Socrates"
            stance = "the Socratic method"

            [[speakers]]
            name = "Diogenes"
            stance = "cynicism"
            model = "llama3"
            system_prompt = "You are {name}, living in a barrel."
            "#,
        )
        .unwrap();

        assert_eq!(config.debate.rounds, 6);
        assert_eq!(config.inference.model, "gpt-4o-mini");
        assert_eq!(config.inference.request_timeout_secs, 120);
        assert_eq!(config.speakers.len(), 2);
        assert_eq!(config.speakers[1].model.as_deref(), Some("llama3"));

        let session = config.session_config();
        assert!(!session.analyze_turns);
        assert_eq!(session.moderator_model.as_deref(), Some("gpt-4o"));
        assert_eq!(
            session.retry,
            RetryPolicy::new(5).with_delay(Duration::from_millis(250))
        );
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = Config::from_toml("[debate]\nrounds = \"many\"").unwrap_err();
        assert!(matches!(err, DebateError::ConfigError(msg) if msg.contains("Failed to parse")));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load("/nonexistent/symposium.toml").unwrap_err();
        assert!(matches!(err, DebateError::ConfigError(msg) if msg.contains("Failed to read")));
    }

    #[test]
    fn test_parse_speaker() {
        let spec = Config::parse_speaker(" Hume = empiricism ").unwrap();
        assert_eq!(spec, SpeakerSpec::new("Hume", "empiricism"));
        assert!(Config::parse_speaker("Hume").is_err());
        assert!(Config::parse_speaker("Hume=").is_err());
    }
}
