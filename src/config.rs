use crate::error::{AssistantError, Result};
use crate::period::{today_in, REFERENCE_TIMEZONE};
use chrono::NaiveDate;
use chrono_tz::Tz;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";

/// Runtime settings for a [`crate::QueryAssistant`] and its model client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AssistantConfig {
    #[schemars(description = "Model that turns a question into a JSON tool plan")]
    pub router_model: String,

    #[schemars(description = "Model that phrases tool results as an answer")]
    pub narrator_model: String,

    #[schemars(description = "Model used for the summary fallback when no tool fits")]
    pub fallback_model: String,

    #[schemars(description = "IANA timezone whose calendar date anchors relative periods")]
    pub timezone: String,

    #[schemars(description = "Base URL of an OpenAI-compatible chat completions API")]
    pub api_base_url: String,

    #[schemars(description = "Completion token limit per model call")]
    pub max_tokens: u32,

    #[schemars(description = "Sampling temperature, 0.0 to 2.0")]
    pub temperature: f64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            router_model: DEFAULT_MODEL.to_string(),
            narrator_model: DEFAULT_MODEL.to_string(),
            fallback_model: DEFAULT_MODEL.to_string(),
            timezone: REFERENCE_TIMEZONE.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            max_tokens: 1000,
            temperature: 0.7,
        }
    }
}

impl AssistantConfig {
    /// Missing keys take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `ASSISTANT_*` and `OPENAI_BASE_URL` variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let set = |target: &mut String, key: &str| {
            if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
                *target = value.trim().to_string();
            }
        };
        set(&mut config.router_model, "ASSISTANT_ROUTER_MODEL");
        set(&mut config.narrator_model, "ASSISTANT_NARRATOR_MODEL");
        set(&mut config.fallback_model, "ASSISTANT_FALLBACK_MODEL");
        set(&mut config.timezone, "ASSISTANT_TIMEZONE");
        set(&mut config.api_base_url, "OPENAI_BASE_URL");
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, model) in [
            ("router_model", &self.router_model),
            ("narrator_model", &self.narrator_model),
            ("fallback_model", &self.fallback_model),
        ] {
            if model.trim().is_empty() {
                return Err(AssistantError::InvalidConfig(format!("{} is empty", name)));
            }
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(AssistantError::InvalidConfig(format!(
                "temperature {} outside 0.0..=2.0",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(AssistantError::InvalidConfig(
                "max_tokens must be positive".to_string(),
            ));
        }
        self.tz()?;
        Ok(())
    }

    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| AssistantError::UnknownTimezone(self.timezone.clone()))
    }

    /// Today's date in the configured timezone.
    pub fn today(&self) -> Result<NaiveDate> {
        Ok(today_in(self.tz()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = AssistantConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tz().unwrap(), chrono_tz::Europe::Helsinki);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config =
            AssistantConfig::from_json_str(r#"{"narrator_model": "gpt-4o", "temperature": 0.2}"#)
                .unwrap();
        assert_eq!(config.narrator_model, "gpt-4o");
        assert_eq!(config.router_model, DEFAULT_MODEL);
        assert_eq!(config.timezone, "Europe/Helsinki");
    }

    #[test]
    fn test_unknown_timezone_rejected() {
        let err = AssistantConfig::from_json_str(r#"{"timezone": "Mars/Olympus"}"#).unwrap_err();
        assert!(matches!(err, AssistantError::UnknownTimezone(tz) if tz == "Mars/Olympus"));
    }

    #[test]
    fn test_bad_temperature_rejected() {
        let err = AssistantConfig::from_json_str(r#"{"temperature": 3.5}"#).unwrap_err();
        assert!(matches!(err, AssistantError::InvalidConfig(_)));
    }

    #[test]
    fn test_env_lookup_overrides() {
        let vars: HashMap<&str, &str> = [
            ("ASSISTANT_ROUTER_MODEL", "router-x"),
            ("ASSISTANT_TIMEZONE", "UTC"),
            ("ASSISTANT_NARRATOR_MODEL", "   "),
        ]
        .into_iter()
        .collect();
        let config =
            AssistantConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();
        assert_eq!(config.router_model, "router-x");
        assert_eq!(config.narrator_model, DEFAULT_MODEL);
        assert_eq!(config.tz().unwrap(), chrono_tz::UTC);
    }
}
