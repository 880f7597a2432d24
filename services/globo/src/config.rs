//! Application configuration for the `globo` front end.
//!
//! Settings come from environment variables, optionally seeded from a `.env` file.

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// Holds all configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub chat_model: String,
    pub vision_model: String,
    pub wolfram_app_id: Option<String>,
    pub elevenlabs_api_key: Option<String>,
    pub voice_id: String,
    pub voice_id_en: String,
    pub output_device: Option<String>,
    pub history_path: PathBuf,
    pub prompts_dir: PathBuf,
    pub audio_settle: Duration,
    pub log_level: Level,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    /// Loads configuration from the process environment.
    ///
    /// * `OPENAI_API_KEY`: required.
    /// * `OPENAI_BASE_URL`, `CHAT_MODEL`, `VISION_MODEL`: chat endpoint and models.
    /// * `WOLFRAM_APP_ID`: enables visualizations when set.
    /// * `ELEVENLABS_API_KEY`: enables narration when set. `ELEVENLABS_VOICE_ID` and
    ///   `ELEVENLABS_VOICE_ID_EN` pick the Spanish and English voices.
    /// * `OUTPUT_DEVICE`: output device name, the default device otherwise.
    /// * `GLOBO_HISTORY_PATH`, `GLOBO_PROMPTS_DIR`, `AUDIO_SETTLE_MS`, `RUST_LOG`.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let openai_api_key =
            var("OPENAI_API_KEY").ok_or_else(|| ConfigError::MissingVar("OPENAI_API_KEY".to_string()))?;
        let openai_base_url = var("OPENAI_BASE_URL")
            .unwrap_or_else(|| globo_providers::consts::BASE_URL.to_string());
        let chat_model = var("CHAT_MODEL")
            .unwrap_or_else(|| globo_providers::consts::DEFAULT_CHAT_MODEL.to_string());
        let vision_model = var("VISION_MODEL")
            .unwrap_or_else(|| globo_providers::consts::DEFAULT_VISION_MODEL.to_string());

        let voice_id = var("ELEVENLABS_VOICE_ID")
            .unwrap_or_else(|| globo_core::locale::DEFAULT_VOICE_ID.to_string());
        let voice_id_en = var("ELEVENLABS_VOICE_ID_EN").unwrap_or_else(|| voice_id.clone());

        let settle_ms = match var("AUDIO_SETTLE_MS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|e| ConfigError::InvalidValue("AUDIO_SETTLE_MS".to_string(), e.to_string()))?,
            None => 100,
        };

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            openai_api_key,
            openai_base_url,
            chat_model,
            vision_model,
            wolfram_app_id: var("WOLFRAM_APP_ID"),
            elevenlabs_api_key: var("ELEVENLABS_API_KEY"),
            voice_id,
            voice_id_en,
            output_device: var("OUTPUT_DEVICE"),
            history_path: var("GLOBO_HISTORY_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".globo_history.json")),
            prompts_dir: var("GLOBO_PROMPTS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("prompts")),
            audio_settle: Duration::from_millis(settle_ms),
            log_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_fill_in_optional_settings() {
        let config = Config::from_lookup(lookup(&[("OPENAI_API_KEY", "sk-test")])).unwrap();

        assert_eq!(config.chat_model, "gpt-4o");
        assert_eq!(config.openai_base_url, "https://api.openai.com/v1");
        assert_eq!(config.voice_id, globo_core::locale::DEFAULT_VOICE_ID);
        assert_eq!(config.voice_id_en, config.voice_id);
        assert_eq!(config.audio_settle, Duration::from_millis(100));
        assert_eq!(config.history_path, PathBuf::from(".globo_history.json"));
        assert_eq!(config.log_level, Level::INFO);
        assert!(config.wolfram_app_id.is_none());
        assert!(config.elevenlabs_api_key.is_none());
    }

    #[test]
    fn missing_openai_key_is_an_error() {
        let err = Config::from_lookup(lookup(&[("OPENAI_API_KEY", "  ")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(var) if var == "OPENAI_API_KEY"));
    }

    #[test]
    fn invalid_values_are_reported() {
        let err = Config::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("AUDIO_SETTLE_MS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(var, _) if var == "AUDIO_SETTLE_MS"));

        let err = Config::from_lookup(lookup(&[("OPENAI_API_KEY", "sk-test"), ("RUST_LOG", "loud")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(var, _) if var == "RUST_LOG"));
    }

    #[test]
    fn english_voice_can_be_overridden() {
        let config = Config::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("ELEVENLABS_VOICE_ID", "es-voice"),
            ("ELEVENLABS_VOICE_ID_EN", "en-voice"),
        ]))
        .unwrap();
        assert_eq!(config.voice_id, "es-voice");
        assert_eq!(config.voice_id_en, "en-voice");
    }
}
