use std::net::SocketAddr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub chat_model: String,
    pub vision_model: String,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables, after reading `.env` if present.
    ///
    /// *   `BIND_ADDRESS`: address to listen on. Defaults to "0.0.0.0:3000".
    /// *   `OPENAI_API_KEY`: required.
    /// *   `OPENAI_BASE_URL`, `CHAT_MODEL`, `VISION_MODEL`: optional overrides.
    /// *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_address_str =
            lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let openai_api_key = lookup("OPENAI_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                ConfigError::MissingVar("OPENAI_API_KEY must be set for the relay".to_string())
            })?;

        let openai_base_url = lookup("OPENAI_BASE_URL")
            .unwrap_or_else(|| globo_providers::consts::BASE_URL.to_string());
        let chat_model = lookup("CHAT_MODEL")
            .unwrap_or_else(|| globo_providers::consts::DEFAULT_CHAT_MODEL.to_string());
        let vision_model = lookup("VISION_MODEL")
            .unwrap_or_else(|| globo_providers::consts::DEFAULT_VISION_MODEL.to_string());

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            openai_api_key,
            openai_base_url,
            chat_model,
            vision_model,
            log_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_address_defaults_and_validates() {
        let config = Config::from_lookup(|key| (key == "OPENAI_API_KEY").then(|| "sk-test".to_string()))
            .unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:3000".parse().unwrap());

        let err = Config::from_lookup(|key| match key {
            "OPENAI_API_KEY" => Some("sk-test".to_string()),
            "BIND_ADDRESS" => Some("localhost".to_string()),
            _ => None,
        })
        .err()
        .unwrap();
        assert!(matches!(err, ConfigError::InvalidValue(var, _) if var == "BIND_ADDRESS"));
    }

    #[test]
    fn the_openai_key_is_required() {
        assert!(matches!(
            Config::from_lookup(|_| None),
            Err(ConfigError::MissingVar(_))
        ));
    }
}
