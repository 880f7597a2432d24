use crate::consts;
use secrecy::SecretString;

/// Connection settings for the OpenAI-compatible chat endpoint.
#[derive(Debug)]
pub struct Config {
    base_url: String,
    api_key: SecretString,
    chat_model: String,
    vision_model: String,
}

pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.config.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.config.api_key = SecretString::from(api_key.to_string());
        self
    }

    pub fn with_chat_model(mut self, model: &str) -> Self {
        self.config.chat_model = model.to_string();
        self
    }

    pub fn with_vision_model(mut self, model: &str) -> Self {
        self.config.vision_model = model.to_string();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Defaults, with the key taken from `OPENAI_API_KEY` when it is set.
    pub fn new() -> Self {
        Self {
            base_url: consts::BASE_URL.to_string(),
            api_key: std::env::var(consts::OPENAI_API_KEY)
                .unwrap_or_default()
                .into(),
            chat_model: consts::DEFAULT_CHAT_MODEL.to_string(),
            vision_model: consts::DEFAULT_VISION_MODEL.to_string(),
        }
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> &SecretString {
        &self.api_key
    }

    pub fn chat_model(&self) -> &str {
        &self.chat_model
    }

    pub fn vision_model(&self) -> &str {
        &self.vision_model
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
