use crate::config::Config;
use crate::consts;
use crate::stats::Stats;
use async_trait::async_trait;
use globo_core::locale;
use globo_core::types::{ChatReply, ContextEntry, MessageContent, Mode};
use globo_core::{BackendError, ChatCompletion, CredentialCheck, CredentialStatus, ModelCatalog};
use reqwest::{Client, StatusCode};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Deserialize)]
struct LlmResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: u64,
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

/// System prompts sent ahead of every turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    standard: String,
    developer: String,
    math_focus: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            standard: locale::system_prompt(Mode::Standard).to_string(),
            developer: locale::system_prompt(Mode::Developer).to_string(),
            math_focus: locale::MATH_FOCUS_PROMPT.to_string(),
        }
    }
}

impl PromptSet {
    /// Replaces the prompts named `standard`, `developer` or `math_focus` in `prompts`.
    pub fn with_overrides(mut self, prompts: &HashMap<String, String>) -> Self {
        if let Some(prompt) = prompts.get("standard") {
            self.standard = prompt.clone();
        }
        if let Some(prompt) = prompts.get("developer") {
            self.developer = prompt.clone();
        }
        if let Some(prompt) = prompts.get("math_focus") {
            self.math_focus = prompt.clone();
        }
        self
    }

    pub fn persona(&self, mode: Mode) -> &str {
        match mode {
            Mode::Standard => &self.standard,
            Mode::Developer => &self.developer,
        }
    }

    pub fn math_focus(&self) -> &str {
        &self.math_focus
    }
}

/// Chat completion client for the tutoring conversation and the diagnostics.
pub struct OpenAiChat {
    client: Client,
    config: Config,
    prompts: PromptSet,
    stats: Mutex<Stats>,
}

impl OpenAiChat {
    pub fn new(config: Config) -> Self {
        Self {
            client: Client::new(),
            config,
            prompts: PromptSet::default(),
            stats: Mutex::new(Stats::default()),
        }
    }

    pub fn with_prompts(mut self, prompts: PromptSet) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_http_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn stats(&self) -> Stats {
        *self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Like [`ChatCompletion::complete`] with an explicit completion budget.
    pub async fn complete_with_limit(
        &self,
        content: &MessageContent,
        mode: Mode,
        context: &[ContextEntry],
        max_tokens: Option<u32>,
    ) -> Result<ChatReply, BackendError> {
        let body = self.request_body(content, mode, context, max_tokens);
        tracing::debug!(
            "Requesting chat completion from {} ({} context entries)",
            body["model"],
            context.len()
        );
        let response = self.post_completion(&body).await?;
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| BackendError::Malformed("No response from OpenAI".to_string()))?;
        Ok(ChatReply::text(&content))
    }

    fn request_body(
        &self,
        content: &MessageContent,
        mode: Mode,
        context: &[ContextEntry],
        max_tokens: Option<u32>,
    ) -> Value {
        let mut messages = vec![
            json!({ "role": "system", "content": self.prompts.persona(mode) }),
            json!({ "role": "system", "content": self.prompts.math_focus() }),
        ];
        messages.extend(
            context
                .iter()
                .map(|entry| json!({ "role": entry.role, "content": entry.content })),
        );

        let (model, default_max_tokens, user) = match content {
            MessageContent::Text(text) => (
                self.config.chat_model(),
                consts::TEXT_MAX_TOKENS,
                json!(text.trim()),
            ),
            MessageContent::Image(url) => (
                self.config.vision_model(),
                consts::IMAGE_MAX_TOKENS,
                json!([
                    { "type": "text", "text": locale::image_instruction(mode) },
                    { "type": "image_url", "image_url": { "url": url, "detail": "auto" } }
                ]),
            ),
        };
        messages.push(json!({ "role": "user", "content": user }));

        json!({
            "model": model,
            "messages": messages,
            "temperature": consts::TEMPERATURE,
            "max_tokens": max_tokens.unwrap_or(default_max_tokens),
        })
    }

    async fn post_completion(&self, body: &Value) -> Result<LlmResponse, BackendError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url()))
            .bearer_auth(self.config.api_key().expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| BackendError::Transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let err = map_error(status, &text);
            tracing::warn!("Chat completion failed with {}: {}", status, err);
            return Err(err);
        }

        let parsed: LlmResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Malformed(e.to_string()))?;
        if let Some(usage) = parsed.usage.as_ref() {
            self.stats
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .update_usage(usage.total_tokens, usage.prompt_tokens, usage.completion_tokens);
        }
        Ok(parsed)
    }
}

/// Classifies a failed response by status and the provider's error code.
fn map_error(status: StatusCode, body: &str) -> BackendError {
    let detail = serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.error)
        .ok();
    let code = detail.as_ref().and_then(|d| d.code.as_deref());
    let message = detail
        .as_ref()
        .and_then(|d| d.message.clone())
        .unwrap_or_else(|| format!("OpenAI API error: {status}"));

    if status == StatusCode::TOO_MANY_REQUESTS || code == Some("rate_limit_exceeded") {
        BackendError::RateLimited
    } else if status == StatusCode::UNAUTHORIZED || code == Some("invalid_api_key") {
        BackendError::InvalidCredential(message)
    } else {
        BackendError::Transient(message)
    }
}

#[async_trait]
impl ChatCompletion for OpenAiChat {
    async fn complete(
        &self,
        content: &MessageContent,
        mode: Mode,
        context: &[ContextEntry],
    ) -> Result<ChatReply, BackendError> {
        self.complete_with_limit(content, mode, context, None).await
    }
}

#[async_trait]
impl ModelCatalog for OpenAiChat {
    async fn list_models(&self) -> Result<Vec<String>, BackendError> {
        let response = self
            .client
            .get(format!("{}/models", self.config.base_url()))
            .bearer_auth(self.config.api_key().expose_secret())
            .send()
            .await
            .map_err(|e| BackendError::Transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(map_error(status, &text));
        }

        let list: ModelList = response
            .json()
            .await
            .map_err(|e| BackendError::Malformed(e.to_string()))?;
        let mut models: Vec<String> = list
            .data
            .into_iter()
            .map(|m| m.id)
            .filter(|id| id.starts_with(consts::MODEL_PREFIX))
            .collect();
        models.sort();
        Ok(models)
    }
}

#[async_trait]
impl CredentialCheck for OpenAiChat {
    async fn check_credential(&self) -> Result<CredentialStatus, BackendError> {
        let body = json!({
            "model": self.config.chat_model(),
            "messages": [{ "role": "user", "content": consts::CREDENTIAL_CHECK_PROMPT }],
            "max_tokens": consts::CREDENTIAL_CHECK_MAX_TOKENS,
        });
        match self.post_completion(&body).await {
            Ok(response) if response.choices.is_empty() => Err(BackendError::Malformed(
                "No response from OpenAI".to_string(),
            )),
            Ok(_) => Ok(CredentialStatus {
                valid: true,
                message: "OpenAI API key is valid and working".to_string(),
            }),
            Err(BackendError::InvalidCredential(message)) => Ok(CredentialStatus {
                valid: false,
                message: format!("OpenAI API Error: {message}"),
            }),
            Err(e) => Err(e),
        }
    }
}
