use crate::consts;
use async_trait::async_trait;
use globo_core::types::audio::NARRATION_PCM16_SAMPLE_RATE;
use globo_core::types::{AudioClip, VoiceProfile};
use globo_core::{Narration, NarrationError};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};

/// Text-to-speech through the ElevenLabs API, returned as raw 24 kHz PCM16.
pub struct ElevenLabsNarrator {
    client: Client,
    base_url: String,
    api_key: SecretString,
}

impl ElevenLabsNarrator {
    pub fn new(api_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: consts::ELEVENLABS_BASE_URL.to_string(),
            api_key: SecretString::from(api_key.to_string()),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_http_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }
}

/// Pulls the human readable part out of an error body. `detail` is either a
/// string or an object carrying `message`.
fn error_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        Value::String(detail) => Some(detail.clone()),
        detail => detail
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

#[async_trait]
impl Narration for ElevenLabsNarrator {
    async fn narrate(&self, text: &str, voice: &VoiceProfile) -> Result<AudioClip, NarrationError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(NarrationError::EmptyInput);
        }

        tracing::debug!(
            "Requesting narration of {} characters with voice {}",
            text.chars().count(),
            voice.voice_id
        );
        let response = self
            .client
            .post(format!(
                "{}/v1/text-to-speech/{}",
                self.base_url, voice.voice_id
            ))
            .query(&[("output_format", consts::ELEVENLABS_OUTPUT_FORMAT)])
            .header(consts::ELEVENLABS_KEY_HEADER, self.api_key.expose_secret())
            .json(&json!({
                "text": text,
                "voice_settings": {
                    "stability": voice.stability,
                    "similarity_boost": voice.similarity_boost,
                },
            }))
            .send()
            .await
            .map_err(|e| NarrationError::Service(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_detail(&body)
                .unwrap_or_else(|| format!("ElevenLabs API error: {}", status.as_u16()));
            tracing::error!("ElevenLabs API error ({}): {}", status, message);
            return Err(NarrationError::Service(message));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| NarrationError::Service(e.to_string()))?;
        Ok(AudioClip::pcm16(bytes.to_vec(), NARRATION_PCM16_SAMPLE_RATE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use axum::Router;
    use axum::extract::{Path, Query};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use std::collections::HashMap;

    fn voice() -> VoiceProfile {
        VoiceProfile {
            voice_id: "voice-es".to_string(),
            stability: 0.5,
            similarity_boost: 0.5,
            playback_rate: 0.95,
            volume: 0.9,
        }
    }

    #[tokio::test]
    async fn blank_text_never_reaches_the_service() {
        let narrator = ElevenLabsNarrator::new("key").with_base_url("http://127.0.0.1:9");
        assert_eq!(
            narrator.narrate("  \t", &voice()).await,
            Err(NarrationError::EmptyInput)
        );
    }

    #[tokio::test]
    async fn narration_returns_the_pcm_body() {
        let app = Router::new().route(
            "/v1/text-to-speech/{voice_id}",
            post(
                |Path(voice_id): Path<String>,
                 Query(params): Query<HashMap<String, String>>,
                 headers: HeaderMap,
                 axum::Json(body): axum::Json<Value>| async move {
                    assert_eq!(voice_id, "voice-es");
                    assert_eq!(params["output_format"], "pcm_24000");
                    assert_eq!(headers["xi-api-key"], "key");
                    assert_eq!(body["text"], "Hola");
                    assert_eq!(body["voice_settings"]["stability"], 0.5);
                    vec![1u8, 0, 2, 0]
                },
            ),
        );
        let base_url = testing::serve(app).await;
        let narrator = ElevenLabsNarrator::new("key")
            .with_base_url(&base_url)
            .with_http_client(testing::client());

        let clip = narrator.narrate(" Hola ", &voice()).await.unwrap();
        assert_eq!(clip.bytes, vec![1, 0, 2, 0]);
        assert_eq!(clip.sample_rate(), 24_000);
    }

    #[tokio::test]
    async fn service_errors_surface_the_detail() {
        let app = Router::new().route(
            "/v1/text-to-speech/{voice_id}",
            post(|| async {
                (
                    StatusCode::UNAUTHORIZED,
                    axum::Json(json!({ "detail": { "status": "invalid_api_key", "message": "Invalid API key" } })),
                )
            }),
        );
        let base_url = testing::serve(app).await;
        let narrator = ElevenLabsNarrator::new("key")
            .with_base_url(&base_url)
            .with_http_client(testing::client());

        assert_eq!(
            narrator.narrate("Hola", &voice()).await,
            Err(NarrationError::Service("Invalid API key".to_string()))
        );
    }

    #[test]
    fn plain_string_details_are_used_verbatim() {
        assert_eq!(
            error_detail(r#"{"detail":"voice not found"}"#).as_deref(),
            Some("voice not found")
        );
        assert_eq!(error_detail("not json"), None);
    }
}
