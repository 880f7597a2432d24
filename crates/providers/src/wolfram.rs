use crate::consts;
use async_trait::async_trait;
use globo_core::types::VisualizationImage;
use globo_core::{BackendError, Visualization};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct QueryResponse {
    queryresult: QueryResult,
}

#[derive(Debug, Default, Deserialize)]
struct QueryResult {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    pods: Vec<Pod>,
}

#[derive(Debug, Deserialize)]
struct Pod {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    subpods: Vec<SubPod>,
}

#[derive(Debug, Deserialize)]
struct SubPod {
    #[serde(default)]
    img: Option<PodImage>,
}

#[derive(Debug, Deserialize)]
struct PodImage {
    src: String,
    #[serde(default)]
    alt: Option<String>,
}

/// Renders visualization queries through the WolframAlpha full results API.
pub struct WolframVisualizer {
    client: Client,
    base_url: String,
    app_id: SecretString,
}

impl WolframVisualizer {
    pub fn new(app_id: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: consts::WOLFRAM_BASE_URL.to_string(),
            app_id: SecretString::from(app_id.to_string()),
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

/// First image found in the result pods, in pod order.
fn first_image(result: QueryResult) -> Option<VisualizationImage> {
    result.pods.into_iter().find_map(|pod| {
        let title = pod.title;
        pod.subpods
            .into_iter()
            .filter_map(|subpod| subpod.img)
            .find(|img| !img.src.is_empty())
            .map(|img| VisualizationImage {
                url: img.src,
                alt: img.alt.or(title.clone()),
            })
    })
}

#[async_trait]
impl Visualization for WolframVisualizer {
    async fn visualize(&self, query: &str) -> Result<VisualizationImage, BackendError> {
        tracing::debug!("Requesting visualization for {:?}", query);
        let response = self
            .client
            .get(format!("{}/v2/query", self.base_url))
            .query(&[
                ("input", query),
                ("appid", self.app_id.expose_secret()),
                ("output", "json"),
            ])
            .send()
            .await
            .map_err(|e| BackendError::Transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Transient(format!(
                "WolframAlpha API error: {status}"
            )));
        }

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Malformed(e.to_string()))?;
        if !parsed.queryresult.success {
            return Err(BackendError::Malformed(format!(
                "WolframAlpha could not interpret {query:?}"
            )));
        }
        first_image(parsed.queryresult)
            .ok_or_else(|| BackendError::Malformed("WolframAlpha returned no image".to_string()))
    }
}
