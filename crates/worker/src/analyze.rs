//! AI analysis of channel metrics via an OpenAI-compatible chat endpoint.

use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use bi_core::{Error, Result};
use report::ChannelMetricsDoc;

const SYSTEM_PROMPT: &str = "You are a marketing analyst. Given monthly channel metrics \
    (visits, conversions, clicks, cost per period), produce a short plain-text summary of \
    the notable changes and two or three concrete recommendations.";

/// AI endpoint configuration.
#[derive(Debug, Clone, serde::Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
}

fn default_api_url() -> String {
    "https://ollama.com/api".to_string()
}

fn default_model() -> String {
    "glm-4.6".to_string()
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: String::new(),
            model: default_model(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

/// Chat-completions client for metrics analysis.
pub struct AiClient {
    http: reqwest::Client,
    config: AiConfig,
}

impl AiClient {
    pub fn new(config: AiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| Error::internal(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Whether a credential is configured.
    pub fn is_configured(&self) -> bool {
        !self.config.api_key.is_empty()
    }

    /// Produces an analysis summary for the given channel metrics.
    pub async fn analyze(&self, metrics: &ChannelMetricsDoc) -> Result<String> {
        if !self.is_configured() {
            return Err(Error::validation("AI analysis is not configured"));
        }

        let url = format!("{}/chat/completions", self.config.api_url.trim_end_matches('/'));
        let body = json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": serde_json::to_string(metrics)?},
            ],
        });

        debug!(project_id = metrics.project_id, model = %self.config.model, "Requesting AI analysis");

        let resp = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::internal(format!("AI endpoint unreachable: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::internal(format!(
                "AI endpoint returned {status}: {text}"
            )));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| Error::internal(format!("invalid AI response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .filter(|content| !content.is_empty())
            .ok_or_else(|| Error::internal("AI response contained no choices"))
    }
}
