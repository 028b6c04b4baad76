use serde::Deserialize;

use crate::types::{ChatMessage, SYSTEM_PROMPT};
use crate::{AssistantError, Result};

const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 2048;

/// An Anthropic-style `/v1/messages` endpoint.
#[derive(Debug, Clone)]
pub struct RemoteBackend {
    endpoint: String,
    model: String,
    api_key_env: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessagesResponse {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl MessagesResponse {
    pub(crate) fn text(&self) -> String {
        self.content
            .iter()
            .filter(|b| b.kind == "text")
            .filter_map(|b| b.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl RemoteBackend {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key_env: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            api_key_env: api_key_env.into(),
            client: reqwest::Client::new(),
        }
    }

    fn api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AssistantError::MissingCredentials(self.api_key_env.clone()))
    }

    pub async fn complete(&self, history: &[ChatMessage]) -> Result<String> {
        let key = self.api_key()?;
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "system": SYSTEM_PROMPT,
            "messages": history,
        });
        tracing::info!(endpoint = %self.endpoint, model = %self.model, "asking remote assistant");

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AssistantError::Protocol(format!("{status}: {}", text.trim())));
        }

        let parsed: MessagesResponse = response.json().await?;
        let text = parsed.text();
        if text.trim().is_empty() {
            return Err(AssistantError::Protocol("reply had no text".into()));
        }
        Ok(text)
    }
}
