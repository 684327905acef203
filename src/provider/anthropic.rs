// src/provider/anthropic.rs — Anthropic Messages API provider

use async_trait::async_trait;

use super::{status_error, transport_error, GenerationParams, TextGenerator};
use crate::infra::errors::TimeslipError;
use crate::util::http_client;

const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";

pub struct AnthropicProvider {
    api_key: String,
    client: reqwest::Client,
    api_url: String,
    params: GenerationParams,
}

impl AnthropicProvider {
    pub fn new(api_key: String, params: GenerationParams) -> Self {
        Self {
            api_key,
            client: http_client(params.timeout),
            api_url: DEFAULT_API_URL.into(),
            params,
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    fn build_request_body(&self, prompt: &str) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.params.model,
            "messages": [{ "role": "user", "content": prompt }],
            "max_tokens": self.params.max_tokens,
            "temperature": self.params.temperature,
        });

        if let Some(system) = &self.params.system {
            body["system"] = serde_json::json!(system);
        }

        body
    }
}

/// Concatenate the text blocks of a Messages API response.
fn extract_text(resp: &serde_json::Value) -> String {
    resp["content"]
        .as_array()
        .map(|blocks| {
            blocks
                .iter()
                .filter(|c| c["type"] == "text")
                .filter_map(|c| c["text"].as_str())
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

#[async_trait]
impl TextGenerator for AnthropicProvider {
    fn id(&self) -> &str {
        "anthropic"
    }

    async fn generate(&self, prompt: &str) -> Result<String, TimeslipError> {
        let body = self.build_request_body(prompt);

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("anthropic", e))?;

        if !response.status().is_success() {
            return Err(status_error("anthropic", response).await);
        }

        let resp: serde_json::Value =
            response.json().await.map_err(|e| TimeslipError::Provider {
                provider: "anthropic".into(),
                message: format!("Failed to parse response: {}", e),
                retriable: false,
            })?;

        Ok(extract_text(&resp))
    }
}
