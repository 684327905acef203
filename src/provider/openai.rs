// src/provider/openai.rs — OpenAI-compatible Chat Completions provider

use async_trait::async_trait;

use super::{status_error, transport_error, GenerationParams, TextGenerator};
use crate::infra::errors::TimeslipError;
use crate::util::http_client;

pub struct OpenAIProvider {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
    params: GenerationParams,
}

impl OpenAIProvider {
    pub fn new(api_key: String, params: GenerationParams) -> Self {
        Self::with_base_url(api_key, "https://api.openai.com/v1".into(), params)
    }

    pub fn with_base_url(api_key: String, base_url: String, params: GenerationParams) -> Self {
        Self {
            api_key,
            client: http_client(params.timeout),
            base_url: base_url.trim_end_matches('/').to_string(),
            params,
        }
    }

    fn build_request_body(&self, prompt: &str) -> serde_json::Value {
        let mut messages = Vec::new();
        if let Some(system) = &self.params.system {
            messages.push(serde_json::json!({ "role": "system", "content": system }));
        }
        messages.push(serde_json::json!({ "role": "user", "content": prompt }));

        serde_json::json!({
            "model": self.params.model,
            "messages": messages,
            "max_tokens": self.params.max_tokens,
            "temperature": self.params.temperature,
        })
    }
}

#[async_trait]
impl TextGenerator for OpenAIProvider {
    fn id(&self) -> &str {
        "openai"
    }

    async fn generate(&self, prompt: &str) -> Result<String, TimeslipError> {
        let body = self.build_request_body(prompt);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("openai", e))?;

        if !response.status().is_success() {
            return Err(status_error("openai", response).await);
        }

        let resp: serde_json::Value =
            response.json().await.map_err(|e| TimeslipError::Provider {
                provider: "openai".into(),
                message: format!("Failed to parse response: {}", e),
                retriable: false,
            })?;

        Ok(resp["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string())
    }
}
