// src/provider/mod.rs — Text-generation provider layer

pub mod anthropic;
pub mod openai;
pub mod resolver;
pub mod retry;

use std::time::Duration;

use async_trait::async_trait;

use crate::infra::errors::TimeslipError;

/// Core trait that all text-generation backends implement.
///
/// Calls are best-effort: callers must be prepared for any error and
/// degrade rather than fail.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn id(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String, TimeslipError>;
}

/// Generation parameters shared by the HTTP providers.
#[derive(Debug, Clone)]
pub struct GenerationParams {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub system: Option<String>,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            model: String::new(),
            max_tokens: 512,
            temperature: 0.2,
            system: Some(SYSTEM_PROMPT.into()),
            timeout: Duration::from_secs(20),
        }
    }
}

pub const SYSTEM_PROMPT: &str = "You write concise, accurate time-entry narratives for a law \
firm's billing records. Describe the work, never invent facts, and never include \
privileged detail beyond what the draft itself states.";

/// Map a reqwest transport error into a provider error.
pub(crate) fn transport_error(provider: &str, e: reqwest::Error) -> TimeslipError {
    TimeslipError::Provider {
        provider: provider.into(),
        message: e.to_string(),
        retriable: e.is_timeout() || e.is_connect(),
    }
}

/// Turn a non-success HTTP response into a provider error.
pub(crate) async fn status_error(provider: &str, response: reqwest::Response) -> TimeslipError {
    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(5);
        return TimeslipError::RateLimited {
            provider: provider.into(),
            retry_after_ms: retry_after * 1000,
        };
    }
    let error_body = response.text().await.unwrap_or_default();
    TimeslipError::Provider {
        provider: provider.into(),
        message: format!(
            "HTTP {}: {}",
            status,
            crate::util::truncate_str(&error_body, 500)
        ),
        retriable: status.is_server_error(),
    }
}
