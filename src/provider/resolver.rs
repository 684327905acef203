// src/provider/resolver.rs — Build the configured text generator

use std::sync::Arc;

use super::anthropic::AnthropicProvider;
use super::openai::OpenAIProvider;
use super::retry::{RetryConfig, RetryGenerator};
use super::{GenerationParams, TextGenerator};
use crate::infra::config::GeneratorConfig;

/// Resolve the generator named in config.
///
/// Returns `None` when generation is disabled or no API key is available;
/// billing summaries then always use the templated narrative.
pub fn resolve_generator(config: &GeneratorConfig) -> Option<Arc<dyn TextGenerator>> {
    resolve_with_key(config, std::env::var(&config.api_key_env).ok())
}

fn resolve_with_key(
    config: &GeneratorConfig,
    api_key: Option<String>,
) -> Option<Arc<dyn TextGenerator>> {
    let provider = config.provider.trim().to_lowercase();
    if provider == "none" || provider.is_empty() {
        tracing::info!("Narrative generation disabled; using templated narratives");
        return None;
    }

    let Some(api_key) = api_key.filter(|k| !k.trim().is_empty()) else {
        tracing::warn!(
            provider = %provider,
            "No API key in ${}; using templated narratives",
            config.api_key_env
        );
        return None;
    };

    let params = GenerationParams {
        model: config.model.clone(),
        max_tokens: config.max_tokens,
        timeout: config.timeout(),
        ..GenerationParams::default()
    };

    let inner: Arc<dyn TextGenerator> = match provider.as_str() {
        "anthropic" => {
            let p = AnthropicProvider::new(api_key, params);
            match &config.base_url {
                Some(url) => Arc::new(p.with_api_url(url.clone())),
                None => Arc::new(p),
            }
        }
        "openai" => match &config.base_url {
            Some(url) => Arc::new(OpenAIProvider::with_base_url(api_key, url.clone(), params)),
            None => Arc::new(OpenAIProvider::new(api_key, params)),
        },
        other => {
            tracing::warn!("Unknown generator provider '{}'; using templated narratives", other);
            return None;
        }
    };

    tracing::info!(provider = inner.id(), model = %config.model, "Narrative generator ready");

    let retry = RetryConfig {
        max_retries: config.max_retries,
        ..RetryConfig::default()
    };
    Some(Arc::new(RetryGenerator::with_config(inner, retry)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_provider_disables_generation() {
        let config = GeneratorConfig {
            provider: "none".into(),
            ..GeneratorConfig::default()
        };
        assert!(resolve_with_key(&config, Some("k".into())).is_none());
    }

    #[test]
    fn test_missing_key_disables_generation() {
        let config = GeneratorConfig::default();
        assert!(resolve_with_key(&config, None).is_none());
        assert!(resolve_with_key(&config, Some("  ".into())).is_none());
    }

    #[test]
    fn test_unknown_provider() {
        let config = GeneratorConfig {
            provider: "mystery".into(),
            ..GeneratorConfig::default()
        };
        assert!(resolve_with_key(&config, Some("k".into())).is_none());
    }

    #[test]
    fn test_resolves_anthropic_and_openai() {
        let anthropic = resolve_with_key(&GeneratorConfig::default(), Some("k".into())).unwrap();
        assert_eq!(anthropic.id(), "anthropic");

        let config = GeneratorConfig {
            provider: "OpenAI".into(),
            base_url: Some("http://localhost:8080/v1".into()),
            ..GeneratorConfig::default()
        };
        let openai = resolve_with_key(&config, Some("k".into())).unwrap();
        assert_eq!(openai.id(), "openai");
    }
}
