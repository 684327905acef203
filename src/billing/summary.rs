// src/billing/summary.rs — Billing summary generation
//
// Hours and metadata are computed locally and deterministically. Only the
// narrative text is delegated to the text-generation provider, and any
// provider failure degrades to a templated narrative: finalizing a
// session never waits on third-party availability.

use std::sync::Arc;
use std::time::Duration;

use super::classify::{classify, round_hours, word_count};
use crate::infra::config::BillingConfig;
use crate::provider::TextGenerator;
use crate::session::types::{BillingSummary, NarrativeSource, SummaryMetadata};
use crate::util::truncate_str;

/// Upper bound on a stored narrative, in bytes.
const MAX_NARRATIVE_LEN: usize = 1_000;
/// Upper bound on draft text embedded in the prompt, in bytes.
const MAX_PROMPT_CONTENT_LEN: usize = 12_000;
const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(20);

pub struct SummaryGenerator {
    config: BillingConfig,
    provider: Option<Arc<dyn TextGenerator>>,
    timeout: Duration,
}

impl SummaryGenerator {
    pub fn new(config: BillingConfig, provider: Option<Arc<dyn TextGenerator>>) -> Self {
        Self {
            config,
            provider,
            timeout: DEFAULT_GENERATION_TIMEOUT,
        }
    }

    /// Bound the whole provider call, retries included.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// A generator that always uses the templated narrative.
    pub fn template_only(config: BillingConfig) -> Self {
        Self::new(config, None)
    }

    pub fn default_tone(&self) -> &str {
        &self.config.default_tone
    }

    pub fn format_hours(&self, hours: f64) -> String {
        format!("{:.*}", self.config.hours_precision as usize, hours)
    }

    /// Hours and metadata for a draft. Pure.
    pub fn metadata(&self, final_content: &str, elapsed_ms: u64) -> (f64, SummaryMetadata) {
        let hours = round_hours(elapsed_ms, self.config.hours_precision);
        let metadata = SummaryMetadata {
            activity_type: classify(final_content, &self.config),
            word_count: word_count(final_content),
        };
        (hours, metadata)
    }

    pub fn build_prompt(&self, final_content: &str, hours: f64, activity_type: &str, tone: &str) -> String {
        let content = truncate_str(final_content.trim(), MAX_PROMPT_CONTENT_LEN);
        format!(
            "Write a billing narrative for a legal time entry.\n\
             Tone: {tone}\n\
             Time billed: {hours} hours\n\
             Activity type: {activity}\n\
             \n\
             Describe the work performed on the email below in one or two sentences, \
             in the past tense, without quoting it and without restating the time.\n\
             Respond with the narrative only.\n\
             \n\
             Email:\n\
             \"\"\"\n\
             {content}\n\
             \"\"\"",
            tone = tone,
            hours = self.format_hours(hours),
            activity = activity_type.replace('_', " "),
            content = content,
        )
    }

    pub fn fallback_narrative(&self, hours: f64, metadata: &SummaryMetadata) -> String {
        let words = match metadata.word_count {
            1 => "1 word".to_string(),
            n => format!("{n} words"),
        };
        format!(
            "Drafted and revised email correspondence ({}, {}): {} hours.",
            metadata.activity_type.replace('_', " "),
            words,
            self.format_hours(hours)
        )
    }

    /// Build the full summary. Never fails.
    pub async fn generate(&self, final_content: &str, elapsed_ms: u64, tone: Option<&str>) -> BillingSummary {
        let (hours, metadata) = self.metadata(final_content, elapsed_ms);
        let tone = tone
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(self.config.default_tone.as_str());

        let generated = match &self.provider {
            Some(provider) => {
                let prompt = self.build_prompt(final_content, hours, &metadata.activity_type, tone);
                match tokio::time::timeout(self.timeout, provider.generate(&prompt)).await {
                    Ok(Ok(text)) if !text.trim().is_empty() => {
                        Some(truncate_str(text.trim(), MAX_NARRATIVE_LEN).to_string())
                    }
                    Ok(Ok(_)) => {
                        tracing::warn!(
                            provider = provider.id(),
                            "Empty narrative from provider, using template"
                        );
                        None
                    }
                    Ok(Err(e)) => {
                        tracing::warn!(
                            provider = provider.id(),
                            "Narrative generation failed, using template: {}",
                            e
                        );
                        None
                    }
                    Err(_) => {
                        tracing::warn!(
                            provider = provider.id(),
                            timeout_ms = self.timeout.as_millis() as u64,
                            "Narrative generation timed out, using template"
                        );
                        None
                    }
                }
            }
            None => None,
        };

        let (narrative, source) = match generated {
            Some(text) => (text, NarrativeSource::Generated),
            None => (
                self.fallback_narrative(hours, &metadata),
                NarrativeSource::Template,
            ),
        };

        BillingSummary {
            hours,
            narrative,
            metadata,
            source,
        }
    }
}
