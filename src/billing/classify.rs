// src/billing/classify.rs — Deterministic draft metadata

use crate::infra::config::{ActivityRule, BillingConfig};

pub const BRIEF_CORRESPONDENCE: &str = "brief_correspondence";
pub const SUBSTANTIVE_DRAFTING: &str = "substantive_drafting";

/// Whitespace-delimited token count.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// `ms / 3_600_000`, rounded half away from zero to `precision` places.
pub fn round_hours(elapsed_ms: u64, precision: u32) -> f64 {
    let hours = elapsed_ms as f64 / 3_600_000.0;
    let scale = 10f64.powi(precision as i32);
    (hours * scale).round() / scale
}

/// Pick an activity type for a draft.
///
/// Keyword rules are checked in order; the first rule with a matching
/// keyword wins. Otherwise the draft is brief or substantive by length.
pub fn classify(content: &str, config: &BillingConfig) -> String {
    let normalized = content.to_lowercase();
    let tokens: Vec<&str> = normalized
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();

    if let Some(rule) = config
        .rules
        .iter()
        .find(|rule| rule_matches(rule, &normalized, &tokens))
    {
        return rule.activity_type.clone();
    }

    if word_count(content) < config.brief_word_limit {
        BRIEF_CORRESPONDENCE.into()
    } else {
        SUBSTANTIVE_DRAFTING.into()
    }
}

fn rule_matches(rule: &ActivityRule, normalized: &str, tokens: &[&str]) -> bool {
    rule.keywords.iter().any(|keyword| {
        let keyword = keyword.trim().to_lowercase();
        if keyword.is_empty() {
            false
        } else if keyword.contains(char::is_whitespace) {
            normalized.contains(&keyword)
        } else {
            tokens.iter().any(|t| *t == keyword)
        }
    })
}
