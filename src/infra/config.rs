// src/infra/config.rs — Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::infra::paths;

/// Ceiling on policy durations read from config.
pub const MAX_POLICY_SECS: u64 = 366 * 24 * 60 * 60;
/// Ceiling on outbound request timeouts.
const MAX_REQUEST_TIMEOUT_SECS: u64 = 600;

fn request_timeout(secs: u64) -> Duration {
    Duration::from_secs(secs.clamp(1, MAX_REQUEST_TIMEOUT_SECS))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub tracking: TrackingConfig,

    #[serde(default)]
    pub billing: BillingConfig,

    #[serde(default)]
    pub generator: GeneratorConfig,

    #[serde(default)]
    pub mail: MailConfig,

    #[serde(default)]
    pub practice: PracticeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Optional bearer token required on tracking endpoints.
    #[serde(default)]
    pub token: Option<String>,
    /// Extra origins allowed by CORS (the webmail page the extension runs in).
    #[serde(default = "default_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 7878,
            token: None,
            allowed_origins: default_origins(),
        }
    }
}

fn default_origins() -> Vec<String> {
    vec!["https://mail.google.com".into()]
}

/// Policy constants for activity detection and session reclamation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub idle_timeout_secs: u64,
    pub debounce_ms: u64,
    pub abandon_after_secs: u64,
    pub sweep_interval_secs: u64,
    pub sync_retries: u32,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 30,
            debounce_ms: 300,
            abandon_after_secs: 4 * 60 * 60,
            sweep_interval_secs: 60,
            sync_retries: 3,
        }
    }
}

impl TrackingConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs.min(MAX_POLICY_SECS))
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn abandon_after(&self) -> Duration {
        Duration::from_secs(self.abandon_after_secs.min(MAX_POLICY_SECS))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingConfig {
    pub hours_precision: u32,
    pub default_tone: String,
    /// Drafts under this many words are classified as brief correspondence.
    pub brief_word_limit: usize,
    #[serde(default = "default_rules")]
    pub rules: Vec<ActivityRule>,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            hours_precision: 2,
            default_tone: "professional".into(),
            brief_word_limit: 75,
            rules: default_rules(),
        }
    }
}

/// Keyword rule: any keyword found in the draft selects `activity_type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityRule {
    pub activity_type: String,
    pub keywords: Vec<String>,
}

fn default_rules() -> Vec<ActivityRule> {
    let rule = |activity_type: &str, keywords: &[&str]| ActivityRule {
        activity_type: activity_type.into(),
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
    };
    vec![
        rule("settlement_negotiation", &["settlement", "settle", "offer"]),
        rule(
            "litigation_correspondence",
            &["hearing", "motion", "court", "deposition", "discovery"],
        ),
        rule(
            "contract_review",
            &["contract", "agreement", "clause", "redline"],
        ),
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// "anthropic", "openai", or "none" (always use the templated narrative).
    pub provider: String,
    pub model: String,
    pub api_key_env: String,
    #[serde(default)]
    pub base_url: Option<String>,
    pub max_tokens: u32,
    pub max_retries: u32,
    /// Budget for one narrative, retries included. On expiry the
    /// templated narrative is used.
    pub timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".into(),
            model: "claude-haiku-3-5-20241022".into(),
            api_key_env: "ANTHROPIC_API_KEY".into(),
            base_url: None,
            max_tokens: 512,
            max_retries: 2,
            timeout_secs: 20,
        }
    }
}

impl GeneratorConfig {
    pub fn timeout(&self) -> Duration {
        request_timeout(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub api_base: String,
    /// Environment variable holding the OAuth access token.
    pub token_env: String,
    /// Sender address for the From header.
    pub from: Option<String>,
    pub timeout_secs: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            api_base: "https://gmail.googleapis.com/gmail/v1".into(),
            token_env: "TIMESLIP_GMAIL_TOKEN".into(),
            from: None,
            timeout_secs: 30,
        }
    }
}

impl MailConfig {
    pub fn timeout(&self) -> Duration {
        request_timeout(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PracticeConfig {
    pub api_base: String,
    pub token_env: String,
    /// Matter used when a send request names none.
    #[serde(default)]
    pub default_matter: Option<String>,
    pub timeout_secs: u64,
}

impl Default for PracticeConfig {
    fn default() -> Self {
        Self {
            api_base: "https://app.clio.com/api/v4".into(),
            token_env: "TIMESLIP_CLIO_TOKEN".into(),
            default_matter: None,
            timeout_secs: 30,
        }
    }
}

impl PracticeConfig {
    pub fn timeout(&self) -> Duration {
        request_timeout(self.timeout_secs)
    }
}

impl Config {
    /// Load config from file, falling back to defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = paths::config_file_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
