// src/integrations/types.rs — Downstream collaborator traits

use async_trait::async_trait;

/// A finalized draft ready to go out.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// A billable entry for the practice-management system.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeEntry {
    /// Matter reference, if the caller or config supplied one.
    pub matter: Option<String>,
    pub duration_ms: u64,
    pub narrative: String,
    pub date: chrono::NaiveDate,
}

/// Sends a message and returns the provider's message id.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> anyhow::Result<String>;
}

/// Records a time entry and returns the provider's entry id.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TimeLogger: Send + Sync {
    async fn log_time(&self, entry: &TimeEntry) -> anyhow::Result<String>;
}

/// Stand-in used when a collaborator has no credentials configured.
/// Every call fails, so the corresponding leg reports an error.
pub struct Unconfigured {
    pub what: &'static str,
    pub hint: String,
}

#[async_trait]
impl MailSender for Unconfigured {
    async fn send(&self, _mail: &OutgoingMail) -> anyhow::Result<String> {
        anyhow::bail!("{} is not configured: {}", self.what, self.hint)
    }
}

#[async_trait]
impl TimeLogger for Unconfigured {
    async fn log_time(&self, _entry: &TimeEntry) -> anyhow::Result<String> {
        anyhow::bail!("{} is not configured: {}", self.what, self.hint)
    }
}
