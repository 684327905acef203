// src/session/coordinator.rs — Send-and-log coordinator
//
// Finalizes a session if the caller skipped the explicit stop, then sends
// the mail and logs the time as two independent legs. Either leg may fail
// without undoing the other; the outcome reports each leg separately.
// A leg that already succeeded on an earlier attempt is not repeated.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::registry::SessionRegistry;
use super::types::{BillingSummary, SessionStatus};
use crate::infra::errors::TimeslipError;
use crate::integrations::{MailSender, OutgoingMail, TimeEntry, TimeLogger};

/// Final draft as the client is about to send it.
#[derive(Debug, Clone, Default)]
pub struct EmailData {
    pub to: String,
    pub subject: String,
    pub content: String,
    pub matter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LegResult {
    fn ok(id: String) -> Self {
        Self {
            success: true,
            id: Some(id),
            error: None,
        }
    }

    fn failed(error: String) -> Self {
        Self {
            success: false,
            id: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SendOutcome {
    Complete,
    Partial,
    Failed,
}

#[derive(Debug, Clone)]
pub struct SendReport {
    pub outcome: SendOutcome,
    pub send_result: LegResult,
    pub log_result: LegResult,
    pub elapsed_ms: u64,
    pub billing_summary: BillingSummary,
}

/// Upper bound on one downstream leg. The session stays locked meanwhile.
const DEFAULT_LEG_TIMEOUT: Duration = Duration::from_secs(60);

pub struct SendCoordinator {
    registry: Arc<SessionRegistry>,
    mail: Arc<dyn MailSender>,
    logger: Arc<dyn TimeLogger>,
    default_matter: Option<String>,
    leg_timeout: Duration,
}

/// Run one leg under `limit`, folding timeouts and errors into a `LegResult`.
async fn run_leg<F>(session_id: &str, leg: &str, limit: Duration, call: F) -> LegResult
where
    F: Future<Output = anyhow::Result<String>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(id)) => LegResult::ok(id),
        Ok(Err(e)) => {
            tracing::warn!(session_id, leg, "Leg failed: {:#}", e);
            LegResult::failed(format!("{e:#}"))
        }
        Err(_) => {
            tracing::warn!(
                session_id,
                leg,
                timeout_ms = limit.as_millis() as u64,
                "Leg timed out"
            );
            LegResult::failed(format!("{leg} timed out after {}s", limit.as_secs_f64()))
        }
    }
}

impl SendCoordinator {
    pub fn new(
        registry: Arc<SessionRegistry>,
        mail: Arc<dyn MailSender>,
        logger: Arc<dyn TimeLogger>,
        default_matter: Option<String>,
    ) -> Self {
        Self {
            registry,
            mail,
            logger,
            default_matter,
            leg_timeout: DEFAULT_LEG_TIMEOUT,
        }
    }

    pub fn with_leg_timeout(mut self, leg_timeout: Duration) -> Self {
        self.leg_timeout = leg_timeout;
        self
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub async fn send_and_log(
        &self,
        session_id: &str,
        email: &EmailData,
    ) -> Result<SendReport, TimeslipError> {
        // Held for the whole operation: a concurrent stop or send for the
        // same id waits here.
        let mut session = self.registry.lock(session_id).await?;

        if session.is_settled() {
            return Err(TimeslipError::AlreadySent {
                session_id: session_id.to_string(),
            });
        }

        if session.status.is_open() {
            tracing::info!(session_id, "Implicit stop before send");
            self.registry
                .finalize(&mut session, &email.content, None)
                .await;
        }

        let billing_summary = session.billing_summary.clone().ok_or_else(|| {
            TimeslipError::Other(anyhow::anyhow!(
                "session '{session_id}' finalized without a billing summary"
            ))
        })?;

        if !email.to.trim().is_empty() {
            session.draft.to = email.to.trim().to_string();
        }
        if !email.subject.trim().is_empty() {
            session.draft.subject = email.subject.clone();
        }
        // The body edited after stop is what goes out; the billing summary
        // stays frozen at stop time.
        if !email.content.trim().is_empty() {
            session.draft.body = email.content.clone();
        }
        if let Some(matter) = email.matter.as_ref().filter(|m| !m.trim().is_empty()) {
            session.matter = Some(matter.clone());
        }

        let mail = OutgoingMail {
            to: session.draft.to.clone(),
            subject: session.draft.subject.clone(),
            body: session.draft.body.clone(),
        };
        let entry = TimeEntry {
            matter: session.matter.clone().or_else(|| self.default_matter.clone()),
            duration_ms: session.accumulated_ms,
            narrative: billing_summary.narrative.clone(),
            date: session.start_time.date_naive(),
        };

        let sent_before = session.message_id.clone();
        let logged_before = session.time_entry_id.clone();

        let send_leg = async {
            match sent_before {
                Some(id) => LegResult::ok(id),
                None => {
                    run_leg(session_id, "mail send", self.leg_timeout, self.mail.send(&mail)).await
                }
            }
        };
        let log_leg = async {
            match logged_before {
                Some(id) => LegResult::ok(id),
                None => {
                    run_leg(session_id, "time entry", self.leg_timeout, self.logger.log_time(&entry))
                        .await
                }
            }
        };
        let (send_result, log_result) = futures::future::join(send_leg, log_leg).await;

        if send_result.success {
            session.message_id = send_result.id.clone();
            session.status = SessionStatus::Sent;
        }
        if log_result.success {
            session.time_entry_id = log_result.id.clone();
        }

        let outcome = match (send_result.success, log_result.success) {
            (true, true) => SendOutcome::Complete,
            (false, false) => SendOutcome::Failed,
            _ => SendOutcome::Partial,
        };

        tracing::info!(
            session_id,
            outcome = ?outcome,
            elapsed_ms = session.accumulated_ms,
            "Send-and-log finished"
        );

        Ok(SendReport {
            outcome,
            send_result,
            log_result,
            elapsed_ms: session.accumulated_ms,
            billing_summary,
        })
    }
}
