// src/session/registry.rs — Server-side session registry
//
// The map itself sits behind a short-lived std RwLock that is never held
// across an await. Each session has its own async mutex; finalization holds
// it for the whole summary generation, so concurrent stops for one id
// serialize and the summary is produced exactly once. Sessions for
// different ids never contend on the same lock.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::types::{BillingSummary, DraftContent, Session, SessionStatus, SessionSummary};
use crate::billing::SummaryGenerator;
use crate::infra::config::TrackingConfig;
use crate::infra::errors::TimeslipError;
use crate::tracker::clock::Clock;

pub type SessionEntry = Arc<Mutex<Session>>;

/// Returned by `create_session`.
#[derive(Debug, Clone)]
pub struct CreatedSession {
    pub session_id: String,
    pub start_time: DateTime<Utc>,
}

/// Returned by a successful finalize.
#[derive(Debug, Clone)]
pub struct StopOutcome {
    pub elapsed_ms: u64,
    pub billing_summary: BillingSummary,
}

/// What one sweep pass reclaimed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub paused: usize,
    pub sent: usize,
    pub abandoned: usize,
    pub skipped_busy: usize,
}

pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionEntry>>,
    clock: Arc<dyn Clock>,
    summaries: SummaryGenerator,
}

fn poisoned() -> TimeslipError {
    TimeslipError::Other(anyhow::anyhow!("session registry lock poisoned"))
}

impl SessionRegistry {
    pub fn new(clock: Arc<dyn Clock>, summaries: SummaryGenerator) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            clock,
            summaries,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn summaries(&self) -> &SummaryGenerator {
        &self.summaries
    }

    pub fn create_session(
        &self,
        to: &str,
        subject: &str,
        content: &str,
        matter: Option<String>,
    ) -> Result<CreatedSession, TimeslipError> {
        if to.trim().is_empty() {
            return Err(TimeslipError::Validation("'to' is required".into()));
        }
        if subject.trim().is_empty() {
            return Err(TimeslipError::Validation("'subject' is required".into()));
        }

        let now = self.clock.now();
        let draft = DraftContent {
            to: to.trim().to_string(),
            subject: subject.to_string(),
            body: content.to_string(),
        };

        let mut sessions = self.sessions.write().map_err(|_| poisoned())?;
        let mut id = uuid::Uuid::new_v4().to_string();
        while sessions.contains_key(&id) {
            id = uuid::Uuid::new_v4().to_string();
        }
        let session = Session::new(id.clone(), draft, matter, now);
        sessions.insert(id.clone(), Arc::new(Mutex::new(session)));
        drop(sessions);

        tracing::info!(session_id = %id, "Tracking session started");
        Ok(CreatedSession {
            session_id: id,
            start_time: now,
        })
    }

    /// Look up the entry for an id.
    pub fn entry(&self, session_id: &str) -> Result<SessionEntry, TimeslipError> {
        let sessions = self.sessions.read().map_err(|_| poisoned())?;
        sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| TimeslipError::not_found(session_id))
    }

    /// Lock a session for a multi-step operation.
    pub async fn lock(&self, session_id: &str) -> Result<OwnedMutexGuard<Session>, TimeslipError> {
        let entry = self.entry(session_id)?;
        Ok(entry.lock_owned().await)
    }

    pub async fn record_activity(&self, session_id: &str) -> Result<(), TimeslipError> {
        let entry = self.entry(session_id)?;
        let mut session = entry.lock().await;
        let was_paused = session.status == SessionStatus::Paused;
        session.touch(self.clock.now());
        if was_paused && session.status == SessionStatus::Active {
            tracing::debug!(session_id, "Session resumed on activity");
        }
        Ok(())
    }

    /// Mirror a client-side idle pause.
    ///
    /// `paused_at` is the client's idle instant; it is clamped to the
    /// current interval so a skewed client clock can neither add time nor
    /// go back past the last resume.
    pub async fn pause_session(
        &self,
        session_id: &str,
        paused_at: Option<DateTime<Utc>>,
    ) -> Result<(), TimeslipError> {
        let entry = self.entry(session_id)?;
        let mut session = entry.lock().await;
        let now = self.clock.now();
        let at = paused_at
            .map_or(now, |at| at.min(now))
            .max(session.interval_start);
        session.pause_at(at);
        tracing::debug!(
            session_id,
            accumulated_ms = session.accumulated_ms,
            "Session paused"
        );
        Ok(())
    }

    pub async fn stop_session(
        &self,
        session_id: &str,
        final_content: &str,
        tone: Option<&str>,
    ) -> Result<StopOutcome, TimeslipError> {
        let entry = self.entry(session_id)?;
        let mut session = entry.lock().await;
        if !session.status.is_open() {
            return Err(TimeslipError::AlreadyStopped {
                session_id: session_id.to_string(),
            });
        }
        Ok(self.finalize(&mut session, final_content, tone).await)
    }

    /// Freeze, summarize and mark an open session stopped.
    ///
    /// The caller must hold the session's lock and have checked it is open.
    pub async fn finalize(
        &self,
        session: &mut Session,
        final_content: &str,
        tone: Option<&str>,
    ) -> StopOutcome {
        let elapsed_ms = session.freeze(self.clock.now());
        session.draft.body = final_content.to_string();

        let billing_summary = self
            .summaries
            .generate(final_content, elapsed_ms, tone)
            .await;
        session.billing_summary = Some(billing_summary.clone());

        tracing::info!(
            session_id = %session.id,
            elapsed_ms,
            hours = billing_summary.hours,
            "Tracking session stopped"
        );

        StopOutcome {
            elapsed_ms,
            billing_summary,
        }
    }

    /// Clone of the current session record.
    pub async fn get(&self, session_id: &str) -> Result<Session, TimeslipError> {
        let entry = self.entry(session_id)?;
        let session = entry.lock().await;
        Ok(session.clone())
    }

    /// Diagnostic listing of every registered session, oldest first.
    pub async fn list_active_sessions(&self) -> Vec<SessionSummary> {
        let entries: Vec<SessionEntry> = match self.sessions.read() {
            Ok(sessions) => sessions.values().cloned().collect(),
            Err(_) => return Vec::new(),
        };

        let now = self.clock.now();
        let mut summaries = Vec::with_capacity(entries.len());
        for entry in entries {
            summaries.push(entry.lock().await.summary(now));
        }
        summaries.sort_by_key(|s| s.start_time);
        summaries
    }

    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One reclamation pass.
    ///
    /// Active sessions idle past `idle_timeout` are paused at their idle
    /// deadline. Sent and logged sessions, and sessions untouched for longer than
    /// `abandon_after`, are dropped. Sessions whose lock is held (being
    /// finalized or sent) are skipped and reconsidered on the next pass.
    pub fn sweep(&self, policy: &SweepPolicy) -> SweepReport {
        let now = self.clock.now();
        let mut report = SweepReport::default();

        let Ok(mut sessions) = self.sessions.write() else {
            tracing::error!("Session registry lock poisoned; skipping sweep");
            return report;
        };

        sessions.retain(|id, entry| {
            let Ok(mut session) = entry.try_lock() else {
                report.skipped_busy += 1;
                return true;
            };
            if session.is_settled() {
                report.sent += 1;
                return false;
            }
            let last_touch = session.stopped_at.unwrap_or(session.last_activity_time);
            if now - last_touch > policy.abandon_after {
                tracing::info!(
                    session_id = %id,
                    status = %session.status,
                    accumulated_ms = session.accumulated_ms,
                    "Reclaiming abandoned session"
                );
                report.abandoned += 1;
                return false;
            }
            if session.status == SessionStatus::Active {
                let deadline = session
                    .last_activity_time
                    .checked_add_signed(policy.idle_timeout)
                    .map(|d| d.max(session.interval_start));
                if let Some(deadline) = deadline.filter(|d| *d < now) {
                    session.pause_at(deadline);
                    report.paused += 1;
                }
            }
            true
        });

        report
    }
}

/// Thresholds for `SessionRegistry::sweep`.
#[derive(Debug, Clone)]
pub struct SweepPolicy {
    pub idle_timeout: chrono::Duration,
    pub abandon_after: chrono::Duration,
}

impl From<&TrackingConfig> for SweepPolicy {
    fn from(config: &TrackingConfig) -> Self {
        Self {
            idle_timeout: chrono::Duration::from_std(config.idle_timeout())
                .unwrap_or(chrono::Duration::seconds(30)),
            abandon_after: chrono::Duration::from_std(config.abandon_after())
                .unwrap_or(chrono::Duration::hours(4)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::config::BillingConfig;
    use crate::tracker::clock::ManualClock;

    fn registry() -> (SessionRegistry, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        let reg = SessionRegistry::new(
            clock.clone(),
            SummaryGenerator::template_only(BillingConfig::default()),
        );
        (reg, clock)
    }

    #[test]
    fn test_create_requires_to_and_subject() {
        let (reg, _) = registry();
        assert!(matches!(
            reg.create_session("", "Update", "", None),
            Err(TimeslipError::Validation(_))
        ));
        assert!(matches!(
            reg.create_session("client@x.com", "   ", "", None),
            Err(TimeslipError::Validation(_))
        ));
        assert!(reg.create_session("client@x.com", "Update", "", None).is_ok());
    }

    #[test]
    fn test_ids_are_unique() {
        let (reg, _) = registry();
        let a = reg.create_session("a@x.com", "A", "", None).unwrap();
        let b = reg.create_session("a@x.com", "A", "", None).unwrap();
        assert_ne!(a.session_id, b.session_id);
        assert_eq!(reg.len(), 2);
    }

    #[tokio::test]
    async fn test_pause_then_activity_resumes() {
        let (reg, clock) = registry();
        let id = reg.create_session("a@x.com", "A", "", None).unwrap().session_id;
        clock.advance_ms(4_000);
        reg.pause_session(&id, None).await.unwrap();
        clock.advance_ms(60_000);
        reg.record_activity(&id).await.unwrap();
        let s = reg.get(&id).await.unwrap();
        assert_eq!(s.status, SessionStatus::Active);
        assert_eq!(s.accumulated_ms, 4_000);
    }

    #[tokio::test]
    async fn test_pause_at_client_idle_instant() {
        let (reg, clock) = registry();
        let id = reg.create_session("a@x.com", "A", "", None).unwrap().session_id;
        let start = reg.now();
        clock.advance_ms(31_200);

        // Client's idle timer fired at 30s; the request arrived 1.2s later.
        let idle_at = start + chrono::Duration::seconds(30);
        reg.pause_session(&id, Some(idle_at)).await.unwrap();
        assert_eq!(reg.get(&id).await.unwrap().accumulated_ms, 30_000);
    }

    #[tokio::test]
    async fn test_pause_instant_clamped_to_interval() {
        let (reg, clock) = registry();
        let id = reg.create_session("a@x.com", "A", "", None).unwrap().session_id;
        let start = reg.now();
        clock.advance_ms(5_000);

        let future = start + chrono::Duration::hours(1);
        reg.pause_session(&id, Some(future)).await.unwrap();
        assert_eq!(reg.get(&id).await.unwrap().accumulated_ms, 5_000);

        reg.record_activity(&id).await.unwrap();
        clock.advance_ms(2_000);
        reg.pause_session(&id, Some(start)).await.unwrap();
        assert_eq!(reg.get(&id).await.unwrap().accumulated_ms, 5_000);
    }

    #[tokio::test]
    async fn test_sweep_with_huge_idle_timeout_does_not_panic() {
        let (reg, clock) = registry();
        let id = reg.create_session("a@x.com", "A", "", None).unwrap().session_id;
        clock.advance_ms(60_000);
        let config = TrackingConfig {
            idle_timeout_secs: u64::MAX,
            abandon_after_secs: u64::MAX,
            ..TrackingConfig::default()
        };
        let report = reg.sweep(&SweepPolicy::from(&config));
        assert_eq!(report.paused, 0);
        assert_eq!(reg.get(&id).await.unwrap().status, SessionStatus::Active);

        let extreme = SweepPolicy {
            idle_timeout: chrono::Duration::MAX,
            abandon_after: chrono::Duration::MAX,
        };
        assert_eq!(reg.sweep(&extreme).paused, 0);
    }

    #[tokio::test]
    async fn test_stop_twice_is_conflict() {
        let (reg, clock) = registry();
        let id = reg.create_session("a@x.com", "A", "", None).unwrap().session_id;
        clock.advance_ms(1_000);
        let first = reg.stop_session(&id, "done", None).await.unwrap();
        assert_eq!(first.elapsed_ms, 1_000);
        assert!(matches!(
            reg.stop_session(&id, "again", None).await,
            Err(TimeslipError::AlreadyStopped { .. })
        ));
        let s = reg.get(&id).await.unwrap();
        assert_eq!(s.billing_summary, Some(first.billing_summary));
        assert_eq!(s.draft.body, "done");
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let (reg, _) = registry();
        assert!(matches!(
            reg.record_activity("nope").await,
            Err(TimeslipError::SessionNotFound { .. })
        ));
        assert!(matches!(
            reg.stop_session("nope", "", None).await,
            Err(TimeslipError::SessionNotFound { .. })
        ));
    }

    fn policy() -> SweepPolicy {
        SweepPolicy {
            idle_timeout: chrono::Duration::seconds(30),
            abandon_after: chrono::Duration::hours(4),
        }
    }

    #[tokio::test]
    async fn test_sweep_pauses_idle_at_deadline() {
        let (reg, clock) = registry();
        let id = reg.create_session("a@x.com", "A", "", None).unwrap().session_id;
        clock.advance_ms(10_000);
        reg.record_activity(&id).await.unwrap();
        clock.advance_ms(120_000);

        let report = reg.sweep(&policy());
        assert_eq!(report.paused, 1);
        let s = reg.get(&id).await.unwrap();
        assert_eq!(s.status, SessionStatus::Paused);
        assert_eq!(s.accumulated_ms, 40_000);
    }

    #[tokio::test]
    async fn test_sweep_evicts_sent() {
        let (reg, _) = registry();
        let id = reg.create_session("a@x.com", "A", "", None).unwrap().session_id;
        {
            let mut s = reg.lock(&id).await.unwrap();
            s.status = SessionStatus::Sent;
            s.message_id = Some("m-1".into());
            s.time_entry_id = Some("t-1".into());
        }
        let report = reg.sweep(&policy());
        assert_eq!(report.sent, 1);
        assert!(reg.is_empty());
    }

    #[tokio::test]
    async fn test_sweep_reclaims_abandoned() {
        let (reg, clock) = registry();
        let stale = reg.create_session("a@x.com", "A", "", None).unwrap().session_id;
        clock.advance_ms(3 * 3_600_000);
        let fresh = reg.create_session("b@x.com", "B", "", None).unwrap().session_id;
        clock.advance_ms(3_600_000 + 1);

        let report = reg.sweep(&policy());
        assert_eq!(report.abandoned, 1);
        assert!(reg.entry(&stale).is_err());
        assert!(reg.entry(&fresh).is_ok());
    }

    #[tokio::test]
    async fn test_sweep_skips_locked_sessions() {
        let (reg, clock) = registry();
        let id = reg.create_session("a@x.com", "A", "", None).unwrap().session_id;
        clock.advance_ms(10 * 3_600_000);

        let entry = reg.entry(&id).unwrap();
        let guard = entry.lock().await;
        let report = reg.sweep(&policy());
        assert_eq!(report.skipped_busy, 1);
        drop(guard);

        let report = reg.sweep(&policy());
        assert_eq!(report.abandoned, 1);
        assert!(reg.is_empty());
    }

    #[tokio::test]
    async fn test_list_sorted_by_start() {
        let (reg, clock) = registry();
        reg.create_session("first@x.com", "1", "", None).unwrap();
        clock.advance_ms(10);
        reg.create_session("second@x.com", "2", "", None).unwrap();
        let list = reg.list_active_sessions().await;
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].to, "first@x.com");
        assert_eq!(list[1].elapsed_ms, 0);
    }
}
