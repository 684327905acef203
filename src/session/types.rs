// src/session/types.rs — Server-side session record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tracker::clock::elapsed_ms;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Paused,
    Stopped,
    Sent,
}

impl SessionStatus {
    /// Still accruing (or able to accrue) time.
    pub fn is_open(self) -> bool {
        matches!(self, SessionStatus::Active | SessionStatus::Paused)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionStatus::Active => "active",
            SessionStatus::Paused => "paused",
            SessionStatus::Stopped => "stopped",
            SessionStatus::Sent => "sent",
        };
        f.write_str(s)
    }
}

/// Latest known draft. Overwritten, never versioned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DraftContent {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryMetadata {
    pub activity_type: String,
    pub word_count: usize,
}

/// Where the narrative text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NarrativeSource {
    Generated,
    Template,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingSummary {
    pub hours: f64,
    pub narrative: String,
    pub metadata: SummaryMetadata,
    pub source: NarrativeSource,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub status: SessionStatus,
    pub start_time: DateTime<Utc>,
    /// Start of the in-flight active interval (meaningful while `Active`).
    pub interval_start: DateTime<Utc>,
    pub accumulated_ms: u64,
    pub last_activity_time: DateTime<Utc>,
    pub draft: DraftContent,
    pub matter: Option<String>,
    pub billing_summary: Option<BillingSummary>,
    pub stopped_at: Option<DateTime<Utc>>,
    /// Mail-provider id once the message has gone out.
    pub message_id: Option<String>,
    /// Practice-management entry id once time has been logged.
    pub time_entry_id: Option<String>,
}

impl Session {
    pub fn new(id: String, draft: DraftContent, matter: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            status: SessionStatus::Active,
            start_time: now,
            interval_start: now,
            accumulated_ms: 0,
            last_activity_time: now,
            draft,
            matter,
            billing_summary: None,
            stopped_at: None,
            message_id: None,
            time_entry_id: None,
        }
    }

    /// Accumulated plus in-flight time as of `now`.
    pub fn elapsed_at(&self, now: DateTime<Utc>) -> u64 {
        match self.status {
            SessionStatus::Active => self.accumulated_ms + elapsed_ms(self.interval_start, now),
            _ => self.accumulated_ms,
        }
    }

    /// Fold the in-flight interval up to `at` and pause. No-op unless active.
    pub fn pause_at(&mut self, at: DateTime<Utc>) {
        if self.status != SessionStatus::Active {
            return;
        }
        self.accumulated_ms += elapsed_ms(self.interval_start, at);
        self.interval_start = at;
        self.status = SessionStatus::Paused;
    }

    /// Refresh activity; a paused session becomes active again.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if !self.status.is_open() {
            return;
        }
        self.last_activity_time = now;
        if self.status == SessionStatus::Paused {
            self.interval_start = now;
            self.status = SessionStatus::Active;
        }
    }

    /// Freeze accumulated time. Returns the frozen value.
    pub fn freeze(&mut self, now: DateTime<Utc>) -> u64 {
        self.pause_at(now);
        if self.status.is_open() {
            self.status = SessionStatus::Stopped;
            self.stopped_at = Some(now);
        }
        self.accumulated_ms
    }

    /// Sent and logged; nothing left to do downstream.
    pub fn is_settled(&self) -> bool {
        self.status == SessionStatus::Sent
            && self.message_id.is_some()
            && self.time_entry_id.is_some()
    }

    pub fn summary(&self, now: DateTime<Utc>) -> SessionSummary {
        SessionSummary {
            session_id: self.id.clone(),
            status: self.status,
            to: self.draft.to.clone(),
            subject: self.draft.subject.clone(),
            start_time: self.start_time,
            last_activity_time: self.last_activity_time,
            elapsed_ms: self.elapsed_at(now),
            hours: self.billing_summary.as_ref().map(|b| b.hours),
        }
    }
}

/// Diagnostic view of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub status: SessionStatus,
    pub to: String,
    pub subject: String,
    pub start_time: DateTime<Utc>,
    pub last_activity_time: DateTime<Utc>,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hours: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn session() -> (Session, DateTime<Utc>) {
        let t0 = Utc.with_ymd_and_hms(2026, 5, 4, 14, 0, 0).unwrap();
        (
            Session::new("s-1".into(), DraftContent::default(), None, t0),
            t0,
        )
    }

    #[test]
    fn test_touch_resumes_without_reset() {
        let (mut s, t0) = session();
        s.pause_at(t0 + Duration::seconds(10));
        s.touch(t0 + Duration::seconds(50));
        assert_eq!(s.status, SessionStatus::Active);
        assert_eq!(s.accumulated_ms, 10_000);
        assert_eq!(s.elapsed_at(t0 + Duration::seconds(55)), 15_000);
    }

    #[test]
    fn test_freeze_is_final() {
        let (mut s, t0) = session();
        assert_eq!(s.freeze(t0 + Duration::seconds(3)), 3_000);
        s.touch(t0 + Duration::seconds(10));
        assert_eq!(s.status, SessionStatus::Stopped);
        assert_eq!(s.freeze(t0 + Duration::seconds(20)), 3_000);
        assert_eq!(s.stopped_at, Some(t0 + Duration::seconds(3)));
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&SessionStatus::Paused).unwrap();
        assert_eq!(json, "\"paused\"");
        assert_eq!(SessionStatus::Sent.to_string(), "sent");
    }

    #[test]
    fn test_summary_camel_case() {
        let (s, t0) = session();
        let json = serde_json::to_value(s.summary(t0 + Duration::seconds(1))).unwrap();
        assert_eq!(json["sessionId"], "s-1");
        assert_eq!(json["elapsedMs"], 1000);
        assert!(json.get("hours").is_none());
    }
}
