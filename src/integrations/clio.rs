// src/integrations/clio.rs — Clio time-entry adapter (API v4)
//
// Creates a TimeEntry activity. Quantity is sent in seconds.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::infra::config::PracticeConfig;
use crate::integrations::types::{TimeEntry, TimeLogger};
use crate::util::{http_client, truncate_str};

pub struct ClioLogger {
    client: Client,
    api_base: String,
    access_token: String,
}

impl ClioLogger {
    pub fn new(api_base: impl Into<String>, access_token: String, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            access_token,
        }
    }

    pub fn from_config(config: &PracticeConfig) -> anyhow::Result<Self> {
        let token = std::env::var(&config.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("no access token in ${}", config.token_env))?;
        Ok(Self::new(config.api_base.clone(), token, config.timeout()))
    }
}

/// Request body for `POST /activities.json`.
pub fn activity_body(entry: &TimeEntry) -> serde_json::Value {
    // Round to the nearest second, never below one.
    let seconds = ((entry.duration_ms + 500) / 1000).max(1);
    let mut data = serde_json::json!({
        "type": "TimeEntry",
        "date": entry.date.format("%Y-%m-%d").to_string(),
        "quantity": seconds,
        "note": entry.narrative,
    });
    if let Some(matter) = &entry.matter {
        data["matter"] = match matter.parse::<u64>() {
            Ok(id) => serde_json::json!({ "id": id }),
            Err(_) => serde_json::json!({ "id": matter }),
        };
    }
    serde_json::json!({ "data": data })
}

#[derive(Deserialize)]
struct ActivityResp {
    data: ActivityData,
}

#[derive(Deserialize)]
struct ActivityData {
    id: serde_json::Value,
}

#[async_trait]
impl TimeLogger for ClioLogger {
    async fn log_time(&self, entry: &TimeEntry) -> anyhow::Result<String> {
        let resp = self
            .client
            .post(format!("{}/activities.json", self.api_base))
            .bearer_auth(&self.access_token)
            .json(&activity_body(entry))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!(
                "Clio time entry failed (HTTP {}): {}",
                status,
                truncate_str(&body, 300)
            );
        }

        let created: ActivityResp = resp.json().await?;
        let id = match created.data.id {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        tracing::debug!(entry_id = %id, "Clio time entry created");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn entry(matter: Option<&str>, duration_ms: u64) -> TimeEntry {
        TimeEntry {
            matter: matter.map(String::from),
            duration_ms,
            narrative: "Drafted correspondence to opposing counsel.".into(),
            date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
        }
    }

    #[test]
    fn test_activity_body_shape() {
        let body = activity_body(&entry(Some("1001"), 180_000));
        assert_eq!(body["data"]["type"], "TimeEntry");
        assert_eq!(body["data"]["quantity"], 180);
        assert_eq!(body["data"]["date"], "2026-03-14");
        assert_eq!(body["data"]["matter"]["id"], 1001);
        assert_eq!(
            body["data"]["note"],
            "Drafted correspondence to opposing counsel."
        );
    }

    #[test]
    fn test_short_durations_bill_one_second() {
        let body = activity_body(&entry(None, 20));
        assert_eq!(body["data"]["quantity"], 1);
        assert!(body["data"].get("matter").is_none());
    }

    #[test]
    fn test_non_numeric_matter_passed_through() {
        let body = activity_body(&entry(Some("ACME-7"), 1_000));
        assert_eq!(body["data"]["matter"]["id"], "ACME-7");
    }
}
