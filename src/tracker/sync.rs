// src/tracker/sync.rs — Client-to-server session sync
//
// The local timer is authoritative for the user; the server mirror is
// updated best-effort. Sync calls run in the background with bounded
// retry and never block the monitor.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use super::monitor::{ActivityMonitor, Transition};
use crate::api::types::{
    ErrorResponse, PauseRequest, SessionRef, StartRequest, StartResponse, StopRequest,
    StopResponse, SuccessResponse,
};
use crate::infra::errors::TimeslipError;
use crate::util::http_client;

const SERVER: &str = "timeslip-server";
const RETRY_BASE_MS: u64 = 200;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Server operations the client mirrors its timer into.
#[async_trait]
pub trait SessionSync: Send + Sync {
    async fn start(&self, draft: &StartRequest) -> Result<StartResponse, TimeslipError>;
    async fn activity(&self, session_id: &str) -> Result<(), TimeslipError>;
    /// `paused_at` is the local pause instant, so the server folds the same
    /// interval the timer did.
    async fn pause(
        &self,
        session_id: &str,
        paused_at: Option<DateTime<Utc>>,
    ) -> Result<(), TimeslipError>;
    /// On a session stopped earlier, returns the cached summary with
    /// `success: false`.
    async fn stop(
        &self,
        session_id: &str,
        final_content: &str,
    ) -> Result<StopResponse, TimeslipError>;
}

pub struct HttpSessionSync {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    retries: u32,
}

impl HttpSessionSync {
    pub fn new(base_url: impl Into<String>, token: Option<String>, retries: u32) -> Self {
        Self {
            client: http_client(REQUEST_TIMEOUT),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            retries,
        }
    }

    fn url(&self, op: &str) -> String {
        format!("{}/email-tracking/{}", self.base_url, op)
    }

    /// POST with bounded retry on transport failures and 5xx answers.
    /// Any other answer is handed back for the caller to read.
    async fn call<B>(&self, op: &str, body: &B) -> Result<reqwest::Response, TimeslipError>
    where
        B: Serialize + Sync,
    {
        let mut attempt = 0;
        loop {
            let mut req = self.client.post(self.url(op)).json(body);
            if let Some(token) = &self.token {
                req = req.bearer_auth(token);
            }

            let result = match req.send().await {
                Ok(resp) if resp.status().is_server_error() => Err(TimeslipError::Provider {
                    provider: SERVER.into(),
                    message: format!("{op}: HTTP {}", resp.status()),
                    retriable: true,
                }),
                Ok(resp) => Ok(resp),
                Err(e) => Err(TimeslipError::Provider {
                    provider: SERVER.into(),
                    message: format!("{op}: {e}"),
                    retriable: true,
                }),
            };

            match result {
                Err(e) if attempt < self.retries => {
                    let delay = Duration::from_millis(RETRY_BASE_MS << attempt.min(6));
                    tracing::debug!(op, attempt = attempt + 1, "Retrying sync call: {}", e);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn post<B, R>(&self, op: &str, session_id: &str, body: &B) -> Result<R, TimeslipError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let resp = self.call(op, body).await?;
        read_response(op, session_id, resp).await
    }
}

/// Map the server's status codes back onto the error enum.
async fn read_response<R: DeserializeOwned>(
    op: &str,
    session_id: &str,
    resp: reqwest::Response,
) -> Result<R, TimeslipError> {
    let status = resp.status();
    if status.is_success() {
        return resp.json::<R>().await.map_err(|e| TimeslipError::Provider {
            provider: SERVER.into(),
            message: format!("{op}: bad response body: {e}"),
            retriable: false,
        });
    }

    let message = resp
        .json::<ErrorResponse>()
        .await
        .map(|e| e.error)
        .unwrap_or_else(|_| status.to_string());
    Err(rejection(op, session_id, status, message))
}

fn rejection(op: &str, session_id: &str, status: StatusCode, message: String) -> TimeslipError {
    let session_id = session_id.to_string();
    match status.as_u16() {
        400 => TimeslipError::Validation(message),
        404 if !session_id.is_empty() => TimeslipError::SessionNotFound { session_id },
        409 if op == "send" => TimeslipError::AlreadySent { session_id },
        409 => TimeslipError::AlreadyStopped { session_id },
        _ => TimeslipError::Provider {
            provider: SERVER.into(),
            message: format!("{op}: HTTP {status}: {message}"),
            retriable: false,
        },
    }
}

#[async_trait]
impl SessionSync for HttpSessionSync {
    async fn start(&self, draft: &StartRequest) -> Result<StartResponse, TimeslipError> {
        self.post("start", "", draft).await
    }

    async fn activity(&self, session_id: &str) -> Result<(), TimeslipError> {
        let body = SessionRef {
            session_id: session_id.into(),
        };
        self.post::<_, SuccessResponse>("activity", session_id, &body)
            .await?;
        Ok(())
    }

    async fn pause(
        &self,
        session_id: &str,
        paused_at: Option<DateTime<Utc>>,
    ) -> Result<(), TimeslipError> {
        let body = PauseRequest {
            session_id: session_id.into(),
            paused_at,
        };
        self.post::<_, SuccessResponse>("pause", session_id, &body)
            .await?;
        Ok(())
    }

    async fn stop(
        &self,
        session_id: &str,
        final_content: &str,
    ) -> Result<StopResponse, TimeslipError> {
        let body = StopRequest {
            session_id: session_id.into(),
            final_content: final_content.into(),
            tone: None,
        };
        let resp = self.call("stop", &body).await?;
        if resp.status() != StatusCode::CONFLICT {
            return read_response("stop", session_id, resp).await;
        }

        // Stopped earlier: use the summary the server already generated.
        match resp.json::<ErrorResponse>().await {
            Ok(ErrorResponse {
                billing_summary: Some(billing_summary),
                time_spent,
                ..
            }) => {
                tracing::info!(session_id, "Session already stopped, using cached summary");
                Ok(StopResponse {
                    success: false,
                    time_spent: time_spent.unwrap_or_default(),
                    billing_summary,
                })
            }
            Ok(rejected) => Err(rejection(
                "stop",
                session_id,
                StatusCode::CONFLICT,
                rejected.error,
            )),
            Err(e) => Err(rejection(
                "stop",
                session_id,
                StatusCode::CONFLICT,
                e.to_string(),
            )),
        }
    }
}

/// Input to the driver loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Keystroke, content mutation or focus on the compose surface.
    Input,
    /// The compose surface is going away.
    Close,
}

/// Run the monitor until the compose surface closes.
///
/// Transitions are forwarded to the server in the background. On close
/// (an explicit `Signal::Close` or the sender being dropped) the timer is
/// flushed to the snapshot store and in-flight sync calls are awaited.
/// Returns the monitor so the caller can stop or inspect it.
pub async fn drive(
    mut monitor: ActivityMonitor,
    sync: Arc<dyn SessionSync>,
    session_id: String,
    mut signals: mpsc::Receiver<Signal>,
    idle_check: Duration,
) -> ActivityMonitor {
    let mut ticker = tokio::time::interval(idle_check);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut pending: JoinSet<()> = JoinSet::new();

    loop {
        let transition = tokio::select! {
            signal = signals.recv() => match signal {
                Some(Signal::Input) => monitor.on_signal(),
                Some(Signal::Close) | None => break,
            },
            _ = ticker.tick() => monitor.check_idle(),
            Some(_) = pending.join_next(), if !pending.is_empty() => None,
        };

        if let Some(transition) = transition {
            let at = paused_at(&monitor, transition);
            forward(&mut pending, sync.clone(), session_id.clone(), transition, at);
        }
    }

    let elapsed = monitor.unload();
    tracing::debug!(session_id = %session_id, elapsed_ms = elapsed, "Compose surface closed");
    let at = paused_at(&monitor, Transition::Paused);
    forward(&mut pending, sync, session_id, Transition::Paused, at);
    while pending.join_next().await.is_some() {}
    monitor
}

/// A pause folds the interval up to the pause instant, which is where the
/// timer's next interval starts.
fn paused_at(monitor: &ActivityMonitor, transition: Transition) -> Option<DateTime<Utc>> {
    match transition {
        Transition::Paused => monitor.timer().state().start_time,
        _ => None,
    }
}

fn forward(
    pending: &mut JoinSet<()>,
    sync: Arc<dyn SessionSync>,
    session_id: String,
    transition: Transition,
    paused_at: Option<DateTime<Utc>>,
) {
    pending.spawn(async move {
        let result = match transition {
            Transition::Resumed | Transition::Heartbeat => sync.activity(&session_id).await,
            Transition::Paused => sync.pause(&session_id, paused_at).await,
        };
        if let Err(e) = result {
            tracing::warn!(session_id = %session_id, ?transition, "Session sync failed: {}", e);
        }
    });
}
