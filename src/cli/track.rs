// src/cli/track.rs — Terminal compose client
//
// Each line read from stdin counts as compose activity and becomes part
// of the draft. EOF closes the compose surface, flushes the timer and
// stops the session on the server. A run interrupted before EOF leaves
// its timer and session id in the snapshot; the next run resumes it.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::api::types::StartRequest;
use crate::infra::config::Config;
use crate::infra::errors::TimeslipError;
use crate::infra::paths;
use crate::tracker::{
    drive, ActivityMonitor, FileSnapshotStore, HttpSessionSync, MonitorConfig, SessionSync, Signal,
    SystemClock,
};

const IDLE_CHECK: Duration = Duration::from_secs(1);

pub async fn run_track(
    config: &Config,
    server: &str,
    to: &str,
    subject: &str,
    matter: Option<String>,
) -> anyhow::Result<()> {
    paths::ensure_dirs().await?;
    let store = Arc::new(FileSnapshotStore::new(paths::snapshots_dir()));
    let mut monitor = ActivityMonitor::rehydrate(
        MonitorConfig::from(&config.tracking),
        Arc::new(SystemClock),
        store,
    );

    let sync: Arc<dyn SessionSync> = Arc::new(HttpSessionSync::new(
        server,
        config.server.token.clone(),
        config.tracking.sync_retries,
    ));
    let draft = StartRequest {
        to: to.into(),
        subject: subject.into(),
        content: String::new(),
        matter,
    };
    let session_id = attach(&mut monitor, sync.as_ref(), &draft).await?;
    eprintln!("Tracking session {session_id} (Ctrl-D to finish)");

    let (tx, rx) = mpsc::channel(64);
    let driver = tokio::spawn(drive(monitor, sync.clone(), session_id.clone(), rx, IDLE_CHECK));

    let mut text = String::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        text.push_str(&line);
        text.push('\n');
        if tx.send(Signal::Input).await.is_err() {
            break;
        }
    }
    // Send fails only if the driver already exited; it is closing either way.
    let _ = tx.send(Signal::Close).await;

    let mut monitor = driver.await?;
    let local_ms = monitor.stop();

    let stopped = sync.stop(&session_id, &text).await?;
    if !stopped.success {
        eprintln!("Session was already stopped; showing its earlier summary");
    } else if stopped.time_spent != local_ms {
        tracing::info!(
            local_ms,
            server_ms = stopped.time_spent,
            "Local and server time differ"
        );
    }
    println!("{}", serde_json::to_string_pretty(&stopped.billing_summary)?);
    Ok(())
}

/// Bind the monitor to a server session and start it running.
///
/// A snapshot still tracking a known session resumes that session, keeping
/// its accrued time. If the server no longer has it open, the old session
/// is stopped locally and a new one is started.
pub(crate) async fn attach(
    monitor: &mut ActivityMonitor,
    sync: &dyn SessionSync,
    draft: &StartRequest,
) -> Result<String, TimeslipError> {
    if monitor.timer().is_tracking() {
        match monitor.session_id().map(str::to_string) {
            Some(session_id) => match sync.activity(&session_id).await {
                Ok(()) => {
                    monitor.on_signal();
                    tracing::info!(
                        session_id = %session_id,
                        elapsed_ms = monitor.elapsed(),
                        "Resuming session from an earlier run"
                    );
                    return Ok(session_id);
                }
                Err(
                    TimeslipError::SessionNotFound { .. } | TimeslipError::AlreadyStopped { .. },
                ) => {
                    let leftover = monitor.stop();
                    tracing::warn!(
                        session_id = %session_id,
                        elapsed_ms = leftover,
                        "Earlier session is no longer open on the server"
                    );
                }
                Err(e) => return Err(e),
            },
            None => {
                let leftover = monitor.stop();
                tracing::warn!(
                    elapsed_ms = leftover,
                    "Tracking state without a session id; starting fresh"
                );
            }
        }
    }

    let started = sync.start(draft).await?;
    monitor.start()?;
    monitor.bind_session(started.session_id.clone());
    Ok(started.session_id)
}
