// src/tracker/monitor.rs — Activity monitor for the compose surface
//
// Turns raw input signals (keystrokes, content mutations, focus) into
// timer transitions: resume on activity, pause after the idle threshold.
// Heartbeats toward the server are coalesced to one per debounce window.
// The timer state is snapshotted on every transition so a reload can
// rehydrate it.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use super::clock::Clock;
use super::snapshot::SnapshotStore;
use super::timer::{Timer, TimerState};
use crate::infra::config::TrackingConfig;
use crate::infra::errors::TimeslipError;

/// Snapshot key for the tracking-status object.
pub const SNAPSHOT_KEY: &str = "tracking-status";

/// Transition the caller should forward to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Resumed,
    Paused,
    Heartbeat,
}

#[derive(Debug, Clone, Copy)]
pub struct MonitorConfig {
    pub idle_timeout: Duration,
    pub debounce: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        (&TrackingConfig::default()).into()
    }
}

impl From<&TrackingConfig> for MonitorConfig {
    fn from(c: &TrackingConfig) -> Self {
        Self {
            idle_timeout: c.idle_timeout(),
            debounce: c.debounce(),
        }
    }
}

/// Saturates instead of overflowing on absurd configured durations.
fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::weeks(52 * 1_000))
}

pub struct ActivityMonitor {
    timer: Timer,
    clock: Arc<dyn Clock>,
    store: Arc<dyn SnapshotStore>,
    config: MonitorConfig,
    last_heartbeat: Option<DateTime<Utc>>,
}

impl ActivityMonitor {
    pub fn new(config: MonitorConfig, clock: Arc<dyn Clock>, store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            timer: Timer::new(clock.clone()),
            clock,
            store,
            config,
            last_heartbeat: None,
        }
    }

    /// Restore from the local snapshot, if one exists.
    ///
    /// A snapshot that was not paused (the page died without an unload
    /// flush) is restored paused, with the in-flight interval counted up to
    /// the point the idle timeout would have fired.
    pub fn rehydrate(
        config: MonitorConfig,
        clock: Arc<dyn Clock>,
        store: Arc<dyn SnapshotStore>,
    ) -> Self {
        let state = match store.get(SNAPSHOT_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<TimerState>(&raw) {
                Ok(state) => Some(state),
                Err(e) => {
                    tracing::warn!("Discarding unreadable tracking snapshot: {}", e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Failed to read tracking snapshot: {}", e);
                None
            }
        };

        let Some(state) = state else {
            return Self::new(config, clock, store);
        };

        let mut timer = Timer::from_state(state, clock.clone());
        if timer.is_tracking() && !timer.is_paused() {
            let now = clock.now();
            let cutoff = timer
                .state()
                .last_activity_time
                .and_then(|t| t.checked_add_signed(to_chrono(config.idle_timeout)))
                .map(|deadline| deadline.min(now))
                .unwrap_or(now);
            timer.pause_at(cutoff);
        }

        tracing::debug!(
            tracking = timer.is_tracking(),
            accumulated_ms = timer.state().accumulated_ms,
            "Rehydrated tracking snapshot"
        );

        let monitor = Self {
            timer,
            clock,
            store,
            config,
            last_heartbeat: None,
        };
        monitor.persist();
        monitor
    }

    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    pub fn elapsed(&self) -> u64 {
        self.timer.current_elapsed()
    }

    pub fn start(&mut self) -> Result<(), TimeslipError> {
        self.timer.start()?;
        self.last_heartbeat = None;
        self.persist();
        Ok(())
    }

    /// Handle one qualifying input signal.
    pub fn on_signal(&mut self) -> Option<Transition> {
        if !self.timer.is_tracking() {
            return None;
        }
        let now = self.clock.now();
        self.timer.touch();

        if self.timer.is_paused() {
            self.timer.resume();
            self.last_heartbeat = Some(now);
            self.persist();
            return Some(Transition::Resumed);
        }

        let due = self
            .last_heartbeat
            .map_or(true, |last| now - last >= to_chrono(self.config.debounce));
        if due {
            self.last_heartbeat = Some(now);
            self.persist();
            return Some(Transition::Heartbeat);
        }
        None
    }

    /// Pause if the idle threshold has passed since the last signal.
    pub fn check_idle(&mut self) -> Option<Transition> {
        let deadline = self.idle_deadline()?;
        if self.clock.now() < deadline {
            return None;
        }
        self.timer.pause_at(deadline);
        self.persist();
        tracing::debug!(
            accumulated_ms = self.timer.state().accumulated_ms,
            "Compose surface idle, pausing"
        );
        Some(Transition::Paused)
    }

    /// When the idle pause would fire, if the timer is running.
    pub fn idle_deadline(&self) -> Option<DateTime<Utc>> {
        if !self.timer.is_tracking() || self.timer.is_paused() {
            return None;
        }
        let last = self.timer.state().last_activity_time?;
        last.checked_add_signed(to_chrono(self.config.idle_timeout))
    }

    /// Server session the timer is tracking for, if bound.
    pub fn session_id(&self) -> Option<&str> {
        self.timer.state().session_id.as_deref()
    }

    /// Record the server session id in the snapshot so a later run can
    /// resume it.
    pub fn bind_session(&mut self, session_id: impl Into<String>) {
        self.timer.bind_session(session_id);
        self.persist();
    }

    /// Flush on compose-surface close: pause, fold, snapshot.
    pub fn unload(&mut self) -> u64 {
        self.timer.pause();
        self.persist();
        self.timer.current_elapsed()
    }

    pub fn stop(&mut self) -> u64 {
        let elapsed = self.timer.stop();
        self.persist();
        elapsed
    }

    /// Snapshot failures are logged and swallowed; tracking continues in memory.
    fn persist(&self) {
        let payload = match serde_json::to_string(self.timer.state()) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("Failed to serialize tracking snapshot: {}", e);
                return;
            }
        };
        if let Err(e) = self.store.set(SNAPSHOT_KEY, &payload) {
            tracing::warn!("Failed to write tracking snapshot: {}", e);
        }
    }
}
