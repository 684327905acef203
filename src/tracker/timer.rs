// src/tracker/timer.rs — Elapsed-time accumulator for a compose session
//
// Owns all bookkeeping across pause/resume cycles. Every mutation goes
// through start/pause/resume/stop; the state is plain data so it can be
// snapshotted and rehydrated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::clock::{elapsed_ms, Clock};
use crate::infra::errors::TimeslipError;

/// Serializable timer state (also the local snapshot payload).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub is_tracking: bool,
    /// Start of the current active interval.
    pub start_time: Option<DateTime<Utc>>,
    pub accumulated_ms: u64,
    pub is_paused: bool,
    pub last_activity_time: Option<DateTime<Utc>>,
    /// Server session this timer mirrors, once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

pub struct Timer {
    state: TimerState,
    clock: Arc<dyn Clock>,
}

impl Timer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: TimerState::default(),
            clock,
        }
    }

    /// Rebuild a timer from previously captured state.
    pub fn from_state(state: TimerState, clock: Arc<dyn Clock>) -> Self {
        Self { state, clock }
    }

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    pub fn is_tracking(&self) -> bool {
        self.state.is_tracking
    }

    pub fn is_paused(&self) -> bool {
        self.state.is_paused
    }

    pub fn start(&mut self) -> Result<(), TimeslipError> {
        if self.state.is_tracking {
            return Err(TimeslipError::AlreadyTracking);
        }
        let now = self.clock.now();
        self.state = TimerState {
            is_tracking: true,
            start_time: Some(now),
            accumulated_ms: 0,
            is_paused: false,
            last_activity_time: Some(now),
            session_id: None,
        };
        Ok(())
    }

    pub fn bind_session(&mut self, session_id: impl Into<String>) {
        self.state.session_id = Some(session_id.into());
    }

    /// Fold the in-flight interval and pause. No-op unless actively tracking.
    pub fn pause(&mut self) {
        let now = self.clock.now();
        self.pause_at(now);
    }

    /// Pause as if it happened at `at` (used when an idle period is detected
    /// after the fact).
    pub fn pause_at(&mut self, at: DateTime<Utc>) {
        if !self.state.is_tracking || self.state.is_paused {
            return;
        }
        self.fold_until(at);
        self.state.is_paused = true;
    }

    pub fn resume(&mut self) {
        if !self.state.is_tracking || !self.state.is_paused {
            return;
        }
        self.state.start_time = Some(self.clock.now());
        self.state.is_paused = false;
    }

    /// Refresh the last-activity timestamp.
    pub fn touch(&mut self) {
        self.state.last_activity_time = Some(self.clock.now());
    }

    /// Accumulated time plus the in-flight interval. Pure read.
    pub fn current_elapsed(&self) -> u64 {
        if !self.state.is_tracking || self.state.is_paused {
            return self.state.accumulated_ms;
        }
        let in_flight = self
            .state
            .start_time
            .map(|start| elapsed_ms(start, self.clock.now()))
            .unwrap_or(0);
        self.state.accumulated_ms + in_flight
    }

    /// Fold any in-flight interval and stop tracking. Calling again returns
    /// the same frozen value.
    pub fn stop(&mut self) -> u64 {
        if !self.state.is_tracking {
            return self.state.accumulated_ms;
        }
        if !self.state.is_paused {
            let now = self.clock.now();
            self.fold_until(now);
        }
        self.state.is_tracking = false;
        self.state.accumulated_ms
    }

    fn fold_until(&mut self, at: DateTime<Utc>) {
        if let Some(start) = self.state.start_time {
            self.state.accumulated_ms += elapsed_ms(start, at);
        }
        self.state.start_time = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::clock::ManualClock;

    fn timer() -> (Timer, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        (Timer::new(clock.clone()), clock)
    }

    #[test]
    fn test_start_twice_fails() {
        let (mut t, _) = timer();
        t.start().unwrap();
        assert!(matches!(t.start(), Err(TimeslipError::AlreadyTracking)));
    }

    #[test]
    fn test_elapsed_while_running() {
        let (mut t, clock) = timer();
        t.start().unwrap();
        clock.advance_ms(2_000);
        assert_eq!(t.current_elapsed(), 2_000);
    }

    #[test]
    fn test_paused_time_not_counted() {
        let (mut t, clock) = timer();
        t.start().unwrap();
        clock.advance_ms(1_000);
        t.pause();
        clock.advance_ms(60_000);
        assert_eq!(t.current_elapsed(), 1_000);
        t.resume();
        clock.advance_ms(500);
        assert_eq!(t.current_elapsed(), 1_500);
    }

    #[test]
    fn test_pause_and_resume_are_noops_out_of_state() {
        let (mut t, clock) = timer();
        t.pause();
        assert!(!t.is_paused());

        t.start().unwrap();
        clock.advance_ms(100);
        t.resume();
        assert_eq!(t.current_elapsed(), 100);

        t.pause();
        clock.advance_ms(100);
        t.pause();
        assert_eq!(t.current_elapsed(), 100);
    }

    #[test]
    fn test_interval_sum_matches_elapsed_after_stop() {
        let (mut t, clock) = timer();
        t.start().unwrap();
        let mut expected = 0;
        for (active, idle) in [(1_200, 300), (50, 9_000), (7_000, 1), (0, 20)] {
            clock.advance_ms(active);
            expected += active as u64;
            t.pause();
            clock.advance_ms(idle);
            t.resume();
        }
        clock.advance_ms(400);
        expected += 400;
        let stopped = t.stop();
        assert_eq!(stopped, expected);
        assert_eq!(t.current_elapsed(), expected);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (mut t, clock) = timer();
        t.start().unwrap();
        clock.advance_ms(3_000);
        let first = t.stop();
        let state = t.state().clone();
        clock.advance_ms(10_000);
        let second = t.stop();
        assert_eq!(first, 3_000);
        assert_eq!(first, second);
        assert_eq!(&state, t.state());
    }

    #[test]
    fn test_stop_while_paused_keeps_accumulated() {
        let (mut t, clock) = timer();
        t.start().unwrap();
        clock.advance_ms(700);
        t.pause();
        clock.advance_ms(5_000);
        assert_eq!(t.stop(), 700);
    }

    #[test]
    fn test_resume_after_stop_does_not_restart() {
        let (mut t, clock) = timer();
        t.start().unwrap();
        t.pause();
        t.stop();
        t.resume();
        clock.advance_ms(1_000);
        assert_eq!(t.current_elapsed(), 0);
        assert!(!t.is_tracking());
    }

    #[test]
    fn test_pause_at_past_instant() {
        let (mut t, clock) = timer();
        t.start().unwrap();
        let start = clock.now();
        clock.advance_ms(45_000);
        t.pause_at(start + chrono::Duration::milliseconds(30_000));
        assert_eq!(t.current_elapsed(), 30_000);
    }
}
