//! Countdown state machine for the Pomodoro timer.
//!
//! [`CountdownTimer`] is the pure core: it owns the phase, the run flag,
//! the remaining seconds, the session-start timestamp, and the completed
//! session counter, and it decides phase transitions. It performs no I/O
//! and takes `now` as an argument wherever a timestamp is involved, which
//! keeps every transition directly testable. The async driver lives in
//! [`engine`](super::engine).
//!
//! All operations are total: starting a running timer, pausing an idle one,
//! or skipping a phase that never began are well-defined no-ops or resets,
//! never errors.

use chrono::{DateTime, Utc};

use crate::types::{NewSession, TimerConfig, TimerPhase};

// ============================================================================
// TickOutcome
// ============================================================================

/// What a tick that reached zero produced.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// A focus phase ran to natural zero. The session must be recorded and
    /// the timer has moved to `next_phase`, paused.
    FocusFinished {
        session: NewSession,
        next_phase: TimerPhase,
    },
    /// A break ran to natural zero. The timer is back at a full focus
    /// phase, paused. Breaks are not persisted.
    BreakFinished,
}

// ============================================================================
// CountdownTimer
// ============================================================================

/// The timer state machine.
///
/// Initial state: focus phase, paused, full focus duration remaining.
#[derive(Debug, Clone)]
pub struct CountdownTimer {
    config: TimerConfig,
    phase: TimerPhase,
    active: bool,
    remaining_seconds: u32,
    session_started_at: Option<DateTime<Utc>>,
    completed_sessions: u32,
    selected_task: Option<String>,
}

impl CountdownTimer {
    /// Creates a timer at its initial state under the given configuration.
    pub fn new(config: TimerConfig) -> Self {
        let remaining_seconds = config.phase_seconds(TimerPhase::Focus);
        Self {
            config,
            phase: TimerPhase::Focus,
            active: false,
            remaining_seconds,
            session_started_at: None,
            completed_sessions: 0,
            selected_task: None,
        }
    }

    // ------------------------------------------------------------------------
    // Read access
    // ------------------------------------------------------------------------

    /// Seconds left in the current phase.
    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    /// Current phase.
    pub fn phase(&self) -> TimerPhase {
        self.phase
    }

    /// True while the countdown is running.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Sessions completed since this counter was last seeded.
    pub fn completed_sessions(&self) -> u32 {
        self.completed_sessions
    }

    /// The instant the current focus phase was first started, if any.
    /// Survives pause; cleared by reset and by phase transitions.
    pub fn session_started_at(&self) -> Option<DateTime<Utc>> {
        self.session_started_at
    }

    /// Task the next recorded session will reference.
    pub fn selected_task(&self) -> Option<&str> {
        self.selected_task.as_deref()
    }

    /// Current configuration.
    pub fn config(&self) -> &TimerConfig {
        &self.config
    }

    /// Fraction of the current phase already elapsed, in `0.0..=1.0`.
    /// A zero-length phase reports 0 instead of dividing by zero.
    pub fn progress(&self) -> f64 {
        let total = self.config.phase_seconds(self.phase);
        if total == 0 {
            return 0.0;
        }
        let elapsed = total.saturating_sub(self.remaining_seconds);
        f64::from(elapsed) / f64::from(total)
    }

    // ------------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------------

    /// Selects the task the next session record will reference.
    pub fn set_selected_task(&mut self, task_id: Option<String>) {
        self.selected_task = task_id;
    }

    /// Seeds the completed-session counter, e.g. from today's persisted
    /// history, so the long-break cadence continues across restarts.
    pub fn set_completed_sessions(&mut self, count: u32) {
        self.completed_sessions = count;
    }

    /// Replaces the configuration.
    ///
    /// A fully reset timer (paused, no session underway, untouched
    /// countdown) re-bases its remaining time on the new duration; an
    /// in-flight countdown keeps its remaining time, clamped so it never
    /// exceeds the new phase duration.
    pub fn set_config(&mut self, config: TimerConfig) {
        let fully_reset = !self.active
            && self.session_started_at.is_none()
            && self.remaining_seconds == self.config.phase_seconds(self.phase);
        self.config = config;
        if fully_reset {
            self.remaining_seconds = self.config.phase_seconds(self.phase);
        } else {
            self.remaining_seconds = self
                .remaining_seconds
                .min(self.config.phase_seconds(self.phase));
        }
    }

    // ------------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------------

    /// Sets the run flag. Entering a focus phase from a fully reset state
    /// stamps the session-start timestamp. Idempotent while running.
    pub fn start(&mut self, now: DateTime<Utc>) {
        if self.active {
            return;
        }
        self.active = true;
        if self.phase == TimerPhase::Focus && self.session_started_at.is_none() {
            self.session_started_at = Some(now);
        }
    }

    /// Clears the run flag. Remaining time and the session-start timestamp
    /// are preserved. Idempotent while paused.
    pub fn pause(&mut self) {
        self.active = false;
    }

    /// Pauses and restores the full duration of the current phase. In a
    /// focus phase the session-start timestamp is cleared, abandoning the
    /// attempt without a record.
    pub fn reset(&mut self) {
        self.active = false;
        self.remaining_seconds = self.config.phase_seconds(self.phase);
        if self.phase == TimerPhase::Focus {
            self.session_started_at = None;
        }
    }

    /// Advances the countdown by one second.
    ///
    /// Returns `None` while the timer is paused or time remains. When the
    /// countdown reaches zero the run flag clears and the phase advances;
    /// this is the only transition that changes phase besides [`skip`].
    ///
    /// [`skip`]: Self::skip
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<TickOutcome> {
        if !self.active {
            return None;
        }
        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds > 0 {
            return None;
        }
        self.active = false;
        Some(self.complete_phase(now))
    }

    /// Force-completes the current phase.
    ///
    /// Skipping a focus phase that was started returns a partial session
    /// record (`completed = false`, duration in elapsed whole minutes,
    /// floored) and moves to the appropriate break. Skipping a focus phase
    /// that never began records nothing and still moves on. Skipping a
    /// break returns to a full focus phase. The timer is paused afterwards.
    pub fn skip(&mut self, now: DateTime<Utc>) -> Option<NewSession> {
        self.active = false;
        if self.phase != TimerPhase::Focus {
            self.enter_phase(TimerPhase::Focus);
            return None;
        }

        let session = self.session_started_at.take().map(|started_at| {
            let total = self.config.phase_seconds(TimerPhase::Focus);
            let elapsed_minutes = total.saturating_sub(self.remaining_seconds) / 60;
            NewSession {
                start_time: started_at,
                end_time: Some(now),
                duration: elapsed_minutes,
                task_id: self.selected_task.clone(),
                completed: false,
            }
        });
        self.enter_phase(self.select_break());
        session
    }

    fn complete_phase(&mut self, now: DateTime<Utc>) -> TickOutcome {
        if self.phase != TimerPhase::Focus {
            self.enter_phase(TimerPhase::Focus);
            return TickOutcome::BreakFinished;
        }

        let session = NewSession {
            start_time: self.session_started_at.take().unwrap_or(now),
            end_time: Some(now),
            duration: self.config.focus_minutes,
            task_id: self.selected_task.clone(),
            completed: true,
        };
        self.completed_sessions += 1;
        let next_phase = self.select_break();
        self.enter_phase(next_phase);
        TickOutcome::FocusFinished {
            session,
            next_phase,
        }
    }

    /// Break selection: long break on every Nth completed session.
    fn select_break(&self) -> TimerPhase {
        let cadence = self.config.sessions_until_long_break;
        if cadence > 0 && self.completed_sessions > 0 && self.completed_sessions % cadence == 0 {
            TimerPhase::LongBreak
        } else {
            TimerPhase::ShortBreak
        }
    }

    fn enter_phase(&mut self, phase: TimerPhase) {
        self.phase = phase;
        self.remaining_seconds = self.config.phase_seconds(phase);
        self.session_started_at = None;
    }
}

impl Default for CountdownTimer {
    fn default() -> Self {
        Self::new(TimerConfig::default())
    }
}

// ============================================================================
// Tests
// ============================================================================
