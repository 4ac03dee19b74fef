//! Async driver for the Pomodoro timer.
//!
//! [`TimerEngine`] wraps the pure [`CountdownTimer`] with:
//! - a one-second ticker task (`tokio::time::interval`)
//! - event emission for consumers (progress rings, notifications)
//! - session recording through the shared [`LocalStore`]
//!
//! The ticker is held by a guard that aborts the spawned task when dropped.
//! Every transition that changes the run flag cancels the current ticker
//! first; `start` then installs a fresh one. Dropping the engine cancels
//! any outstanding ticker, so an unmounted consumer cannot leak a running
//! countdown.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info};

use crate::store::{LocalStore, SharedStore};
use crate::types::{NewSession, TimerConfig, TimerPhase};

use super::state::{CountdownTimer, TickOutcome};

/// Locks a mutex, recovering the inner value if a holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// TimerEvent
// ============================================================================

/// Timer events for consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    /// A focus countdown began running.
    FocusStarted {
        /// Task the session will reference, if any.
        task_id: Option<String>,
    },
    /// A focus phase ran to natural zero and its session was recorded.
    FocusCompleted {
        /// Completed-session counter after this session.
        completed_sessions: u32,
        /// Task the session referenced, if any.
        task_id: Option<String>,
    },
    /// A break countdown began (naturally or because focus was skipped).
    BreakStarted {
        /// Which break.
        phase: TimerPhase,
    },
    /// A break ran to natural zero; the timer is back at focus, paused.
    BreakCompleted,
    /// The countdown was paused.
    Paused,
    /// The current phase was reset to its full duration.
    Reset,
    /// The current phase was force-completed.
    Skipped {
        /// Phase that was skipped.
        from: TimerPhase,
    },
    /// One second elapsed.
    Tick {
        /// Remaining seconds after the tick.
        remaining_seconds: u32,
    },
}

// ============================================================================
// Ticker guard
// ============================================================================

/// Handle to the spawned ticker task. Aborts the task on drop, which is the
/// only way a ticker is ever cancelled; all exit paths go through it.
struct Ticker {
    handle: JoinHandle<()>,
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

// ============================================================================
// TimerEngine
// ============================================================================

/// The timer engine.
///
/// Commands never fail: starting a running timer or pausing an idle one are
/// no-ops, and consumers that dropped their event receiver simply stop
/// getting events.
pub struct TimerEngine {
    timer: Arc<Mutex<CountdownTimer>>,
    store: SharedStore,
    event_tx: mpsc::UnboundedSender<TimerEvent>,
    ticker: Option<Ticker>,
}

impl TimerEngine {
    /// Creates an engine over a shared store and event channel.
    ///
    /// The long-break cadence counter is seeded from the store's completed
    /// sessions for today, so the cadence continues across restarts.
    pub fn new(
        config: TimerConfig,
        store: SharedStore,
        event_tx: mpsc::UnboundedSender<TimerEvent>,
    ) -> Self {
        let mut timer = CountdownTimer::new(config);
        timer.set_completed_sessions(lock(&store).sessions_completed_today());
        Self {
            timer: Arc::new(Mutex::new(timer)),
            store,
            event_tx,
            ticker: None,
        }
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    /// Starts (or resumes) the countdown. No-op while already running.
    pub fn start(&mut self) {
        let (phase, task_id) = {
            let mut timer = lock(&self.timer);
            if timer.is_active() {
                return;
            }
            timer.start(Utc::now());
            (timer.phase(), timer.selected_task().map(str::to_string))
        };

        info!(phase = phase.as_str(), "timer started");
        match phase {
            TimerPhase::Focus => self.emit(TimerEvent::FocusStarted { task_id }),
            other => self.emit(TimerEvent::BreakStarted { phase: other }),
        }

        // Cancel-then-reschedule: never two tickers for one engine
        self.ticker = None;
        self.ticker = Some(self.spawn_ticker());
    }

    /// Pauses the countdown, preserving remaining time and the session
    /// start. No-op while already paused.
    pub fn pause(&mut self) {
        {
            let mut timer = lock(&self.timer);
            if !timer.is_active() {
                return;
            }
            timer.pause();
        }
        self.ticker = None;
        info!("timer paused");
        self.emit(TimerEvent::Paused);
    }

    /// Pauses and restores the full duration of the current phase. A focus
    /// attempt in flight is abandoned without a record.
    pub fn reset(&mut self) {
        lock(&self.timer).reset();
        self.ticker = None;
        info!("timer reset");
        self.emit(TimerEvent::Reset);
    }

    /// Force-completes the current phase. A started focus phase records a
    /// partial session; a break records nothing.
    pub fn skip(&mut self) {
        self.ticker = None;
        let now = Utc::now();
        let (from, session, next) = {
            let mut timer = lock(&self.timer);
            let from = timer.phase();
            let session = timer.skip(now);
            (from, session, timer.phase())
        };

        if let Some(draft) = session {
            lock(&self.store).add_pomodoro(draft);
        }

        info!(from = from.as_str(), to = next.as_str(), "phase skipped");
        self.emit(TimerEvent::Skipped { from });
        if next.is_break() {
            self.emit(TimerEvent::BreakStarted { phase: next });
        }
    }

    // ------------------------------------------------------------------------
    // Read access / configuration
    // ------------------------------------------------------------------------

    /// Seconds left in the current phase.
    pub fn remaining_seconds(&self) -> u32 {
        lock(&self.timer).remaining_seconds()
    }

    /// Current phase.
    pub fn phase(&self) -> TimerPhase {
        lock(&self.timer).phase()
    }

    /// True while the countdown is running.
    pub fn is_active(&self) -> bool {
        lock(&self.timer).is_active()
    }

    /// Focus sessions completed today, driving the long-break cadence.
    pub fn completed_sessions_today(&self) -> u32 {
        lock(&self.timer).completed_sessions()
    }

    /// Fraction of the current phase already elapsed.
    pub fn progress(&self) -> f64 {
        lock(&self.timer).progress()
    }

    /// Current configuration.
    pub fn config(&self) -> TimerConfig {
        lock(&self.timer).config().clone()
    }

    /// Replaces the configuration; see
    /// [`CountdownTimer::set_config`](super::CountdownTimer::set_config).
    pub fn set_config(&mut self, config: TimerConfig) {
        lock(&self.timer).set_config(config);
    }

    /// Selects the task the next session will reference.
    pub fn set_selected_task(&mut self, task_id: Option<String>) {
        lock(&self.timer).set_selected_task(task_id);
    }

    /// Task the next session will reference.
    pub fn selected_task(&self) -> Option<String> {
        lock(&self.timer).selected_task().map(str::to_string)
    }

    /// The store this engine records sessions into.
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn emit(&self, event: TimerEvent) {
        // Consumer gone; commands stay infallible
        let _ = self.event_tx.send(event);
    }

    fn spawn_ticker(&self) -> Ticker {
        let timer = Arc::clone(&self.timer);
        let store = Arc::clone(&self.store);
        let event_tx = self.event_tx.clone();
        let handle = tokio::spawn(async move {
            if let Err(err) = run_ticker(timer, store, event_tx).await {
                debug!(error = %err, "ticker stopped");
            }
        });
        Ticker { handle }
    }
}

/// Ticks once per second until the countdown pauses or the phase completes.
async fn run_ticker(
    timer: Arc<Mutex<CountdownTimer>>,
    store: Arc<Mutex<LocalStore>>,
    event_tx: mpsc::UnboundedSender<TimerEvent>,
) -> Result<()> {
    let mut ticker = interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first interval tick completes immediately; consume it so the
    // countdown loses its first second a full second from now
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let (remaining, outcome) = {
            let mut timer = lock(&timer);
            if !timer.is_active() {
                return Ok(());
            }
            let outcome = timer.tick(Utc::now());
            (timer.remaining_seconds(), outcome)
        };

        event_tx
            .send(TimerEvent::Tick {
                remaining_seconds: remaining,
            })
            .context("tick receiver dropped")?;

        let Some(outcome) = outcome else {
            continue;
        };

        match outcome {
            TickOutcome::FocusFinished {
                session,
                next_phase,
            } => {
                let task_id = session.task_id.clone();
                record_session(&store, session);
                let completed_sessions = lock(&timer).completed_sessions();
                info!(completed_sessions, "focus session completed");

                event_tx
                    .send(TimerEvent::FocusCompleted {
                        completed_sessions,
                        task_id,
                    })
                    .context("event receiver dropped")?;
                event_tx
                    .send(TimerEvent::BreakStarted { phase: next_phase })
                    .context("event receiver dropped")?;
            }
            TickOutcome::BreakFinished => {
                info!("break completed");
                event_tx
                    .send(TimerEvent::BreakCompleted)
                    .context("event receiver dropped")?;
            }
        }

        // Phase complete: the timer paused itself, this ticker is done
        return Ok(());
    }
}

fn record_session(store: &SharedStore, draft: NewSession) {
    lock(store).add_pomodoro(draft);
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBackend;
    use crate::types::NewTask;

    fn create_engine() -> (TimerEngine, mpsc::UnboundedReceiver<TimerEvent>) {
        create_engine_with_config(TimerConfig::default())
    }

    fn create_engine_with_config(
        config: TimerConfig,
    ) -> (TimerEngine, mpsc::UnboundedReceiver<TimerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let store = LocalStore::open(MemoryBackend::new()).into_shared();
        let engine = TimerEngine::new(config, store, tx);
        (engine, rx)
    }

    /// Receives events until one matches, panicking if the channel closes.
    async fn recv_until(
        rx: &mut mpsc::UnboundedReceiver<TimerEvent>,
        mut pred: impl FnMut(&TimerEvent) -> bool,
    ) -> TimerEvent {
        loop {
            let event = rx.recv().await.expect("event channel closed");
            if pred(&event) {
                return event;
            }
        }
    }

    mod command_tests {
        use super::*;

        #[tokio::test]
        async fn test_new_engine_initial_state() {
            let (engine, _rx) = create_engine();
            assert_eq!(engine.phase(), TimerPhase::Focus);
            assert!(!engine.is_active());
            assert_eq!(engine.remaining_seconds(), 25 * 60);
            assert_eq!(engine.completed_sessions_today(), 0);
        }

        #[tokio::test]
        async fn test_start_emits_focus_started() {
            let (mut engine, mut rx) = create_engine();
            engine.set_selected_task(Some("t1".to_string()));
            engine.start();

            assert!(engine.is_active());
            let event = rx.try_recv().unwrap();
            assert_eq!(
                event,
                TimerEvent::FocusStarted {
                    task_id: Some("t1".to_string())
                }
            );
        }

        #[tokio::test]
        async fn test_start_twice_is_idempotent() {
            let (mut engine, mut rx) = create_engine();
            engine.start();
            let _ = rx.try_recv();

            engine.start();
            assert!(rx.try_recv().is_err(), "no second start event");
        }

        #[tokio::test]
        async fn test_pause_emits_once() {
            let (mut engine, mut rx) = create_engine();
            engine.start();
            let _ = rx.try_recv();

            engine.pause();
            assert!(!engine.is_active());
            assert_eq!(rx.try_recv().unwrap(), TimerEvent::Paused);

            engine.pause();
            assert!(rx.try_recv().is_err(), "second pause is a no-op");
        }

        #[tokio::test]
        async fn test_reset_restores_full_phase() {
            let (mut engine, mut rx) = create_engine();
            engine.start();
            engine.reset();

            assert!(!engine.is_active());
            assert_eq!(engine.remaining_seconds(), 25 * 60);
            let _ = rx.try_recv(); // FocusStarted
            assert_eq!(rx.try_recv().unwrap(), TimerEvent::Reset);
        }

        #[tokio::test]
        async fn test_skip_unstarted_focus_records_nothing() {
            let (mut engine, mut rx) = create_engine();
            engine.skip();

            assert_eq!(engine.phase(), TimerPhase::ShortBreak);
            assert_eq!(
                rx.try_recv().unwrap(),
                TimerEvent::Skipped {
                    from: TimerPhase::Focus
                }
            );
            let store = engine.store().lock().unwrap();
            assert!(store.pomodoros().is_empty());
        }

        #[tokio::test]
        async fn test_skip_started_focus_records_partial_session() {
            let (mut engine, mut rx) = create_engine();
            engine.start();
            engine.skip();

            {
                let store = engine.store().lock().unwrap();
                assert_eq!(store.pomodoros().len(), 1);
                let session = &store.pomodoros()[0];
                assert!(!session.completed);
                assert_eq!(session.duration, 0);
            }
            assert_eq!(engine.phase(), TimerPhase::ShortBreak);
            assert!(!engine.is_active());

            let _ = rx.try_recv(); // FocusStarted
            assert_eq!(
                rx.try_recv().unwrap(),
                TimerEvent::Skipped {
                    from: TimerPhase::Focus
                }
            );
            assert_eq!(
                rx.try_recv().unwrap(),
                TimerEvent::BreakStarted {
                    phase: TimerPhase::ShortBreak
                }
            );
        }

        #[tokio::test]
        async fn test_skip_break_returns_to_focus() {
            let (mut engine, mut rx) = create_engine();
            engine.skip(); // focus -> short break
            engine.skip(); // break -> focus

            assert_eq!(engine.phase(), TimerPhase::Focus);
            assert_eq!(engine.remaining_seconds(), 25 * 60);

            let _ = rx.try_recv(); // Skipped focus
            assert_eq!(
                rx.try_recv().unwrap(),
                TimerEvent::Skipped {
                    from: TimerPhase::ShortBreak
                }
            );
        }

        #[tokio::test]
        async fn test_counter_seeded_from_store_history() {
            let (tx, _rx) = mpsc::unbounded_channel();
            let store = LocalStore::open(MemoryBackend::new()).into_shared();
            {
                let mut store = store.lock().unwrap();
                for _ in 0..3 {
                    store.add_pomodoro(crate::types::NewSession {
                        start_time: Utc::now(),
                        end_time: Some(Utc::now()),
                        duration: 25,
                        task_id: None,
                        completed: true,
                    });
                }
            }

            let engine = TimerEngine::new(TimerConfig::default(), store, tx);
            assert_eq!(engine.completed_sessions_today(), 3);
        }
    }

    mod ticker_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_ticks_decrement_once_per_second() {
            let (mut engine, mut rx) = create_engine();
            engine.start();
            let _ = rx.try_recv(); // FocusStarted

            for expected in (25 * 60 - 10..25 * 60).rev() {
                let event = recv_until(&mut rx, |e| matches!(e, TimerEvent::Tick { .. })).await;
                assert_eq!(
                    event,
                    TimerEvent::Tick {
                        remaining_seconds: expected
                    }
                );
            }
            assert_eq!(engine.remaining_seconds(), 25 * 60 - 10);
        }

        #[tokio::test(start_paused = true)]
        async fn test_restart_does_not_double_tick() {
            let (mut engine, mut rx) = create_engine();
            engine.start();
            engine.start(); // second start must not install a second ticker

            for _ in 0..10 {
                recv_until(&mut rx, |e| matches!(e, TimerEvent::Tick { .. })).await;
            }
            assert_eq!(engine.remaining_seconds(), 25 * 60 - 10);
        }

        #[tokio::test(start_paused = true)]
        async fn test_focus_completion_records_session_and_breaks() {
            let (mut engine, mut rx) = create_engine();
            engine.start();

            let event =
                recv_until(&mut rx, |e| matches!(e, TimerEvent::FocusCompleted { .. })).await;
            assert_eq!(
                event,
                TimerEvent::FocusCompleted {
                    completed_sessions: 1,
                    task_id: None
                }
            );

            let event = rx.recv().await.unwrap();
            assert_eq!(
                event,
                TimerEvent::BreakStarted {
                    phase: TimerPhase::ShortBreak
                }
            );

            {
                let store = engine.store().lock().unwrap();
                assert_eq!(store.pomodoros().len(), 1);
                let session = &store.pomodoros()[0];
                assert!(session.completed);
                assert_eq!(session.duration, 25);
                assert!(session.end_time.unwrap() >= session.start_time);
            }
            assert_eq!(engine.phase(), TimerPhase::ShortBreak);
            assert!(!engine.is_active());
            assert_eq!(engine.remaining_seconds(), 5 * 60);
        }

        #[tokio::test(start_paused = true)]
        async fn test_fourth_session_gets_long_break() {
            let config = TimerConfig::default().with_focus_minutes(1);
            let (mut engine, mut rx) = create_engine_with_config(config);

            for session in 1..=4u32 {
                engine.start();
                let event =
                    recv_until(&mut rx, |e| matches!(e, TimerEvent::BreakStarted { .. })).await;
                let expected = if session == 4 {
                    TimerPhase::LongBreak
                } else {
                    TimerPhase::ShortBreak
                };
                assert_eq!(event, TimerEvent::BreakStarted { phase: expected });

                // Run the break down so the next cycle starts at focus
                engine.start();
                recv_until(&mut rx, |e| matches!(e, TimerEvent::BreakCompleted)).await;
            }
        }

        #[tokio::test(start_paused = true)]
        async fn test_pause_stops_ticks() {
            let (mut engine, mut rx) = create_engine();
            engine.start();
            recv_until(&mut rx, |e| matches!(e, TimerEvent::Tick { .. })).await;

            engine.pause();
            recv_until(&mut rx, |e| matches!(e, TimerEvent::Paused)).await;
            let remaining = engine.remaining_seconds();

            // With the ticker cancelled, no further ticks arrive
            tokio::time::sleep(Duration::from_secs(5)).await;
            assert!(rx.try_recv().is_err());
            assert_eq!(engine.remaining_seconds(), remaining);
        }

        #[tokio::test(start_paused = true)]
        async fn test_drop_cancels_ticker() {
            let (mut engine, mut rx) = create_engine();
            engine.start();
            recv_until(&mut rx, |e| matches!(e, TimerEvent::Tick { .. })).await;

            drop(engine);
            tokio::time::sleep(Duration::from_secs(5)).await;
            while let Ok(event) = rx.try_recv() {
                assert!(
                    matches!(event, TimerEvent::Tick { .. }),
                    "only stale ticks may remain"
                );
            }
        }

        #[tokio::test(start_paused = true)]
        async fn test_completed_session_counts_in_store_stats() {
            let (mut engine, mut rx) = create_engine();
            {
                let mut store = engine.store().lock().unwrap();
                let task = store.add_task(NewTask::new("Deep work"));
                drop(store);
                engine.set_selected_task(Some(task.id));
            }
            engine.start();

            recv_until(&mut rx, |e| matches!(e, TimerEvent::FocusCompleted { .. })).await;

            let store = engine.store().lock().unwrap();
            assert_eq!(store.stats().total_pomodoros, 1);
            assert_eq!(store.stats().total_focus_time, 25);
            assert!(store.pomodoros()[0].task_id.is_some());
        }
    }
}
