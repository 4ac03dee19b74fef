//! Pomodoro timer: pure countdown state machine plus its async driver.

pub mod engine;
pub mod state;

pub use engine::{TimerEngine, TimerEvent};
pub use state::{CountdownTimer, TickOutcome};
