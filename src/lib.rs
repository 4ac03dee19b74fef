//! Core library for the Planthesia productivity app: a local task and
//! Pomodoro session store with derived statistics, and the Pomodoro timer
//! state machine that records into it.
//!
//! The crate has three layers:
//! - [`types`]: plain data model (tasks, sessions, stats, timer config).
//! - [`store`]: the synchronous [`LocalStore`](store::LocalStore) over a
//!   pluggable [`StorageBackend`](store::StorageBackend).
//! - [`timer`]: the pure [`CountdownTimer`](timer::CountdownTimer) and the
//!   tokio-driven [`TimerEngine`](timer::TimerEngine) that ticks it once a
//!   second, emits [`TimerEvent`](timer::TimerEvent)s, and records finished
//!   sessions through a shared store.
//!
//! ```no_run
//! use planthesia_core::store::{FileBackend, LocalStore};
//! use planthesia_core::timer::TimerEngine;
//! use planthesia_core::types::TimerConfig;
//! use tokio::sync::mpsc;
//!
//! # async fn demo() {
//! let store = LocalStore::open(FileBackend::new()).into_shared();
//! let (tx, mut events) = mpsc::unbounded_channel();
//! let mut engine = TimerEngine::new(TimerConfig::default(), store, tx);
//!
//! engine.start();
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! # }
//! ```

pub mod store;
pub mod timer;
pub mod types;
