//! Local data store for tasks, Pomodoro sessions, and derived statistics.
//!
//! The store owns the three collections, recomputes aggregate statistics
//! synchronously after every mutation, and persists each collection to its
//! own keyed slot. Persistence failures are logged and swallowed: in-memory
//! state stays authoritative for the rest of the session (the original app
//! behaved the same way when browser storage was unavailable).

pub mod backend;
pub mod error;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::{Local, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::types::{Category, NewSession, NewTask, PomodoroSession, Task, TaskUpdate, UserStats};

pub use backend::{FileBackend, MemoryBackend, StorageBackend};
pub use error::StorageError;

/// Slot key for the task collection.
pub const TASKS_SLOT: &str = "planthesia_tasks";
/// Slot key for the session history.
pub const POMODOROS_SLOT: &str = "planthesia_pomodoros";
/// Slot key for the stats record.
pub const STATS_SLOT: &str = "planthesia_stats";

/// A store shared between the timer engine and consumers.
pub type SharedStore = Arc<Mutex<LocalStore>>;

// ============================================================================
// StreakPolicy
// ============================================================================

/// How the day streak is maintained.
///
/// The original app only ever raised the streak to at least 1 on a day with
/// a task completion and never reset it, so the counter could only grow.
/// That behavior is kept as the default rather than silently fixed;
/// `Consecutive` derives a true consecutive-day streak instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakPolicy {
    /// Faithful to the original: `max(streak, 1)` on a day with a
    /// completion, never decremented.
    GrowOnly,
    /// Length of the consecutive run of task-completion days ending today
    /// (or yesterday, when today has no completion yet).
    Consecutive,
}

impl Default for StreakPolicy {
    fn default() -> Self {
        StreakPolicy::GrowOnly
    }
}

// ============================================================================
// TaskFocus
// ============================================================================

/// Per-task focus totals, aggregated from completed sessions.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskFocus {
    /// Display title; falls back to a placeholder for deleted tasks and
    /// general (task-less) sessions.
    pub title: String,
    /// The referenced task id, if the sessions named one.
    pub task_id: Option<String>,
    /// Completed session count.
    pub sessions: u32,
    /// Total focus minutes.
    pub total_minutes: u32,
    /// Category of the referenced task, if it still exists.
    pub category: Option<Category>,
}

// ============================================================================
// LocalStore
// ============================================================================

/// Placeholder title for sessions without a task reference.
const GENERAL_FOCUS_TITLE: &str = "General Focus";
/// Placeholder title for sessions whose task has since been deleted.
const DELETED_TASK_TITLE: &str = "Deleted Task";

/// The local store.
pub struct LocalStore {
    backend: Box<dyn StorageBackend>,
    tasks: Vec<Task>,
    pomodoros: Vec<PomodoroSession>,
    stats: UserStats,
    loading: bool,
    streak_policy: StreakPolicy,
}

impl LocalStore {
    /// Opens a store over the given backend, loading all three slots.
    ///
    /// A missing or corrupt slot loads as its default value; storage read
    /// failures are logged and leave the corresponding collection empty.
    pub fn open(backend: impl StorageBackend + 'static) -> Self {
        let mut store = Self {
            backend: Box::new(backend),
            tasks: Vec::new(),
            pomodoros: Vec::new(),
            stats: UserStats::default(),
            loading: true,
            streak_policy: StreakPolicy::default(),
        };
        store.load_slots();
        store.loading = false;
        store
    }

    /// Opens a store backed by throwaway in-memory storage.
    pub fn open_in_memory() -> Self {
        Self::open(MemoryBackend::new())
    }

    /// Wraps the store for sharing with a timer engine.
    pub fn into_shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    // ------------------------------------------------------------------------
    // Read access
    // ------------------------------------------------------------------------

    /// All tasks, newest first.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Full session history, newest first.
    pub fn pomodoros(&self) -> &[PomodoroSession] {
        &self.pomodoros
    }

    /// Current aggregate statistics.
    pub fn stats(&self) -> &UserStats {
        &self.stats
    }

    /// True while a load from storage is in progress.
    pub fn loading(&self) -> bool {
        self.loading
    }

    /// Looks up a task by id.
    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Tasks not yet completed, the source for the timer's task picker.
    pub fn pending_tasks(&self) -> Vec<&Task> {
        self.tasks.iter().filter(|t| !t.completed).collect()
    }

    /// Resolves a session's weak task reference to a display title.
    ///
    /// `None` means a general focus session; a dangling id resolves to a
    /// deleted-task placeholder rather than an error.
    pub fn task_title(&self, task_id: Option<&str>) -> String {
        match task_id {
            None => GENERAL_FOCUS_TITLE.to_string(),
            Some(id) => self
                .task(id)
                .map(|t| t.title.clone())
                .unwrap_or_else(|| DELETED_TASK_TITLE.to_string()),
        }
    }

    /// Count of completed sessions whose start time falls on the local
    /// calendar date.
    pub fn sessions_completed_today(&self) -> u32 {
        let today = Local::now().date_naive();
        self.pomodoros
            .iter()
            .filter(|s| s.completed && s.start_time.with_timezone(&Local).date_naive() == today)
            .count() as u32
    }

    /// Completed sessions, newest start time first, at most `limit`.
    pub fn recent_sessions(&self, limit: usize) -> Vec<&PomodoroSession> {
        let mut sessions: Vec<&PomodoroSession> =
            self.pomodoros.iter().filter(|s| s.completed).collect();
        sessions.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        sessions.truncate(limit);
        sessions
    }

    /// Per-task focus totals over completed sessions, most minutes first,
    /// at most `limit` buckets. The original dashboard showed the top 5.
    ///
    /// Sessions referencing deleted tasks aggregate under a placeholder
    /// title, and task-less sessions under a general bucket.
    pub fn focus_by_task(&self, limit: usize) -> Vec<TaskFocus> {
        let mut buckets: Vec<TaskFocus> = Vec::new();
        for session in self.pomodoros.iter().filter(|s| s.completed) {
            let key = session.task_id.as_deref();
            if let Some(bucket) = buckets.iter_mut().find(|b| b.task_id.as_deref() == key) {
                bucket.sessions += 1;
                bucket.total_minutes += session.duration;
            } else {
                buckets.push(TaskFocus {
                    title: self.task_title(key),
                    task_id: session.task_id.clone(),
                    sessions: 1,
                    total_minutes: session.duration,
                    category: key.and_then(|id| self.task(id)).map(|t| t.category),
                });
            }
        }
        buckets.sort_by(|a, b| b.total_minutes.cmp(&a.total_minutes));
        buckets.truncate(limit);
        buckets
    }

    /// The active streak policy.
    pub fn streak_policy(&self) -> StreakPolicy {
        self.streak_policy
    }

    /// Switches the streak policy and recomputes stats under it.
    pub fn set_streak_policy(&mut self, policy: StreakPolicy) {
        self.streak_policy = policy;
        self.after_mutation();
    }

    // ------------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------------

    /// Creates a task from the draft, prepending it to the collection.
    ///
    /// The store assigns a fresh id and creation timestamp; new tasks always
    /// start incomplete.
    pub fn add_task(&mut self, draft: NewTask) -> Task {
        let task = Task {
            id: Uuid::new_v4().to_string(),
            title: draft.title,
            description: draft.description,
            completed: false,
            priority: draft.priority,
            category: draft.category,
            created_at: Utc::now(),
            completed_at: None,
            due_date: draft.due_date,
        };
        debug!(task_id = %task.id, title = %task.title, "adding task");
        self.tasks.insert(0, task.clone());
        self.after_mutation();
        task
    }

    /// Merges a partial update into the matching task.
    ///
    /// Flipping `completed` false to true stamps `completed_at`; flipping it
    /// back clears the stamp so day-bucketed stats never count a reverted
    /// task. Unknown ids are a silent no-op.
    pub fn update_task(&mut self, id: &str, update: TaskUpdate) {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            debug!(task_id = %id, "update for unknown task ignored");
            return;
        };

        if let Some(title) = update.title {
            task.title = title;
        }
        if let Some(description) = update.description {
            task.description = Some(description);
        }
        if let Some(priority) = update.priority {
            task.priority = priority;
        }
        if let Some(category) = update.category {
            task.category = category;
        }
        if let Some(due_date) = update.due_date {
            task.due_date = Some(due_date);
        }
        if let Some(completed) = update.completed {
            if completed && !task.completed {
                task.completed_at = Some(Utc::now());
            } else if !completed && task.completed {
                task.completed_at = None;
            }
            task.completed = completed;
        }

        self.after_mutation();
    }

    /// Removes the matching task. Sessions referencing it are untouched;
    /// their weak reference now dangles. Unknown ids are a silent no-op.
    pub fn delete_task(&mut self, id: &str) {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        if self.tasks.len() == before {
            debug!(task_id = %id, "delete for unknown task ignored");
            return;
        }
        self.after_mutation();
    }

    /// Records a session, prepending it to the history.
    pub fn add_pomodoro(&mut self, draft: NewSession) -> PomodoroSession {
        let session = PomodoroSession {
            id: Uuid::new_v4().to_string(),
            start_time: draft.start_time,
            end_time: draft.end_time,
            duration: draft.duration,
            task_id: draft.task_id,
            completed: draft.completed,
        };
        debug!(
            session_id = %session.id,
            duration = session.duration,
            completed = session.completed,
            "recording pomodoro session"
        );
        self.pomodoros.insert(0, session.clone());
        self.after_mutation();
        session
    }

    /// Reloads all collections from storage, discarding unsaved in-memory
    /// state. Used to recover after external storage mutation.
    pub fn refresh_data(&mut self) {
        self.loading = true;
        self.load_slots();
        self.loading = false;
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn load_slots(&mut self) {
        self.tasks = load_slot_or_default(self.backend.as_ref(), TASKS_SLOT);
        self.pomodoros = load_slot_or_default(self.backend.as_ref(), POMODOROS_SLOT);
        self.stats = load_slot_or_default(self.backend.as_ref(), STATS_SLOT);
    }

    fn after_mutation(&mut self) {
        self.recompute_stats();
        self.persist_all();
    }

    fn recompute_stats(&mut self) {
        let today = Local::now().date_naive();
        let completed_today = self
            .tasks
            .iter()
            .filter_map(|t| t.completed_at)
            .filter(|at| at.with_timezone(&Local).date_naive() == today)
            .count();

        let streak = match self.streak_policy {
            StreakPolicy::GrowOnly => {
                if completed_today > 0 {
                    self.stats.streak.max(1)
                } else {
                    self.stats.streak
                }
            }
            StreakPolicy::Consecutive => self.consecutive_streak(today),
        };

        self.stats = UserStats {
            total_tasks: self.tasks.len() as u32,
            completed_tasks: self.tasks.iter().filter(|t| t.completed).count() as u32,
            total_pomodoros: self.pomodoros.iter().filter(|s| s.completed).count() as u32,
            total_focus_time: self
                .pomodoros
                .iter()
                .filter(|s| s.completed)
                .map(|s| s.duration)
                .sum(),
            streak,
            last_active_date: today,
        };
    }

    /// Consecutive-day run of completion dates ending today, or yesterday
    /// when today has no completion yet.
    fn consecutive_streak(&self, today: NaiveDate) -> u32 {
        let days: HashSet<NaiveDate> = self
            .tasks
            .iter()
            .filter_map(|t| t.completed_at)
            .map(|at| at.with_timezone(&Local).date_naive())
            .collect();

        let mut cursor = if days.contains(&today) {
            today
        } else {
            match today.pred_opt() {
                Some(yesterday) => yesterday,
                None => return 0,
            }
        };

        let mut run = 0;
        while days.contains(&cursor) {
            run += 1;
            match cursor.pred_opt() {
                Some(prev) => cursor = prev,
                None => break,
            }
        }
        run
    }

    fn persist_all(&mut self) {
        persist_slot(self.backend.as_mut(), TASKS_SLOT, &self.tasks);
        persist_slot(self.backend.as_mut(), POMODOROS_SLOT, &self.pomodoros);
        persist_slot(self.backend.as_mut(), STATS_SLOT, &self.stats);
    }
}

/// Loads and parses one slot. `Ok(None)` means the slot has never been
/// written; unparseable content surfaces as [`StorageError::Corrupt`].
fn load_slot<T: DeserializeOwned>(
    backend: &dyn StorageBackend,
    key: &str,
) -> Result<Option<T>, StorageError> {
    let Some(text) = backend.read(key)? else {
        return Ok(None);
    };
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|source| StorageError::Corrupt {
            key: key.to_string(),
            source,
        })
}

/// Loads one slot, falling back to the default on any failure.
fn load_slot_or_default<T: DeserializeOwned + Default>(
    backend: &dyn StorageBackend,
    key: &str,
) -> T {
    match load_slot(backend, key) {
        Ok(Some(value)) => value,
        Ok(None) => T::default(),
        Err(err) if err.is_corrupt() => {
            warn!(slot = key, error = %err, "corrupt slot, using default");
            T::default()
        }
        Err(err) => {
            warn!(slot = key, error = %err, "failed to read slot, using default");
            T::default()
        }
    }
}

/// Writes one slot, logging instead of propagating failures.
fn persist_slot<T: Serialize>(backend: &mut dyn StorageBackend, key: &str, value: &T) {
    match serde_json::to_string(value) {
        Ok(text) => {
            if let Err(err) = backend.write(key, &text) {
                warn!(slot = key, error = %err, "failed to persist slot");
            }
        }
        Err(err) => {
            warn!(slot = key, error = %err, "failed to encode slot");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
