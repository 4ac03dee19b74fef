//! Core data types for Planthesia.
//!
//! This module defines the data structures used for:
//! - Tasks and their lifecycle metadata
//! - Recorded Pomodoro sessions (append-only history)
//! - Derived user statistics
//! - Timer phase and configuration
//!
//! Persisted types keep the camelCase field names of the original web app
//! so existing exported data loads unchanged.

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Priority / Category
// ============================================================================

/// Task priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    /// Returns the string representation of the priority.
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

/// Task category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Work,
    Personal,
    Learning,
    Health,
}

impl Category {
    /// Returns the string representation of the category.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Work => "work",
            Category::Personal => "personal",
            Category::Learning => "learning",
            Category::Health => "health",
        }
    }
}

impl Default for Category {
    fn default() -> Self {
        Category::Work
    }
}

// ============================================================================
// Task
// ============================================================================

/// A single task.
///
/// `completed_at` is stamped by the store when `completed` flips to true and
/// cleared when the task is reverted, so day-bucketed queries never see a
/// stale completion timestamp. `due_date` carries no time component and is
/// compared at local calendar-day granularity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique identifier.
    pub id: String,
    /// Task title.
    pub title: String,
    /// Optional free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the task is done.
    pub completed: bool,
    /// Priority level.
    pub priority: Priority,
    /// Category bucket.
    pub category: Category,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Completion timestamp, present iff `completed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Due date, day granularity only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
}

/// Input for creating a task. The store assigns the id and creation
/// timestamp and always starts the task incomplete.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub category: Category,
    pub due_date: Option<NaiveDate>,
}

impl NewTask {
    /// Creates a new task draft with the given title and defaults elsewhere.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }
}

/// Partial update for a task. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub completed: Option<bool>,
    pub priority: Option<Priority>,
    pub category: Option<Category>,
    pub due_date: Option<NaiveDate>,
}

impl TaskUpdate {
    /// Update that only flips the completion flag.
    pub fn completed(completed: bool) -> Self {
        Self {
            completed: Some(completed),
            ..Self::default()
        }
    }
}

// ============================================================================
// PomodoroSession
// ============================================================================

/// A recorded focus-phase attempt.
///
/// Break phases are never persisted. Records are append-only: created once
/// at phase completion or skip time, never mutated or deleted. `task_id` is
/// a weak reference; the task may have been deleted since.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PomodoroSession {
    /// Unique identifier.
    pub id: String,
    /// Instant the focus phase was first started.
    pub start_time: DateTime<Utc>,
    /// Instant the record was created, if the phase ended.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Intended session length in minutes. Equals the configured focus
    /// length for a naturally completed session, elapsed whole minutes for
    /// a skipped one.
    pub duration: u32,
    /// Weak reference to the task worked on, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    /// True only if the phase ran to natural zero.
    pub completed: bool,
}

/// Input for recording a session. The store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSession {
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration: u32,
    pub task_id: Option<String>,
    pub completed: bool,
}

// ============================================================================
// UserStats
// ============================================================================

/// Aggregate statistics, recomputed by the store after every mutation.
///
/// Fully derivable from tasks and sessions except `streak`, which carries
/// forward state under the store's grow-only streak policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    /// Count of all tasks.
    pub total_tasks: u32,
    /// Count of completed tasks.
    pub completed_tasks: u32,
    /// Count of completed sessions.
    pub total_pomodoros: u32,
    /// Sum of `duration` over completed sessions, in minutes.
    pub total_focus_time: u32,
    /// Day streak counter. See the store's streak policy.
    pub streak: u32,
    /// Local calendar date of the last stats recompute.
    pub last_active_date: NaiveDate,
}

impl Default for UserStats {
    fn default() -> Self {
        Self {
            total_tasks: 0,
            completed_tasks: 0,
            total_pomodoros: 0,
            total_focus_time: 0,
            streak: 0,
            last_active_date: Local::now().date_naive(),
        }
    }
}

// ============================================================================
// TimerPhase
// ============================================================================

/// The countdown phase of the Pomodoro timer.
///
/// The run flag (active vs paused) is tracked separately on the timer
/// state; a paused focus phase is still the focus phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerPhase {
    /// Dedicated work time; ends with a persisted session record.
    Focus,
    /// Short recovery countdown.
    ShortBreak,
    /// Long recovery countdown, every N completed sessions.
    LongBreak,
}

impl TimerPhase {
    /// Returns the string representation of the phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerPhase::Focus => "focus",
            TimerPhase::ShortBreak => "short_break",
            TimerPhase::LongBreak => "long_break",
        }
    }

    /// Returns true for either break phase.
    pub fn is_break(&self) -> bool {
        matches!(self, TimerPhase::ShortBreak | TimerPhase::LongBreak)
    }
}

impl Default for TimerPhase {
    fn default() -> Self {
        TimerPhase::Focus
    }
}

// ============================================================================
// TimerConfig
// ============================================================================

/// Configuration for the Pomodoro timer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerConfig {
    /// Focus duration in minutes (1-120).
    pub focus_minutes: u32,
    /// Short break duration in minutes (1-60).
    pub short_break_minutes: u32,
    /// Long break duration in minutes (1-60).
    pub long_break_minutes: u32,
    /// Completed sessions between long breaks (1-12).
    pub sessions_until_long_break: u32,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            focus_minutes: 25,
            short_break_minutes: 5,
            long_break_minutes: 15,
            sessions_until_long_break: 4,
        }
    }
}

impl TimerConfig {
    /// Creates a new configuration with the specified focus duration.
    pub fn with_focus_minutes(mut self, minutes: u32) -> Self {
        self.focus_minutes = minutes;
        self
    }

    /// Creates a new configuration with the specified short break duration.
    pub fn with_short_break_minutes(mut self, minutes: u32) -> Self {
        self.short_break_minutes = minutes;
        self
    }

    /// Creates a new configuration with the specified long break duration.
    pub fn with_long_break_minutes(mut self, minutes: u32) -> Self {
        self.long_break_minutes = minutes;
        self
    }

    /// Creates a new configuration with the specified long break cadence.
    pub fn with_sessions_until_long_break(mut self, sessions: u32) -> Self {
        self.sessions_until_long_break = sessions;
        self
    }

    /// Validates the configuration.
    ///
    /// Returns an error message if validation fails. The timer itself never
    /// divides by a configured duration, so an invalid configuration cannot
    /// crash it; this is a boundary check for settings forms.
    pub fn validate(&self) -> Result<(), String> {
        if self.focus_minutes < 1 || self.focus_minutes > 120 {
            return Err("focus duration must be between 1 and 120 minutes".to_string());
        }
        if self.short_break_minutes < 1 || self.short_break_minutes > 60 {
            return Err("short break duration must be between 1 and 60 minutes".to_string());
        }
        if self.long_break_minutes < 1 || self.long_break_minutes > 60 {
            return Err("long break duration must be between 1 and 60 minutes".to_string());
        }
        if self.sessions_until_long_break < 1 || self.sessions_until_long_break > 12 {
            return Err("sessions until long break must be between 1 and 12".to_string());
        }
        Ok(())
    }

    /// Returns the full duration of the given phase in seconds.
    pub fn phase_seconds(&self, phase: TimerPhase) -> u32 {
        let minutes = match phase {
            TimerPhase::Focus => self.focus_minutes,
            TimerPhase::ShortBreak => self.short_break_minutes,
            TimerPhase::LongBreak => self.long_break_minutes,
        };
        minutes * 60
    }
}

// ============================================================================
// Tests
// ============================================================================
