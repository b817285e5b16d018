//! # StudyTracker Core Library
//!
//! Session accounting for a personal study-time tracker. The CLI binary and
//! any GUI are thin drivers over this crate: they own the one-second tick
//! loop and render the [`Event`]s the engines return.
//!
//! ## Architecture
//!
//! - **Session Store**: SQLite session log, one connection per operation,
//!   with additive migrations applied on every open
//! - **Timer Engine**: manual stopwatch over a single session
//! - **Pomodoro Engine**: study/break phase cycle that records study phases
//! - **Side files**: TOML config, Pomodoro snapshot, to-do list
//!
//! ## Key Invariants
//!
//! - A session's `duration_sec` is computed once, at finalization, from its
//!   start and end timestamps. Tick counts never feed into it.
//! - Finalizing an already-finalized session is a no-op.
//! - Open sessions never contribute to duration-based aggregates.

pub mod clock;
pub mod error;
pub mod events;
pub mod pomodoro;
pub mod storage;
pub mod timer;

pub use clock::{fmt_hms, fmt_mmss, Clock, ManualClock, SystemClock};
pub use error::{ConfigError, CoreError, DatabaseError};
pub use events::Event;
pub use pomodoro::{Phase, PomodoroEngine, PomodoroSettings};
pub use storage::{
    Config, PomodoroSnapshot, SessionRecord, SessionSource, SessionStore, SnapshotFile,
    StudyStats, TodoStore,
};
pub use timer::{TimerEngine, TimerState, TimerStatus};
