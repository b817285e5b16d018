use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pomodoro::Phase;
use crate::storage::SessionSource;
use crate::timer::TimerState;

/// Every engine operation reports what happened as Events.
/// The presentation layer polls for them; nothing is pushed.
///
/// Events describing a store write are only produced after that write
/// has committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// Stopwatch advanced by one second.
    Tick {
        elapsed_secs: u64,
        at: DateTime<Utc>,
    },
    StateChanged {
        state: TimerState,
        at: DateTime<Utc>,
    },
    SessionOpened {
        session_id: i64,
        source: SessionSource,
        at: DateTime<Utc>,
    },
    /// `duration_secs` is `None` when the store had already finalized the row.
    SessionFinalized {
        session_id: i64,
        duration_secs: Option<i64>,
        at: DateTime<Utc>,
    },
    PhaseTick {
        phase: Phase,
        elapsed_secs: u64,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    PhaseEntered {
        phase: Phase,
        target_secs: u64,
        cycle_count: u32,
        running: bool,
        at: DateTime<Utc>,
    },
    PhaseCompleted {
        phase: Phase,
        cycle_count: u32,
        skipped: bool,
        at: DateTime<Utc>,
    },
    /// Pomodoro start/pause toggle.
    PhaseRunning {
        phase: Phase,
        running: bool,
        at: DateTime<Utc>,
    },
    PomodoroReset {
        at: DateTime<Utc>,
    },
}
