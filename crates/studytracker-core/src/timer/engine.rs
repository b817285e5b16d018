//! Manual stopwatch engine.
//!
//! The engine has no internal thread. The caller invokes `tick()` once per
//! second while it wants time to advance; the engine only counts ticks.
//! The recorded session duration never comes from that count: the store
//! recomputes it from the start and end timestamps when the session is
//! stopped, so missed or extra ticks cannot distort history.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running <-> Paused -> Idle
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::new(store);
//! engine.start()?;
//! // Once per second:
//! engine.tick(); // Some(Event::Tick { .. }) while running
//! engine.stop()?;
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::events::Event;
use crate::storage::{SessionSource, SessionStore};

/// Named state carried by `Event::StateChanged`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Running,
    Paused,
}

/// Stopwatch state. A session id exists exactly when the timer is not idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerStatus {
    Idle,
    Running { session_id: i64, elapsed_secs: u64 },
    Paused { session_id: i64, elapsed_secs: u64 },
}

impl TimerStatus {
    pub fn state(&self) -> TimerState {
        match self {
            TimerStatus::Idle => TimerState::Idle,
            TimerStatus::Running { .. } => TimerState::Running,
            TimerStatus::Paused { .. } => TimerState::Paused,
        }
    }

    fn session(&self) -> Option<(i64, u64)> {
        match *self {
            TimerStatus::Idle => None,
            TimerStatus::Running {
                session_id,
                elapsed_secs,
            }
            | TimerStatus::Paused {
                session_id,
                elapsed_secs,
            } => Some((session_id, elapsed_secs)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TimerEngine {
    store: SessionStore,
    status: TimerStatus,
    subject: String,
    note: String,
    /// Ticks between elapsed checkpoints; 0 disables them.
    checkpoint_interval_secs: u64,
}

impl TimerEngine {
    pub fn new(store: SessionStore) -> Self {
        Self {
            store,
            status: TimerStatus::Idle,
            subject: String::new(),
            note: String::new(),
            checkpoint_interval_secs: 0,
        }
    }

    /// Subject and note attached to sessions this engine opens.
    pub fn with_labels(mut self, subject: impl Into<String>, note: impl Into<String>) -> Self {
        self.subject = subject.into();
        self.note = note.into();
        self
    }

    pub fn with_checkpoint_interval(mut self, secs: u64) -> Self {
        self.checkpoint_interval_secs = secs;
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn status(&self) -> TimerStatus {
        self.status
    }

    pub fn state(&self) -> TimerState {
        self.status.state()
    }

    pub fn session_id(&self) -> Option<i64> {
        self.status.session().map(|(id, _)| id)
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.status.session().map(|(_, e)| e).unwrap_or(0)
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Open a session and start counting. No-op unless idle.
    ///
    /// # Errors
    /// Returns an error if the session cannot be created; the engine stays idle.
    pub fn start(&mut self) -> Result<Vec<Event>> {
        if self.status != TimerStatus::Idle {
            return Ok(Vec::new());
        }
        let session_id = self
            .store
            .start_session(&self.subject, &self.note, SessionSource::Timer)?;
        self.status = TimerStatus::Running {
            session_id,
            elapsed_secs: 0,
        };
        debug!(session_id, "timer started");
        let at = self.now();
        Ok(vec![
            Event::SessionOpened {
                session_id,
                source: SessionSource::Timer,
                at,
            },
            self.state_event(),
        ])
    }

    pub fn pause(&mut self) -> Option<Event> {
        match self.status {
            TimerStatus::Running {
                session_id,
                elapsed_secs,
            } => {
                self.status = TimerStatus::Paused {
                    session_id,
                    elapsed_secs,
                };
                Some(self.state_event())
            }
            _ => None,
        }
    }

    pub fn resume(&mut self) -> Option<Event> {
        match self.status {
            TimerStatus::Paused {
                session_id,
                elapsed_secs,
            } => {
                self.status = TimerStatus::Running {
                    session_id,
                    elapsed_secs,
                };
                Some(self.state_event())
            }
            _ => None,
        }
    }

    /// Pause when running, resume when paused.
    pub fn toggle_pause(&mut self) -> Option<Event> {
        match self.status {
            TimerStatus::Running { .. } => self.pause(),
            TimerStatus::Paused { .. } => self.resume(),
            TimerStatus::Idle => None,
        }
    }

    /// Finalize the open session and return to idle. No-op when idle.
    ///
    /// # Errors
    /// Returns an error if the store cannot finalize; the engine keeps its session.
    pub fn stop(&mut self) -> Result<Vec<Event>> {
        let Some((session_id, _)) = self.status.session() else {
            return Ok(Vec::new());
        };
        let duration_secs = self.store.stop_session(session_id)?;
        self.status = TimerStatus::Idle;
        debug!(session_id, ?duration_secs, "timer stopped");
        let at = self.now();
        Ok(vec![
            Event::SessionFinalized {
                session_id,
                duration_secs,
                at,
            },
            self.state_event(),
        ])
    }

    /// Advance the stopwatch by one second. Ignored unless running.
    pub fn tick(&mut self) -> Option<Event> {
        let TimerStatus::Running {
            session_id,
            elapsed_secs,
        } = self.status
        else {
            return None;
        };
        let elapsed_secs = elapsed_secs + 1;
        self.status = TimerStatus::Running {
            session_id,
            elapsed_secs,
        };
        if self.checkpoint_interval_secs > 0 && elapsed_secs % self.checkpoint_interval_secs == 0 {
            self.checkpoint();
        }
        Some(Event::Tick {
            elapsed_secs,
            at: self.now(),
        })
    }

    /// Best-effort write of the current elapsed count. Returns whether it landed.
    pub fn checkpoint(&self) -> bool {
        let Some((session_id, elapsed)) = self.status.session() else {
            return false;
        };
        match self
            .store
            .update_elapsed(session_id, i64::try_from(elapsed).unwrap_or(i64::MAX))
        {
            Ok(_) => true,
            Err(e) => {
                warn!(session_id, error = %e, "elapsed checkpoint failed");
                false
            }
        }
    }

    /// Adopt an open timer session left behind by a previous run.
    ///
    /// Elapsed time is recomputed from the session's start timestamp, not from
    /// any stored checkpoint. With `paused` the engine comes back paused.
    /// Open Pomodoro sessions are left alone; `PomodoroEngine::finalize_orphans`
    /// closes those.
    ///
    /// # Errors
    /// Returns an error if the store cannot be queried.
    pub fn resume_active_session(&mut self, paused: bool) -> Result<Vec<Event>> {
        if self.status != TimerStatus::Idle {
            return Ok(Vec::new());
        }
        let Some(active) = self.store.active_session_for(SessionSource::Timer)? else {
            return Ok(Vec::new());
        };
        let elapsed_secs = (self.now() - active.start_utc).num_seconds().max(0) as u64;
        let session_id = active.id;
        self.status = if paused {
            TimerStatus::Paused {
                session_id,
                elapsed_secs,
            }
        } else {
            TimerStatus::Running {
                session_id,
                elapsed_secs,
            }
        };
        info!(session_id, elapsed_secs, paused, "resumed open timer session");
        Ok(vec![self.state_event()])
    }

    /// Close-of-application sequence: stop counting, checkpoint, finalize.
    ///
    /// Never fails; store errors are logged and dropped so shutdown can proceed.
    pub fn shutdown(&mut self) -> Vec<Event> {
        let Some((session_id, _)) = self.status.session() else {
            return Vec::new();
        };
        self.pause();
        self.checkpoint();

        let mut events = Vec::new();
        match self.store.stop_session(session_id) {
            Ok(duration_secs) => events.push(Event::SessionFinalized {
                session_id,
                duration_secs,
                at: self.now(),
            }),
            Err(e) => warn!(session_id, error = %e, "could not finalize timer session on shutdown"),
        }
        self.status = TimerStatus::Idle;
        events.push(self.state_event());
        events
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.store.clock().now_utc()
    }

    fn state_event(&self) -> Event {
        Event::StateChanged {
            state: self.state(),
            at: self.now(),
        }
    }
}
