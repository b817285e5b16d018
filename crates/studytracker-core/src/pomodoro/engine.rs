//! Pomodoro phase engine.
//!
//! Alternates study and break phases, counting down against each phase's
//! target. Only study phases are recorded in the session log, and a study
//! session is never suspended: pausing finalizes it, and starting again
//! opens a fresh one. Like the stopwatch, the engine is driven entirely by
//! the caller's `tick()`.
//!
//! ## Phase Cycle
//!
//! ```text
//! Study #1 -> Break #1 -> Study #2 -> ... -> Study #N -> long Break #N -> Study #N+1
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::fmt_mmss;
use crate::error::Result;
use crate::events::Event;
use crate::storage::{PomodoroSnapshot, SessionSource, SessionStore, SnapshotFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Study,
    Break,
}

/// Phase lengths in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PomodoroSettings {
    pub study_secs: u64,
    pub short_break_secs: u64,
    pub long_break_secs: u64,
    /// Every Nth completed study phase is followed by a long break.
    pub cycles_before_long_break: u32,
    /// Ticks between elapsed checkpoints of the open study session; 0 disables them.
    pub checkpoint_interval_secs: u64,
}

impl Default for PomodoroSettings {
    fn default() -> Self {
        Self {
            study_secs: 25 * 60,
            short_break_secs: 5 * 60,
            long_break_secs: 15 * 60,
            cycles_before_long_break: 4,
            checkpoint_interval_secs: 30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PomodoroEngine {
    store: SessionStore,
    settings: PomodoroSettings,
    phase: Phase,
    elapsed_secs: u64,
    target_secs: u64,
    cycle_count: u32,
    running: bool,
    /// Open study session. Only ever `Some` during a running study phase.
    session_id: Option<i64>,
    /// Phase elapsed count when the open session started.
    session_base_secs: u64,
    subject: String,
}

impl PomodoroEngine {
    /// Starts on a paused "Study #1".
    pub fn new(store: SessionStore, settings: PomodoroSettings) -> Self {
        Self {
            store,
            target_secs: settings.study_secs,
            settings,
            phase: Phase::Study,
            elapsed_secs: 0,
            cycle_count: 0,
            running: false,
            session_id: None,
            session_base_secs: 0,
            subject: String::new(),
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed_secs
    }

    pub fn target_secs(&self) -> u64 {
        self.target_secs
    }

    pub fn remaining_secs(&self) -> u64 {
        self.target_secs.saturating_sub(self.elapsed_secs)
    }

    pub fn cycle_count(&self) -> u32 {
        self.cycle_count
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn session_id(&self) -> Option<i64> {
        self.session_id
    }

    pub fn settings(&self) -> &PomodoroSettings {
        &self.settings
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Study phases show the upcoming study number, breaks the number just completed.
    pub fn phase_label(&self) -> String {
        match self.phase {
            Phase::Study => format!("Study Session #{}", self.cycle_count + 1),
            Phase::Break => format!("Break #{}", self.cycle_count.max(1)),
        }
    }

    /// Remaining time as `MM:SS`.
    pub fn countdown(&self) -> String {
        fmt_mmss(self.remaining_secs())
    }

    pub fn snapshot(&self) -> PomodoroSnapshot {
        PomodoroSnapshot {
            phase: self.phase,
            elapsed: self.elapsed_secs,
            cycle_count: self.cycle_count,
            running: self.running,
            session_id: self.session_id,
            target: Some(self.target_secs),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Switch to `phase` with a fresh countdown.
    ///
    /// Any open study session is finalized first. With `autostart` the phase
    /// begins running immediately, and a study phase opens its session.
    ///
    /// # Errors
    /// Returns an error if finalizing or opening a session fails.
    pub fn enter_phase(&mut self, phase: Phase, long: bool, autostart: bool) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        self.finalize_session(&mut events)?;
        events.push(self.set_phase(phase, long));
        if autostart {
            if phase == Phase::Study {
                self.open_session(&mut events)?;
            }
            self.running = true;
            events.push(self.running_event());
        }
        Ok(events)
    }

    /// Start when stopped, pause when running.
    ///
    /// Starting a study phase opens a session if none is open. Pausing a study
    /// phase finalizes its session; the next start opens a new one.
    ///
    /// # Errors
    /// Returns an error if the session cannot be opened or finalized; the
    /// running flag is left unchanged in that case.
    pub fn start_pause(&mut self) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        if self.running {
            self.finalize_session(&mut events)?;
            self.running = false;
        } else {
            if self.phase == Phase::Study && self.session_id.is_none() {
                self.open_session(&mut events)?;
            }
            self.running = true;
        }
        debug!(phase = ?self.phase, running = self.running, "pomodoro toggled");
        events.push(self.running_event());
        Ok(events)
    }

    /// # Errors
    /// See [`start_pause`](Self::start_pause).
    pub fn start(&mut self) -> Result<Vec<Event>> {
        if self.running {
            return Ok(Vec::new());
        }
        self.start_pause()
    }

    /// # Errors
    /// See [`start_pause`](Self::start_pause).
    pub fn pause(&mut self) -> Result<Vec<Event>> {
        if !self.running {
            return Ok(Vec::new());
        }
        self.start_pause()
    }

    /// Count one second. Completes the phase once elapsed passes the target.
    ///
    /// # Errors
    /// Returns an error if completing the phase fails to finalize or open a session.
    pub fn tick(&mut self) -> Result<Vec<Event>> {
        if !self.running {
            return Ok(Vec::new());
        }
        self.elapsed_secs += 1;

        let interval = self.settings.checkpoint_interval_secs;
        if interval > 0 && self.elapsed_secs % interval == 0 {
            self.checkpoint();
        }

        if self.elapsed_secs > self.target_secs {
            return self.complete_phase(false);
        }
        Ok(vec![Event::PhaseTick {
            phase: self.phase,
            elapsed_secs: self.elapsed_secs,
            remaining_secs: self.remaining_secs(),
            at: self.now(),
        }])
    }

    /// End the current phase now, with the same bookkeeping as a natural finish.
    ///
    /// # Errors
    /// Returns an error if finalizing or opening a session fails.
    pub fn skip(&mut self) -> Result<Vec<Event>> {
        self.complete_phase(true)
    }

    /// Back to a stopped "Study #1" with the cycle count cleared.
    ///
    /// Never fails: an open session that cannot be finalized is logged and
    /// left for startup recovery.
    pub fn reset(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        self.running = false;
        if let Some(session_id) = self.session_id.take() {
            match self.store.stop_session(session_id) {
                Ok(duration_secs) => events.push(Event::SessionFinalized {
                    session_id,
                    duration_secs,
                    at: self.now(),
                }),
                Err(e) => warn!(session_id, error = %e, "could not finalize session on reset"),
            }
        }
        self.cycle_count = 0;
        events.push(Event::PomodoroReset { at: self.now() });
        events.push(self.set_phase(Phase::Study, false));
        events
    }

    /// Best-effort write of the open session's elapsed count. Seconds the
    /// phase ran under an earlier, already finalized session are excluded.
    pub fn checkpoint(&self) -> bool {
        let Some(session_id) = self.session_id else {
            return false;
        };
        let elapsed = self.elapsed_secs.saturating_sub(self.session_base_secs);
        match self
            .store
            .update_elapsed(session_id, i64::try_from(elapsed).unwrap_or(i64::MAX))
        {
            Ok(_) => true,
            Err(e) => {
                warn!(session_id, error = %e, "pomodoro checkpoint failed");
                false
            }
        }
    }

    /// Show a previous run's snapshot. Display only: the engine stays stopped
    /// and holds no session. Ignored if the engine is already active.
    pub fn restore(&mut self, snapshot: &PomodoroSnapshot) -> Option<Event> {
        if self.running || self.session_id.is_some() {
            return None;
        }
        self.phase = snapshot.phase;
        self.elapsed_secs = snapshot.elapsed;
        self.cycle_count = snapshot.cycle_count;
        self.target_secs = match snapshot.phase {
            Phase::Study => self.settings.study_secs,
            Phase::Break => snapshot.target.unwrap_or(self.settings.short_break_secs),
        };
        info!(
            phase = ?self.phase,
            elapsed = self.elapsed_secs,
            cycle_count = self.cycle_count,
            "restored pomodoro snapshot"
        );
        Some(self.phase_event())
    }

    /// Finalize pomodoro sessions left open by a previous run. Returns how many
    /// were closed. Store failures are logged and end the sweep.
    pub fn finalize_orphans(&self) -> usize {
        let mut closed = 0;
        loop {
            let active = match self.store.active_session_for(SessionSource::Pomodoro) {
                Ok(Some(active)) if Some(active.id) != self.session_id => active,
                Ok(_) => break,
                Err(e) => {
                    warn!(error = %e, "could not look up orphaned pomodoro sessions");
                    break;
                }
            };
            match self.store.stop_session(active.id) {
                Ok(Some(_)) => {
                    info!(session_id = active.id, "finalized orphaned pomodoro session");
                    closed += 1;
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(session_id = active.id, error = %e, "could not finalize orphaned session");
                    break;
                }
            }
        }
        closed
    }

    /// Close-of-application sequence. Returns the snapshot describing the
    /// state at close; the open study session (if any) is checkpointed and
    /// finalized. Never fails.
    pub fn shutdown(&mut self) -> PomodoroSnapshot {
        let snapshot = self.snapshot();
        self.running = false;
        if let Some(session_id) = self.session_id {
            self.checkpoint();
            if let Err(e) = self.store.stop_session(session_id) {
                warn!(session_id, error = %e, "could not finalize pomodoro session on shutdown");
            }
            self.session_id = None;
        }
        snapshot
    }

    /// [`shutdown`](Self::shutdown), then write the snapshot to `file`.
    /// A failed write is logged and ignored.
    pub fn shutdown_to(&mut self, file: &SnapshotFile) -> PomodoroSnapshot {
        let snapshot = self.shutdown();
        if let Err(e) = file.save(&snapshot) {
            warn!(path = %file.path().display(), error = %e, "could not save pomodoro snapshot");
        }
        snapshot
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn complete_phase(&mut self, skipped: bool) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        self.finalize_session(&mut events)?;
        self.running = false;

        let completed = self.phase;
        let (next, long) = match completed {
            Phase::Study => {
                self.cycle_count += 1;
                let every = self.settings.cycles_before_long_break.max(1);
                (Phase::Break, self.cycle_count % every == 0)
            }
            Phase::Break => (Phase::Study, false),
        };
        debug!(?completed, cycle_count = self.cycle_count, skipped, "pomodoro phase complete");
        events.push(Event::PhaseCompleted {
            phase: completed,
            cycle_count: self.cycle_count,
            skipped,
            at: self.now(),
        });
        events.extend(self.enter_phase(next, long, true)?);
        Ok(events)
    }

    fn set_phase(&mut self, phase: Phase, long: bool) -> Event {
        self.phase = phase;
        self.elapsed_secs = 0;
        self.running = false;
        self.target_secs = match phase {
            Phase::Study => self.settings.study_secs,
            Phase::Break if long => self.settings.long_break_secs,
            Phase::Break => self.settings.short_break_secs,
        };
        self.phase_event()
    }

    fn open_session(&mut self, events: &mut Vec<Event>) -> Result<()> {
        let session_id = self
            .store
            .start_session(&self.subject, "", SessionSource::Pomodoro)?;
        self.session_id = Some(session_id);
        self.session_base_secs = self.elapsed_secs;
        events.push(Event::SessionOpened {
            session_id,
            source: SessionSource::Pomodoro,
            at: self.now(),
        });
        Ok(())
    }

    fn finalize_session(&mut self, events: &mut Vec<Event>) -> Result<()> {
        if let Some(session_id) = self.session_id {
            let duration_secs = self.store.stop_session(session_id)?;
            self.session_id = None;
            events.push(Event::SessionFinalized {
                session_id,
                duration_secs,
                at: self.now(),
            });
        }
        Ok(())
    }

    fn now(&self) -> DateTime<Utc> {
        self.store.clock().now_utc()
    }

    fn phase_event(&self) -> Event {
        Event::PhaseEntered {
            phase: self.phase,
            target_secs: self.target_secs,
            cycle_count: self.cycle_count,
            running: self.running,
            at: self.now(),
        }
    }

    fn running_event(&self) -> Event {
        Event::PhaseRunning {
            phase: self.phase,
            running: self.running,
            at: self.now(),
        }
    }
}
