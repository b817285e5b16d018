//! SQLite-based session log and study statistics.
//!
//! Every public operation opens its own connection, applies migrations,
//! performs one unit of work and drops the connection again. Nothing is
//! held open between calls, so a crash can only ever lose the operation
//! that was in flight.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{data_dir, migrations, DB_FILE};
use crate::clock::{date_key, to_iso, utc_now_secs, Clock, SystemClock};
use crate::error::DatabaseError;

type StoreResult<T> = Result<T, DatabaseError>;

/// Which engine produced a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionSource {
    #[default]
    Timer,
    Pomodoro,
}

impl SessionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionSource::Timer => "timer",
            SessionSource::Pomodoro => "pomodoro",
        }
    }
}

impl fmt::Display for SessionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "timer" => Ok(SessionSource::Timer),
            "pomodoro" => Ok(SessionSource::Pomodoro),
            other => Err(format!("unknown session source: {other}")),
        }
    }
}

/// One row of the session log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: i64,
    pub start_utc: DateTime<Utc>,
    pub local_date: NaiveDate,
    pub end_utc: Option<DateTime<Utc>>,
    pub duration_sec: Option<i64>,
    pub subject: String,
    pub note: String,
    pub source: SessionSource,
    pub elapsed_sec: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn is_open(&self) -> bool {
        self.end_utc.is_none()
    }
}

/// Finalized study seconds for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyTotal {
    pub local_date: NaiveDate,
    pub total_sec: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StudyStats {
    pub today_seconds: i64,
    pub streak_days: u32,
    pub total_days: u32,
    pub total_hours: f64,
}

const SESSION_COLUMNS: &str = "id, start_utc, local_date, end_utc, duration_sec, subject, note, \
                               source, elapsed_sec, updated_at";

/// Handle to the session log.
///
/// Cheap to clone; clones point at the same file and clock.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    /// Session log at `<data_dir>/study.db`.
    ///
    /// # Errors
    /// Returns an error if the data directory cannot be created.
    pub fn open_default() -> std::io::Result<Self> {
        Ok(Self::new(data_dir()?.join(DB_FILE)))
    }

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_clock(path, Arc::new(SystemClock))
    }

    pub fn with_clock(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: path.into(),
            clock,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Open a connection and bring the schema up to date.
    ///
    /// # Errors
    /// Returns `OpenFailed` if SQLite cannot open the file and
    /// `MigrationFailed` if the schema cannot be applied.
    pub fn connect(&self) -> StoreResult<Connection> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| {
                    DatabaseError::DirectoryUnavailable {
                        path: parent.to_path_buf(),
                        source,
                    }
                })?;
            }
        }
        let conn = Connection::open(&self.path).map_err(|source| DatabaseError::OpenFailed {
            path: self.path.clone(),
            source,
        })?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        migrations::migrate(&conn).map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(conn)
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Open a new session starting now and return its id.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn start_session(
        &self,
        subject: &str,
        note: &str,
        source: SessionSource,
    ) -> StoreResult<i64> {
        let now = utc_now_secs(self.clock.as_ref());
        let today = self.clock.today();
        let conn = self.connect()?;

        let open: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sessions WHERE end_utc IS NULL",
            [],
            |row| row.get(0),
        )?;
        if open > 0 {
            warn!(open, %source, "starting a session while another is still open");
        }

        conn.execute(
            "INSERT INTO sessions (start_utc, local_date, subject, note, source, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?1)",
            params![to_iso(now), date_key(today), subject, note, source.as_str()],
        )?;
        let id = conn.last_insert_rowid();
        debug!(session_id = id, %source, "session opened");
        Ok(id)
    }

    /// Record an elapsed-seconds checkpoint. Returns the number of rows touched;
    /// an unknown id touches none.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub fn update_elapsed(&self, id: i64, seconds: i64) -> StoreResult<usize> {
        let now = utc_now_secs(self.clock.as_ref());
        let conn = self.connect()?;
        let changed = conn.execute(
            "UPDATE sessions SET elapsed_sec = ?1, updated_at = ?2 WHERE id = ?3",
            params![seconds, to_iso(now), id],
        )?;
        Ok(changed)
    }

    /// Finalize an open session and return its duration in seconds.
    ///
    /// Returns `Ok(None)` if the id is unknown or already finalized; only the
    /// first call for a given id has any effect.
    ///
    /// # Errors
    /// Returns an error if the lookup or update fails.
    pub fn stop_session(&self, id: i64) -> StoreResult<Option<i64>> {
        let now = utc_now_secs(self.clock.as_ref());
        let conn = self.connect()?;
        let tx = conn.unchecked_transaction()?;

        let start: Option<String> = tx
            .query_row(
                "SELECT start_utc FROM sessions WHERE id = ?1 AND end_utc IS NULL",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(start) = start else {
            debug!(session_id = id, "stop ignored, no open session with that id");
            return Ok(None);
        };

        let start = parse_utc(&start).map_err(|message| DatabaseError::InvalidRecord { id, message })?;
        let duration = (now - start).num_seconds().max(0);

        tx.execute(
            "UPDATE sessions SET end_utc = ?1, duration_sec = ?2, updated_at = ?1
             WHERE id = ?3 AND end_utc IS NULL",
            params![to_iso(now), duration, id],
        )?;
        tx.commit()?;
        debug!(session_id = id, duration, "session finalized");
        Ok(Some(duration))
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn get_session(&self, id: i64) -> StoreResult<Option<SessionRecord>> {
        let conn = self.connect()?;
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1");
        Ok(conn.query_row(&sql, params![id], map_session).optional()?)
    }

    /// The most recently started open session, if any.
    pub fn active_session(&self) -> StoreResult<Option<SessionRecord>> {
        let conn = self.connect()?;
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE end_utc IS NULL
             ORDER BY start_utc DESC, id DESC LIMIT 1"
        );
        Ok(conn.query_row(&sql, [], map_session).optional()?)
    }

    /// The most recently started open session produced by `source`.
    pub fn active_session_for(&self, source: SessionSource) -> StoreResult<Option<SessionRecord>> {
        let conn = self.connect()?;
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE end_utc IS NULL AND source = ?1
             ORDER BY start_utc DESC, id DESC LIMIT 1"
        );
        Ok(conn
            .query_row(&sql, params![source.as_str()], map_session)
            .optional()?)
    }

    /// Finalized seconds attributed to today's local date. Open sessions are excluded.
    pub fn today_total_seconds(&self) -> StoreResult<i64> {
        let today = self.clock.today();
        let conn = self.connect()?;
        let total = conn.query_row(
            "SELECT COALESCE(SUM(duration_sec), 0) FROM sessions
             WHERE local_date = ?1 AND duration_sec IS NOT NULL",
            params![date_key(today)],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    /// Consecutive days, ending today, that each have a finalized session
    /// with a positive duration. Zero if today has none.
    pub fn get_daily_streak(&self) -> StoreResult<u32> {
        let days = self.study_days()?;
        let mut day = self.clock.today();
        let mut streak = 0;
        while days.contains(&date_key(day)) {
            streak += 1;
            match day.pred_opt() {
                Some(prev) => day = prev,
                None => break,
            }
        }
        Ok(streak)
    }

    /// Number of distinct local dates with at least one positive finalized session.
    pub fn get_total_days_studied(&self) -> StoreResult<u32> {
        let conn = self.connect()?;
        let count: u32 = conn.query_row(
            "SELECT COUNT(DISTINCT local_date) FROM sessions
             WHERE end_utc IS NOT NULL AND duration_sec > 0",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn get_total_hours_studied(&self) -> StoreResult<f64> {
        let conn = self.connect()?;
        let seconds: i64 = conn.query_row(
            "SELECT COALESCE(SUM(duration_sec), 0) FROM sessions WHERE end_utc IS NOT NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(seconds as f64 / 3600.0)
    }

    pub fn stats(&self) -> StoreResult<StudyStats> {
        Ok(StudyStats {
            today_seconds: self.today_total_seconds()?,
            streak_days: self.get_daily_streak()?,
            total_days: self.get_total_days_studied()?,
            total_hours: self.get_total_hours_studied()?,
        })
    }

    /// Sessions whose local date falls in `from..=to`, oldest first.
    pub fn sessions_between(&self, from: NaiveDate, to: NaiveDate) -> StoreResult<Vec<SessionRecord>> {
        let conn = self.connect()?;
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM sessions
             WHERE local_date >= ?1 AND local_date <= ?2
             ORDER BY start_utc ASC, id ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![date_key(from), date_key(to)], map_session)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Every session, newest first.
    pub fn list_sessions(&self) -> StoreResult<Vec<SessionRecord>> {
        let conn = self.connect()?;
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions ORDER BY start_utc DESC, id DESC");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], map_session)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Finalized seconds per day in `from..=to`. Days without study are filled with zero.
    pub fn daily_totals(&self, from: NaiveDate, to: NaiveDate) -> StoreResult<Vec<DailyTotal>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT local_date, SUM(duration_sec) FROM sessions
             WHERE local_date >= ?1 AND local_date <= ?2 AND duration_sec IS NOT NULL
             GROUP BY local_date",
        )?;
        let rows = stmt.query_map(params![date_key(from), date_key(to)], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        let mut by_day = std::collections::HashMap::new();
        for row in rows {
            let (day, total) = row?;
            by_day.insert(day, total);
        }

        let mut totals = Vec::new();
        // `succ_opt` ends the walk at the last representable date.
        let mut next = Some(from);
        while let Some(day) = next.filter(|day| *day <= to) {
            totals.push(DailyTotal {
                local_date: day,
                total_sec: by_day.get(&date_key(day)).copied().unwrap_or(0),
            });
            next = day.succ_opt();
        }
        Ok(totals)
    }

    fn study_days(&self) -> StoreResult<HashSet<String>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT local_date FROM sessions
             WHERE end_utc IS NOT NULL AND duration_sec > 0",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<Result<HashSet<_>, _>>()?)
    }
}

fn parse_utc(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("bad timestamp '{s}': {e}"))
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn utc_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    parse_utc(&text).map_err(|m| conversion_error(idx, m))
}

fn map_session(row: &Row<'_>) -> rusqlite::Result<SessionRecord> {
    let local_date: String = row.get(2)?;
    let local_date = NaiveDate::parse_from_str(&local_date, "%Y-%m-%d")
        .map_err(|e| conversion_error(2, format!("bad local_date '{local_date}': {e}")))?;
    let end_utc = match row.get::<_, Option<String>>(3)? {
        Some(text) => Some(parse_utc(&text).map_err(|m| conversion_error(3, m))?),
        None => None,
    };
    let source = row
        .get::<_, Option<String>>(7)?
        .and_then(|s| s.parse().ok())
        .unwrap_or_default();

    Ok(SessionRecord {
        id: row.get(0)?,
        start_utc: utc_column(row, 1)?,
        local_date,
        end_utc,
        duration_sec: row.get(4)?,
        subject: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        note: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
        source,
        elapsed_sec: row.get(8)?,
        updated_at: utc_column(row, 9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    fn store() -> (TempDir, ManualClock, SessionStore) {
        let dir = TempDir::new().unwrap();
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap());
        let store = SessionStore::with_clock(dir.path().join(DB_FILE), Arc::new(clock.clone()));
        (dir, clock, store)
    }

    #[test]
    fn start_and_stop_records_wall_clock_duration() {
        let (_dir, clock, store) = store();
        let id = store.start_session("math", "", SessionSource::Timer).unwrap();
        clock.advance_secs(125);
        assert_eq!(store.stop_session(id).unwrap(), Some(125));

        let rec = store.get_session(id).unwrap().unwrap();
        assert_eq!(rec.duration_sec, Some(125));
        assert_eq!(rec.end_utc, Some(rec.start_utc + Duration::seconds(125)));
        assert_eq!(rec.subject, "math");
    }

    #[test]
    fn subsecond_offsets_round_down() {
        let (_dir, clock, store) = store();
        clock.advance(Duration::milliseconds(400));
        let id = store.start_session("", "", SessionSource::Timer).unwrap();
        clock.advance(Duration::milliseconds(1900));
        // start stored as 12:00:00, now truncates to 12:00:02
        assert_eq!(store.stop_session(id).unwrap(), Some(2));
    }

    #[test]
    fn stop_twice_is_a_noop() {
        let (_dir, clock, store) = store();
        let id = store.start_session("", "", SessionSource::Timer).unwrap();
        clock.advance_secs(60);
        assert_eq!(store.stop_session(id).unwrap(), Some(60));
        let first = store.get_session(id).unwrap().unwrap();

        clock.advance_secs(600);
        assert_eq!(store.stop_session(id).unwrap(), None);
        let second = store.get_session(id).unwrap().unwrap();
        assert_eq!(first.end_utc, second.end_utc);
        assert_eq!(first.duration_sec, second.duration_sec);
    }

    #[test]
    fn stop_unknown_id_returns_none() {
        let (_dir, _clock, store) = store();
        assert_eq!(store.stop_session(42).unwrap(), None);
    }

    #[test]
    fn update_elapsed_unknown_id_touches_nothing() {
        let (_dir, _clock, store) = store();
        assert_eq!(store.update_elapsed(99, 10).unwrap(), 0);
    }

    #[test]
    fn update_elapsed_refreshes_updated_at() {
        let (_dir, clock, store) = store();
        let id = store.start_session("", "", SessionSource::Timer).unwrap();
        clock.advance_secs(30);
        assert_eq!(store.update_elapsed(id, 30).unwrap(), 1);
        let rec = store.get_session(id).unwrap().unwrap();
        assert_eq!(rec.elapsed_sec, Some(30));
        assert_eq!(rec.updated_at, rec.start_utc + Duration::seconds(30));
        assert!(rec.is_open());
    }

    #[test]
    fn active_session_prefers_latest_start() {
        let (_dir, clock, store) = store();
        assert!(store.active_session().unwrap().is_none());
        let older = store.start_session("", "", SessionSource::Timer).unwrap();
        clock.advance_secs(10);
        let newer = store.start_session("", "", SessionSource::Pomodoro).unwrap();

        assert_eq!(store.active_session().unwrap().unwrap().id, newer);
        assert_eq!(
            store
                .active_session_for(SessionSource::Timer)
                .unwrap()
                .unwrap()
                .id,
            older
        );

        store.stop_session(newer).unwrap();
        store.stop_session(older).unwrap();
        assert!(store.active_session().unwrap().is_none());
    }

    #[test]
    fn today_total_excludes_open_sessions() {
        let (_dir, clock, store) = store();
        let done = store.start_session("", "", SessionSource::Timer).unwrap();
        clock.advance_secs(100);
        store.stop_session(done).unwrap();

        let open = store.start_session("", "", SessionSource::Timer).unwrap();
        clock.advance_secs(50);
        assert_eq!(store.today_total_seconds().unwrap(), 100);

        store.stop_session(open).unwrap();
        assert_eq!(store.today_total_seconds().unwrap(), 150);
    }

    #[test]
    fn daily_totals_fill_gaps() {
        let (_dir, clock, store) = store();
        let today = clock.today();
        let id = store.start_session("", "", SessionSource::Timer).unwrap();
        clock.advance_secs(300);
        store.stop_session(id).unwrap();

        let from = today - Duration::days(2);
        let totals = store.daily_totals(from, today).unwrap();
        assert_eq!(totals.len(), 3);
        assert_eq!(totals[0].total_sec, 0);
        assert_eq!(totals[2].local_date, today);
        assert_eq!(totals[2].total_sec, 300);
    }

    #[test]
    fn daily_totals_reach_last_representable_date() {
        let (_dir, _clock, store) = store();
        let totals = store
            .daily_totals(NaiveDate::MAX - Duration::days(1), NaiveDate::MAX)
            .unwrap();
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[1].local_date, NaiveDate::MAX);
        assert!(totals.iter().all(|t| t.total_sec == 0));
    }

    #[test]
    fn daily_totals_empty_for_reversed_range() {
        let (_dir, clock, store) = store();
        let today = clock.today();
        assert!(store
            .daily_totals(today, today - Duration::days(1))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn totals_count_only_positive_finalized_days() {
        let (_dir, clock, store) = store();
        let zero = store.start_session("", "", SessionSource::Timer).unwrap();
        store.stop_session(zero).unwrap();
        assert_eq!(store.get_total_days_studied().unwrap(), 0);

        let id = store.start_session("", "", SessionSource::Timer).unwrap();
        clock.advance_secs(5400);
        store.stop_session(id).unwrap();
        assert_eq!(store.get_total_days_studied().unwrap(), 1);
        assert!((store.get_total_hours_studied().unwrap() - 1.5).abs() < f64::EPSILON);
    }
}
