//! Storage engine: schema management, a bounded pool of SQLite sessions,
//! and transactional execution for every public mutation.
//!
//! Each checked-out [`Session`] serves exactly one caller and returns to
//! the pool on drop. Acquisition blocks up to the configured timeout and
//! then fails with [`StoreError::Unavailable`]; nothing is retried
//! internally, so a data mutation can never be silently duplicated.

mod blocks;
mod deps;
mod history;
mod projects;
mod schema;

use std::collections::BTreeSet;
use std::fs;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use uuid::Uuid;

use crate::error::{Result, StoreError};

/// Tuning knobs for the storage engine. Environment variables override the
/// defaults so deployments can adjust without a rebuild.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Upper bound on concurrently open SQLite sessions.
    pub pool_size: usize,
    /// How long a caller may block waiting for a free session.
    pub acquire_timeout: Duration,
    /// SQLite busy handler timeout applied to every session.
    pub busy_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            pool_size: 8,
            acquire_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(5),
        }
    }
}

impl StoreConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let pool_size = std::env::var("STORYLOOM_POOL_SIZE")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(defaults.pool_size);
        let acquire_timeout = std::env::var("STORYLOOM_ACQUIRE_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.acquire_timeout);
        let busy_timeout = std::env::var("STORYLOOM_BUSY_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.busy_timeout);
        Self {
            pool_size,
            acquire_timeout,
            busy_timeout,
        }
    }
}

/// Handle to one project database. Cheap to clone; clones share the pool.
#[derive(Clone)]
pub struct Database {
    db_path: PathBuf,
    config: Arc<StoreConfig>,
    pool: Arc<PoolShared>,
}

#[derive(Debug)]
struct PoolShared {
    state: Mutex<PoolState>,
    cvar: Condvar,
    max: usize,
}

#[derive(Debug)]
struct PoolState {
    idle: Vec<Connection>,
    created: usize,
}

/// A pooled connection checked out for the duration of one transaction.
#[derive(Debug)]
pub(crate) struct Session {
    conn: Option<Connection>,
    pool: Arc<PoolShared>,
}

impl Deref for Session {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        self.conn.as_ref().expect("session connection already taken")
    }
}

impl DerefMut for Session {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().expect("session connection already taken")
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            let mut guard = self.pool.state.lock().expect("pool mutex poisoned");
            guard.idle.push(conn);
            drop(guard);
            self.pool.cvar.notify_one();
        }
    }
}

impl Database {
    /// Open (creating if missing) the database at `db_path` and run the
    /// idempotent schema initialization.
    pub fn open(db_path: impl Into<PathBuf>, config: StoreConfig) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&db_path)?;
        Self::apply_pragmas(&conn, &config)?;
        conn.execute_batch(schema::SCHEMA)?;
        tracing::debug!(path = %db_path.display(), pool = config.pool_size, "storage engine opened");

        let pool = Arc::new(PoolShared {
            state: Mutex::new(PoolState {
                idle: vec![conn],
                created: 1,
            }),
            cvar: Condvar::new(),
            max: config.pool_size,
        });
        Ok(Self {
            db_path,
            config: Arc::new(config),
            pool,
        })
    }

    /// Open the per-user default database (outside any project root).
    pub fn open_default() -> Result<Self> {
        let dirs = directories::ProjectDirs::from("", "", "storyloom").ok_or_else(|| {
            StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no home directory for default data dir",
            ))
        })?;
        Self::open(dirs.data_dir().join("project.db"), StoreConfig::from_env())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    // WAL keeps readers unblocked while one writer commits; foreign keys
    // enforce the cascade paths declared in the schema.
    fn apply_pragmas(conn: &Connection, config: &StoreConfig) -> rusqlite::Result<()> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(config.busy_timeout)?;
        Ok(())
    }

    /// Check out a session, blocking up to the configured acquisition
    /// timeout when the pool is exhausted.
    pub(crate) fn session(&self) -> Result<Session> {
        let deadline = Instant::now() + self.config.acquire_timeout;
        let mut guard = self.pool.state.lock().expect("pool mutex poisoned");
        loop {
            if let Some(conn) = guard.idle.pop() {
                drop(guard);
                return Ok(Session {
                    conn: Some(conn),
                    pool: Arc::clone(&self.pool),
                });
            }
            if guard.created < self.pool.max {
                guard.created += 1;
                drop(guard);
                match Connection::open(&self.db_path)
                    .and_then(|conn| Self::apply_pragmas(&conn, &self.config).map(|_| conn))
                {
                    Ok(conn) => {
                        return Ok(Session {
                            conn: Some(conn),
                            pool: Arc::clone(&self.pool),
                        });
                    }
                    Err(e) => {
                        let mut guard = self.pool.state.lock().expect("pool mutex poisoned");
                        guard.created -= 1;
                        drop(guard);
                        self.pool.cvar.notify_one();
                        return Err(e.into());
                    }
                }
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(StoreError::Unavailable(self.config.acquire_timeout));
            }
            let (g, wait) = self
                .pool
                .cvar
                .wait_timeout(guard, deadline - now)
                .expect("pool condvar poisoned");
            guard = g;
            if wait.timed_out() && guard.idle.is_empty() && guard.created >= self.pool.max {
                return Err(StoreError::Unavailable(self.config.acquire_timeout));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Column helpers shared by the per-table op modules
// ---------------------------------------------------------------------------

pub(crate) fn now_str() -> String {
    fmt_ts(&Utc::now())
}

pub(crate) fn fmt_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn conversion_err(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

pub(crate) fn uuid_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let s: String = row.get(idx)?;
    Uuid::parse_str(&s).map_err(|e| conversion_err(idx, e))
}

pub(crate) fn opt_uuid_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    let s: Option<String> = row.get(idx)?;
    s.map(|s| Uuid::parse_str(&s).map_err(|e| conversion_err(idx, e)))
        .transpose()
}

pub(crate) fn ts_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let s: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_err(idx, e))
}

/// Tags live as a JSON array in one TEXT column; NULL means empty.
pub(crate) fn tags_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<BTreeSet<String>> {
    let s: Option<String> = row.get(idx)?;
    match s {
        Some(s) => serde_json::from_str(&s).map_err(|e| conversion_err(idx, e)),
        None => Ok(BTreeSet::new()),
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;

    pub fn open_test_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::open(dir.path().join("project.db"), StoreConfig::default())
            .expect("open test db");
        (dir, db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reopen_preserves_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.db");
        let project_id = {
            let db = Database::open(&path, StoreConfig::default()).unwrap();
            db.create_project("Reopen", "/tmp/reopen").unwrap().id
        };
        let db = Database::open(&path, StoreConfig::default()).unwrap();
        let project = db.get_project(project_id).unwrap().unwrap();
        assert_eq!(project.name, "Reopen");
    }

    #[test]
    fn exhausted_pool_times_out_with_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            pool_size: 1,
            acquire_timeout: Duration::from_millis(50),
            ..StoreConfig::default()
        };
        let db = Database::open(dir.path().join("project.db"), config).unwrap();

        let held = db.session().unwrap();
        let err = db.session().unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        drop(held);

        // Session returned to the pool; acquisition works again.
        assert!(db.session().is_ok());
    }
}
