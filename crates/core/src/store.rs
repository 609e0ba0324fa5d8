//! SQLite-backed record store.
//!
//! A single connection is shared behind a mutex. Every service call holds the lock for
//! its whole duration, and multi-record writes run inside one transaction, so partial
//! cascades or half-applied reassignments are never visible.

use crate::config::CoreConfig;
use crate::error::UnknownVariant;
use crate::{CoreError, CoreResult};
use curamind_uuid::RecordId;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::Type;
use rusqlite::{Connection, Row, Transaction, TransactionBehavior};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const MIGRATIONS: &[(i64, &str)] = &[(1, include_str!("../migrations/001_initial.sql"))];

/// How long a write waits for another connection to release the database.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to the record store. Cheap to clone.
#[derive(Clone)]
pub struct Store {
    cfg: Arc<CoreConfig>,
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("database_path", &self.cfg.database_path())
            .finish()
    }
}

impl Store {
    /// Opens (creating if needed) the database named by `cfg` and runs pending migrations.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Database` if the file cannot be opened and
    /// `CoreError::Migration` if a migration script fails.
    pub fn open(cfg: Arc<CoreConfig>) -> CoreResult<Self> {
        let conn = if cfg.is_in_memory() {
            Connection::open_in_memory()?
        } else {
            Connection::open(cfg.database_path())?
        };
        configure_connection(&conn)?;
        run_migrations(&conn)?;

        tracing::info!("record store ready at {}", cfg.database_path().display());

        Ok(Self {
            cfg,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }

    /// Runs `f` against the connection without opening a transaction.
    pub(crate) fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> CoreResult<T>,
    ) -> CoreResult<T> {
        let guard = self.conn.lock().map_err(|_| CoreError::LockPoisoned)?;
        f(&guard)
    }

    /// Runs `f` inside a transaction, committing only when it returns `Ok`.
    ///
    /// The write lock is taken up front, so reads made inside `f` cannot be invalidated by
    /// another connection before commit.
    pub(crate) fn with_tx<T>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> CoreResult<T>,
    ) -> CoreResult<T> {
        let mut guard = self.conn.lock().map_err(|_| CoreError::LockPoisoned)?;
        let tx = guard.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    /// Current schema version (0 for an empty database).
    pub fn schema_version(&self) -> CoreResult<i64> {
        self.with_conn(|conn| Ok(current_version(conn)))
    }
}

fn configure_connection(conn: &Connection) -> CoreResult<()> {
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;

    // SQLite's LOWER only folds ASCII.
    conn.create_scalar_function(
        "unicode_lower",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| Ok(ctx.get::<Option<String>>(0)?.map(|s| s.to_lowercase())),
    )?;
    Ok(())
}

fn run_migrations(conn: &Connection) -> CoreResult<()> {
    let current = current_version(conn);

    for (version, sql) in MIGRATIONS {
        if *version > current {
            tracing::info!("Running migration v{version}");
            conn.execute_batch(sql).map_err(|e| CoreError::Migration {
                version: *version,
                reason: e.to_string(),
            })?;
        }
    }

    Ok(())
}

fn current_version(conn: &Connection) -> i64 {
    conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
        row.get::<_, Option<i64>>(0)
    })
    .ok()
    .flatten()
    .unwrap_or(0)
}

// Row decoding helpers shared by the services.

pub(crate) fn id_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<RecordId> {
    let raw: String = row.get(idx)?;
    RecordId::parse(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn opt_id_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<RecordId>> {
    match row.get::<_, Option<String>>(idx)? {
        None => Ok(None),
        Some(raw) => RecordId::parse(&raw).map(Some).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
        }),
    }
}

pub(crate) fn tag_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = UnknownVariant>,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn json_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Escapes `%`, `_` and `\` so user input can be embedded in a `LIKE ... ESCAPE '\'` pattern.
pub(crate) fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
