//! SQLite-backed store.

use std::path::PathBuf;
use std::time::Duration;

use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection};
use tracing::debug;

use super::{Driver, RowSet, Store, Value};
use crate::error::StoreResult;
use crate::schema;

/// Default table prefix.
pub const DEFAULT_PREFIX: &str = "dc_";

/// Configuration for a [`SqliteStore`].
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Database file. None opens an in-memory database.
    pub path: Option<PathBuf>,

    /// Table name prefix.
    pub prefix: String,

    /// Enforce foreign keys.
    pub foreign_keys: bool,

    /// How long to wait on a locked database.
    pub busy_timeout: Duration,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: None,
            prefix: DEFAULT_PREFIX.to_string(),
            foreign_keys: true,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

impl SqliteConfig {
    /// Create a configuration for a database file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }

    /// Create an in-memory configuration for testing.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Set the table prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Disable foreign key enforcement.
    pub fn without_foreign_keys(mut self) -> Self {
        self.foreign_keys = false;
        self
    }

    /// Set the busy timeout.
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }
}

/// A [`Store`] over one SQLite connection.
pub struct SqliteStore {
    conn: Connection,
    prefix: String,
}

impl SqliteStore {
    /// Open a store with the given configuration.
    pub fn open(config: SqliteConfig) -> StoreResult<Self> {
        let conn = match &config.path {
            Some(path) => Connection::open(path)?,
            None => Connection::open_in_memory()?,
        };
        conn.busy_timeout(config.busy_timeout)?;
        conn.pragma_update(None, "foreign_keys", config.foreign_keys)?;

        Ok(Self {
            conn,
            prefix: config.prefix,
        })
    }

    /// Open an in-memory store with the default prefix.
    pub fn in_memory() -> StoreResult<Self> {
        Self::open(SqliteConfig::in_memory())
    }

    /// Create the schema tables that do not exist yet.
    pub fn install_schema(&self) -> StoreResult<()> {
        debug!(prefix = %self.prefix, "Installing schema");
        self.conn.execute_batch(&schema::sqlite_ddl(&self.prefix))?;
        Ok(())
    }

    /// The underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Store for SqliteStore {
    fn driver(&self) -> Driver {
        Driver::Sqlite
    }

    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn query(&self, sql: &str, params: &[Value]) -> StoreResult<RowSet> {
        let mut stmt = self.conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();

        let mut rows = Vec::new();
        let mut cursor = stmt.query(params_from_iter(params.iter()))?;
        while let Some(row) = cursor.next()? {
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                values.push(from_sql(row.get_ref(i)?));
            }
            rows.push(values);
        }

        Ok(RowSet::new(columns, rows))
    }

    fn execute(&self, sql: &str, params: &[Value]) -> StoreResult<usize> {
        Ok(self.conn.execute(sql, params_from_iter(params.iter()))?)
    }

    fn begin(&self) -> StoreResult<()> {
        self.conn.execute_batch("BEGIN")?;
        Ok(())
    }

    fn commit(&self) -> StoreResult<()> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&self) -> StoreResult<()> {
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    fn tables(&self) -> StoreResult<Vec<String>> {
        let rs = self.query(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY rowid",
            &[],
        )?;
        Ok(rs
            .rows()
            .iter()
            .filter_map(|r| r.first().and_then(Value::as_str))
            .filter_map(|name| name.strip_prefix(self.prefix.as_str()))
            .map(str::to_string)
            .collect())
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(rusqlite::types::Value::Null),
            Value::Int(i) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(*i)),
            Value::Bool(b) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(i64::from(*b))),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Text(f.to_string()),
        ValueRef::Text(t) | ValueRef::Blob(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
    }
}
