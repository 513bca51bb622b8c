//! Relational store abstraction.
//!
//! The writer and the restore engine only rely on the narrow contract of the
//! [`Store`] trait: named-column queries, row cursors with typed field
//! assignment, explicit transactions, string-literal escaping, table
//! enumeration under a prefix and the driver family.

mod constraints;
mod sqlite;

use std::fmt;

use crate::error::StoreResult;

pub use constraints::{
    constraint_toggle, ConstraintToggle, MysqlForeignKeyChecks, NoConstraintToggle,
    PostgresDeferral, SqliteDeferral,
};
pub use sqlite::{SqliteConfig, SqliteStore};

/// Driver family of a store, used to pick a constraint strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Driver {
    /// SQLite.
    Sqlite,
    /// PostgreSQL.
    Postgres,
    /// MySQL / MariaDB.
    Mysql,
    /// Anything else.
    Other,
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Driver::Sqlite => write!(f, "sqlite"),
            Driver::Postgres => write!(f, "postgresql"),
            Driver::Mysql => write!(f, "mysql"),
            Driver::Other => write!(f, "other"),
        }
    }
}

/// A column value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// Integer.
    Int(i64),
    /// Boolean, stored as 0/1 where the backend has no boolean type.
    Bool(bool),
    /// Text.
    Text(String),
}

impl Value {
    /// Whether this is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Integer view of the value.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Text(s) => s.trim().parse().ok(),
            Value::Null => None,
        }
    }

    /// Text view of the value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Render for a flat backup field. NULL becomes the empty string.
    pub fn to_flat(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Int(i) => i.to_string(),
            Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            Value::Text(s) => s.clone(),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Result of a read query: column names and rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl RowSet {
    /// Build a row set. Every row must have one value per column.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// Column names in result order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// All rows.
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the result is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value of a named column in a given row.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// First column of the first row as an integer, NULL and empty sets
    /// yield `None`.
    pub fn first_int(&self) -> Option<i64> {
        self.rows.first().and_then(|r| r.first()).and_then(Value::as_i64)
    }
}

/// A row being assembled for insertion or update.
///
/// The table name is unprefixed; the store applies its prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct RowCursor {
    table: String,
    fields: Vec<(String, Value)>,
}

impl RowCursor {
    /// Open an empty cursor on a table.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            fields: Vec::new(),
        }
    }

    /// Unprefixed table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Assign a field, replacing a previous assignment.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
        self
    }

    /// Current value of a field.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Assigned fields in assignment order.
    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    /// Forget all assignments.
    pub fn clear(&mut self) {
        self.fields.clear();
    }
}

/// The relational store contract.
///
/// SQL passed to [`Store::query`] and [`Store::execute`] uses `?`
/// placeholders and fully prefixed table names (see [`Store::table`]).
pub trait Store {
    /// Driver family.
    fn driver(&self) -> Driver;

    /// Table name prefix.
    fn prefix(&self) -> &str;

    /// Prefixed name of a table.
    fn table(&self, name: &str) -> String {
        format!("{}{}", self.prefix(), name)
    }

    /// Run a read query.
    fn query(&self, sql: &str, params: &[Value]) -> StoreResult<RowSet>;

    /// Run a statement, returning the number of affected rows.
    fn execute(&self, sql: &str, params: &[Value]) -> StoreResult<usize>;

    /// Insert the cursor as a new row.
    fn insert(&self, cursor: &RowCursor) -> StoreResult<()> {
        let names: Vec<&str> = cursor.fields().iter().map(|(n, _)| n.as_str()).collect();
        let placeholders = vec!["?"; names.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table(cursor.table()),
            names.join(", "),
            placeholders
        );
        let params: Vec<Value> = cursor.fields().iter().map(|(_, v)| v.clone()).collect();
        self.execute(&sql, &params)?;
        Ok(())
    }

    /// Update the rows matching `condition` (a `WHERE ...` clause) with the
    /// cursor's fields, returning the number of affected rows.
    fn update(&self, cursor: &RowCursor, condition: &str, params: &[Value]) -> StoreResult<usize> {
        let assignments: Vec<String> = cursor
            .fields()
            .iter()
            .map(|(n, _)| format!("{} = ?", n))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} {}",
            self.table(cursor.table()),
            assignments.join(", "),
            condition
        );
        let mut all: Vec<Value> = cursor.fields().iter().map(|(_, v)| v.clone()).collect();
        all.extend_from_slice(params);
        self.execute(&sql, &all)
    }

    /// Begin a transaction.
    fn begin(&self) -> StoreResult<()>;

    /// Commit the current transaction.
    fn commit(&self) -> StoreResult<()>;

    /// Roll back the current transaction.
    fn rollback(&self) -> StoreResult<()>;

    /// Escape a string so it can be embedded between single quotes.
    fn escape_string(&self, s: &str) -> String {
        s.replace('\'', "''")
    }

    /// Unprefixed names of the tables under the prefix.
    fn tables(&self) -> StoreResult<Vec<String>>;
}
