//! flatbak core - flat backup format, streaming reader and writer.
//!
//! A flat backup is a line-oriented text dump of the relational dataset of a
//! blog install. This crate provides:
//! - the grammar shared by writer and reader ([`format`]),
//! - a streaming [`FlatWriter`] dumping query results,
//! - a lazy [`FlatReader`] yielding one [`Record`] per data line,
//! - a [`LegacyAdapter`] upgrading records written by 1.2.x installs,
//! - the [`Store`] contract and a SQLite implementation of it,
//! - the fixed [`schema`] both sides agree on.

pub mod error;
pub mod format;
pub mod legacy;
pub mod reader;
pub mod record;
pub mod schema;
pub mod store;
pub mod writer;

pub use error::{Error, FormatError, StoreError, StoreResult};
pub use format::{escape, unescape, BlockHeader, FormatVersion, ImportMode, Signature};
pub use legacy::LegacyAdapter;
pub use reader::FlatReader;
pub use record::Record;
pub use schema::{ColumnDef, ColumnDefault, ColumnKind, TableDef};
pub use store::{
    constraint_toggle, ConstraintToggle, Driver, RowCursor, RowSet, SqliteConfig, SqliteStore,
    Store, Value,
};
pub use writer::FlatWriter;
