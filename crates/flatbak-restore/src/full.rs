//! Whole-install restore.

use flatbak_core::{schema, Record, RowCursor, Value};
use tracing::debug;

use crate::engine::RestoreEngine;
use crate::error::RestoreResult;
use crate::session::Outcome;

/// Tables emptied before a full restore. Rows of blog-owned tables go with
/// their blog.
pub const WIPED_TABLES: &[&str] = &["blog", "media", "setting", "log"];

impl RestoreEngine<'_> {
    pub(crate) fn wipe(&self) -> RestoreResult<()> {
        for &table in WIPED_TABLES {
            let sql = format!("DELETE FROM {}", self.store.table(table));
            let rows = self.store.execute(&sql, &[])?;
            debug!(table, rows, "Emptied table");
        }
        Ok(())
    }

    /// Copy one record onto its table.
    pub(crate) fn restore_full_record(&self, record: &Record) -> RestoreResult<Outcome> {
        let Some(def) = schema::table(record.table()) else {
            debug!(table = record.table(), line = record.line(), "Ignoring unknown table");
            return Ok(Outcome::Ignored);
        };
        let cursor = def.cursor_from(record, &self.config.default_timezone)?;

        match def.name {
            "user" => {
                let login = record.as_string("user_id");
                if self.auth.user_exists(self.store, &login)? {
                    debug!(login, "Keeping existing user");
                    return Ok(Outcome::Skipped);
                }
                self.store.insert(&cursor)?;
            }
            "pref" => {
                let user = field(&cursor, "user_id");
                let matched = self.store.update(
                    &cursor,
                    "WHERE pref_id = ? AND pref_ws = ? \
                     AND (user_id = ? OR (user_id IS NULL AND ? IS NULL))",
                    &[
                        field(&cursor, "pref_id"),
                        field(&cursor, "pref_ws"),
                        user.clone(),
                        user,
                    ],
                )?;
                if matched > 0 {
                    return Ok(Outcome::Updated);
                }
                self.store.insert(&cursor)?;
            }
            "spamrule" => {
                let matched =
                    self.store
                        .update(&cursor, "WHERE rule_id = ?", &[field(&cursor, "rule_id")])?;
                if matched > 0 {
                    return Ok(Outcome::Updated);
                }
                self.store.insert(&cursor)?;
            }
            _ => self.store.insert(&cursor)?,
        }

        Ok(Outcome::Inserted)
    }
}

fn field(cursor: &RowCursor, name: &str) -> Value {
    cursor.get(name).cloned().unwrap_or(Value::Null)
}
