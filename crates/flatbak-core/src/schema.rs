//! The fixed relational schema backups are taken from.
//!
//! Column kinds drive the coercion of flat string fields back into typed
//! values; column defaults fill in fields that older backups do not carry.

use crate::error::FormatError;
use crate::record::{parse_bool, Record};
use crate::store::{RowCursor, Value};

/// Semantic type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Text.
    Text,
    /// Integer.
    Int,
    /// Boolean stored as 0/1.
    Bool,
}

impl ColumnKind {
    fn sql_type(&self) -> &'static str {
        match self {
            ColumnKind::Text => "TEXT",
            ColumnKind::Int | ColumnKind::Bool => "INTEGER",
        }
    }
}

/// Value used when a backup lacks a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnDefault {
    /// NOT NULL, no default: the kind's zero value (`""`, `0`, `false`).
    Required,
    /// Nullable; empty fields are stored as NULL too.
    Null,
    /// Boolean false.
    False,
    /// A fixed integer.
    Int(i64),
    /// A fixed text.
    Text(&'static str),
    /// The restore's default time zone.
    TimeZone,
}

/// A column of the schema.
#[derive(Debug, Clone, Copy)]
pub struct ColumnDef {
    /// Column name.
    pub name: &'static str,
    /// Semantic type.
    pub kind: ColumnKind,
    /// Default when missing.
    pub default: ColumnDefault,
}

/// A foreign key of the schema.
#[derive(Debug, Clone, Copy)]
pub struct ForeignKey {
    /// Referencing column.
    pub column: &'static str,
    /// Referenced table (unprefixed).
    pub table: &'static str,
    /// Referenced column.
    pub references: &'static str,
    /// `ON DELETE` action.
    pub on_delete: &'static str,
}

/// A table of the schema.
#[derive(Debug, Clone, Copy)]
pub struct TableDef {
    /// Unprefixed table name.
    pub name: &'static str,
    /// Columns in declaration order.
    pub columns: &'static [ColumnDef],
    /// Primary key columns, possibly empty.
    pub primary_key: &'static [&'static str],
    /// Foreign keys.
    pub foreign_keys: &'static [ForeignKey],
}

impl TableDef {
    /// Look a column up by name.
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Copy a record onto a fresh cursor, column by column.
    ///
    /// Fields the table does not declare are ignored; declared columns the
    /// record lacks get their default.
    pub fn cursor_from(&self, record: &Record, timezone: &str) -> Result<RowCursor, FormatError> {
        let mut cursor = RowCursor::new(self.name);
        for column in self.columns {
            cursor.set(column.name, coerce(column, record, timezone)?);
        }
        Ok(cursor)
    }

    /// SQLite DDL creating this table under a prefix.
    pub fn sqlite_ddl(&self, prefix: &str) -> String {
        let mut lines: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                let mut line = format!("{} {}", c.name, c.kind.sql_type());
                match c.default {
                    ColumnDefault::Null => {}
                    ColumnDefault::Required => line.push_str(" NOT NULL"),
                    ColumnDefault::False => line.push_str(" NOT NULL DEFAULT 0"),
                    ColumnDefault::Int(i) => line.push_str(&format!(" NOT NULL DEFAULT {}", i)),
                    ColumnDefault::Text(t) => {
                        line.push_str(&format!(" NOT NULL DEFAULT '{}'", t.replace('\'', "''")))
                    }
                    ColumnDefault::TimeZone => line.push_str(" NOT NULL DEFAULT 'UTC'"),
                }
                line
            })
            .collect();

        if !self.primary_key.is_empty() {
            lines.push(format!("PRIMARY KEY ({})", self.primary_key.join(", ")));
        }
        for fk in self.foreign_keys {
            lines.push(format!(
                "FOREIGN KEY ({}) REFERENCES {}{}({}) ON DELETE {}",
                fk.column, prefix, fk.table, fk.references, fk.on_delete
            ));
        }

        format!(
            "CREATE TABLE IF NOT EXISTS {}{} (\n    {}\n);",
            prefix,
            self.name,
            lines.join(",\n    ")
        )
    }
}

/// Coerce a record field into a value for `column`.
pub fn coerce(column: &ColumnDef, record: &Record, timezone: &str) -> Result<Value, FormatError> {
    let raw = record.get(column.name);

    let raw = match (raw, column.default) {
        (None, default) | (Some(""), default @ ColumnDefault::Null) => {
            return Ok(default_value(column.kind, default, timezone))
        }
        (Some(raw), _) => raw,
    };

    match column.kind {
        ColumnKind::Text => Ok(Value::Text(raw.to_string())),
        ColumnKind::Int => match raw.trim() {
            "" => Ok(default_value(column.kind, column.default, timezone)),
            trimmed => trimmed
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| record.invalid(column.name, raw, "integer")),
        },
        ColumnKind::Bool => parse_bool(raw.trim())
            .map(Value::Bool)
            .ok_or_else(|| record.invalid(column.name, raw, "boolean")),
    }
}

fn default_value(kind: ColumnKind, default: ColumnDefault, timezone: &str) -> Value {
    match default {
        ColumnDefault::Null => Value::Null,
        ColumnDefault::False => Value::Bool(false),
        ColumnDefault::Int(i) => Value::Int(i),
        ColumnDefault::Text(t) => Value::Text(t.to_string()),
        ColumnDefault::TimeZone => Value::Text(timezone.to_string()),
        ColumnDefault::Required => match kind {
            ColumnKind::Text => Value::Text(String::new()),
            ColumnKind::Int => Value::Int(0),
            ColumnKind::Bool => Value::Bool(false),
        },
    }
}

/// Look a table up by unprefixed name.
pub fn table(name: &str) -> Option<&'static TableDef> {
    TABLES.iter().find(|t| t.name == name)
}

/// SQLite DDL for the whole schema, in dependency order.
pub fn sqlite_ddl(prefix: &str) -> String {
    TABLES
        .iter()
        .map(|t| t.sqlite_ddl(prefix))
        .collect::<Vec<_>>()
        .join("\n")
}

const fn col(name: &'static str, kind: ColumnKind, default: ColumnDefault) -> ColumnDef {
    ColumnDef {
        name,
        kind,
        default,
    }
}

const fn fk(
    column: &'static str,
    table: &'static str,
    references: &'static str,
    on_delete: &'static str,
) -> ForeignKey {
    ForeignKey {
        column,
        table,
        references,
        on_delete,
    }
}

use ColumnDefault::{False, Null, Required, TimeZone};
use ColumnKind::{Bool, Int, Text};

/// Every table, in dependency order.
pub static TABLES: &[TableDef] = &[
    TableDef {
        name: "blog",
        columns: &[
            col("blog_id", Text, Required),
            col("blog_uid", Text, Required),
            col("blog_creadt", Text, Required),
            col("blog_upddt", Text, Required),
            col("blog_url", Text, Required),
            col("blog_name", Text, Required),
            col("blog_desc", Text, Null),
            col("blog_status", Int, ColumnDefault::Int(1)),
        ],
        primary_key: &["blog_id"],
        foreign_keys: &[],
    },
    TableDef {
        name: "category",
        columns: &[
            col("cat_id", Int, Required),
            col("blog_id", Text, Required),
            col("cat_title", Text, Required),
            col("cat_url", Text, Required),
            col("cat_desc", Text, Null),
            col("cat_position", Int, ColumnDefault::Int(0)),
            col("cat_lft", Int, Null),
            col("cat_rgt", Int, Null),
        ],
        primary_key: &["cat_id"],
        foreign_keys: &[fk("blog_id", "blog", "blog_id", "CASCADE")],
    },
    TableDef {
        name: "link",
        columns: &[
            col("link_id", Int, Required),
            col("blog_id", Text, Required),
            col("link_href", Text, Required),
            col("link_title", Text, Required),
            col("link_desc", Text, Null),
            col("link_lang", Text, Null),
            col("link_xfn", Text, Null),
            col("link_position", Int, ColumnDefault::Int(0)),
        ],
        primary_key: &["link_id"],
        foreign_keys: &[fk("blog_id", "blog", "blog_id", "CASCADE")],
    },
    TableDef {
        name: "setting",
        columns: &[
            col("setting_id", Text, Required),
            col("blog_id", Text, Null),
            col("setting_ns", Text, ColumnDefault::Text("system")),
            col("setting_value", Text, Null),
            col("setting_type", Text, ColumnDefault::Text("string")),
            col("setting_label", Text, Null),
        ],
        primary_key: &[],
        foreign_keys: &[fk("blog_id", "blog", "blog_id", "CASCADE")],
    },
    TableDef {
        name: "user",
        columns: &[
            col("user_id", Text, Required),
            col("user_super", Bool, False),
            col("user_status", Int, ColumnDefault::Int(1)),
            col("user_pwd", Text, Required),
            col("user_change_pwd", Bool, False),
            col("user_recover_key", Text, Null),
            col("user_name", Text, Null),
            col("user_firstname", Text, Null),
            col("user_displayname", Text, Null),
            col("user_email", Text, Null),
            col("user_url", Text, Null),
            col("user_desc", Text, Null),
            col("user_default_blog", Text, Null),
            col("user_options", Text, Null),
            col("user_lang", Text, Null),
            col("user_tz", Text, TimeZone),
            col("user_post_status", Int, ColumnDefault::Int(-2)),
            col("user_creadt", Text, Required),
            col("user_upddt", Text, Required),
        ],
        primary_key: &["user_id"],
        foreign_keys: &[],
    },
    TableDef {
        name: "pref",
        columns: &[
            col("pref_id", Text, Required),
            col("user_id", Text, Null),
            col("pref_ws", Text, ColumnDefault::Text("system")),
            col("pref_value", Text, Null),
            col("pref_type", Text, ColumnDefault::Text("string")),
            col("pref_label", Text, Null),
        ],
        primary_key: &[],
        foreign_keys: &[fk("user_id", "user", "user_id", "CASCADE")],
    },
    TableDef {
        name: "permissions",
        columns: &[
            col("user_id", Text, Required),
            col("blog_id", Text, Required),
            col("permissions", Text, Null),
        ],
        primary_key: &["user_id", "blog_id"],
        foreign_keys: &[
            fk("user_id", "user", "user_id", "CASCADE"),
            fk("blog_id", "blog", "blog_id", "CASCADE"),
        ],
    },
    TableDef {
        name: "post",
        columns: &[
            col("post_id", Int, Required),
            col("blog_id", Text, Required),
            col("user_id", Text, Required),
            col("cat_id", Int, Null),
            col("post_dt", Text, Required),
            col("post_tz", Text, TimeZone),
            col("post_creadt", Text, Required),
            col("post_upddt", Text, Required),
            col("post_password", Text, Null),
            col("post_type", Text, ColumnDefault::Text("post")),
            col("post_format", Text, ColumnDefault::Text("xhtml")),
            col("post_url", Text, Required),
            col("post_lang", Text, Null),
            col("post_title", Text, Null),
            col("post_excerpt", Text, Null),
            col("post_excerpt_xhtml", Text, Null),
            col("post_content", Text, Null),
            col("post_content_xhtml", Text, Null),
            col("post_notes", Text, Null),
            col("post_meta", Text, Null),
            col("post_words", Text, Null),
            col("post_status", Int, ColumnDefault::Int(0)),
            col("post_selected", Bool, False),
            col("post_position", Int, ColumnDefault::Int(0)),
            col("post_open_comment", Bool, False),
            col("post_open_tb", Bool, False),
            col("nb_comment", Int, ColumnDefault::Int(0)),
            col("nb_trackback", Int, ColumnDefault::Int(0)),
            col("post_firstpub", Bool, False),
        ],
        primary_key: &["post_id"],
        foreign_keys: &[
            fk("blog_id", "blog", "blog_id", "CASCADE"),
            fk("user_id", "user", "user_id", "CASCADE"),
            fk("cat_id", "category", "cat_id", "SET NULL"),
        ],
    },
    TableDef {
        name: "meta",
        columns: &[
            col("meta_id", Text, Required),
            col("meta_type", Text, Required),
            col("post_id", Int, Required),
        ],
        primary_key: &["meta_id", "meta_type", "post_id"],
        foreign_keys: &[fk("post_id", "post", "post_id", "CASCADE")],
    },
    TableDef {
        name: "media",
        columns: &[
            col("media_id", Int, Required),
            col("user_id", Text, Required),
            col("media_path", Text, Required),
            col("media_title", Text, Required),
            col("media_file", Text, Required),
            col("media_dir", Text, ColumnDefault::Text(".")),
            col("media_meta", Text, Null),
            col("media_dt", Text, Required),
            col("media_creadt", Text, Required),
            col("media_upddt", Text, Required),
            col("media_private", Bool, False),
        ],
        primary_key: &["media_id"],
        foreign_keys: &[fk("user_id", "user", "user_id", "CASCADE")],
    },
    TableDef {
        name: "post_media",
        columns: &[
            col("media_id", Int, Required),
            col("post_id", Int, Required),
            col("link_type", Text, ColumnDefault::Text("attachment")),
        ],
        primary_key: &["media_id", "post_id", "link_type"],
        foreign_keys: &[
            fk("media_id", "media", "media_id", "CASCADE"),
            fk("post_id", "post", "post_id", "CASCADE"),
        ],
    },
    TableDef {
        name: "log",
        columns: &[
            col("log_id", Int, Required),
            col("user_id", Text, Null),
            col("log_table", Text, Required),
            col("log_dt", Text, Required),
            col("log_ip", Text, Required),
            col("log_msg", Text, Required),
            col("blog_id", Text, Required),
        ],
        primary_key: &["log_id"],
        foreign_keys: &[fk("blog_id", "blog", "blog_id", "CASCADE")],
    },
    TableDef {
        name: "ping",
        columns: &[
            col("post_id", Int, Required),
            col("ping_url", Text, Required),
            col("ping_dt", Text, Required),
        ],
        primary_key: &["post_id", "ping_url"],
        foreign_keys: &[fk("post_id", "post", "post_id", "CASCADE")],
    },
    TableDef {
        name: "comment",
        columns: &[
            col("comment_id", Int, Required),
            col("post_id", Int, Required),
            col("comment_dt", Text, Required),
            col("comment_tz", Text, TimeZone),
            col("comment_upddt", Text, Required),
            col("comment_author", Text, Null),
            col("comment_email", Text, Null),
            col("comment_site", Text, Null),
            col("comment_content", Text, Null),
            col("comment_words", Text, Null),
            col("comment_ip", Text, Null),
            col("comment_status", Int, ColumnDefault::Int(0)),
            col("comment_spam_status", Text, Null),
            col("comment_spam_filter", Text, Null),
            col("comment_trackback", Bool, False),
        ],
        primary_key: &["comment_id"],
        foreign_keys: &[fk("post_id", "post", "post_id", "CASCADE")],
    },
    TableDef {
        name: "spamrule",
        columns: &[
            col("rule_id", Int, Required),
            col("blog_id", Text, Null),
            col("rule_type", Text, ColumnDefault::Text("word")),
            col("rule_content", Text, Required),
        ],
        primary_key: &["rule_id"],
        foreign_keys: &[fk("blog_id", "blog", "blog_id", "CASCADE")],
    },
];
