//! Streaming flat backup writer.
//!
//! The writer has no transactional guarantee: an export interrupted midway
//! leaves a truncated stream behind.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::error::Error;
use crate::format::{encode_header, encode_row, ImportMode, Signature};
use crate::store::{Store, Value};

/// Tables dumped for a single blog, in the order a merge restore needs them.
pub const BLOG_TABLES: &[&str] = &[
    "category",
    "link",
    "media",
    "post",
    "meta",
    "post_media",
    "ping",
    "comment",
];

/// Writes query results as flat backup blocks into a sink.
pub struct FlatWriter<W: Write> {
    sink: W,
    blocks: usize,
}

impl FlatWriter<BufWriter<File>> {
    /// Create (or truncate) a backup file.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, Error> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> FlatWriter<W> {
    /// Wrap a sink.
    pub fn new(sink: W) -> Self {
        Self { sink, blocks: 0 }
    }

    /// Write the `///DOTCLEAR|<version>|<mode>` line expected by importers.
    pub fn write_signature(&mut self, version: &str, mode: ImportMode) -> Result<(), Error> {
        writeln!(self.sink, "{}", Signature::new(version, mode).encode())?;
        Ok(())
    }

    /// Export every table under the store prefix. Returns rows written.
    pub fn export_all(&mut self, store: &dyn Store) -> Result<usize, Error> {
        let mut rows = 0;
        for table in store.tables()? {
            rows += self.export_table(store, &table)?;
        }
        info!(rows, blocks = self.blocks, "Exported all tables");
        Ok(rows)
    }

    /// Export one table in full. Returns rows written.
    pub fn export_table(&mut self, store: &dyn Store, name: &str) -> Result<usize, Error> {
        let sql = format!("SELECT * FROM {}", store.table(name));
        self.export(store, name, &sql)
    }

    /// Export the rows of `query` as a block named `name`.
    ///
    /// An empty result writes nothing. Returns rows written.
    pub fn export(&mut self, store: &dyn Store, name: &str, query: &str) -> Result<usize, Error> {
        let rs = store.query(query, &[])?;
        if rs.is_empty() {
            debug!(table = name, "Nothing to export");
            return Ok(0);
        }

        if self.blocks > 0 {
            writeln!(self.sink)?;
        }
        writeln!(self.sink, "{}", encode_header(name, rs.columns()))?;
        for row in rs.rows() {
            writeln!(self.sink, "{}", encode_row(row.iter().map(Value::to_flat)))?;
        }
        self.sink.flush()?;
        self.blocks += 1;

        debug!(table = name, rows = rs.len(), "Exported table");
        Ok(rs.len())
    }

    /// Export the content of one blog so it can be merged elsewhere.
    pub fn export_blog(&mut self, store: &dyn Store, blog_id: &str) -> Result<usize, Error> {
        let blog = store.escape_string(blog_id);
        let post = store.table("post");
        let mut rows = 0;

        for &name in BLOG_TABLES {
            let table = store.table(name);
            let sql = match name {
                "category" => format!(
                    "SELECT * FROM {} WHERE blog_id = '{}' ORDER BY cat_lft",
                    table, blog
                ),
                "link" | "post" => format!("SELECT * FROM {} WHERE blog_id = '{}'", table, blog),
                "media" => format!(
                    "SELECT DISTINCT M.* FROM {} M \
                     JOIN {} PM ON PM.media_id = M.media_id \
                     JOIN {} P ON P.post_id = PM.post_id \
                     WHERE P.blog_id = '{}'",
                    table,
                    store.table("post_media"),
                    post,
                    blog
                ),
                _ => format!(
                    "SELECT T.* FROM {} T JOIN {} P ON P.post_id = T.post_id WHERE P.blog_id = '{}'",
                    table, post, blog
                ),
            };
            rows += self.export(store, name, &sql)?;
        }

        info!(blog_id, rows, "Exported blog");
        Ok(rows)
    }

    /// Flush and hand back the sink.
    pub fn finish(mut self) -> Result<W, Error> {
        self.sink.flush()?;
        Ok(self.sink)
    }
}
