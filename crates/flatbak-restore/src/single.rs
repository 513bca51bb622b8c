//! Single-blog merge.
//!
//! Rows are re-homed to the destination blog under fresh ids. Dependent rows
//! have their references rewritten through the session's id maps and fail
//! when the referenced row was not restored before them.

use chrono::Utc;
use flatbak_core::{schema, Record, RowCursor, TableDef, Value};
use tracing::debug;

use crate::engine::RestoreEngine;
use crate::error::RestoreResult;
use crate::session::{Counters, IdKind, Outcome, RestoreSession};
use crate::urls::POST_URL_MAX;

/// Value of `log_table` for merge log rows.
pub const ACTIVITY_LOG_TABLE: &str = "flatbak";

impl RestoreEngine<'_> {
    pub(crate) fn seed(&self, session: &mut RestoreSession, blog_id: &str) -> RestoreResult<()> {
        session.counters = Some(Counters::seed(self.store, blog_id)?);
        Ok(())
    }

    /// Merge one record into `blog_id`.
    pub(crate) fn restore_single_record(
        &self,
        session: &mut RestoreSession,
        record: &Record,
        blog_id: &str,
    ) -> RestoreResult<Outcome> {
        let Some(def) = schema::table(record.table()) else {
            debug!(table = record.table(), line = record.line(), "Ignoring unknown table");
            return Ok(Outcome::Ignored);
        };

        match def.name {
            "category" => self.merge_category(session, def, record, blog_id),
            "link" => self.merge_link(session, def, record, blog_id),
            "post" => self.merge_post(session, def, record, blog_id),
            "meta" | "ping" => self.merge_post_child(session, def, record),
            "media" => self.merge_media(session, def, record),
            "post_media" => self.merge_post_media(session, def, record),
            "comment" => self.merge_comment(session, def, record),
            other => {
                debug!(table = other, line = record.line(), "Table not merged");
                Ok(Outcome::Ignored)
            }
        }
    }

    fn cursor(&self, def: &TableDef, record: &Record) -> RestoreResult<RowCursor> {
        Ok(def.cursor_from(record, &self.config.default_timezone)?)
    }

    fn merge_category(
        &self,
        session: &mut RestoreSession,
        def: &TableDef,
        record: &Record,
        blog_id: &str,
    ) -> RestoreResult<Outcome> {
        let old = required_id(record, "cat_id")?;
        let url = record.as_string("cat_url");

        let sql = format!(
            "SELECT cat_id FROM {} WHERE blog_id = ? AND cat_url = ?",
            self.store.table("category")
        );
        let existing = self
            .store
            .query(&sql, &[Value::from(blog_id), Value::from(url.as_str())])?
            .first_int();
        if let Some(id) = existing {
            debug!(cat_url = %url, cat_id = id, "Reusing existing category");
            session.categories.insert(old, id);
            return Ok(Outcome::Skipped);
        }

        let counters = session.counters()?;
        let id = counters.next(IdKind::Category);
        let (lft, rgt) = counters.next_slot();

        let mut cursor = self.cursor(def, record)?;
        cursor
            .set("cat_id", id)
            .set("blog_id", blog_id)
            .set("cat_lft", lft)
            .set("cat_rgt", rgt);
        self.store.insert(&cursor)?;

        session.categories.insert(old, id);
        Ok(Outcome::Inserted)
    }

    fn merge_link(
        &self,
        session: &mut RestoreSession,
        def: &TableDef,
        record: &Record,
        blog_id: &str,
    ) -> RestoreResult<Outcome> {
        let mut cursor = self.cursor(def, record)?;
        cursor
            .set("link_id", session.counters()?.next(IdKind::Link))
            .set("blog_id", blog_id);
        self.store.insert(&cursor)?;
        Ok(Outcome::Inserted)
    }

    fn merge_post(
        &self,
        session: &mut RestoreSession,
        def: &TableDef,
        record: &Record,
        blog_id: &str,
    ) -> RestoreResult<Outcome> {
        let old = required_id(record, "post_id")?;

        let cat_id = match record.as_int("cat_id")? {
            None | Some(0) => Value::Null,
            Some(cat) => Value::Int(session.categories.require(cat, def.name, record.line())?),
        };
        let user_id = self.resolve_user(session, &record.as_string("user_id"))?;

        let id = session.counters()?.next(IdKind::Post);
        let url = self.urls.post_url(
            id,
            &record.as_string("post_dt"),
            &record.as_string("post_title"),
        );
        let url = self.unique_post_url(blog_id, url)?;

        let mut cursor = self.cursor(def, record)?;
        cursor
            .set("post_id", id)
            .set("blog_id", blog_id)
            .set("cat_id", cat_id)
            .set("user_id", user_id)
            .set("post_url", url);
        self.store.insert(&cursor)?;

        session.posts.insert(old, id);
        Ok(Outcome::Inserted)
    }

    /// Rows keyed by their post only.
    fn merge_post_child(
        &self,
        session: &mut RestoreSession,
        def: &TableDef,
        record: &Record,
    ) -> RestoreResult<Outcome> {
        let post_id = session
            .posts
            .require(required_id(record, "post_id")?, def.name, record.line())?;

        let mut cursor = self.cursor(def, record)?;
        cursor.set("post_id", post_id);
        self.store.insert(&cursor)?;
        Ok(Outcome::Inserted)
    }

    fn merge_media(
        &self,
        session: &mut RestoreSession,
        def: &TableDef,
        record: &Record,
    ) -> RestoreResult<Outcome> {
        let old = required_id(record, "media_id")?;
        let path = record.as_string("media_path");
        let file = record.as_string("media_file");

        let sql = format!(
            "SELECT media_id FROM {} WHERE media_path = ? AND media_file = ?",
            self.store.table("media")
        );
        let existing = self
            .store
            .query(&sql, &[Value::from(path.as_str()), Value::from(file.as_str())])?
            .first_int();
        if let Some(id) = existing {
            debug!(media_path = %path, media_file = %file, media_id = id, "Media already present");
            session.media.insert(old, id);
            return Ok(Outcome::Skipped);
        }

        let user_id = self.resolve_user(session, &record.as_string("user_id"))?;
        let id = session.counters()?.next(IdKind::Media);

        let mut cursor = self.cursor(def, record)?;
        cursor.set("media_id", id).set("user_id", user_id);
        self.store.insert(&cursor)?;

        session.media.insert(old, id);
        Ok(Outcome::Inserted)
    }

    fn merge_post_media(
        &self,
        session: &mut RestoreSession,
        def: &TableDef,
        record: &Record,
    ) -> RestoreResult<Outcome> {
        let line = record.line();
        let media_id = session
            .media
            .require(required_id(record, "media_id")?, def.name, line)?;
        let post_id = session
            .posts
            .require(required_id(record, "post_id")?, def.name, line)?;

        let mut cursor = self.cursor(def, record)?;
        cursor.set("media_id", media_id).set("post_id", post_id);
        self.store.insert(&cursor)?;
        Ok(Outcome::Inserted)
    }

    fn merge_comment(
        &self,
        session: &mut RestoreSession,
        def: &TableDef,
        record: &Record,
    ) -> RestoreResult<Outcome> {
        let post_id = session
            .posts
            .require(required_id(record, "post_id")?, def.name, record.line())?;

        let mut cursor = self.cursor(def, record)?;
        cursor
            .set("comment_id", session.counters()?.next(IdKind::Comment))
            .set("post_id", post_id);
        self.store.insert(&cursor)?;
        Ok(Outcome::Inserted)
    }

    /// Append a numeric suffix until the URL is free in the blog. The base is
    /// shortened so the suffixed URL stays within [`POST_URL_MAX`].
    fn unique_post_url(&self, blog_id: &str, url: String) -> RestoreResult<String> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE blog_id = ? AND post_url = ?",
            self.store.table("post")
        );

        let mut candidate = url.clone();
        let mut suffix = 1;
        while self
            .store
            .query(&sql, &[Value::from(blog_id), Value::from(candidate.as_str())])?
            .first_int()
            .unwrap_or(0)
            > 0
        {
            let tail = format!("-{}", suffix);
            let base: String = url
                .chars()
                .take(POST_URL_MAX.saturating_sub(tail.chars().count()))
                .collect();
            candidate = base + &tail;
            suffix += 1;
        }
        Ok(candidate)
    }

    /// Leave a trace of the merge in the activity log.
    pub(crate) fn log_activity(
        &self,
        session: &mut RestoreSession,
        blog_id: &str,
    ) -> RestoreResult<()> {
        let inserted = session.summary().inserted;
        let id = session.counters()?.next(IdKind::Log);

        let mut cursor = RowCursor::new("log");
        cursor
            .set("log_id", id)
            .set("user_id", self.auth.user_id())
            .set("log_table", ACTIVITY_LOG_TABLE)
            .set("log_dt", Utc::now().format("%Y-%m-%d %H:%M:%S").to_string())
            .set("log_ip", "")
            .set("log_msg", format!("Merged {} rows from a flat backup", inserted))
            .set("blog_id", blog_id);
        self.store.insert(&cursor)?;
        Ok(())
    }
}

/// A non-empty integer id field.
fn required_id(record: &Record, field: &str) -> RestoreResult<i64> {
    match record.as_int(field)? {
        Some(id) => Ok(id),
        None => Err(record.invalid(field, "", "integer").into()),
    }
}
