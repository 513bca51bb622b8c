//! Per-restore mutable state.
//!
//! A [`RestoreSession`] is created at the start of one restore and dropped
//! once it is committed or rolled back. Nothing outlives it.

use std::collections::HashMap;

use flatbak_core::{ImportMode, Store, Value};
use tracing::debug;

use crate::error::{RestoreError, RestoreResult};

/// Entity kinds given fresh ids on a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdKind {
    /// `category.cat_id`.
    Category,
    /// `post.post_id`.
    Post,
    /// `media.media_id`.
    Media,
    /// `comment.comment_id`.
    Comment,
    /// `link.link_id`.
    Link,
    /// `log.log_id`.
    Log,
}

impl IdKind {
    /// Every kind.
    pub const ALL: [IdKind; 6] = [
        IdKind::Category,
        IdKind::Post,
        IdKind::Media,
        IdKind::Comment,
        IdKind::Link,
        IdKind::Log,
    ];

    /// Unprefixed table holding the ids.
    pub fn table(&self) -> &'static str {
        match self {
            IdKind::Category => "category",
            IdKind::Post => "post",
            IdKind::Media => "media",
            IdKind::Comment => "comment",
            IdKind::Link => "link",
            IdKind::Log => "log",
        }
    }

    /// Id column.
    pub fn column(&self) -> &'static str {
        match self {
            IdKind::Category => "cat_id",
            IdKind::Post => "post_id",
            IdKind::Media => "media_id",
            IdKind::Comment => "comment_id",
            IdKind::Link => "link_id",
            IdKind::Log => "log_id",
        }
    }
}

/// Old id to new id for one entity kind.
#[derive(Debug, Clone)]
pub struct IdMap {
    relation: &'static str,
    ids: HashMap<i64, i64>,
}

impl IdMap {
    /// An empty map for `relation`.
    pub fn new(relation: &'static str) -> Self {
        Self {
            relation,
            ids: HashMap::new(),
        }
    }

    /// Record that `old` became `new`.
    pub fn insert(&mut self, old: i64, new: i64) {
        self.ids.insert(old, new);
    }

    /// New id of `old`, if mapped.
    pub fn get(&self, old: i64) -> Option<i64> {
        self.ids.get(&old).copied()
    }

    /// New id of `old`, or a referential error naming the relation and the
    /// referencing row.
    pub fn require(&self, old: i64, table: &str, line: usize) -> RestoreResult<i64> {
        self.get(old).ok_or_else(|| RestoreError::Referential {
            relation: self.relation,
            id: old,
            table: table.to_string(),
            line,
        })
    }

    /// Number of mapped ids.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether nothing is mapped.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Next free id per kind, plus the nested-set slot of the destination blog.
#[derive(Debug, Clone)]
pub struct Counters {
    next: HashMap<IdKind, i64>,
    slot: i64,
}

impl Counters {
    /// Seed from the destination install.
    pub fn seed(store: &dyn Store, blog_id: &str) -> RestoreResult<Self> {
        let mut next = HashMap::new();
        for kind in IdKind::ALL {
            let sql = format!("SELECT MAX({}) FROM {}", kind.column(), store.table(kind.table()));
            let max = store.query(&sql, &[])?.first_int().unwrap_or(0);
            next.insert(kind, max + 1);
        }

        let sql = format!(
            "SELECT MAX(cat_rgt) FROM {} WHERE blog_id = ?",
            store.table("category")
        );
        let slot = store
            .query(&sql, &[Value::from(blog_id)])?
            .first_int()
            .map_or(2, |rgt| rgt + 1);

        debug!(blog_id, slot, "Seeded id counters");
        Ok(Self { next, slot })
    }

    /// Take the next id of a kind.
    pub fn next(&mut self, kind: IdKind) -> i64 {
        let entry = self.next.entry(kind).or_insert(1);
        let id = *entry;
        *entry += 1;
        id
    }

    /// Peek at the next id of a kind.
    pub fn peek(&self, kind: IdKind) -> i64 {
        self.next.get(&kind).copied().unwrap_or(1)
    }

    /// Take two nested-set slots, returned as `(lft, rgt)`.
    pub fn next_slot(&mut self) -> (i64, i64) {
        let lft = self.slot;
        self.slot += 2;
        (lft, lft + 1)
    }
}

/// Tally of a finished restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    /// Restore mode.
    pub mode: ImportMode,
    /// Rows inserted.
    pub inserted: usize,
    /// Existing rows updated in place.
    pub updated: usize,
    /// Records matched to an existing row and not inserted.
    pub skipped: usize,
    /// Records of tables the mode does not restore.
    pub ignored: usize,
    /// Records rewritten from the 1.2 layout.
    pub legacy: usize,
}

/// What happened to one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Inserted,
    Updated,
    Skipped,
    Ignored,
}

/// State of one restore.
#[derive(Debug)]
pub struct RestoreSession {
    /// Category ids.
    pub categories: IdMap,
    /// Post ids.
    pub posts: IdMap,
    /// Media ids.
    pub media: IdMap,
    /// Id counters, seeded for merges only.
    pub counters: Option<Counters>,
    /// Backup login to destination login.
    pub users: HashMap<String, String>,
    /// Table of the previous record.
    pub last_table: Option<String>,
    /// Whether foreign-key checking is currently relaxed.
    pub constraints_deferred: bool,
    summary: ImportSummary,
}

impl RestoreSession {
    /// A fresh session.
    pub fn new(mode: ImportMode) -> Self {
        Self {
            categories: IdMap::new("category"),
            posts: IdMap::new("post"),
            media: IdMap::new("media"),
            counters: None,
            users: HashMap::new(),
            last_table: None,
            constraints_deferred: false,
            summary: ImportSummary {
                mode,
                inserted: 0,
                updated: 0,
                skipped: 0,
                ignored: 0,
                legacy: 0,
            },
        }
    }

    /// Counters of a merge session. Fails until they are seeded.
    pub(crate) fn counters(&mut self) -> RestoreResult<&mut Counters> {
        self.counters.as_mut().ok_or(RestoreError::Unseeded)
    }

    pub(crate) fn tally(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Inserted => self.summary.inserted += 1,
            Outcome::Updated => self.summary.updated += 1,
            Outcome::Skipped => self.summary.skipped += 1,
            Outcome::Ignored => self.summary.ignored += 1,
        }
    }

    pub(crate) fn count_legacy(&mut self) {
        self.summary.legacy += 1;
    }

    /// Tally so far.
    pub fn summary(&self) -> ImportSummary {
        self.summary
    }
}
