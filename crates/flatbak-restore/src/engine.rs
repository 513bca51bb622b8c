//! Restore engine.
//!
//! A restore replays a [`FlatReader`] into a [`Store`] inside one
//! transaction. Any error rolls the whole restore back; the error carries
//! the line of the record being restored.
//!
//! Two modes exist:
//! - [`RestoreEngine::import_full`] replaces the whole install,
//! - [`RestoreEngine::import_single`] merges a blog into an existing one,
//!   allocating fresh ids and remapping references through the session's
//!   id maps.

use std::io::BufRead;

use flatbak_core::store::NoConstraintToggle;
use flatbak_core::{
    constraint_toggle, ConstraintToggle, FlatReader, FormatError, ImportMode, LegacyAdapter,
    Record, Store,
};
use tracing::{debug, info, instrument, warn};

use crate::auth::{random_password, sanitize_login, Auth};
use crate::config::RestoreConfig;
use crate::error::{RestoreError, RestoreResult};
use crate::hooks::{HookContext, Hooks, ImportHook};
use crate::session::{ImportSummary, Outcome, RestoreSession};
use crate::urls::PostUrlTemplate;

/// Tables whose rows reference rows of other restored tables.
pub const CONSTRAINED_TABLES: &[&str] = &["post", "meta", "post_media", "ping", "comment"];

/// Whether rows of `table` reference other restored rows.
pub fn is_constrained(table: &str) -> bool {
    CONSTRAINED_TABLES.contains(&table)
}

/// Replays flat backups into a store.
pub struct RestoreEngine<'a> {
    pub(crate) store: &'a dyn Store,
    pub(crate) auth: &'a dyn Auth,
    pub(crate) urls: &'a dyn PostUrlTemplate,
    pub(crate) config: RestoreConfig,
    hooks: Hooks,
    constraints: Box<dyn ConstraintToggle>,
}

impl<'a> RestoreEngine<'a> {
    /// Create an engine over a store, a caller identity and a URL template.
    pub fn new(
        store: &'a dyn Store,
        auth: &'a dyn Auth,
        urls: &'a dyn PostUrlTemplate,
        config: RestoreConfig,
    ) -> Self {
        let constraints: Box<dyn ConstraintToggle> = if config.defer_constraints {
            constraint_toggle(store.driver())
        } else {
            Box::new(NoConstraintToggle)
        };

        Self {
            store,
            auth,
            urls,
            config,
            hooks: Hooks::default(),
            constraints,
        }
    }

    /// Register a hook. Hooks run in registration order.
    pub fn with_hook(mut self, hook: impl ImportHook + 'static) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    /// The configuration.
    pub fn config(&self) -> &RestoreConfig {
        &self.config
    }

    /// Restore a backup in the mode its signature asks for.
    ///
    /// Streams without signature are merged into `blog_id`.
    pub fn restore<R: BufRead>(
        &self,
        reader: FlatReader<R>,
        blog_id: &str,
    ) -> RestoreResult<ImportSummary> {
        match reader.signature().map(|s| s.mode).unwrap_or_default() {
            ImportMode::Full => self.import_full(reader),
            ImportMode::Single => self.import_single(reader, blog_id),
        }
    }

    /// Replace the whole install with the content of a backup.
    ///
    /// Requires super administration and a signed stream. The blogs, media,
    /// settings and log tables are emptied first; users and their
    /// preferences are kept.
    #[instrument(skip_all, fields(user = self.auth.user_id()))]
    pub fn import_full<R: BufRead>(
        &self,
        mut reader: FlatReader<R>,
    ) -> RestoreResult<ImportSummary> {
        if !self.auth.is_super_admin() {
            reader.close();
            return Err(RestoreError::Permission(format!(
                "{} cannot restore a full backup",
                self.auth.user_id()
            )));
        }
        if reader.signature().is_none() {
            reader.close();
            return Err(FormatError::InvalidSignature(String::new()).into());
        }

        let legacy = self.legacy_adapter(&reader);
        let ctx = HookContext {
            store: self.store,
            mode: ImportMode::Full,
            blog_id: None,
        };
        let mut session = RestoreSession::new(ImportMode::Full);
        info!(legacy = legacy.is_some(), "Starting full restore");

        self.store.begin()?;
        let result = self.run_full(&mut reader, &ctx, &mut session, legacy.as_ref());
        reader.close();
        self.finish(result, &session)
    }

    /// Merge the content of a backup into `blog_id`.
    ///
    /// Requires administration of the blog. Every category, post, media,
    /// comment and link gets a fresh id.
    #[instrument(skip_all, fields(user = self.auth.user_id(), blog_id = %blog_id))]
    pub fn import_single<R: BufRead>(
        &self,
        mut reader: FlatReader<R>,
        blog_id: &str,
    ) -> RestoreResult<ImportSummary> {
        if !self.auth.is_blog_admin(blog_id) {
            reader.close();
            return Err(RestoreError::Permission(format!(
                "{} does not administer blog {}",
                self.auth.user_id(),
                blog_id
            )));
        }

        let legacy = self.legacy_adapter(&reader);
        let ctx = HookContext {
            store: self.store,
            mode: ImportMode::Single,
            blog_id: Some(blog_id),
        };
        let mut session = RestoreSession::new(ImportMode::Single);
        info!(legacy = legacy.is_some(), "Starting blog merge");

        self.store.begin()?;
        let result = self.run_single(&mut reader, &ctx, &mut session, legacy.as_ref(), blog_id);
        reader.close();
        self.finish(result, &session)
    }

    fn run_full<R: BufRead>(
        &self,
        reader: &mut FlatReader<R>,
        ctx: &HookContext<'_>,
        session: &mut RestoreSession,
        legacy: Option<&LegacyAdapter>,
    ) -> RestoreResult<()> {
        self.wipe()?;
        self.replay(reader, ctx, session, legacy, |_, record| {
            self.restore_full_record(record)
        })?;
        self.conclude(ctx, session)
    }

    fn run_single<R: BufRead>(
        &self,
        reader: &mut FlatReader<R>,
        ctx: &HookContext<'_>,
        session: &mut RestoreSession,
        legacy: Option<&LegacyAdapter>,
        blog_id: &str,
    ) -> RestoreResult<()> {
        self.seed(session, blog_id)?;
        self.replay(reader, ctx, session, legacy, |session, record| {
            self.restore_single_record(session, record, blog_id)
        })?;
        if self.config.record_activity {
            self.log_activity(session, blog_id)?;
        }
        self.conclude(ctx, session)
    }

    /// Feed every record of the stream to `apply`.
    fn replay<R, F>(
        &self,
        reader: &mut FlatReader<R>,
        ctx: &HookContext<'_>,
        session: &mut RestoreSession,
        legacy: Option<&LegacyAdapter>,
        mut apply: F,
    ) -> RestoreResult<()>
    where
        R: BufRead,
        F: FnMut(&mut RestoreSession, &Record) -> RestoreResult<Outcome>,
    {
        self.hooks.import_start(ctx);

        loop {
            let next = reader
                .next_record()
                .map_err(|e| RestoreError::from(e).at_line(reader.line()))?;
            let Some(mut record) = next else {
                break;
            };
            let line = record.line();
            self.replay_record(&mut record, ctx, session, legacy, &mut apply)
                .map_err(|e| e.at_line(line))?;
        }
        Ok(())
    }

    fn replay_record<F>(
        &self,
        record: &mut Record,
        ctx: &HookContext<'_>,
        session: &mut RestoreSession,
        legacy: Option<&LegacyAdapter>,
        apply: &mut F,
    ) -> RestoreResult<()>
    where
        F: FnMut(&mut RestoreSession, &Record) -> RestoreResult<Outcome>,
    {
        if let Some(adapter) = legacy {
            adapter.adapt(record)?;
            session.count_legacy();
            self.hooks.adapt_legacy(ctx, record);
        }

        self.track_constraints(session, record.table())?;
        let outcome = apply(session, record)?;
        session.tally(outcome);
        self.hooks.record(ctx, record);
        Ok(())
    }

    /// Relax checking when entering dependent tables, re-establish it when
    /// leaving them.
    fn track_constraints(&self, session: &mut RestoreSession, table: &str) -> RestoreResult<()> {
        if session.last_table.as_deref() == Some(table) {
            return Ok(());
        }

        let was = session.last_table.as_deref().is_some_and(is_constrained);
        let now = is_constrained(table);
        if was && !now {
            self.constraints.restore_constraints(self.store)?;
            session.constraints_deferred = false;
        } else if !was && now {
            self.constraints.defer_constraints(self.store)?;
            session.constraints_deferred = true;
        }

        session.last_table = Some(table.to_string());
        Ok(())
    }

    fn conclude(&self, ctx: &HookContext<'_>, session: &mut RestoreSession) -> RestoreResult<()> {
        if session.constraints_deferred {
            self.constraints.restore_constraints(self.store)?;
            session.constraints_deferred = false;
        }
        self.hooks.pre_commit(ctx);
        Ok(())
    }

    /// Commit on success, roll back otherwise.
    fn finish(
        &self,
        result: RestoreResult<()>,
        session: &RestoreSession,
    ) -> RestoreResult<ImportSummary> {
        let result = result.and_then(|()| self.store.commit().map_err(RestoreError::from));

        match result {
            Ok(()) => {
                let summary = session.summary();
                info!(
                    mode = %summary.mode,
                    inserted = summary.inserted,
                    updated = summary.updated,
                    skipped = summary.skipped,
                    ignored = summary.ignored,
                    "Restore committed"
                );
                Ok(summary)
            }
            Err(err) => {
                if let Err(rollback) = self.store.rollback() {
                    warn!(error = %rollback, "Rollback failed");
                }
                warn!(error = %err, line = ?err.line(), "Restore rolled back");
                Err(err)
            }
        }
    }

    fn legacy_adapter<R: BufRead>(&self, reader: &FlatReader<R>) -> Option<LegacyAdapter> {
        reader
            .signature()
            .filter(|s| s.version.is_legacy())
            .map(|_| LegacyAdapter::new(self.config.legacy_blog_id.as_str()))
    }

    /// Destination login for a login found in the backup.
    ///
    /// Existing logins are kept. Unknown ones become placeholder accounts
    /// when the caller may create users, the caller otherwise.
    pub(crate) fn resolve_user(
        &self,
        session: &mut RestoreSession,
        login: &str,
    ) -> RestoreResult<String> {
        if login.is_empty() {
            return Ok(self.auth.user_id().to_string());
        }
        if let Some(resolved) = session.users.get(login) {
            return Ok(resolved.clone());
        }

        let resolved = if self.auth.user_exists(self.store, login)? {
            login.to_string()
        } else if self.auth.is_super_admin() {
            let clean = sanitize_login(login);
            if !self.auth.user_exists(self.store, &clean)? {
                self.auth.create_user(self.store, &clean, &random_password())?;
            }
            clean
        } else {
            debug!(login, "Unknown user, attributing to caller");
            self.auth.user_id().to_string()
        };

        session.users.insert(login.to_string(), resolved.clone());
        Ok(resolved)
    }
}
