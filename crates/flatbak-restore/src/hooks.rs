//! Extension points invoked during a restore.

use std::fmt;

use flatbak_core::{ImportMode, Record, Store};

/// What a hook sees of the running restore.
pub struct HookContext<'a> {
    /// Destination store, inside the restore transaction.
    pub store: &'a dyn Store,
    /// Restore mode.
    pub mode: ImportMode,
    /// Destination blog of a single-blog merge.
    pub blog_id: Option<&'a str>,
}

/// Callbacks run synchronously at fixed points of a restore.
///
/// Every method defaults to doing nothing.
pub trait ImportHook {
    /// Before the first record.
    fn import_start(&self, _ctx: &HookContext<'_>) {}

    /// After the built-in rewrite of a 1.2.x record.
    fn adapt_legacy(&self, _ctx: &HookContext<'_>, _record: &mut Record) {}

    /// After a record was restored.
    fn record(&self, _ctx: &HookContext<'_>, _record: &Record) {}

    /// After the last record, before commit.
    fn pre_commit(&self, _ctx: &HookContext<'_>) {}
}

/// Ordered list of hooks.
#[derive(Default)]
pub struct Hooks {
    hooks: Vec<Box<dyn ImportHook>>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks").field("len", &self.hooks.len()).finish()
    }
}

impl Hooks {
    /// Append a hook; hooks run in insertion order.
    pub fn push(&mut self, hook: Box<dyn ImportHook>) {
        self.hooks.push(hook);
    }

    /// Number of hooks.
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Whether no hook is registered.
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub(crate) fn import_start(&self, ctx: &HookContext<'_>) {
        for hook in &self.hooks {
            hook.import_start(ctx);
        }
    }

    pub(crate) fn adapt_legacy(&self, ctx: &HookContext<'_>, record: &mut Record) {
        for hook in &self.hooks {
            hook.adapt_legacy(ctx, record);
        }
    }

    pub(crate) fn record(&self, ctx: &HookContext<'_>, record: &Record) {
        for hook in &self.hooks {
            hook.record(ctx, record);
        }
    }

    pub(crate) fn pre_commit(&self, ctx: &HookContext<'_>) {
        for hook in &self.hooks {
            hook.pre_commit(ctx);
        }
    }
}
