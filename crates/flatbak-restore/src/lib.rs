//! flatbak restore - transactional replay of flat backups.
//!
//! The [`RestoreEngine`] consumes a [`flatbak_core::FlatReader`] and writes
//! its records into a [`flatbak_core::Store`], either replacing the whole
//! install or merging one blog into an existing install. Everything happens
//! inside one transaction.
//!
//! Collaborators are injected through narrow traits:
//! - [`Auth`] for the caller's capabilities and user accounts,
//! - [`PostUrlTemplate`] for post URLs in the destination blog,
//! - [`ImportHook`] for extension points.

pub mod auth;
pub mod config;
pub mod engine;
pub mod error;
mod full;
pub mod hooks;
pub mod session;
mod single;
pub mod urls;

pub use auth::{Auth, SessionAuth};
pub use config::RestoreConfig;
pub use engine::{is_constrained, RestoreEngine, CONSTRAINED_TABLES};
pub use error::{RestoreError, RestoreResult};
pub use full::WIPED_TABLES;
pub use hooks::{HookContext, Hooks, ImportHook};
pub use session::{Counters, IdKind, IdMap, ImportSummary, RestoreSession};
pub use single::ACTIVITY_LOG_TABLE;
pub use urls::{PostUrlFormat, PostUrlTemplate};
