//! Restore configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RestoreResult;

/// Blog id assigned to rows of 1.2.x backups.
pub const DEFAULT_LEGACY_BLOG_ID: &str = "default";

/// Time zone used when a backup lacks one.
pub const DEFAULT_TIMEZONE: &str = "UTC";

/// Restore engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestoreConfig {
    /// Blog that 1.2.x rows belong to.
    pub legacy_blog_id: String,

    /// Time zone for `*_tz` columns missing from the backup.
    pub default_timezone: String,

    /// Relax foreign-key checking around dependent tables.
    pub defer_constraints: bool,

    /// Write an activity-log row after a single-blog merge.
    pub record_activity: bool,
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            legacy_blog_id: DEFAULT_LEGACY_BLOG_ID.to_string(),
            default_timezone: DEFAULT_TIMEZONE.to_string(),
            defer_constraints: true,
            record_activity: true,
        }
    }
}

impl RestoreConfig {
    /// Load a configuration from a JSON file. Missing keys take defaults.
    pub fn load(path: impl AsRef<Path>) -> RestoreResult<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Set the blog 1.2.x rows belong to.
    pub fn with_legacy_blog_id(mut self, blog_id: impl Into<String>) -> Self {
        self.legacy_blog_id = blog_id.into();
        self
    }

    /// Set the fallback time zone.
    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.default_timezone = timezone.into();
        self
    }

    /// Insert rows strictly in stream order.
    pub fn without_constraint_deferral(mut self) -> Self {
        self.defer_constraints = false;
        self
    }

    /// Skip the activity-log row.
    pub fn without_activity_log(mut self) -> Self {
        self.record_activity = false;
        self
    }
}
