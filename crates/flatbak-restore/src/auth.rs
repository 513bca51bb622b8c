//! Caller identity and user account management.

use std::collections::HashSet;

use chrono::Utc;
use flatbak_core::{RowCursor, Store, Value};
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::config::DEFAULT_TIMEZONE;
use crate::error::RestoreResult;

/// Length of generated placeholder passwords.
const PASSWORD_LEN: usize = 24;

/// Capabilities of the caller and access to user accounts.
pub trait Auth {
    /// Login of the caller.
    fn user_id(&self) -> &str;

    /// Whether the caller administers the whole install.
    fn is_super_admin(&self) -> bool;

    /// Whether the caller administers `blog_id`.
    fn is_blog_admin(&self, blog_id: &str) -> bool;

    /// Whether a login exists in the store.
    fn user_exists(&self, store: &dyn Store, login: &str) -> RestoreResult<bool> {
        let rs = store.query(
            &format!("SELECT COUNT(*) FROM {} WHERE user_id = ?", store.table("user")),
            &[Value::from(login)],
        )?;
        Ok(rs.first_int().unwrap_or(0) > 0)
    }

    /// Create a minimal account.
    fn create_user(&self, store: &dyn Store, login: &str, password: &str) -> RestoreResult<()>;
}

/// An [`Auth`] over a fixed session identity.
#[derive(Debug, Clone)]
pub struct SessionAuth {
    user_id: String,
    super_admin: bool,
    admin_of: HashSet<String>,
    timezone: String,
}

impl SessionAuth {
    /// A regular user without any blog administration right.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            super_admin: false,
            admin_of: HashSet::new(),
            timezone: DEFAULT_TIMEZONE.to_string(),
        }
    }

    /// A super administrator.
    pub fn super_admin(user_id: impl Into<String>) -> Self {
        Self {
            super_admin: true,
            ..Self::new(user_id)
        }
    }

    /// Grant administration of a blog.
    pub fn with_blog_admin(mut self, blog_id: impl Into<String>) -> Self {
        self.admin_of.insert(blog_id.into());
        self
    }

    /// Time zone given to created accounts.
    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }
}

impl Auth for SessionAuth {
    fn user_id(&self) -> &str {
        &self.user_id
    }

    fn is_super_admin(&self) -> bool {
        self.super_admin
    }

    fn is_blog_admin(&self, blog_id: &str) -> bool {
        self.super_admin || self.admin_of.contains(blog_id)
    }

    fn create_user(&self, store: &dyn Store, login: &str, password: &str) -> RestoreResult<()> {
        let now = Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let mut cursor = RowCursor::new("user");
        cursor
            .set("user_id", login)
            .set("user_super", false)
            .set("user_status", 1_i64)
            .set("user_pwd", hash_password(password))
            .set("user_change_pwd", true)
            .set("user_tz", self.timezone.as_str())
            .set("user_post_status", -2_i64)
            .set("user_creadt", now.as_str())
            .set("user_upddt", now);
        store.insert(&cursor)?;

        info!(login, "Created user account");
        Ok(())
    }
}

/// Salted SHA-256 digest, stored as `<salt>$<hex digest>`.
pub fn hash_password(password: &str) -> String {
    let salt = random_string(16);
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{}${}", salt, hex::encode(hasher.finalize()))
}

/// Check a password against a [`hash_password`] digest.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt, digest)) = stored.split_once('$') else {
        return false;
    };
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize()) == digest
}

/// A random password for placeholder accounts.
pub fn random_password() -> String {
    random_string(PASSWORD_LEN)
}

/// Reduce a login to `[A-Za-z0-9@._-]`, padded to at least two characters.
pub fn sanitize_login(login: &str) -> String {
    let mut clean: String = login
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '_' | '-'))
        .collect();
    if clean.len() < 2 {
        clean.push_str("-a");
    }
    clean
}

fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
