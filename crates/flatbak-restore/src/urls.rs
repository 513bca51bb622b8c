//! Post URL generation.

use chrono::{NaiveDate, NaiveDateTime};

/// Default post URL pattern.
pub const DEFAULT_POST_URL_FORMAT: &str = "{y}/{m}/{d}/{id}-{t}";

/// Maximum length of a post URL.
pub const POST_URL_MAX: usize = 255;

/// Builds the URL of a post in its destination blog.
pub trait PostUrlTemplate {
    /// URL for a post given its id, its `post_dt` and its title.
    fn post_url(&self, id: i64, date: &str, title: &str) -> String;
}

/// Pattern-based [`PostUrlTemplate`].
///
/// Tokens: `{y}` `{m}` `{d}` `{H}` `{M}` `{S}` for the post date, `{id}` for
/// the post id and `{t}` for the slugged title.
#[derive(Debug, Clone)]
pub struct PostUrlFormat {
    pattern: String,
}

impl Default for PostUrlFormat {
    fn default() -> Self {
        Self::new(DEFAULT_POST_URL_FORMAT)
    }
}

impl PostUrlFormat {
    /// Create a template from a pattern.
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }

    /// The pattern.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

impl PostUrlTemplate for PostUrlFormat {
    fn post_url(&self, id: i64, date: &str, title: &str) -> String {
        let dt = parse_datetime(date);
        let url = self
            .pattern
            .replace("{y}", &dt.format("%Y").to_string())
            .replace("{m}", &dt.format("%m").to_string())
            .replace("{d}", &dt.format("%d").to_string())
            .replace("{H}", &dt.format("%H").to_string())
            .replace("{M}", &dt.format("%M").to_string())
            .replace("{S}", &dt.format("%S").to_string())
            .replace("{id}", &id.to_string())
            .replace("{t}", &slug(title));
        url.chars().take(POST_URL_MAX).collect()
    }
}

/// Turn a title into a URL segment: alphanumerics are kept, every other run
/// of characters becomes one `-`.
pub fn slug(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut pending_dash = false;
    for c in title.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c);
        } else {
            pending_dash = true;
        }
    }
    out
}

fn parse_datetime(date: &str) -> NaiveDateTime {
    let date = date.trim();
    NaiveDateTime::parse_from_str(date, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(date, "%Y-%m-%d %H:%M"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .unwrap_or_default()
}
