//! Adapter for backups written by 1.2.x installs.
//!
//! Those backups predate multi-blog support and use French column names,
//! separate wiki/xhtml content fields and 0/1 publication flags. The adapter
//! rewrites each record into the current layout before it is restored.

use chrono::NaiveDateTime;

use crate::error::FormatError;
use crate::record::Record;

/// Maximum length of a post URL.
const POST_URL_MAX: usize = 255;

/// Rewrites legacy records into the current shape.
#[derive(Debug, Clone)]
pub struct LegacyAdapter {
    blog_id: String,
}

impl Default for LegacyAdapter {
    fn default() -> Self {
        Self::new("default")
    }
}

impl LegacyAdapter {
    /// Create an adapter assigning legacy rows to `blog_id`.
    pub fn new(blog_id: impl Into<String>) -> Self {
        Self {
            blog_id: blog_id.into(),
        }
    }

    /// Blog legacy rows are assigned to.
    pub fn blog_id(&self) -> &str {
        &self.blog_id
    }

    /// Rewrite a record in place.
    pub fn adapt(&self, record: &mut Record) -> Result<(), FormatError> {
        let table = record.table().to_string();
        match table.as_str() {
            "categorie" => self.adapt_category(record),
            "link" => self.adapt_link(record),
            "post" => self.adapt_post(record)?,
            "post_meta" => adapt_meta(record),
            "comment" => adapt_comment(record)?,
            "user" => adapt_user(record)?,
            _ => {}
        }
        Ok(())
    }

    fn adapt_category(&self, record: &mut Record) {
        record.set_table("category");
        record.rename("cat_libelle", "cat_title");
        record.rename("cat_libelle_url", "cat_url");
        record.rename("cat_ord", "cat_position");
        record.set("blog_id", self.blog_id.as_str());
    }

    fn adapt_link(&self, record: &mut Record) {
        record.rename("href", "link_href");
        record.rename("label", "link_title");
        record.rename("title", "link_desc");
        record.rename("lang", "link_lang");
        record.rename("rel", "link_xfn");
        record.rename("position", "link_position");
        record.set("blog_id", self.blog_id.as_str());
    }

    fn adapt_post(&self, record: &mut Record) -> Result<(), FormatError> {
        record.rename("post_titre", "post_title");
        let title = decode_entities(&record.as_string("post_title"));
        record.set("post_title", title);

        let url = legacy_post_url(record)?;
        record.set("post_url", url);

        let xhtml_content = record.as_string("post_content");
        let xhtml_excerpt = record.as_string("post_chapo");
        let wiki_content = record.as_string("post_content_wiki");

        record.set("post_content_xhtml", xhtml_content.as_str());
        record.set("post_excerpt_xhtml", xhtml_excerpt.as_str());
        if wiki_content.is_empty() {
            record.set("post_format", "xhtml");
            record.set("post_content", xhtml_content);
            record.set("post_excerpt", xhtml_excerpt);
        } else {
            let wiki_excerpt = record.as_string("post_chapo_wiki");
            record.set("post_format", "wiki");
            record.set("post_content", wiki_content);
            record.set("post_excerpt", wiki_excerpt);
        }

        let published = record.as_bool("post_pub")?;
        record.set("post_status", flag(published));
        for name in ["post_open_comment", "post_open_tb"] {
            if record.contains(name) {
                let value = record.as_bool(name)?;
                record.set(name, flag(value));
            }
        }

        record.set("post_type", "post");
        record.set("blog_id", self.blog_id.as_str());
        record.drop_fields(&[
            "post_titre_url",
            "post_content_wiki",
            "post_chapo",
            "post_chapo_wiki",
            "post_pub",
        ]);
        Ok(())
    }
}

fn adapt_meta(record: &mut Record) {
    record.set_table("meta");
    record.drop_fields(&["meta_id"]);
    record.rename("meta_key", "meta_type");
    record.rename("meta_value", "meta_id");
}

fn adapt_comment(record: &mut Record) -> Result<(), FormatError> {
    record.rename("comment_auteur", "comment_author");
    record.rename("comment_pub", "comment_status");
    let published = record.as_bool("comment_status")?;
    record.set("comment_status", flag(published));
    if record.contains("comment_trackback") {
        let trackback = record.as_bool("comment_trackback")?;
        record.set("comment_trackback", flag(trackback));
    }
    Ok(())
}

fn adapt_user(record: &mut Record) -> Result<(), FormatError> {
    record.rename("user_pseudo", "user_displayname");
    record.rename("user_nom", "user_name");
    record.rename("user_prenom", "user_firstname");
    record.rename("user_post_pub", "user_post_status");
    if record.contains("user_post_status") {
        let published = record.as_bool("user_post_status")?;
        record.set("user_post_status", if published { "1" } else { "-2" });
    }
    let level = record.as_int("user_level")?.unwrap_or(0);
    record.set("user_super", flag(level == 9));
    record.drop_fields(&["user_level", "user_edit_size"]);
    Ok(())
}

/// `Y/m/d/<post_id>-<post_titre_url>`, cut to the column size.
fn legacy_post_url(record: &Record) -> Result<String, FormatError> {
    let raw_dt = record.as_string("post_dt");
    let dt = NaiveDateTime::parse_from_str(raw_dt.trim(), "%Y-%m-%d %H:%M:%S")
        .map_err(|_| record.invalid("post_dt", &raw_dt, "datetime"))?;
    let id = record
        .as_int("post_id")?
        .ok_or_else(|| record.invalid("post_id", "", "integer"))?;

    let url = format!(
        "{}{}-{}",
        dt.format("%Y/%m/%d/"),
        id,
        record.as_string("post_titre_url")
    );
    Ok(url.chars().take(POST_URL_MAX).collect())
}

fn flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

/// Decode the HTML entities 1.2 stored titles with.
fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let decoded = tail.find(';').and_then(|end| {
            let entity = &tail[1..end];
            let c = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|d| d.parse().ok()))
                    .and_then(char::from_u32),
            };
            c.map(|c| (c, end))
        });
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
