//! Flat backup grammar.
//!
//! A backup is UTF-8 text made of blocks separated by blank lines:
//!
//! ```text
//! ///DOTCLEAR|2.0|full
//!
//! [category cat_id,blog_id,cat_title]
//! "1","default","News"
//! "2","default","Say \"hi\"\nthere"
//! ```
//!
//! Only importer-targeted dumps start with the signature line. Field values
//! are escaped so that every row fits on one line.

use std::cmp::Ordering;
use std::fmt;

use crate::error::FormatError;

/// Literal prefix of the signature line.
pub const SIGNATURE_PREFIX: &str = "///DOTCLEAR";

/// Escape a field value for a data line (without the surrounding quotes).
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '"' => out.push_str("\\\""),
            other => out.push(other),
        }
    }
    out
}

/// Reverse [`escape`].
///
/// Escapes are consumed left to right, so an escaped backslash never starts
/// another sequence. A backslash before any other character, or at the end
/// of the value, is kept as is.
pub fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('"') => out.push('"'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Render a block header line (without line terminator).
pub fn encode_header<S: AsRef<str>>(table: &str, columns: &[S]) -> String {
    let columns: Vec<&str> = columns.iter().map(AsRef::as_ref).collect();
    format!("[{} {}]", table, columns.join(","))
}

/// Render a data line (without line terminator).
pub fn encode_row<I, S>(values: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let fields: Vec<String> = values
        .into_iter()
        .map(|v| format!("\"{}\"", escape(v.as_ref())))
        .collect();
    fields.join(",")
}

/// A parsed block header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    /// Table name.
    pub table: String,
    /// Declared columns, in order.
    pub columns: Vec<String>,
}

impl BlockHeader {
    /// Parse a `[table col1,col2]` line.
    pub fn parse(line: &str, line_no: usize) -> Result<Self, FormatError> {
        let malformed = || FormatError::MalformedHeader { line: line_no };

        let body = line.strip_prefix('[').ok_or_else(malformed)?;
        let end = body.find(']').ok_or_else(malformed)?;
        let body = &body[..end];
        let (table, columns) = body.split_once(' ').ok_or_else(malformed)?;
        if table.is_empty() || columns.is_empty() {
            return Err(malformed());
        }

        Ok(Self {
            table: table.to_string(),
            columns: columns.split(',').map(str::to_string).collect(),
        })
    }
}

/// Split a data line into raw, still escaped, field values.
///
/// Fields are double-quoted and comma-separated. Inside a field a backslash
/// always takes the following character with it, so `\"` never closes the
/// field.
pub fn split_row(line: &str, line_no: usize) -> Result<Vec<String>, FormatError> {
    let malformed = |reason: &str| FormatError::MalformedRow {
        line: line_no,
        reason: reason.to_string(),
    };

    let mut fields = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        if chars.next() != Some('"') {
            return Err(malformed("expected opening quote"));
        }

        let mut field = String::new();
        let mut closed = false;
        while let Some(c) = chars.next() {
            match c {
                '\\' => {
                    field.push('\\');
                    if let Some(next) = chars.next() {
                        field.push(next);
                    }
                }
                '"' => {
                    closed = true;
                    break;
                }
                other => field.push(other),
            }
        }
        if !closed {
            return Err(malformed("unterminated field"));
        }
        fields.push(field);

        match chars.next() {
            None => return Ok(fields),
            Some(',') => continue,
            Some(_) => return Err(malformed("unexpected character after field")),
        }
    }
}

/// How a backup is meant to be restored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImportMode {
    /// Whole-install replacement.
    Full,
    /// Merge of one blog into an existing install.
    #[default]
    Single,
}

impl ImportMode {
    /// Parse a mode, defaulting to [`ImportMode::Single`].
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "full" => ImportMode::Full,
            _ => ImportMode::Single,
        }
    }

    /// Mode name as written in signatures.
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportMode::Full => "full",
            ImportMode::Single => "single",
        }
    }
}

impl fmt::Display for ImportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Version of the software that produced a backup.
///
/// Only the dotted numeric prefix takes part in comparisons: `2.0-beta7`
/// orders as `2.0`.
#[derive(Debug, Clone)]
pub struct FormatVersion {
    raw: String,
    parts: Vec<u32>,
}

impl FormatVersion {
    /// Parse a version string.
    pub fn parse(raw: &str) -> Self {
        let mut parts = Vec::new();
        for piece in raw.trim().split('.') {
            let digits: String = piece.chars().take_while(char::is_ascii_digit).collect();
            match digits.parse::<u32>() {
                Ok(n) => parts.push(n),
                Err(_) => break,
            }
            if digits.len() != piece.len() {
                break;
            }
        }
        Self {
            raw: raw.trim().to_string(),
            parts,
        }
    }

    /// The version as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether this version uses the 1.2 layout, i.e. lies in `[1.2, 1.3)`.
    pub fn is_legacy(&self) -> bool {
        self.compare(&[1, 2]) != Ordering::Less && self.compare(&[1, 3]) == Ordering::Less
    }

    /// Compare against numeric components, padding the shorter side with 0.
    pub fn compare(&self, other: &[u32]) -> Ordering {
        let len = self.parts.len().max(other.len());
        for i in 0..len {
            let a = self.parts.get(i).copied().unwrap_or(0);
            let b = other.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        Ordering::Equal
    }
}

impl PartialEq for FormatVersion {
    fn eq(&self, other: &Self) -> bool {
        self.compare(&other.parts) == Ordering::Equal
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// The `///DOTCLEAR|<version>|<mode>` line opening a full dump.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    /// Producer version.
    pub version: FormatVersion,
    /// Intended restore mode.
    pub mode: ImportMode,
}

impl Signature {
    /// Create a signature.
    pub fn new(version: &str, mode: ImportMode) -> Self {
        Self {
            version: FormatVersion::parse(version),
            mode,
        }
    }

    /// Parse a signature line.
    pub fn parse(line: &str) -> Result<Self, FormatError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let mut parts = line.split('|');

        if parts.next() != Some(SIGNATURE_PREFIX) {
            return Err(FormatError::InvalidSignature(line.to_string()));
        }
        let version = match parts.next() {
            Some(v) if !v.trim().is_empty() => v,
            _ => return Err(FormatError::InvalidSignature(line.to_string())),
        };
        let mode = parts.next().map(ImportMode::parse).unwrap_or_default();

        Ok(Self::new(version, mode))
    }

    /// Render the signature line (without line terminator).
    pub fn encode(&self) -> String {
        format!("{}|{}|{}", SIGNATURE_PREFIX, self.version, self.mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_all_specials() {
        assert_eq!(escape("a\\b\nc\rd\"e"), "a\\\\b\\nc\\rd\\\"e");
        assert_eq!(unescape("a\\\\b\\nc\\rd\\\"e"), "a\\b\nc\rd\"e");
    }

    #[test]
    fn test_literal_backslash_n_differs_from_newline() {
        let literal = "\\n";
        let newline = "\n";
        assert_ne!(escape(literal), escape(newline));
        assert_eq!(unescape(&escape(literal)), literal);
        assert_eq!(unescape(&escape(newline)), newline);
    }

    #[test]
    fn test_backslash_runs() {
        // Even run before `n`: escaped backslashes followed by a letter.
        assert_eq!(unescape("\\\\n"), "\\n");
        // Odd run before `n`: one escaped backslash then a newline.
        assert_eq!(unescape("\\\\\\n"), "\\\n");
        // Trailing run is halved, a lone trailing backslash kept.
        assert_eq!(unescape("x\\\\\\\\"), "x\\\\");
        assert_eq!(unescape("x\\"), "x\\");
        assert_eq!(unescape("\\t"), "\\t");
    }

    #[test]
    fn test_header_parse() {
        let h = BlockHeader::parse("[post post_id,cat_id,post_title]", 4).unwrap();
        assert_eq!(h.table, "post");
        assert_eq!(h.columns, vec!["post_id", "cat_id", "post_title"]);
        assert_eq!(encode_header(&h.table, &h.columns), "[post post_id,cat_id,post_title]");
    }

    #[test]
    fn test_header_parse_malformed() {
        assert!(matches!(
            BlockHeader::parse("[post]", 9),
            Err(FormatError::MalformedHeader { line: 9 })
        ));
        assert!(BlockHeader::parse("[post a,b", 1).is_err());
    }

    #[test]
    fn test_split_row_escaped_quotes() {
        let line = encode_row(["a\",\"b", "c\\", ""]);
        let fields = split_row(&line, 1).unwrap();
        assert_eq!(fields.len(), 3);
        let values: Vec<String> = fields.iter().map(|f| unescape(f)).collect();
        assert_eq!(values, vec!["a\",\"b", "c\\", ""]);
    }

    #[test]
    fn test_split_row_malformed() {
        assert!(split_row("\"a\",b", 2).is_err());
        assert!(split_row("\"a", 2).is_err());
        assert!(split_row("\"a\"x", 2).is_err());
    }

    #[test]
    fn test_signature_parse() {
        let sig = Signature::parse("///DOTCLEAR|2.0-beta7|full\n").unwrap();
        assert_eq!(sig.mode, ImportMode::Full);
        assert_eq!(sig.version.as_str(), "2.0-beta7");
        assert_eq!(sig.encode(), "///DOTCLEAR|2.0-beta7|full");

        let sig = Signature::parse("///DOTCLEAR|1.2.5").unwrap();
        assert_eq!(sig.mode, ImportMode::Single);
        let sig = Signature::parse("///DOTCLEAR|1.2.5|whatever").unwrap();
        assert_eq!(sig.mode, ImportMode::Single);
    }

    #[test]
    fn test_signature_rejects_bad_prefix() {
        assert!(Signature::parse("[post post_id]").is_err());
        assert!(Signature::parse("//DOTCLEAR|2.0|full").is_err());
        assert!(Signature::parse("///DOTCLEAR||full").is_err());
    }

    #[test]
    fn test_legacy_range() {
        assert!(FormatVersion::parse("1.2").is_legacy());
        assert!(FormatVersion::parse("1.2.8").is_legacy());
        assert!(!FormatVersion::parse("1.3").is_legacy());
        assert!(!FormatVersion::parse("1.1.9").is_legacy());
        assert!(!FormatVersion::parse("2.0-beta7").is_legacy());
        assert_eq!(FormatVersion::parse("2.0-rc1"), FormatVersion::parse("2"));
    }
}
