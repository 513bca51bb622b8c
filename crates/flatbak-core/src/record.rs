//! Parsed rows of a flat backup.

use crate::error::FormatError;

/// One logical row read from a flat backup.
///
/// Fields keep the declared column order of their block header. Names are
/// unique: setting an existing name replaces its value in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    table: String,
    fields: Vec<(String, String)>,
    line: usize,
}

impl Record {
    /// Create a record from its table name, fields and source line.
    pub fn new(table: impl Into<String>, fields: Vec<(String, String)>, line: usize) -> Self {
        let mut record = Self {
            table: table.into(),
            fields: Vec::with_capacity(fields.len()),
            line,
        };
        for (name, value) in fields {
            record.set(name, value);
        }
        record
    }

    /// Table this record belongs to.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Move the record to another table.
    pub fn set_table(&mut self, table: impl Into<String>) {
        self.table = table.into();
    }

    /// 1-based source line number.
    pub fn line(&self) -> usize {
        self.line
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no field.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over `(name, value)` pairs in column order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Whether a field is present.
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Raw value of a field.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|i| self.fields[i].1.as_str())
    }

    /// Set a field, appending it when absent.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(i) => self.fields[i].1 = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Rename a field in place.
    ///
    /// Does nothing when `from` is absent. A field already named `to` is
    /// replaced by the renamed one.
    pub fn rename(&mut self, from: &str, to: &str) {
        if from == to {
            return;
        }
        let Some(i) = self.position(from) else {
            return;
        };
        if let Some(j) = self.position(to) {
            self.fields.remove(j);
        }
        let i = if self.fields.get(i).map(|(n, _)| n.as_str()) == Some(from) {
            i
        } else {
            i - 1
        };
        self.fields[i].0 = to.to_string();
    }

    /// Remove fields, returning how many were present.
    pub fn drop_fields(&mut self, names: &[&str]) -> usize {
        let before = self.fields.len();
        self.fields.retain(|(n, _)| !names.contains(&n.as_str()));
        before - self.fields.len()
    }

    /// Field value as a string, empty when missing.
    pub fn as_string(&self, name: &str) -> String {
        self.get(name).unwrap_or_default().to_string()
    }

    /// Field value as an integer.
    ///
    /// Missing and empty values yield `None`.
    pub fn as_int(&self, name: &str) -> Result<Option<i64>, FormatError> {
        match self.get(name).map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => raw
                .parse::<i64>()
                .map(Some)
                .map_err(|_| self.invalid(name, raw, "integer")),
        }
    }

    /// Field value as a boolean.
    ///
    /// Accepts `1/0`, `t/f` and `true/false`; missing and empty values are
    /// `false`.
    pub fn as_bool(&self, name: &str) -> Result<bool, FormatError> {
        match self.get(name).map(str::trim) {
            None => Ok(false),
            Some(raw) => parse_bool(raw).ok_or_else(|| self.invalid(name, raw, "boolean")),
        }
    }

    /// Build an [`FormatError::InvalidValue`] for this record.
    pub fn invalid(&self, field: &str, value: &str, expected: &'static str) -> FormatError {
        FormatError::InvalidValue {
            line: self.line,
            field: field.to_string(),
            value: value.to_string(),
            expected,
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|(n, _)| n == name)
    }
}

/// Parse the boolean spellings found in backups.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "" | "0" | "f" | "false" => Some(false),
        "1" | "t" | "true" => Some(true),
        _ => None,
    }
}
