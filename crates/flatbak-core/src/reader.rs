//! Streaming flat backup reader.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::debug;

use crate::error::{Error, FormatError};
use crate::format::{split_row, unescape, BlockHeader, Signature};
use crate::record::Record;

/// Pull-based reader yielding one [`Record`] per data line.
///
/// The reader makes a single pass over its source. Reading again means
/// opening the source again.
pub struct FlatReader<R> {
    source: R,
    signature: Option<Signature>,
    header: Option<BlockHeader>,
    line_no: usize,
    buf: String,
}

impl FlatReader<BufReader<File>> {
    /// Open a backup file, reading and checking its signature line.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let file = File::open(path)?;
        Self::with_signature(BufReader::new(file))
    }
}

impl<R: BufRead> FlatReader<R> {
    /// Read a stream without signature line.
    pub fn new(source: R) -> Self {
        Self {
            source,
            signature: None,
            header: None,
            line_no: 0,
            buf: String::new(),
        }
    }

    /// Read a stream whose first line must be a signature.
    pub fn with_signature(source: R) -> Result<Self, Error> {
        let mut reader = Self::new(source);
        let signature = match reader.read_line()? {
            Some(line) => Signature::parse(line)?,
            None => return Err(FormatError::InvalidSignature(String::new()).into()),
        };
        reader.signature = Some(signature);
        Ok(reader)
    }

    /// Signature of the stream, if it was opened with one.
    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    /// Number of the last line read.
    pub fn line(&self) -> usize {
        self.line_no
    }

    /// Read the next record, `None` at end of stream.
    ///
    /// Blank lines are skipped, as are lines that are neither a block header
    /// nor a data line.
    pub fn next_record(&mut self) -> Result<Option<Record>, Error> {
        loop {
            let line_no = self.line_no + 1;
            let in_block = self.header.is_some();
            let Some(line) = self.read_line()? else {
                return Ok(None);
            };

            if line.trim().is_empty() {
                continue;
            }

            if line.starts_with('[') {
                let header = BlockHeader::parse(line, line_no)?;
                debug!(table = %header.table, columns = header.columns.len(), "Entering block");
                self.header = Some(header);
                continue;
            }

            if line.starts_with('"') {
                if !in_block {
                    return Err(FormatError::RowWithoutHeader { line: line_no }.into());
                }
                let raw = split_row(line, line_no)?;
                let header = self
                    .header
                    .as_ref()
                    .ok_or(FormatError::RowWithoutHeader { line: line_no })?;
                if raw.len() != header.columns.len() {
                    return Err(FormatError::FieldCount {
                        line: line_no,
                        expected: header.columns.len(),
                        found: raw.len(),
                    }
                    .into());
                }

                let fields = header
                    .columns
                    .iter()
                    .cloned()
                    .zip(raw.iter().map(|f| unescape(f)))
                    .collect();
                return Ok(Some(Record::new(header.table.clone(), fields, line_no)));
            }

            debug!(line = line_no, "Skipping unrecognized line");
        }
    }

    /// Release the source.
    pub fn close(self) {}

    /// Read one line without its terminator. `None` at end of stream.
    ///
    /// A line that fails to decode still counts.
    fn read_line(&mut self) -> Result<Option<&str>, Error> {
        self.buf.clear();
        match self.source.read_line(&mut self.buf) {
            Ok(0) => return Ok(None),
            Ok(_) => self.line_no += 1,
            Err(e) => {
                self.line_no += 1;
                return Err(e.into());
            }
        }
        Ok(Some(self.buf.trim_end_matches(['\n', '\r'])))
    }
}

impl<R: BufRead> Iterator for FlatReader<R> {
    type Item = Result<Record, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}
