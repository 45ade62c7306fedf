// src/convert/mod.rs
use std::{
    fmt,
    io::{self, BufRead},
    path::{Path, PathBuf},
    time::Instant,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::detect::Delimiter;

pub mod streaming;
pub mod structured;

/// Lines starting with this (after leading whitespace) are never written out.
pub const DEFAULT_COMMENT: char = '#';

/// Rows per record batch on the structured path.
pub const DEFAULT_BATCH_SIZE: usize = 8192;

#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub delimiter: Delimiter,
    pub comment: char,
    pub batch_size: usize,
}

impl ConvertOptions {
    pub fn new(delimiter: Delimiter) -> Self {
        Self {
            delimiter,
            comment: DEFAULT_COMMENT,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_comment(mut self, comment: char) -> Self {
        self.comment = comment;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// `true` if `text`, ignoring leading whitespace, starts with the comment marker.
    pub fn is_comment(&self, text: &str) -> bool {
        text.trim_start().starts_with(self.comment)
    }
}

/// Whether a quoted field is still open after scanning `text`.
///
/// Follows csv-core's rules: a `"` opens a quoted field only at the start of
/// a field, `""` inside quotes is an escaped quote, and any other `"` inside
/// quotes closes the field.
fn quote_open_after(text: &str, delimiter: char, mut in_quotes: bool) -> bool {
    let mut at_field_start = !in_quotes;
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            at_field_start = false;
        } else if c == '"' && at_field_start {
            in_quotes = true;
            at_field_start = false;
        } else {
            at_field_start = c == delimiter || c == '\n' || c == '\r';
        }
    }
    in_quotes
}

/// Splits decoded input into raw record text: normally one line, several
/// when a quoted field runs over a line break.
///
/// Comment and blank-line checks run on whole records, so a continuation line
/// inside quotes is never mistaken for either.
pub(crate) struct RecordLines<R> {
    inner: R,
    delimiter: char,
}

impl<R: BufRead> RecordLines<R> {
    pub(crate) fn new(inner: R, delimiter: Delimiter) -> Self {
        Self {
            inner,
            delimiter: delimiter.as_char(),
        }
    }

    pub(crate) fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Fill `buf` with the next record, terminators included. `false` at end of input.
    pub(crate) fn next_record(&mut self, buf: &mut String) -> io::Result<bool> {
        buf.clear();
        let mut in_quotes = false;
        loop {
            let start = buf.len();
            if self.inner.read_line(buf)? == 0 {
                // unterminated quote at EOF: hand back what we have
                return Ok(!buf.is_empty());
            }
            in_quotes = quote_open_after(&buf[start..], self.delimiter, in_quotes);
            if !in_quotes {
                return Ok(true);
            }
        }
    }
}

/// `true` for a record that is only a line terminator (or nothing).
pub(crate) fn is_blank_record(text: &str) -> bool {
    text.trim_end_matches(['\r', '\n']).is_empty()
}

/// A way of turning the input into the output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Whole-table parse into text columns, rectangular output with header.
    Structured,
    /// Record-at-a-time copy, rows passed through as they are.
    Streaming,
}

impl Strategy {
    /// Order in which [`convert`] tries strategies.
    pub const DEFAULT_ORDER: [Strategy; 2] = [Strategy::Structured, Strategy::Streaming];

    pub fn attempt(
        self,
        input: &Path,
        output: &Path,
        opts: &ConvertOptions,
    ) -> anyhow::Result<Summary> {
        match self {
            Strategy::Structured => structured::convert(input, output, opts),
            Strategy::Streaming => streaming::convert(input, output, opts),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Structured => f.write_str("structured"),
            Strategy::Streaming => f.write_str("streaming"),
        }
    }
}

/// What a successful strategy reports about the file it wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Summary {
    Table { rows: usize, columns: usize },
    Streamed { records: usize },
}

#[derive(Debug)]
pub struct Conversion {
    pub strategy: Strategy,
    pub summary: Summary,
    pub output: PathBuf,
    /// Strategies that failed before `strategy` succeeded.
    pub recovered: Vec<(Strategy, anyhow::Error)>,
}

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("{strategy} conversion failed: {cause:#}")]
    Failed {
        strategy: Strategy,
        cause: anyhow::Error,
    },

    #[error("no conversion strategy given")]
    NoStrategy,
}

/// Convert `input` to CSV at `output`, structured first, streaming as fallback.
pub fn convert(
    input: &Path,
    output: &Path,
    opts: &ConvertOptions,
) -> Result<Conversion, ConvertError> {
    convert_with(&Strategy::DEFAULT_ORDER, input, output, opts)
}

/// Try `strategies` in order; the first one that succeeds wins.
#[tracing::instrument(
    level = "info",
    skip_all,
    fields(input = %input.display(), output = %output.display(), delimiter = %opts.delimiter)
)]
pub fn convert_with(
    strategies: &[Strategy],
    input: &Path,
    output: &Path,
    opts: &ConvertOptions,
) -> Result<Conversion, ConvertError> {
    if !input.is_file() {
        return Err(ConvertError::InputNotFound(input.to_path_buf()));
    }

    let mut recovered = Vec::new();
    for &strategy in strategies {
        let start = Instant::now();
        match strategy.attempt(input, output, opts) {
            Ok(summary) => {
                info!(%strategy, ?summary, elapsed = ?start.elapsed(), "conversion done");
                return Ok(Conversion {
                    strategy,
                    summary,
                    output: output.to_path_buf(),
                    recovered,
                });
            }
            Err(e) => {
                warn!(%strategy, error = %format!("{e:#}"), "conversion attempt failed");
                recovered.push((strategy, e));
            }
        }
    }

    match recovered.pop() {
        Some((strategy, cause)) => Err(ConvertError::Failed { strategy, cause }),
        None => Err(ConvertError::NoStrategy),
    }
}
