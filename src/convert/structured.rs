// src/convert/structured.rs
use anyhow::Result;
use std::path::Path;

use super::{ConvertOptions, Summary};

/// Parse the whole input as a table of text columns and write it as CSV.
///
/// Comment and blank records are dropped before parsing; a line break inside
/// a quoted field does not start a new record. The first remaining
/// record is the header; names are trimmed and made unique. Short rows are
/// padded with empty cells, rows longer than the header are an error.
#[cfg(feature = "structured")]
#[tracing::instrument(level = "debug", skip_all, fields(input = %input.display()))]
pub fn convert(input: &Path, output: &Path, opts: &ConvertOptions) -> Result<Summary> {
    imp::convert(input, output, opts)
}

/// Built without the `structured` feature: always fails so the caller falls back.
#[cfg(not(feature = "structured"))]
pub fn convert(_input: &Path, _output: &Path, _opts: &ConvertOptions) -> Result<Summary> {
    anyhow::bail!("structured conversion unavailable (built without the `structured` feature)")
}

/// Trim header names, name empty ones after their position and suffix
/// duplicates with `.1`, `.2`, ... until every name is unique.
pub fn normalize_headers<'a, I>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut names: Vec<String> = Vec::new();
    for (idx, name) in raw.into_iter().enumerate() {
        let base = match name.trim() {
            "" => format!("Unnamed: {idx}"),
            trimmed => trimmed.to_string(),
        };
        let mut candidate = base.clone();
        let mut n = 0;
        while names.contains(&candidate) {
            n += 1;
            candidate = format!("{base}.{n}");
        }
        names.push(candidate);
    }
    names
}

#[cfg(feature = "structured")]
mod imp {
    use anyhow::{anyhow, Context, Result};
    use arrow::{
        csv::{ReaderBuilder, WriterBuilder},
        datatypes::{DataType, Field, Schema},
        record_batch::RecordBatch,
    };
    use std::{
        io::{BufWriter, Cursor, Write},
        path::Path,
        sync::Arc,
    };
    use tracing::{debug, warn};

    use super::{normalize_headers, ConvertOptions, Summary};
    use crate::{convert::RecordLines, output::AtomicOutput, source::open_text};

    /// Read `input` fully, dropping comment and blank records.
    fn read_table_text(input: &Path, opts: &ConvertOptions) -> Result<String> {
        let mut records = RecordLines::new(open_text(input)?, opts.delimiter);
        let mut text = String::new();
        let mut record = String::new();
        let mut dropped = 0usize;

        while records
            .next_record(&mut record)
            .with_context(|| format!("reading {}", input.display()))?
        {
            if record.trim().is_empty() || opts.is_comment(&record) {
                dropped += 1;
                continue;
            }
            text.push_str(&record);
            if !record.ends_with('\n') {
                text.push('\n');
            }
        }

        let replaced = records.get_ref().replaced_lines();
        if replaced > 0 {
            warn!(lines = replaced, "replaced invalid UTF-8 in input");
        }
        debug!(bytes = text.len(), dropped, "loaded table text");
        Ok(text)
    }

    /// Schema of all-text columns named after the first record of `text`.
    fn text_schema(text: &str, opts: &ConvertOptions) -> Result<Schema> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(opts.delimiter.as_byte())
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes());

        let header = rdr
            .records()
            .next()
            .ok_or_else(|| anyhow!("no header row found"))?
            .context("parsing header row")?;

        let fields: Vec<Field> = normalize_headers(header.iter())
            .into_iter()
            .map(|name| Field::new(name, DataType::Utf8, true))
            .collect();
        Ok(Schema::new(fields))
    }

    pub(super) fn convert(input: &Path, output: &Path, opts: &ConvertOptions) -> Result<Summary> {
        let text = read_table_text(input, opts)?;
        let schema = Arc::new(text_schema(&text, opts)?);
        let columns = schema.fields().len();

        let reader = ReaderBuilder::new(schema.clone())
            .with_header(true)
            .with_delimiter(opts.delimiter.as_byte())
            .with_quote(b'"')
            .with_truncated_rows(true)
            .with_batch_size(opts.batch_size)
            .build(Cursor::new(text.as_bytes()))
            .context("creating CSV reader")?;

        let mut out = AtomicOutput::create(output)?;
        let mut rows = 0usize;
        {
            let mut writer = WriterBuilder::new()
                .with_header(true)
                .build(BufWriter::new(out.file_mut()));

            let mut wrote_header = false;
            for (idx, batch) in reader.enumerate() {
                let batch = batch.with_context(|| format!("parsing batch {idx}"))?;
                rows += batch.num_rows();
                writer
                    .write(&batch)
                    .with_context(|| format!("writing batch {idx}"))?;
                wrote_header = true;
            }
            // header-only input: an empty batch still emits the header line
            if !wrote_header {
                writer
                    .write(&RecordBatch::new_empty(schema.clone()))
                    .context("writing header")?;
            }
            writer.into_inner().flush().context("flushing output")?;
        }

        let path = out.commit()?;
        debug!(rows, columns, output = %path.display(), "wrote table");
        Ok(Summary::Table { rows, columns })
    }
}
