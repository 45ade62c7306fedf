// src/convert/streaming.rs
use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::{
    io::{BufWriter, Write},
    path::Path,
};
use tracing::{debug, warn};

use super::{is_blank_record, ConvertOptions, RecordLines, Summary};
use crate::{output::AtomicOutput, source::open_text};

/// Copy `input` to `output` one record at a time.
///
/// No header handling and no field-count checks: each record is written
/// straight back out comma-separated, unless its first field (leading
/// whitespace stripped) starts with the comment marker. A blank input line
/// becomes an empty output line.
#[tracing::instrument(level = "debug", skip_all, fields(input = %input.display()))]
pub fn convert(input: &Path, output: &Path, opts: &ConvertOptions) -> Result<Summary> {
    let mut lines = RecordLines::new(open_text(input)?, opts.delimiter);

    let mut out = AtomicOutput::create(output)?;
    let mut records = 0usize;
    let mut skipped = 0usize;
    {
        let mut wtr = WriterBuilder::new()
            .flexible(true)
            .from_writer(BufWriter::new(out.file_mut()));

        let mut text = String::new();
        let mut record = StringRecord::new();
        while lines.next_record(&mut text).with_context(|| {
            format!("reading record {} of {}", records + skipped + 1, input.display())
        })? {
            if is_blank_record(&text) {
                // csv::Writer has no empty-record form; write the bare terminator
                wtr.flush().context("flushing output")?;
                (&**wtr.get_ref().get_ref()).write_all(b"\n").context("writing empty record")?;
                records += 1;
                continue;
            }

            let mut rdr = ReaderBuilder::new()
                .delimiter(opts.delimiter.as_byte())
                .has_headers(false)
                .flexible(true)
                .from_reader(text.as_bytes());
            while rdr
                .read_record(&mut record)
                .with_context(|| format!("parsing record {}", records + skipped + 1))?
            {
                if record.get(0).is_some_and(|first| opts.is_comment(first)) {
                    skipped += 1;
                    continue;
                }
                wtr.write_record(&record)
                    .with_context(|| format!("writing record {}", records + 1))?;
                records += 1;
            }
        }
        wtr.flush().context("flushing output")?;
    }

    let replaced = lines.get_ref().replaced_lines();
    if replaced > 0 {
        warn!(lines = replaced, "replaced invalid UTF-8 in input");
    }
    drop(lines);

    let path = out.commit()?;
    debug!(records, skipped, output = %path.display(), "streamed records");
    Ok(Summary::Streamed { records })
}
