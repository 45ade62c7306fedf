// src/source.rs
use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use std::{
    fs::File,
    io::{self, BufRead, BufReader, Read},
    path::Path,
};
use tracing::debug;

/// Number of raw lines shown in the console preview and fed to the detector.
pub const PREVIEW_LINES: usize = 20;

/// `true` when `path` ends in `.gz` (case-sensitive, so `.GZ` is read as plain text).
pub fn is_gzip<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref().as_os_str().to_string_lossy().ends_with(".gz")
}

/// Line-oriented UTF-8 view over a plain or gzip-compressed file.
///
/// Bytes are pulled one line at a time from the underlying reader and decoded
/// with `String::from_utf8_lossy`, so anything downstream (`read_line`,
/// `csv::Reader`, the arrow reader) only ever sees valid UTF-8. Invalid
/// sequences become U+FFFD; `replaced_lines` counts how many lines needed it.
pub struct TextStream {
    inner: Box<dyn BufRead>,
    raw: Vec<u8>,
    decoded: Vec<u8>,
    pos: usize,
    replaced_lines: usize,
}

impl TextStream {
    pub fn new(inner: Box<dyn BufRead>) -> Self {
        Self {
            inner,
            raw: Vec::new(),
            decoded: Vec::new(),
            pos: 0,
            replaced_lines: 0,
        }
    }

    pub fn replaced_lines(&self) -> usize {
        self.replaced_lines
    }
}

impl BufRead for TextStream {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.pos >= self.decoded.len() {
            self.raw.clear();
            self.decoded.clear();
            self.pos = 0;

            // UTF-8 continuation bytes never equal b'\n', so splitting on it
            // cannot cut a valid multi-byte sequence in half.
            if self.inner.read_until(b'\n', &mut self.raw)? == 0 {
                return Ok(&[]);
            }
            let text = String::from_utf8_lossy(&self.raw);
            if matches!(text, std::borrow::Cow::Owned(_)) {
                self.replaced_lines += 1;
            }
            self.decoded.extend_from_slice(text.as_bytes());
        }
        Ok(&self.decoded[self.pos..])
    }

    fn consume(&mut self, amt: usize) {
        self.pos = (self.pos + amt).min(self.decoded.len());
    }
}

impl Read for TextStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = {
            let available = self.fill_buf()?;
            let n = available.len().min(buf.len());
            buf[..n].copy_from_slice(&available[..n]);
            n
        };
        self.consume(n);
        Ok(n)
    }
}

/// Open `path` as a decoded text stream, transparently gunzipping `.gz` files.
pub fn open_text<P: AsRef<Path>>(path: P) -> Result<TextStream> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("opening input {}", path.display()))?;

    let inner: Box<dyn BufRead> = if is_gzip(path) {
        debug!(path = %path.display(), "opening gzip stream");
        Box::new(BufReader::new(MultiGzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };
    Ok(TextStream::new(inner))
}

/// Read up to `max_lines` raw lines (terminators included) from the start of `path`.
pub fn read_preview<P: AsRef<Path>>(path: P, max_lines: usize) -> Result<String> {
    let path = path.as_ref();
    let mut stream = open_text(path)?;
    let mut sample = String::new();

    for _ in 0..max_lines {
        let n = stream
            .read_line(&mut sample)
            .with_context(|| format!("reading preview of {}", path.display()))?;
        if n == 0 {
            break;
        }
    }
    Ok(sample)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use flate2::{write::GzEncoder, Compression};
    use std::io::{Cursor, Write};
    use tempfile::TempDir;
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    pub(crate) fn init_test_logging() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,rtab2csv=debug")),
            )
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    pub(crate) fn write_gzip(path: &Path, content: &[u8]) -> Result<()> {
        let mut enc = GzEncoder::new(File::create(path)?, Compression::default());
        enc.write_all(content)?;
        enc.finish()?;
        Ok(())
    }

    #[test]
    fn gz_suffix_selects_decompression() {
        assert!(is_gzip("table.rtab.gz"));
        assert!(is_gzip("dir/.gz"));
        assert!(!is_gzip("TABLE.RTAB.GZ"));
        assert!(!is_gzip("table.rtab"));
        assert!(!is_gzip("gz"));
    }

    #[test]
    fn invalid_utf8_is_replaced_not_fatal() -> Result<()> {
        let bytes = b"ok\tline\nbad\xff\xfebytes\nlast".to_vec();
        let mut stream = TextStream::new(Box::new(Cursor::new(bytes)));
        let mut text = String::new();
        stream.read_to_string(&mut text)?;

        assert_eq!(text, "ok\tline\nbad\u{FFFD}\u{FFFD}bytes\nlast");
        assert_eq!(stream.replaced_lines(), 1);
        Ok(())
    }

    #[test]
    fn small_reads_see_every_byte() -> Result<()> {
        let mut stream = TextStream::new(Box::new(Cursor::new(b"abc\ndef\n".to_vec())));
        let mut out = Vec::new();
        let mut buf = [0u8; 2];
        loop {
            let n = stream.read(&mut buf)?;
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        assert_eq!(out, b"abc\ndef\n");
        Ok(())
    }

    #[test]
    fn preview_is_bounded_and_keeps_terminators() -> Result<()> {
        init_test_logging();
        let dir = TempDir::new()?;
        let path = dir.path().join("long.rtab");
        let body: String = (0..50).map(|i| format!("{i}\tx\n")).collect();
        std::fs::write(&path, &body)?;

        let preview = read_preview(&path, PREVIEW_LINES)?;
        assert_eq!(preview.lines().count(), PREVIEW_LINES);
        assert!(preview.starts_with("0\tx\n1\tx\n"));
        assert!(preview.ends_with("19\tx\n"));
        Ok(())
    }

    #[test]
    fn gzip_and_plain_read_the_same() -> Result<()> {
        let dir = TempDir::new()?;
        let plain = dir.path().join("t.rtab");
        let gz = dir.path().join("t.rtab.gz");
        let content = "# note\na;b\n1;2\n";
        std::fs::write(&plain, content)?;
        write_gzip(&gz, content.as_bytes())?;

        let mut from_plain = String::new();
        open_text(&plain)?.read_to_string(&mut from_plain)?;
        let mut from_gz = String::new();
        open_text(&gz)?.read_to_string(&mut from_gz)?;

        assert_eq!(from_plain, content);
        assert_eq!(from_gz, content);
        Ok(())
    }

    #[test]
    fn empty_file_gives_empty_preview() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("empty.rtab");
        File::create(&path)?;
        assert_eq!(read_preview(&path, PREVIEW_LINES)?, "");
        Ok(())
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = open_text("/definitely/not/here.rtab").err().expect("should fail");
        assert!(format!("{err:#}").contains("opening input"));
    }
}
