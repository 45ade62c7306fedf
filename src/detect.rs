// src/detect.rs
use std::fmt;
use tracing::trace;

/// Field separators the detector chooses between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Delimiter {
    #[default]
    Tab,
    Semicolon,
    Comma,
    Pipe,
    Space,
}

impl Delimiter {
    /// Evaluation order; earlier entries win ties and `Tab` is the default.
    pub const CANDIDATES: [Delimiter; 5] = [
        Delimiter::Tab,
        Delimiter::Semicolon,
        Delimiter::Comma,
        Delimiter::Pipe,
        Delimiter::Space,
    ];

    pub fn as_char(self) -> char {
        match self {
            Delimiter::Tab => '\t',
            Delimiter::Semicolon => ';',
            Delimiter::Comma => ',',
            Delimiter::Pipe => '|',
            Delimiter::Space => ' ',
        }
    }

    pub fn as_byte(self) -> u8 {
        self.as_char() as u8
    }

    /// Quoted, escaped form for console output, e.g. `'\t'` vs `' '`.
    pub fn escaped(self) -> String {
        format!("'{}'", self.as_char().escape_debug())
    }
}

impl fmt::Display for Delimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.escaped())
    }
}

/// `mean - variance` of per-line counts, or `None` when there are no lines.
fn score(counts: &[usize]) -> Option<f64> {
    if counts.is_empty() {
        return None;
    }
    let n = counts.len() as f64;
    let mean = counts.iter().sum::<usize>() as f64 / n;
    let variance = counts
        .iter()
        .map(|&c| (c as f64 - mean).powi(2))
        .sum::<f64>()
        / n;
    Some(mean - variance)
}

/// Guess the field separator of a text sample.
///
/// Every candidate is scored on the non-blank lines of the sample by the mean
/// of its per-line occurrence count minus the variance of that count, so a
/// separator that shows up often and the same number of times on each line
/// wins. The highest score strictly above `-1` is taken; ties keep the earlier
/// candidate. With nothing to score the result is [`Delimiter::Tab`].
///
/// This is a heuristic. Prose full of spaces will happily come out as
/// [`Delimiter::Space`].
pub fn detect(sample: &str) -> Delimiter {
    // '\r' alone also ends a line (old Mac files); the empty piece between
    // "\r\n" is dropped with the other blank lines.
    let lines: Vec<&str> = sample
        .trim()
        .split(['\n', '\r'])
        .filter(|line| !line.trim().is_empty())
        .collect();

    let mut best = Delimiter::default();
    let mut best_score = -1.0;

    for candidate in Delimiter::CANDIDATES {
        let ch = candidate.as_char();
        let counts: Vec<usize> = lines.iter().map(|line| line.matches(ch).count()).collect();
        let Some(s) = score(&counts) else {
            continue;
        };
        trace!(delimiter = %candidate, score = s, "scored candidate");
        if s > best_score {
            best_score = s;
            best = candidate;
        }
    }
    best
}
