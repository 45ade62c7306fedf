//! Convert ad hoc delimited text tables (`.rtab`, optionally gzipped) to CSV.
//!
//! [`source`] opens the input as decoded text, [`detect`] guesses the field
//! separator from a preview, and [`convert`] writes the CSV, trying the
//! structured path before the streaming one.

pub mod convert;
pub mod detect;
pub mod output;
pub mod source;

pub use convert::{convert, ConvertError, ConvertOptions, Conversion, Strategy, Summary};
pub use detect::{detect, Delimiter};
pub use source::{open_text, read_preview, PREVIEW_LINES};
