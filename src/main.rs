use rtab2csv::{
    convert::{self, ConvertError, ConvertOptions, Summary},
    detect, source,
};
use std::{env, path::Path, process};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

const EXIT_USAGE: i32 = 1;
const EXIT_NOT_FOUND: i32 = 2;
const EXIT_CONVERSION_FAILED: i32 = 3;

fn main() {
    // ─── 1) init logging ─────────────────────────────────────────────
    // stdout carries the preview and the result; logs go to stderr.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // ─── 2) arguments ────────────────────────────────────────────────
    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        let prog = args.first().map(String::as_str).unwrap_or("rtab2csv");
        eprintln!("Usage: {prog} <input.rtab[.gz]> <output.csv>");
        process::exit(EXIT_USAGE);
    }
    let input = Path::new(&args[1]);
    let output = Path::new(&args[2]);

    if !input.exists() {
        println!("Input file not found: {}", input.display());
        process::exit(EXIT_NOT_FOUND);
    }

    // ─── 3) preview + delimiter ──────────────────────────────────────
    let preview = source::read_preview(input, source::PREVIEW_LINES);
    println!("=== file preview ===");
    let sample = match preview {
        Ok(sample) if sample.is_empty() => {
            println!("(file empty)");
            sample
        }
        Ok(sample) => {
            println!("{sample}");
            sample
        }
        Err(e) => {
            // an unreadable preview only costs us the guess
            error!(error = %format!("{e:#}"), "could not read preview");
            println!("(preview unavailable: {e:#})");
            String::new()
        }
    };
    let delimiter = detect::detect(&sample);
    println!("Detected delimiter: {}", delimiter.escaped());
    info!(%delimiter, input = %input.display(), "starting conversion");

    // ─── 4) convert ──────────────────────────────────────────────────
    let opts = ConvertOptions::new(delimiter);
    println!("Trying structured conversion...");
    match convert::convert(input, output, &opts) {
        Ok(conv) => {
            for (strategy, e) in &conv.recovered {
                println!("{strategy} conversion failed, falling back. Error: {e:#}");
            }
            println!("Converted using the {} path.", conv.strategy);
            match conv.summary {
                Summary::Table { rows, columns } => println!(
                    "Wrote {} with {} rows and {} columns.",
                    conv.output.display(),
                    rows,
                    columns
                ),
                Summary::Streamed { .. } => println!("Wrote {}", conv.output.display()),
            }
        }
        Err(ConvertError::InputNotFound(path)) => {
            println!("Input file not found: {}", path.display());
            process::exit(EXIT_NOT_FOUND);
        }
        Err(e) => {
            println!("Conversion failed: {e}");
            process::exit(EXIT_CONVERSION_FAILED);
        }
    }
}
