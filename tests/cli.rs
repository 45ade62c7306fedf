use anyhow::Result;
use std::{fs, process::Command};
use tempfile::TempDir;

fn rtab2csv() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_rtab2csv"));
    cmd.env("RUST_LOG", "warn");
    cmd
}

#[test]
fn wrong_argument_count_exits_1() -> Result<()> {
    let out = rtab2csv().arg("only-one").output()?;
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("Usage"));
    Ok(())
}

#[test]
fn missing_input_exits_2() -> Result<()> {
    let dir = TempDir::new()?;
    let output = dir.path().join("out.csv");
    let out = rtab2csv()
        .arg(dir.path().join("absent.rtab"))
        .arg(&output)
        .output()?;
    assert_eq!(out.status.code(), Some(2));
    assert!(!output.exists());
    Ok(())
}

#[test]
fn unwritable_output_exits_3() -> Result<()> {
    let dir = TempDir::new()?;
    let input = dir.path().join("in.rtab");
    fs::write(&input, "a\tb\n1\t2\n")?;
    let out = rtab2csv()
        .arg(&input)
        .arg(dir.path().join("no-such-dir").join("out.csv"))
        .output()?;
    assert_eq!(out.status.code(), Some(3));
    Ok(())
}

#[test]
fn converts_and_reports_shape() -> Result<()> {
    let dir = TempDir::new()?;
    let input = dir.path().join("in.rtab");
    let output = dir.path().join("out.csv");
    fs::write(&input, "# comment\na\tb\tc\n1\t2\t3\n4\t5\t6\n")?;

    let out = rtab2csv().arg(&input).arg(&output).output()?;
    assert_eq!(out.status.code(), Some(0));

    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("=== file preview ==="));
    assert!(stdout.contains("# comment"));
    assert!(stdout.contains(r"Detected delimiter: '\t'"));
    assert!(stdout.contains("with 2 rows and 3 columns"));
    assert_eq!(fs::read_to_string(&output)?, "a,b,c\n1,2,3\n4,5,6\n");
    Ok(())
}

#[test]
fn empty_input_reports_empty_preview() -> Result<()> {
    let dir = TempDir::new()?;
    let input = dir.path().join("empty.rtab");
    let output = dir.path().join("out.csv");
    fs::write(&input, "")?;

    let out = rtab2csv().arg(&input).arg(&output).output()?;
    assert_eq!(out.status.code(), Some(0));

    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("(file empty)"));
    assert!(stdout.contains(r"Detected delimiter: '\t'"));
    assert_eq!(fs::read_to_string(&output)?, "");
    Ok(())
}

#[test]
fn corrupt_gzip_is_not_reported_as_empty() -> Result<()> {
    let dir = TempDir::new()?;
    let input = dir.path().join("broken.rtab.gz");
    let output = dir.path().join("out.csv");
    fs::write(&input, "a\tb\n1\t2\n")?;

    let out = rtab2csv().arg(&input).arg(&output).output()?;
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("(preview unavailable"));
    assert!(!stdout.contains("(file empty)"));
    assert_eq!(out.status.code(), Some(3));
    assert!(!output.exists());
    Ok(())
}
