// src/output.rs
use anyhow::{Context, Result};
use std::{
    fs::File,
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tracing::debug;

/// Output file that only appears at its target path once `commit` succeeds.
///
/// Data goes to a temp file next to the target; `commit` renames it over the
/// target (overwriting any previous content). Dropping without committing
/// deletes the temp file and leaves the target untouched.
pub struct AtomicOutput {
    tmp: NamedTempFile,
    target: PathBuf,
}

impl AtomicOutput {
    pub fn create<P: AsRef<Path>>(target: P) -> Result<Self> {
        let target = target.as_ref().to_path_buf();
        let dir = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let tmp = NamedTempFile::new_in(&dir)
            .with_context(|| format!("creating temp output in {}", dir.display()))?;
        debug!(tmp = %tmp.path().display(), target = %target.display(), "opened output");
        Ok(Self { tmp, target })
    }

    pub fn file_mut(&mut self) -> &mut File {
        self.tmp.as_file_mut()
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn commit(self) -> Result<PathBuf> {
        self.tmp
            .as_file()
            .sync_all()
            .context("syncing output file")?;
        self.tmp
            .persist(&self.target)
            .with_context(|| format!("moving output into place at {}", self.target.display()))?;
        Ok(self.target)
    }
}
