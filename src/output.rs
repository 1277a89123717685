use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::record::{RecipeRecord, COLUMNS};

/// Append-only CSV output. The header is written only when the file is new
/// or empty, so repeated runs keep adding rows under a single header.
pub struct RecipeSink {
    writer: csv::Writer<File>,
    path: PathBuf,
}

impl RecipeSink {
    pub fn open(path: &Path) -> Result<Self> {
        let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if size == 0 {
            writer.write_record(COLUMNS)?;
            writer.flush()?;
        }

        Ok(Self {
            writer,
            path: path.to_path_buf(),
        })
    }

    /// Write one row and flush it to disk.
    pub fn write(&mut self, record: &RecipeRecord) -> Result<()> {
        let row = record.to_row().context("Failed to encode list fields")?;
        self.writer
            .write_record(&row)
            .with_context(|| format!("Failed to write to {}", self.path.display()))?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
