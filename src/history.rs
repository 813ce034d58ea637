//! In-memory command history with file persistence.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Submitted lines in the order they were entered.
///
/// `last_appended` marks how much of the log [`HistoryLog::append`] has
/// already written out, so repeated appends never duplicate entries.
#[derive(Debug, Default, Clone)]
pub struct HistoryLog {
    entries: Vec<String>,
    last_appended: usize,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a line. Filtering blank lines is up to the caller.
    pub fn add(&mut self, line: impl Into<String>) {
        self.entries.push(line.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(String::as_str)
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Loads lines from `path` onto the end of the log, dropping trailing
    /// `\r` and empty lines. Returns how many entries were added.
    pub fn read(&mut self, path: &Path) -> Result<usize> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("can't read history from {}", path.display()))?;

        let before = self.entries.len();
        self.entries.extend(
            content
                .lines()
                .map(|line| line.trim_end_matches('\r'))
                .filter(|line| !line.is_empty())
                .map(str::to_string),
        );
        Ok(self.entries.len() - before)
    }

    /// Replaces the contents of `path` with the whole log.
    pub fn write(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("can't write history to {}", path.display()))?;
        write_lines(file, &self.entries)
            .with_context(|| format!("can't write history to {}", path.display()))
    }

    /// Appends the entries added since the previous append to `path`.
    /// Returns how many entries were written.
    pub fn append(&mut self, path: &Path) -> Result<usize> {
        let pending = &self.entries[self.last_appended..];
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("can't append history to {}", path.display()))?;
        write_lines(file, pending)
            .with_context(|| format!("can't append history to {}", path.display()))?;

        let written = pending.len();
        self.last_appended = self.entries.len();
        Ok(written)
    }
}

fn write_lines(file: File, lines: &[String]) -> std::io::Result<()> {
    let mut writer = BufWriter::new(file);
    for line in lines {
        writeln!(writer, "{}", line)?;
    }
    writer.flush()
}
