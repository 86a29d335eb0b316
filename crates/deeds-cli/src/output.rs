//! JSON Lines record output.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Writes one JSON object per line.
pub struct JsonLinesWriter<W: Write> {
    inner: W,
    written: usize,
}

impl<W: Write> JsonLinesWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    pub fn write_record<T: Serialize>(&mut self, record: &T) -> Result<()> {
        serde_json::to_writer(&mut self.inner, record).context("Failed to encode record")?;
        self.inner
            .write_all(b"\n")
            .context("Failed to write record")?;
        self.written += 1;
        Ok(())
    }

    /// Flush and return the number of records written.
    pub fn finish(mut self) -> Result<usize> {
        self.inner.flush().context("Failed to flush output")?;
        Ok(self.written)
    }
}

/// Open `path` for writing, or stdout when no path is given.
pub fn open(path: Option<&Path>) -> Result<JsonLinesWriter<Box<dyn Write + Send>>> {
    let sink: Box<dyn Write + Send> = match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file {}", path.display()))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(BufWriter::new(io::stdout())),
    };
    Ok(JsonLinesWriter::new(sink))
}
