use std::io::{self, Write};
use std::sync::Mutex;

use crate::output::traits::{OutputResult, PageRecord, RecordSink};

/// Writes "URL STATUS" for every page
///
/// Generic over the writer so tests can capture the output; the binary uses
/// [`StdoutSink::stdout`].
pub struct StdoutSink<W = io::Stdout> {
    out: Mutex<W>,
}

impl StdoutSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> StdoutSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Returns the underlying writer
    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

impl<W: Write + Send> RecordSink for StdoutSink<W> {
    fn record(&self, record: &PageRecord) -> OutputResult<()> {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        writeln!(out, "{} {}", record.url, record.status)?;
        Ok(())
    }

    fn flush(&self) -> OutputResult<()> {
        self.out.lock().unwrap_or_else(|e| e.into_inner()).flush()?;
        Ok(())
    }
}
