// src/output.rs
// =============================================================================
// Where discovered URLs go.
//
// stdout carries URLs and nothing else, one per line, flushed immediately so
// the output can be piped into other tools while the crawl is still running.
// With --json each line is a small JSON object instead.
//
// Several workers may discover URLs at the same moment, so the writer sits
// behind a mutex and each record is written in one piece.
// =============================================================================

use crate::listing::EntryKind;
use serde::Serialize;
use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

/// One discovered URL
#[derive(Debug, Clone, Serialize)]
pub struct Discovery {
    pub url: String,
    /// Display name from the listing (the path for the seed)
    pub name: String,
    pub kind: EntryKind,
    /// Directory hops from the seed
    pub depth: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Plain,
    Json,
}

/// A sink for discoveries; must be callable from several workers at once
pub trait Emitter: Send + Sync {
    fn emit(&self, discovery: &Discovery) -> io::Result<()>;
}

/// Writes newline-delimited records to any writer (stdout in production,
/// a Vec<u8> in tests)
pub struct LineEmitter<W> {
    writer: Mutex<W>,
    format: OutputFormat,
}

impl<W: Write + Send> LineEmitter<W> {
    pub fn new(writer: W, format: OutputFormat) -> Self {
        Self {
            writer: Mutex::new(writer),
            format,
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> Emitter for LineEmitter<W> {
    fn emit(&self, discovery: &Discovery) -> io::Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        match self.format {
            OutputFormat::Plain => writeln!(writer, "{}", discovery.url)?,
            OutputFormat::Json => {
                serde_json::to_writer(&mut *writer, discovery)?;
                writeln!(writer)?;
            }
        }
        writer.flush()
    }
}
