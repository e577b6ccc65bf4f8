//! In-memory capture of log output
//!
//! A [`BufferLogger`] pairs a [`CaptureBuffer`] with a logger writing into it, so that a
//! request's log entries can be read back as JSON once the request is done.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::de::IgnoredAny;
use serde_json::{Map, Value};

use crate::config::LoggerConfig;
use crate::error::{Error, Result};
use crate::logger::{Encoding, SharedSink, StructuredLogger};
use crate::redact::{RedactionRules, Redactor};

/// One parsed log entry
pub type LogRecord = Map<String, Value>;

/// Thread-safe, growable byte buffer
///
/// Clones share the same bytes.
#[derive(Debug, Clone, Default)]
pub struct CaptureBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        self.bytes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of everything written so far
    pub fn contents(&self) -> Vec<u8> {
        self.lock().clone()
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.lock()).into_owned()
    }

    /// Drop all content, keeping the allocation
    pub fn reset(&self) {
        self.lock().clear();
    }
}

impl Write for CaptureBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A logger whose output is captured in memory
#[derive(Debug)]
pub struct BufferLogger {
    logger: StructuredLogger,
    buffer: CaptureBuffer,
}

impl BufferLogger {
    /// Create a buffer and a logger writing into it
    ///
    /// With `rules`, entries pass through a redactor bound to those (shared) rules.
    pub fn new(name: &str, config: &LoggerConfig, rules: Option<&RedactionRules>) -> Result<Self> {
        let buffer = CaptureBuffer::new();
        let logger = match rules {
            Some(rules) => StructuredLogger::with_redactor(
                name,
                config,
                Redactor::with_rules(buffer.clone(), rules.clone()),
            )?,
            None => StructuredLogger::new(name, config, buffer.clone())?,
        };

        Ok(Self { logger, buffer })
    }

    pub fn logger(&self) -> &StructuredLogger {
        &self.logger
    }

    pub fn buffer(&self) -> &CaptureBuffer {
        &self.buffer
    }

    pub fn encoding(&self) -> Encoding {
        self.logger.encoding()
    }

    pub fn redaction(&self) -> Option<&RedactionRules> {
        self.logger.redaction()
    }

    /// Empty the buffer
    pub fn reset(&self) {
        self.buffer.reset();
    }

    /// Writer onto the same sink as the logger, redactor included
    pub fn make_writer(&self) -> SharedSink {
        self.logger.sink()
    }

    /// A `tracing` dispatcher that captures events into this buffer as JSON
    pub fn dispatch(&self) -> tracing::Dispatch {
        super::subscriber::capture_dispatch(self)
    }

    /// Captured entries as a JSON array
    ///
    /// Entries may be separated by commas or whitespace; both end up as one array.
    pub fn raw_text(&self) -> Result<String> {
        if self.encoding() != Encoding::Json {
            return Err(Error::UnsupportedEncoding {
                encoding: self.encoding().to_string(),
            });
        }

        let text = self.buffer.to_string_lossy();
        let entries = split_entries(&text)?;
        Ok(format!("[{}]", entries.join(",")))
    }

    /// Captured entries parsed into records
    pub fn records(&self) -> Result<Vec<LogRecord>> {
        let raw = self.raw_text()?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Slice `text` into its top-level JSON values
fn split_entries(text: &str) -> Result<Vec<&str>> {
    let is_separator = |c: char| c == ',' || c.is_whitespace();
    let mut entries = Vec::new();
    let mut rest = text.trim_start_matches(is_separator);

    while !rest.is_empty() {
        let mut stream = serde_json::Deserializer::from_str(rest).into_iter::<IgnoredAny>();
        match stream.next() {
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(e.into()),
            None => break,
        }
        let end = stream.byte_offset();
        entries.push(&rest[..end]);
        rest = rest[end..].trim_start_matches(is_separator);
    }

    Ok(entries)
}
