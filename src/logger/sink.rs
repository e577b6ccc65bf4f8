//! Shared, lockable log sink

use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing_subscriber::fmt::MakeWriter;

/// A cloneable handle onto one writer
///
/// Loggers, their children and `tracing` layers all write through the same handle, one
/// entry per lock.
#[derive(Clone)]
pub struct SharedSink {
    inner: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl SharedSink {
    pub fn new<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn Write + Send>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write a complete entry while holding the lock once
    pub fn write_entry(&self, entry: &[u8]) -> io::Result<()> {
        self.lock().write_all(entry)
    }
}

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock().write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.write_entry(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.lock().flush()
    }
}

impl<'a> MakeWriter<'a> for SharedSink {
    type Writer = SharedSink;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

impl fmt::Debug for SharedSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSink")
            .field("handles", &Arc::strong_count(&self.inner))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::CaptureBuffer;

    #[test]
    fn test_clones_write_to_same_writer() {
        let buffer = CaptureBuffer::new();
        let sink = SharedSink::new(buffer.clone());
        let mut other = sink.clone();

        sink.write_entry(b"one\n").unwrap();
        other.write_all(b"two\n").unwrap();
        other.flush().unwrap();

        assert_eq!(buffer.to_string_lossy(), "one\ntwo\n");
    }
}
