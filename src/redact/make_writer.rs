//! `tracing-subscriber` integration

use tracing_subscriber::fmt::MakeWriter;

use super::rules::RedactionRules;
use super::writer::Redactor;

/// A MakeWriter that wraps another MakeWriter and redacts every event it writes
///
/// The fmt layer formats a whole event before writing it, so each event reaches the
/// redactor in one piece.
#[derive(Debug, Clone)]
pub struct RedactingMakeWriter<M> {
    inner: M,
    rules: RedactionRules,
}

impl<M> RedactingMakeWriter<M> {
    pub fn new(inner: M, rules: RedactionRules) -> Self {
        Self { inner, rules }
    }

    pub fn rules(&self) -> &RedactionRules {
        &self.rules
    }
}

impl<'a, M> MakeWriter<'a> for RedactingMakeWriter<M>
where
    M: MakeWriter<'a>,
{
    type Writer = Redactor<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        Redactor::with_rules(self.inner.make_writer(), self.rules.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct MockMakeWriter {
        output: Arc<Mutex<Vec<u8>>>,
    }

    struct MockWriter {
        output: Arc<Mutex<Vec<u8>>>,
    }

    impl<'a> MakeWriter<'a> for MockMakeWriter {
        type Writer = MockWriter;

        fn make_writer(&'a self) -> Self::Writer {
            MockWriter {
                output: self.output.clone(),
            }
        }
    }

    impl Write for MockWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_redacting_make_writer() {
        let mock = MockMakeWriter::default();
        let rules = RedactionRules::new();
        rules.add_redactions(["hunter2"]).unwrap();
        let make_writer = RedactingMakeWriter::new(mock.clone(), rules);

        make_writer
            .make_writer()
            .write_all(b"login with hunter2\n")
            .unwrap();

        let result = String::from_utf8(mock.output.lock().unwrap().clone()).unwrap();
        assert_eq!(result, "login with *****\n");
    }

    #[test]
    fn test_fmt_subscriber_through_redactor() {
        let mock = MockMakeWriter::default();
        let rules = RedactionRules::new();
        rules.add_value_redactions(["api_key"]).unwrap();

        let subscriber = tracing_subscriber::fmt()
            .with_writer(RedactingMakeWriter::new(mock.clone(), rules))
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(api_key = "sk-live-123", "calling upstream");
        });

        let result = String::from_utf8(mock.output.lock().unwrap().clone()).unwrap();
        assert!(result.contains("calling upstream"), "Result: {}", result);
        assert!(result.contains("api_key=\"[redacted]\""), "Result: {}", result);
        assert!(!result.contains("sk-live-123"));
    }
}
