//! Redacting writer
//!
//! Sits between a logger and its real sink and filters every write through a
//! [`RedactionRules`] set.

use std::io::{self, Write};

use super::rules::RedactionRules;
use crate::error::{Error, Result};

/// A writer that redacts each write before forwarding it to `output`
///
/// Each call to [`write`](Write::write) is filtered on its own; callers are expected to
/// hand over whole entries. A successful write always reports the length of the
/// original input, whatever the length of the redacted payload.
#[derive(Debug)]
pub struct Redactor<W> {
    output: W,
    rules: RedactionRules,
}

impl<W: Write> Redactor<W> {
    /// Create a redactor with its own empty rule set
    pub fn new(output: W) -> Self {
        Self::with_rules(output, RedactionRules::new())
    }

    /// Create a redactor bound to an existing (possibly shared) rule set
    pub fn with_rules(output: W, rules: RedactionRules) -> Self {
        Self { output, rules }
    }

    /// Same rules, different sink
    pub fn fork<V: Write>(&self, output: V) -> Redactor<V> {
        Redactor::with_rules(output, self.rules.clone())
    }
}

impl<W> Redactor<W> {
    pub fn rules(&self) -> &RedactionRules {
        &self.rules
    }

    pub fn output(&self) -> &W {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut W {
        &mut self.output
    }

    /// Replace the sink, returning the previous one
    pub fn set_output(&mut self, output: W) -> W {
        std::mem::replace(&mut self.output, output)
    }

    pub fn into_inner(self) -> W {
        self.output
    }

    pub fn add_redactions<I, S>(&self, literals: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.rules.add_redactions(literals)
    }

    pub fn add_value_redactions<I, S>(&self, keys: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.rules.add_value_redactions(keys)
    }

    pub fn redactions(&self) -> Vec<String> {
        self.rules.redactions()
    }

    pub fn set_disabled(&self, disabled: bool) {
        self.rules.set_disabled(disabled);
    }

    pub fn enable(&self) {
        self.rules.enable();
    }

    pub fn disable(&self) {
        self.rules.disable();
    }

    pub fn is_enabled(&self) -> bool {
        self.rules.is_enabled()
    }
}

impl<W: Write> Write for Redactor<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let redacted = self.rules.redact(buf);
        let written = self.output.write(&redacted)?;
        if written != redacted.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                Error::ShortWrite {
                    expected: redacted.len(),
                    written,
                },
            ));
        }

        // original length, not the redacted one
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.output.flush()
    }
}
