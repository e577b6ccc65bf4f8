//! Streaming secret redaction
//!
//! Provides the shared rule set, the intercepting [`Redactor`] writer, and a
//! `tracing-subscriber` MakeWriter adapter.

mod make_writer;
mod rules;
mod writer;

pub use make_writer::RedactingMakeWriter;
pub use rules::{RedactionRules, LITERAL_MASK, VALUE_MARKER};
pub use writer::Redactor;
