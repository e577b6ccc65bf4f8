//! `tracing` subscribers writing through redaction
//!
//! [`init_tracing`] sets up process-wide output on stderr; [`capture_dispatch`] builds a
//! dispatcher that records events into a pooled buffer logger so they can be read back
//! as records.

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use super::buffer::BufferLogger;
use crate::error::{Error, Result};
use crate::redact::{RedactingMakeWriter, RedactionRules};

/// Install the global subscriber
///
/// `RUST_LOG` takes precedence over `default_filter`. Every line written to stderr passes
/// through `rules` when given.
pub fn init_tracing(default_filter: &str, rules: Option<RedactionRules>) -> Result<()> {
    let rules = rules.unwrap_or_else(|| {
        let rules = RedactionRules::new();
        rules.disable();
        rules
    });

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(RedactingMakeWriter::new(std::io::stderr, rules))
        .with_target(true);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| Error::config(format!("Failed to install tracing subscriber: {}", e)))
}

/// Dispatcher writing JSON events into `buffer_logger`'s sink
///
/// Events go through the same redactor as the logger's own entries and are filtered at
/// the logger's level when the dispatcher is built.
pub fn capture_dispatch(buffer_logger: &BufferLogger) -> tracing::Dispatch {
    let level = LevelFilter::from(buffer_logger.logger().level());

    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_writer(buffer_logger.make_writer())
        .with_ansi(false)
        .with_max_level(level)
        .finish();

    tracing::Dispatch::new(subscriber)
}
