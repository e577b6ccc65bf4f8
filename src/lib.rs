//! logsieve - pooled log capture with streaming secret redaction
//!
//! Two pieces make up the crate:
//!
//! - [`redact`]: a writer that masks literal secrets and the values of sensitive keys in
//!   every write before passing it on.
//! - [`logging`]: a fixed-size pool of buffer loggers for capturing the log output of a
//!   single request and reading it back as JSON records.
//!
//! [`logger`] holds the small leveled logger both sides are exercised with, and
//! [`config`] the TOML-backed settings.

pub mod config;
pub mod error;
pub mod logger;
pub mod logging;
pub mod redact;

pub use config::{Config, LoggerConfig, PoolConfig, RedactionConfig};
pub use error::{Error, Result};
pub use logger::{Level, Logger, StructuredLogger};
pub use logging::{BufferLogger, BufferLoggerPool, LogRecord, PooledBufferLogger};
pub use redact::{RedactionRules, Redactor};
