//! Leveled logger used by pooled capture buffers
//!
//! The logger is small: it turns a level, a message and a list of
//! key/value variables into one encoded entry and hands that entry to a sink in a
//! single write. Everything interesting about the bytes (redaction, capture) happens
//! in the sink.

mod mux;
mod sink;
mod structured;

use std::borrow::Cow;
use std::fmt;
use std::io;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing_subscriber::filter::LevelFilter;

use crate::error::{Error, Result};

pub use mux::MuxLogger;
pub use sink::SharedSink;
pub use structured::StructuredLogger;

/// One structured variable: key and JSON value
pub type Var<'a> = (&'a str, Value);

/// Variable key carrying the request id from a [`LogContext`]
pub const REQUEST_ID_KEY: &str = "requestID";

/// Variable key carrying the context id from a [`LogContext`]
pub const CONTEXT_ID_KEY: &str = "ctx";

/// Logging levels, least severe first
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl Level {
    /// Lowercase name, as written into JSON entries
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }

    /// Look up a level by name
    ///
    /// Unknown names fall back to `Debug` so that a typo never hides output.
    pub fn from_name(name: &str) -> Level {
        match name.to_ascii_lowercase().as_str() {
            "info" => Level::Info,
            "warn" | "warning" => Level::Warn,
            "error" => Level::Error,
            _ => Level::Debug,
        }
    }

    /// Short tag used by the console encoding
    fn console_tag(&self) -> &'static str {
        match self {
            Level::Debug => "(D)",
            Level::Info => "(I)",
            Level::Warn => "(W)",
            Level::Error => "(E)",
        }
    }

    fn to_u8(self) -> u8 {
        self as u8
    }

    fn from_u8(value: u8) -> Level {
        match value {
            0 => Level::Debug,
            1 => Level::Info,
            2 => Level::Warn,
            _ => Level::Error,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE | tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

impl From<Level> for LevelFilter {
    fn from(level: Level) -> Self {
        match level {
            Level::Debug => LevelFilter::DEBUG,
            Level::Info => LevelFilter::INFO,
            Level::Warn => LevelFilter::WARN,
            Level::Error => LevelFilter::ERROR,
        }
    }
}

/// Output encoding of a logger
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// One JSON object per entry; the only encoding records can be read back from
    #[default]
    Json,
    /// Human-readable single line per entry
    Console,
}

impl Encoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Json => "json",
            Encoding::Console => "console",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Encoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(Encoding::Json),
            "console" => Ok(Encoding::Console),
            other => Err(Error::config(format!("Unknown encoding: {:?}", other))),
        }
    }
}

/// How variables are rendered when they are grouped under one field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VarGroupMode {
    /// `"group": "k=v || k=v"`
    #[default]
    Flattened,
    /// `"group": {"k": v}`
    Structured,
}

/// Encoding of the time field in JSON entries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeEncoding {
    #[default]
    EpochMillis,
    Iso8601,
}

impl TimeEncoding {
    fn encode(&self, time: DateTime<Utc>) -> Value {
        match self {
            TimeEncoding::EpochMillis => Value::from(time.timestamp_millis()),
            TimeEncoding::Iso8601 => Value::from(time.to_rfc3339()),
        }
    }
}

/// JSON encoder settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Written after every entry: `","` or any whitespace (default `"\n"`)
    #[serde(default = "default_line_ending")]
    pub line_ending: String,

    /// Field grouping all variables; empty puts them at the top level
    #[serde(default)]
    pub var_group_name: String,

    #[serde(default)]
    pub var_group_mode: VarGroupMode,

    #[serde(default = "default_time_field_name")]
    pub time_field_name: String,

    #[serde(default)]
    pub time_encoding: TimeEncoding,
}

fn default_line_ending() -> String {
    "\n".to_string()
}

fn default_time_field_name() -> String {
    "time".to_string()
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            line_ending: default_line_ending(),
            var_group_name: String::new(),
            var_group_mode: VarGroupMode::default(),
            time_field_name: default_time_field_name(),
            time_encoding: TimeEncoding::default(),
        }
    }
}

impl EncoderConfig {
    /// Group variables under `name` using `mode`
    pub fn grouped(name: impl Into<String>, mode: VarGroupMode) -> Self {
        Self {
            var_group_name: name.into(),
            var_group_mode: mode,
            ..Self::default()
        }
    }

    /// Whether entries are separated by commas rather than whitespace
    pub fn comma_separated(&self) -> bool {
        self.line_ending.trim() == ","
    }

    /// Check that captured output can be read back as a JSON array
    pub fn validate(&self) -> Result<()> {
        if self.line_ending.is_empty() {
            return Err(Error::config("line_ending must not be empty"));
        }
        if !self.comma_separated() && !self.line_ending.chars().all(char::is_whitespace) {
            return Err(Error::config(format!(
                "line_ending must be \",\" or whitespace, got {:?}",
                self.line_ending
            )));
        }
        if self.time_field_name.is_empty() {
            return Err(Error::config("time_field_name must not be empty"));
        }
        Ok(())
    }
}

/// Request-scoped values attached to entries by the `*_ctx` logging forms
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogContext {
    pub request_id: Option<String>,
    pub context_id: Option<String>,
}

impl LogContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    pub fn with_context_id(mut self, id: impl Into<String>) -> Self {
        self.context_id = Some(id.into());
        self
    }

    fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref().filter(|id| !id.is_empty())
    }

    fn context_id(&self) -> Option<&str> {
        self.context_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Prepend context variables unless the caller already supplied those keys
    pub fn apply<'a>(&self, vars: &[Var<'a>]) -> Vec<Var<'a>> {
        let mut merged = Vec::with_capacity(vars.len() + 2);
        let has_key = |key: &str| vars.iter().any(|(k, _)| *k == key);

        if let Some(id) = self.request_id() {
            if !has_key(REQUEST_ID_KEY) {
                merged.push((REQUEST_ID_KEY, Value::from(id)));
            }
        }
        if let Some(id) = self.context_id() {
            if !has_key(CONTEXT_ID_KEY) {
                merged.push((CONTEXT_ID_KEY, Value::from(id)));
            }
        }

        merged.extend(vars.iter().cloned());
        merged
    }

    /// Append the request id to an unstructured message
    pub fn annotate<'m>(&self, message: &'m str) -> Cow<'m, str> {
        match self.request_id() {
            Some(id) => Cow::Owned(format!("{} (requestID: {})", message, id)),
            None => Cow::Borrowed(message),
        }
    }
}

fn render(args: fmt::Arguments<'_>) -> Cow<'static, str> {
    match args.as_str() {
        Some(s) => Cow::Borrowed(s),
        None => Cow::Owned(args.to_string()),
    }
}

/// Leveled logging operations
///
/// Implementors provide [`log`](Logger::log); the unstructured (`format_args!`),
/// structured (`*_with`) and context (`*_ctx`, `*_with_ctx`) forms are derived.
pub trait Logger: Send + Sync {
    /// Emit one entry if `level` is enabled
    fn log(&self, level: Level, message: &str, vars: &[Var<'_>]);

    /// Flush the underlying sink
    fn flush(&self) -> io::Result<()>;

    /// A logger named `<self>.<name>` sharing this logger's sink and level
    fn child(&self, name: &str) -> Arc<dyn Logger>;

    fn debug(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Debug, &render(args), &[]);
    }

    fn info(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Info, &render(args), &[]);
    }

    fn warn(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Warn, &render(args), &[]);
    }

    fn error(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Error, &render(args), &[]);
    }

    fn debug_with(&self, message: &str, vars: &[Var<'_>]) {
        self.log(Level::Debug, message, vars);
    }

    fn info_with(&self, message: &str, vars: &[Var<'_>]) {
        self.log(Level::Info, message, vars);
    }

    fn warn_with(&self, message: &str, vars: &[Var<'_>]) {
        self.log(Level::Warn, message, vars);
    }

    fn error_with(&self, message: &str, vars: &[Var<'_>]) {
        self.log(Level::Error, message, vars);
    }

    /// Structured entry carrying the context's ids as variables
    fn log_ctx(&self, ctx: &LogContext, level: Level, message: &str, vars: &[Var<'_>]) {
        self.log(level, message, &ctx.apply(vars));
    }

    fn debug_ctx(&self, ctx: &LogContext, args: fmt::Arguments<'_>) {
        self.log(Level::Debug, &ctx.annotate(&render(args)), &[]);
    }

    fn info_ctx(&self, ctx: &LogContext, args: fmt::Arguments<'_>) {
        self.log(Level::Info, &ctx.annotate(&render(args)), &[]);
    }

    fn warn_ctx(&self, ctx: &LogContext, args: fmt::Arguments<'_>) {
        self.log(Level::Warn, &ctx.annotate(&render(args)), &[]);
    }

    fn error_ctx(&self, ctx: &LogContext, args: fmt::Arguments<'_>) {
        self.log(Level::Error, &ctx.annotate(&render(args)), &[]);
    }

    fn debug_with_ctx(&self, ctx: &LogContext, message: &str, vars: &[Var<'_>]) {
        self.log_ctx(ctx, Level::Debug, message, vars);
    }

    fn info_with_ctx(&self, ctx: &LogContext, message: &str, vars: &[Var<'_>]) {
        self.log_ctx(ctx, Level::Info, message, vars);
    }

    fn warn_with_ctx(&self, ctx: &LogContext, message: &str, vars: &[Var<'_>]) {
        self.log_ctx(ctx, Level::Warn, message, vars);
    }

    fn error_with_ctx(&self, ctx: &LogContext, message: &str, vars: &[Var<'_>]) {
        self.log_ctx(ctx, Level::Error, message, vars);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_level_from_name() {
        assert_eq!(Level::from_name("info"), Level::Info);
        assert_eq!(Level::from_name("WARN"), Level::Warn);
        assert_eq!(Level::from_name("error"), Level::Error);
        assert_eq!(Level::from_name("debug"), Level::Debug);
        assert_eq!(Level::from_name("nonsense"), Level::Debug);
    }

    #[test]
    fn test_level_ordering_and_roundtrip() {
        assert!(Level::Debug < Level::Info);
        assert!(Level::Warn < Level::Error);
        for level in [Level::Debug, Level::Info, Level::Warn, Level::Error] {
            assert_eq!(Level::from_u8(level.to_u8()), level);
        }
    }

    #[test]
    fn test_encoding_from_str() {
        assert_eq!("json".parse::<Encoding>().unwrap(), Encoding::Json);
        assert_eq!("console".parse::<Encoding>().unwrap(), Encoding::Console);
        assert!(matches!(
            "xml".parse::<Encoding>(),
            Err(Error::Configuration { .. })
        ));
    }

    #[test]
    fn test_encoder_config_validation() {
        assert!(EncoderConfig::default().validate().is_ok());

        let commas = EncoderConfig {
            line_ending: ",".to_string(),
            ..EncoderConfig::default()
        };
        assert!(commas.validate().is_ok());
        assert!(commas.comma_separated());

        let empty = EncoderConfig {
            line_ending: String::new(),
            ..EncoderConfig::default()
        };
        assert!(empty.validate().is_err());

        let pipe = EncoderConfig {
            line_ending: "|".to_string(),
            ..EncoderConfig::default()
        };
        assert!(pipe.validate().is_err());

        let no_time = EncoderConfig {
            time_field_name: String::new(),
            ..EncoderConfig::default()
        };
        assert!(no_time.validate().is_err());
    }

    #[test]
    fn test_context_apply_prepends_ids() {
        let ctx = LogContext::new()
            .with_request_id("123456")
            .with_context_id("abcdef");
        let vars = ctx.apply(&[("some", json!("thing"))]);

        assert_eq!(vars[0], (REQUEST_ID_KEY, json!("123456")));
        assert_eq!(vars[1], (CONTEXT_ID_KEY, json!("abcdef")));
        assert_eq!(vars[2], ("some", json!("thing")));
    }

    #[test]
    fn test_context_apply_keeps_existing_keys() {
        let ctx = LogContext::new()
            .with_request_id("123456")
            .with_context_id("abcdef");
        let vars = ctx.apply(&[("some", json!("thing")), (REQUEST_ID_KEY, json!("987654"))]);

        assert_eq!(vars.len(), 3);
        assert_eq!(vars[0], (CONTEXT_ID_KEY, json!("abcdef")));
        assert!(vars.contains(&(REQUEST_ID_KEY, json!("987654"))));
        assert!(!vars.contains(&(REQUEST_ID_KEY, json!("123456"))));
    }

    #[test]
    fn test_context_empty_ids_ignored() {
        let ctx = LogContext::new().with_request_id("");
        assert!(ctx.apply(&[]).is_empty());
        assert_eq!(ctx.annotate("hello"), "hello");

        let ctx = LogContext::new().with_request_id("r-1");
        assert_eq!(ctx.annotate("hello"), "hello (requestID: r-1)");
    }
}
