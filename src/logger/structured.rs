//! JSON / console logger writing one entry per write

use std::borrow::Cow;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use chrono::{Local, Utc};
use serde_json::{Map, Value};

use super::{Encoding, EncoderConfig, Level, Logger, SharedSink, Var, VarGroupMode};
use crate::config::LoggerConfig;
use crate::error::Result;
use crate::redact::{RedactionRules, Redactor};

/// Console column width for logger names
const CONSOLE_NAME_WIDTH: usize = 25;

/// Separator between flattened variables
const FLATTENED_DELIMITER: &str = " || ";

/// A leveled logger that encodes entries as JSON objects or console lines
///
/// Children share the sink, the level and the encoder settings of their parent.
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    name: String,
    encoding: Encoding,
    encoder: Arc<EncoderConfig>,
    level: Arc<AtomicU8>,
    sink: SharedSink,
    redaction: Option<RedactionRules>,
}

impl StructuredLogger {
    /// Create a logger writing to `sink`
    ///
    /// Fails if the encoder settings cannot produce readable output.
    pub fn new<W>(name: &str, config: &LoggerConfig, sink: W) -> Result<Self>
    where
        W: Write + Send + 'static,
    {
        config.validate()?;

        Ok(Self {
            name: name.to_string(),
            encoding: config.encoding,
            encoder: Arc::new(config.json.clone()),
            level: Arc::new(AtomicU8::new(config.level.to_u8())),
            sink: SharedSink::new(sink),
            redaction: None,
        })
    }

    /// Create a logger writing through `redactor`, keeping a handle on its rules
    pub fn with_redactor<W>(name: &str, config: &LoggerConfig, redactor: Redactor<W>) -> Result<Self>
    where
        W: Write + Send + 'static,
    {
        let rules = redactor.rules().clone();
        let mut logger = Self::new(name, config, redactor)?;
        logger.redaction = Some(rules);
        Ok(logger)
    }

    /// Console logger for command-line tools
    pub fn for_command<W>(name: &str, level: Level, writer: W) -> Result<Self>
    where
        W: Write + Send + 'static,
    {
        let config = LoggerConfig {
            encoding: Encoding::Console,
            level,
            ..LoggerConfig::default()
        };
        Self::new(name, &config, writer)
    }

    /// Console logger on stdout for test suites
    ///
    /// Output goes through a disabled redactor so tests can switch redaction on.
    pub fn for_tests(name: &str, verbose: bool) -> Result<Self> {
        let redactor = Redactor::new(io::stdout());
        redactor.disable();
        Self::with_redactor(name, &LoggerConfig::for_tests(verbose), redactor)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn encoder_config(&self) -> &EncoderConfig {
        &self.encoder
    }

    pub fn level(&self) -> Level {
        Level::from_u8(self.level.load(Ordering::Relaxed))
    }

    /// Change the level for this logger and every logger sharing it
    pub fn set_level(&self, level: Level) {
        self.level.store(level.to_u8(), Ordering::Relaxed);
    }

    pub fn enabled(&self, level: Level) -> bool {
        level >= self.level()
    }

    /// Rules of the redactor this logger writes through, if any
    pub fn redaction(&self) -> Option<&RedactionRules> {
        self.redaction.as_ref()
    }

    /// Handle onto the sink entries are written to
    pub fn sink(&self) -> SharedSink {
        self.sink.clone()
    }

    /// Concrete child logger named `<self>.<name>`
    pub fn named(&self, name: &str) -> StructuredLogger {
        let name = if self.name.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.name, name)
        };
        StructuredLogger {
            name,
            ..self.clone()
        }
    }

    /// Encode one entry, line ending included
    pub fn encode(&self, level: Level, message: &str, vars: &[Var<'_>]) -> Vec<u8> {
        let vars = self.quote_redacted_values(vars);
        match self.encoding {
            Encoding::Json => self.encode_json(level, message, &vars),
            Encoding::Console => self.encode_console(level, message, &vars),
        }
    }

    /// Render non-string values of redacted keys as strings
    ///
    /// A value rule masks an unquoted value up to the next whitespace, which inside a
    /// JSON object would take the following fields with it.
    fn quote_redacted_values<'v, 'a>(&self, vars: &'v [Var<'a>]) -> Cow<'v, [Var<'a>]> {
        let rules = match &self.redaction {
            Some(rules) if rules.is_enabled() => rules,
            _ => return Cow::Borrowed(vars),
        };

        let needs_quoting =
            |(key, value): &Var<'_>| !value.is_string() && rules.matches_value_key(key);
        if !vars.iter().any(|var| needs_quoting(var)) {
            return Cow::Borrowed(vars);
        }

        Cow::Owned(
            vars.iter()
                .map(|var| {
                    if needs_quoting(var) {
                        (var.0, Value::String(var.1.to_string()))
                    } else {
                        var.clone()
                    }
                })
                .collect(),
        )
    }

    fn encode_json(&self, level: Level, message: &str, vars: &[Var<'_>]) -> Vec<u8> {
        let mut record = Map::new();
        record.insert("level".to_string(), Value::from(level.as_str()));
        record.insert(
            self.encoder.time_field_name.clone(),
            self.encoder.time_encoding.encode(Utc::now()),
        );
        if !self.name.is_empty() {
            record.insert("name".to_string(), Value::from(self.name.as_str()));
        }
        record.insert("message".to_string(), Value::from(message));

        let group = &self.encoder.var_group_name;
        if group.is_empty() {
            for (key, value) in vars {
                record.insert(key.to_string(), value.clone());
            }
        } else if !vars.is_empty() {
            let grouped = match self.encoder.var_group_mode {
                VarGroupMode::Structured => Value::Object(structured_vars(vars)),
                VarGroupMode::Flattened => Value::String(flattened_vars(vars)),
            };
            record.insert(group.clone(), grouped);
        }

        let mut entry = Value::Object(record).to_string().into_bytes();
        entry.extend_from_slice(self.encoder.line_ending.as_bytes());
        entry
    }

    fn encode_console(&self, level: Level, message: &str, vars: &[Var<'_>]) -> Vec<u8> {
        let mut line = format!(
            "{} {} {} {}",
            Local::now().format("%y.%m.%d %H:%M:%S%.3f"),
            level.console_tag(),
            console_name(&self.name),
            message
        );
        if !vars.is_empty() {
            line.push(' ');
            line.push_str(&Value::Object(structured_vars(vars)).to_string());
        }
        line.push('\n');
        line.into_bytes()
    }
}

impl Logger for StructuredLogger {
    fn log(&self, level: Level, message: &str, vars: &[Var<'_>]) {
        if !self.enabled(level) {
            return;
        }

        let entry = self.encode(level, message, vars);
        if let Err(e) = self.sink.write_entry(&entry) {
            tracing::warn!(logger = %self.name, error = %e, "Failed to write log entry");
        }
    }

    fn flush(&self) -> io::Result<()> {
        self.sink.clone().flush()
    }

    fn child(&self, name: &str) -> Arc<dyn Logger> {
        Arc::new(self.named(name))
    }
}

fn structured_vars(vars: &[Var<'_>]) -> Map<String, Value> {
    vars.iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}

fn flattened_vars(vars: &[Var<'_>]) -> String {
    vars.iter()
        .map(|(key, value)| match value {
            Value::String(s) => format!("{}={}", key, s),
            other => format!("{}={}", key, other),
        })
        .collect::<Vec<_>>()
        .join(FLATTENED_DELIMITER)
}

/// Right-align short names, keep the tail of long ones
fn console_name(name: &str) -> String {
    let len = name.chars().count();
    if len >= CONSOLE_NAME_WIDTH {
        name.chars().skip(len - CONSOLE_NAME_WIDTH).collect()
    } else {
        format!("{:>width$}", name, width = CONSOLE_NAME_WIDTH)
    }
}
