//! Redaction rule set shared between redactors

use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use regex::bytes::Regex;

use crate::error::{Error, Result};

/// Token that replaces every literal match
pub const LITERAL_MASK: &str = "*****";

/// Marker that replaces the value of a redacted key
pub const VALUE_MARKER: &str = "[redacted]";

/// Replacement for value rules: keep the key and separator (group 1), mask the value
const VALUE_REPLACEMENT: &str = "${1}\"[redacted]\"";

/// Value: single-quoted, double-quoted, or a run of non-whitespace
///
/// Byte-oriented, so invalid UTF-8 and non-ASCII characters inside a value are consumed
/// with it and only ASCII whitespace ends an unquoted value.
const VALUE_PATTERN: &str = r#"(?-u:'[^']*?'|"[^"]*"|\S*)"#;

#[derive(Debug)]
struct LiteralRule {
    literal: String,
    regex: Regex,
}

#[derive(Debug)]
struct ValueRule {
    key: String,
    regex: Regex,
}

#[derive(Debug, Default)]
struct RuleSet {
    /// Sorted longest first, then lexicographically
    literals: Vec<LiteralRule>,
    /// Registration order
    values: Vec<ValueRule>,
}

/// Literal and key/value redaction rules plus the enabled switch
///
/// Cloning is cheap and yields a handle onto the same rules, so one configuration can
/// drive any number of redactors bound to different sinks. Rules are only ever added.
#[derive(Debug, Clone)]
pub struct RedactionRules {
    rules: Arc<RwLock<RuleSet>>,
    enabled: Arc<AtomicBool>,
}

impl Default for RedactionRules {
    fn default() -> Self {
        Self::new()
    }
}

impl RedactionRules {
    /// Create an empty, enabled rule set
    pub fn new() -> Self {
        Self {
            rules: Arc::new(RwLock::new(RuleSet::default())),
            enabled: Arc::new(AtomicBool::new(true)),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, RuleSet> {
        self.rules.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add literal patterns masked wherever they occur
    ///
    /// Empty strings are skipped and already-known literals are ignored.
    pub fn add_redactions<I, S>(&self, literals: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut compiled = Vec::new();
        for literal in literals {
            let literal = literal.as_ref();
            if literal.is_empty() {
                continue;
            }
            let regex = Regex::new(&regex::escape(literal)).map_err(|source| {
                Error::InvalidPattern {
                    pattern: literal.to_string(),
                    source,
                }
            })?;
            compiled.push(LiteralRule {
                literal: literal.to_string(),
                regex,
            });
        }

        let mut rules = self.rules.write().unwrap_or_else(PoisonError::into_inner);
        for rule in compiled {
            if !rules.literals.iter().any(|r| r.literal == rule.literal) {
                rules.literals.push(rule);
            }
        }
        rules.literals.sort_by(|a, b| {
            b.literal
                .len()
                .cmp(&a.literal.len())
                .then_with(|| a.literal.cmp(&b.literal))
        });
        Ok(())
    }

    /// Add keys whose associated values are masked
    ///
    /// Keys are pattern fragments matched case-insensitively. All keys are compiled
    /// before any is stored, so a bad key leaves the rule set untouched.
    pub fn add_value_redactions<I, S>(&self, keys: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut compiled: Vec<ValueRule> = Vec::new();
        for key in keys {
            let key = key.as_ref();
            if key.is_empty() || compiled.iter().any(|r| r.key == key) {
                continue;
            }
            compiled.push(ValueRule {
                key: key.to_string(),
                regex: compile_value_rule(key)?,
            });
        }

        let mut rules = self.rules.write().unwrap_or_else(PoisonError::into_inner);
        for rule in compiled {
            if !rules.values.iter().any(|r| r.key == rule.key) {
                rules.values.push(rule);
            }
        }
        Ok(())
    }

    /// Configured literals, in application order
    pub fn redactions(&self) -> Vec<String> {
        self.read().literals.iter().map(|r| r.literal.clone()).collect()
    }

    /// Configured value keys, in application order
    pub fn value_redactions(&self) -> Vec<String> {
        self.read().values.iter().map(|r| r.key.clone()).collect()
    }

    /// Whether a value logged under `key` would be replaced by a value rule
    pub fn matches_value_key(&self, key: &str) -> bool {
        let candidate = format!("{}=", key);
        self.read()
            .values
            .iter()
            .any(|rule| rule.regex.is_match(candidate.as_bytes()))
    }

    /// Whether the rules currently apply
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Turn redaction on or off without touching the rules
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Inverse of [`set_enabled`](Self::set_enabled)
    pub fn set_disabled(&self, disabled: bool) {
        self.set_enabled(!disabled);
    }

    pub fn enable(&self) {
        self.set_enabled(true);
    }

    pub fn disable(&self) {
        self.set_enabled(false);
    }

    /// Apply value rules then literal rules to `input`
    ///
    /// Returns the input borrowed when disabled or when nothing matched.
    pub fn redact<'a>(&self, input: &'a [u8]) -> Cow<'a, [u8]> {
        if !self.is_enabled() {
            return Cow::Borrowed(input);
        }

        let rules = self.read();
        let mut redacted = Cow::Borrowed(input);

        for rule in &rules.values {
            if let Some(replaced) = replace_all(&rule.regex, &redacted, VALUE_REPLACEMENT) {
                redacted = Cow::Owned(replaced);
            }
        }

        for rule in &rules.literals {
            if let Some(replaced) = replace_all(&rule.regex, &redacted, LITERAL_MASK) {
                redacted = Cow::Owned(replaced);
            }
        }

        redacted
    }
}

/// Run one rule, returning the new bytes only if something matched
fn replace_all(regex: &Regex, haystack: &[u8], replacement: &str) -> Option<Vec<u8>> {
    match regex.replace_all(haystack, replacement.as_bytes()) {
        Cow::Owned(replaced) => Some(replaced),
        Cow::Borrowed(_) => None,
    }
}

/// Build the matcher for one value key
///
/// `key [quote] (= | :) value`, where the key may be wrapped in backslashes or a quote
/// (as it is inside JSON or escaped strings).
fn compile_value_rule(key: &str) -> Result<Regex> {
    let pattern =
        format!(r#"(\\*['"]?(?i:{key})\\*['"]?(?-u:\s)*[=:](?-u:\s)*)({VALUE_PATTERN})"#);
    Regex::new(&pattern).map_err(|source| Error::InvalidPattern {
        pattern: key.to_string(),
        source,
    })
}
