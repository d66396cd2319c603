//! Per-wrapper configuration.
//!
//! [`Options`] decide what happens when a guarded call faults: which kinds
//! are ignored or propagated and how much detail a report carries. They are
//! fixed when the guard is built.
//!
//! Options come from three places:
//!
//! - the builder methods on [`Options`],
//! - [`Options::from_env`], for deployment-level defaults,
//! - [`Options::from_map`], for configuration loaded by name from JSON or
//!   similar formats.

use core::{fmt, str::FromStr};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    kind::FaultKind,
    redact::RedactionPolicy,
    report::ConfigurationSnapshot,
    value::{ContextValue, Kwargs},
};

/// Severity recorded in a report.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    /// `ERROR`
    Error,
    /// `WARNING`
    Warning,
    /// `INFO`
    Info,
    /// `DEBUG`
    #[default]
    Debug,
}

impl Level {
    /// The upper-case name of the level.
    pub const fn as_str(self) -> &'static str {
        match self {
            Level::Error => "ERROR",
            Level::Warning => "WARNING",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = OptionsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ERROR" => Ok(Level::Error),
            "WARNING" | "WARN" => Ok(Level::Warning),
            "INFO" => Ok(Level::Info),
            "DEBUG" => Ok(Level::Debug),
            _ => Err(OptionsError::UnknownLevel(s.to_string())),
        }
    }
}

/// Errors from building [`Options`] by name.
#[derive(Debug, thiserror::Error)]
pub enum OptionsError {
    /// A fault kind name that the kind registry does not know.
    #[error("unknown fault kind `{0}`")]
    UnknownFaultKind(String),
    /// A recognised option with a value of the wrong type.
    #[error("option `{key}` expects {expected}")]
    InvalidValue {
        /// The option name as given.
        key: String,
        /// What the option accepts.
        expected: &'static str,
    },
    /// A level name other than ERROR, WARNING, INFO or DEBUG.
    #[error("unknown error level `{0}`")]
    UnknownLevel(String),
}

/// Configuration of a guarded call.
#[derive(Clone, Debug)]
pub struct Options {
    /// Kinds that are swallowed silently.
    pub ignore_errors: Vec<&'static FaultKind>,
    /// Kinds that are passed on to the caller unreported.
    pub propagate_errors: Vec<&'static FaultKind>,
    /// Entries added to every report.
    pub custom_context: IndexMap<String, String>,
    /// Whether to read source windows.
    pub capture_code_context: bool,
    /// The level recorded in reports.
    pub error_level: Level,
    /// Whether to attach recorded locals to the innermost frame.
    pub capture_locals: bool,
    /// The most frames a report holds.
    pub max_stack_depth: usize,
    /// Whether panics in the target are caught like errors.
    pub catch_panics: bool,
    /// Which names hold sensitive values.
    pub redaction: RedactionPolicy,
    /// Wrap-time context, reported alongside the call's keyword arguments.
    pub context: Kwargs,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            ignore_errors: Vec::new(),
            propagate_errors: Vec::new(),
            custom_context: IndexMap::new(),
            capture_code_context: true,
            error_level: Level::Debug,
            capture_locals: false,
            max_stack_depth: 10,
            catch_panics: true,
            redaction: RedactionPolicy::default(),
            context: Kwargs::new(),
        }
    }
}

impl Options {
    /// Creates the default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Swallows faults of `kind` and its descendants.
    #[must_use]
    pub fn ignore(mut self, kind: &'static FaultKind) -> Self {
        self.ignore_errors.push(kind);
        self
    }

    /// Passes faults of `kind` and its descendants on to the caller.
    #[must_use]
    pub fn propagate(mut self, kind: &'static FaultKind) -> Self {
        self.propagate_errors.push(kind);
        self
    }

    /// Adds an entry to every report.
    #[must_use]
    pub fn custom_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_context.insert(key.into(), value.into());
        self
    }

    /// Adds a wrap-time context entry.
    #[must_use]
    pub fn context(mut self, key: impl Into<String>, value: impl Into<ContextValue>) -> Self {
        self.context.insert(key, value);
        self
    }

    /// Enables or disables source windows.
    #[must_use]
    pub fn capture_code_context(mut self, enabled: bool) -> Self {
        self.capture_code_context = enabled;
        self
    }

    /// Sets the level recorded in reports.
    #[must_use]
    pub fn error_level(mut self, level: Level) -> Self {
        self.error_level = level;
        self
    }

    /// Enables or disables recorded locals.
    #[must_use]
    pub fn capture_locals(mut self, enabled: bool) -> Self {
        self.capture_locals = enabled;
        self
    }

    /// Sets the most frames a report holds.
    #[must_use]
    pub fn max_stack_depth(mut self, depth: usize) -> Self {
        self.max_stack_depth = depth;
        self
    }

    /// Enables or disables catching panics.
    #[must_use]
    pub fn catch_panics(mut self, enabled: bool) -> Self {
        self.catch_panics = enabled;
        self
    }

    /// Replaces the redaction policy.
    #[must_use]
    pub fn redaction(mut self, policy: RedactionPolicy) -> Self {
        self.redaction = policy;
        self
    }

    /// Default options overridden by environment variables.
    ///
    /// | Variable | Option |
    /// |---|---|
    /// | `FAULTSCAN_LEVEL` | `error_level` |
    /// | `FAULTSCAN_CAPTURE_LOCALS` | `capture_locals` |
    /// | `FAULTSCAN_CODE_CONTEXT` | `capture_code_context` |
    /// | `FAULTSCAN_MAX_STACK_DEPTH` | `max_stack_depth` |
    ///
    /// Unparsable values are logged and ignored.
    pub fn from_env() -> Self {
        let mut options = Self::default();

        if let Some(value) = env_var("FAULTSCAN_LEVEL") {
            match value.parse() {
                Ok(level) => options.error_level = level,
                Err(error) => tracing::warn!(%error, "ignoring FAULTSCAN_LEVEL"),
            }
        }
        if let Some(value) = env_var("FAULTSCAN_CAPTURE_LOCALS") {
            match parse_flag(&value) {
                Some(enabled) => options.capture_locals = enabled,
                None => tracing::warn!(value, "ignoring FAULTSCAN_CAPTURE_LOCALS"),
            }
        }
        if let Some(value) = env_var("FAULTSCAN_CODE_CONTEXT") {
            match parse_flag(&value) {
                Some(enabled) => options.capture_code_context = enabled,
                None => tracing::warn!(value, "ignoring FAULTSCAN_CODE_CONTEXT"),
            }
        }
        if let Some(value) = env_var("FAULTSCAN_MAX_STACK_DEPTH") {
            match value.trim().parse() {
                Ok(depth) => options.max_stack_depth = depth,
                Err(_) => tracing::warn!(value, "ignoring FAULTSCAN_MAX_STACK_DEPTH"),
            }
        }

        options
    }

    /// Builds options from named values.
    ///
    /// Recognised names, in camelCase or snake_case: `ignoreErrors`,
    /// `propagateErrors`, `customContext`, `captureCodeContext`,
    /// `errorLevel`, `captureLocals`, `maxStackDepth` and `catchPanics`.
    /// Fault kinds are given by name and resolved with
    /// [`FaultKind::lookup`]. Any other name becomes a [`context`] entry.
    ///
    /// ```rust
    /// use faultscan::{Options, kind::kinds};
    /// use indexmap::IndexMap;
    /// use serde_json::json;
    ///
    /// let map: IndexMap<String, serde_json::Value> = serde_json::from_value(json!({
    ///     "ignoreErrors": ["ValueError"],
    ///     "max_stack_depth": 4,
    ///     "target_type": "group",
    /// }))
    /// .unwrap();
    ///
    /// let options = Options::from_map(map).unwrap();
    /// assert!(std::ptr::eq(options.ignore_errors[0], &kinds::VALUE_ERROR));
    /// assert_eq!(options.max_stack_depth, 4);
    /// assert_eq!(options.context.get("target_type").unwrap().to_string(), "group");
    /// ```
    ///
    /// [`context`]: Options::context
    pub fn from_map(map: IndexMap<String, Value>) -> Result<Self, OptionsError> {
        let mut options = Self::default();

        for (key, value) in map {
            match key.as_str() {
                "ignoreErrors" | "ignore_errors" => {
                    options.ignore_errors = kinds_from_value(&key, &value)?;
                }
                "propagateErrors" | "propagate_errors" => {
                    options.propagate_errors = kinds_from_value(&key, &value)?;
                }
                "customContext" | "custom_context" => {
                    let Value::Object(entries) = value else {
                        return Err(invalid(&key, "an object"));
                    };
                    options.custom_context = entries
                        .into_iter()
                        .map(|(key, value)| (key, value_to_string(value)))
                        .collect();
                }
                "captureCodeContext" | "capture_code_context" => {
                    options.capture_code_context = bool_from_value(&key, &value)?;
                }
                "errorLevel" | "error_level" => {
                    let Value::String(level) = &value else {
                        return Err(invalid(&key, "a level name"));
                    };
                    options.error_level = level.parse()?;
                }
                "captureLocals" | "capture_locals" => {
                    options.capture_locals = bool_from_value(&key, &value)?;
                }
                "maxStackDepth" | "max_stack_depth" => {
                    options.max_stack_depth = value
                        .as_u64()
                        .and_then(|depth| usize::try_from(depth).ok())
                        .ok_or_else(|| invalid(&key, "a non-negative integer"))?;
                }
                "catchPanics" | "catch_panics" => {
                    options.catch_panics = bool_from_value(&key, &value)?;
                }
                _ => {
                    options.context.insert(key, value_to_string(value));
                }
            }
        }

        Ok(options)
    }

    /// The configuration section of a report.
    pub fn snapshot(&self) -> ConfigurationSnapshot {
        ConfigurationSnapshot {
            capture_code_context: self.capture_code_context,
            capture_locals: self.capture_locals,
            max_stack_depth: self.max_stack_depth,
            error_level: self.error_level,
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn invalid(key: &str, expected: &'static str) -> OptionsError {
    OptionsError::InvalidValue {
        key: key.to_string(),
        expected,
    }
}

fn bool_from_value(key: &str, value: &Value) -> Result<bool, OptionsError> {
    value.as_bool().ok_or_else(|| invalid(key, "a boolean"))
}

fn kinds_from_value(key: &str, value: &Value) -> Result<Vec<&'static FaultKind>, OptionsError> {
    let Value::Array(names) = value else {
        return Err(invalid(key, "a list of fault kind names"));
    };
    names
        .iter()
        .map(|name| {
            let name = name
                .as_str()
                .ok_or_else(|| invalid(key, "a list of fault kind names"))?;
            FaultKind::lookup(name).ok_or_else(|| OptionsError::UnknownFaultKind(name.to_string()))
        })
        .collect()
}

/// Strings are taken as they are, everything else as JSON text.
fn value_to_string(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::kind::kinds;

    fn map(value: Value) -> IndexMap<String, Value> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_defaults() {
        let options = Options::default();
        assert!(options.capture_code_context);
        assert!(!options.capture_locals);
        assert_eq!(options.max_stack_depth, 10);
        assert_eq!(options.error_level, Level::Debug);
        assert!(options.catch_panics);
    }

    #[test]
    fn test_level_parsing() {
        assert_eq!("warning".parse::<Level>().unwrap(), Level::Warning);
        assert_eq!(" Error ".parse::<Level>().unwrap(), Level::Error);
        assert!(matches!(
            "loud".parse::<Level>(),
            Err(OptionsError::UnknownLevel(_))
        ));
        assert_eq!(serde_json::to_value(Level::Info).unwrap(), json!("INFO"));
    }

    #[test]
    fn test_from_map_accepts_both_spellings() {
        let options = Options::from_map(map(json!({
            "propagate_errors": ["ZeroDivisionError"],
            "captureLocals": true,
            "errorLevel": "ERROR",
            "customContext": {"service": "billing", "shard": 3},
            "event": {"id": 7},
        })))
        .unwrap();
        assert!(core::ptr::eq(
            options.propagate_errors[0],
            &kinds::ZERO_DIVISION_ERROR
        ));
        assert!(options.capture_locals);
        assert_eq!(options.error_level, Level::Error);
        assert_eq!(options.custom_context["service"], "billing");
        assert_eq!(options.custom_context["shard"], "3");
        assert_eq!(
            options.context.get("event").unwrap().to_string(),
            r#"{"id":7}"#
        );
    }

    #[test]
    fn test_from_map_errors() {
        assert!(matches!(
            Options::from_map(map(json!({"ignoreErrors": ["NoSuchError"]}))),
            Err(OptionsError::UnknownFaultKind(name)) if name == "NoSuchError"
        ));
        assert!(matches!(
            Options::from_map(map(json!({"maxStackDepth": -1}))),
            Err(OptionsError::InvalidValue { expected: "a non-negative integer", .. })
        ));
        assert!(matches!(
            Options::from_map(map(json!({"captureLocals": "yes"}))),
            Err(OptionsError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
