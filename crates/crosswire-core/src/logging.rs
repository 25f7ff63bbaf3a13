//! Structured logging.
//!
//! Process-level events are emitted through [`Logger`] as structured
//! records, either compact (`level target message key=value ...`) or as
//! one JSON object per line. Per-request tracing does not go through this
//! module at all: code holding an asupersync `Cx` traces through
//! `cx.trace(...)` so the record lands in the runtime's own
//! observability stream.
//!
//! # Example
//!
//! ```
//! use crosswire_core::logging::{LogConfig, LogLevel, Logger};
//!
//! let logger = Logger::new(LogConfig::new().level(LogLevel::Info));
//! logger.info("proxy", "origin connected", &[("addr", "127.0.0.1:3000")]);
//! ```

use std::fmt;
use std::io::Write;
use std::sync::Mutex;

/// Log severity, lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    /// Most verbose, for detailed debugging.
    Trace = 0,
    /// Debug information, not shown in production.
    Debug = 1,
    /// General information about normal operation.
    Info = 2,
    /// Something unexpected but recoverable.
    Warn = 3,
    /// An error that affected processing.
    Error = 4,
}

impl LogLevel {
    /// Returns the level as a lowercase string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logger configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum level to emit.
    pub min_level: LogLevel,
    /// Emit one JSON object per line instead of the compact form.
    pub json_output: bool,
    /// Include the target (module path / subsystem) in records.
    pub include_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            json_output: false,
            include_target: true,
        }
    }
}

impl LogConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the minimum level to emit.
    #[must_use]
    pub fn level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Enables or disables JSON output.
    #[must_use]
    pub fn json_output(mut self, enabled: bool) -> Self {
        self.json_output = enabled;
        self
    }

    /// Enables or disables the target field.
    #[must_use]
    pub fn include_target(mut self, enabled: bool) -> Self {
        self.include_target = enabled;
        self
    }
}

/// A structured logger writing to an arbitrary sink (stderr by default).
pub struct Logger {
    config: LogConfig,
    sink: Mutex<Box<dyn Write + Send>>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Logger {
    /// Creates a logger writing to stderr.
    #[must_use]
    pub fn new(config: LogConfig) -> Self {
        Self {
            config,
            sink: Mutex::new(Box::new(std::io::stderr())),
        }
    }

    /// Creates a logger writing to the given sink. Used by tests.
    #[must_use]
    pub fn with_sink(config: LogConfig, sink: Box<dyn Write + Send>) -> Self {
        Self {
            config,
            sink: Mutex::new(sink),
        }
    }

    /// Returns true if `level` would be emitted.
    #[must_use]
    pub fn enabled(&self, level: LogLevel) -> bool {
        level >= self.config.min_level
    }

    /// Emits a record at the given level.
    pub fn log(&self, level: LogLevel, target: &str, message: &str, fields: &[(&str, &str)]) {
        if !self.enabled(level) {
            return;
        }

        let mut line = String::with_capacity(96);
        if self.config.json_output {
            line.push_str("{\"level\":\"");
            line.push_str(level.as_str());
            line.push('"');
            if self.config.include_target {
                line.push_str(",\"target\":\"");
                push_json_escaped(&mut line, target);
                line.push('"');
            }
            line.push_str(",\"message\":\"");
            push_json_escaped(&mut line, message);
            line.push('"');
            if !fields.is_empty() {
                line.push_str(",\"fields\":{");
                for (i, (key, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        line.push(',');
                    }
                    line.push('"');
                    push_json_escaped(&mut line, key);
                    line.push_str("\":\"");
                    push_json_escaped(&mut line, value);
                    line.push('"');
                }
                line.push('}');
            }
            line.push('}');
        } else {
            line.push_str(level.as_str());
            if self.config.include_target {
                line.push(' ');
                line.push_str(target);
            }
            line.push(' ');
            line.push_str(message);
            for (key, value) in fields {
                line.push(' ');
                line.push_str(key);
                line.push('=');
                line.push_str(value);
            }
        }
        line.push('\n');

        if let Ok(mut sink) = self.sink.lock() {
            let _ = sink.write_all(line.as_bytes());
        }
    }

    /// Emits at debug level.
    pub fn debug(&self, target: &str, message: &str, fields: &[(&str, &str)]) {
        self.log(LogLevel::Debug, target, message, fields);
    }

    /// Emits at info level.
    pub fn info(&self, target: &str, message: &str, fields: &[(&str, &str)]) {
        self.log(LogLevel::Info, target, message, fields);
    }

    /// Emits at warn level.
    pub fn warn(&self, target: &str, message: &str, fields: &[(&str, &str)]) {
        self.log(LogLevel::Warn, target, message, fields);
    }

    /// Emits at error level.
    pub fn error(&self, target: &str, message: &str, fields: &[(&str, &str)]) {
        self.log(LogLevel::Error, target, message, fields);
    }
}

fn push_json_escaped(out: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
}
