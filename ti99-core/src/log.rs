//! Diagnostic log sink.
//!
//! The `LogSink` trait is the process-wide append target for operator-facing
//! messages. `EnvLogSink` forwards to the `log` facade; `MemoryLog` keeps the
//! lines so tests can assert on them.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Severity of a logged line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Info => f.write_str("INFO"),
            Level::Warn => f.write_str("WARN"),
            Level::Error => f.write_str("ERROR"),
        }
    }
}

/// Append-only sink for diagnostic messages.
pub trait LogSink: Send + Sync {
    fn append(&self, level: Level, message: &str);
}

/// Sink that forwards to the `log` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvLogSink;

impl LogSink for EnvLogSink {
    fn append(&self, level: Level, message: &str) {
        match level {
            Level::Info => log::info!(target: "ti99", "{message}"),
            Level::Warn => log::warn!(target: "ti99", "{message}"),
            Level::Error => log::error!(target: "ti99", "{message}"),
        }
    }
}

/// Sink that records every line in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryLog {
    lines: Arc<Mutex<Vec<(Level, String)>>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded lines, oldest first.
    pub fn lines(&self) -> Vec<(Level, String)> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Messages logged at error level.
    pub fn errors(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|(level, _)| *level == Level::Error)
            .map(|(_, message)| message)
            .collect()
    }

    /// True if any line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|(_, message)| message.contains(needle))
    }
}

impl LogSink for MemoryLog {
    fn append(&self, level: Level, message: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((level, message.to_string()));
    }
}

/// Cloneable handle to the active sink.
#[derive(Clone)]
pub struct Log {
    sink: Arc<dyn LogSink>,
}

impl Log {
    pub fn new(sink: impl LogSink + 'static) -> Self {
        Self {
            sink: Arc::new(sink),
        }
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.sink.append(Level::Info, message.as_ref());
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.sink.append(Level::Warn, message.as_ref());
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.sink.append(Level::Error, message.as_ref());
    }
}

impl Default for Log {
    fn default() -> Self {
        Self::new(EnvLogSink)
    }
}

impl fmt::Debug for Log {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Log").finish_non_exhaustive()
    }
}
