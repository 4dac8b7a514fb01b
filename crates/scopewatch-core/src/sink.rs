//! Log sinks: where scope trace lines and rendered reports go.

use std::sync::{Mutex, PoisonError};

use tracing::Level;

/// Receives `(level, category, message)` lines from the engine.
/// Failures inside a sink are the sink's business.
pub trait LogSink: Send + Sync {
    fn log(&self, level: Level, category: &str, message: &str);
}

/// Forwards to `tracing` events carrying a `category` field.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: Level, category: &str, message: &str) {
        match level {
            Level::ERROR => tracing::error!(category, "{message}"),
            Level::WARN => tracing::warn!(category, "{message}"),
            Level::INFO => tracing::info!(category, "{message}"),
            Level::DEBUG => tracing::debug!(category, "{message}"),
            _ => tracing::trace!(category, "{message}"),
        }
    }
}

/// One line captured by [`MemorySink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub level: Level,
    pub category: String,
    pub message: String,
}

/// Keeps every line in memory. Handy for tests and for embedding hosts that
/// ship lines elsewhere themselves.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<LogLine>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<LogLine> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Lines logged at exactly `level`.
    pub fn at(&self, level: Level) -> Vec<LogLine> {
        self.lines()
            .into_iter()
            .filter(|l| l.level == level)
            .collect()
    }

    pub fn clear(&self) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl LogSink for MemorySink {
    fn log(&self, level: Level, category: &str, message: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(LogLine {
                level,
                category: category.to_owned(),
                message: message.to_owned(),
            });
    }
}
