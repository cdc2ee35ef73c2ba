//! Run log: the human-readable, append-only record of what a run did.
//!
//! Every line is timestamped by the engine before it reaches the sink, and is
//! mirrored to `tracing` so diagnostics and the user-facing log agree.

use chrono::Local;
use std::sync::Mutex;

/// Receiver of run log lines.
pub trait LogSink: Send + Sync {
    /// Append one already-timestamped line.
    fn append(&self, line: &str);
}

/// Keeps every line in memory.
#[derive(Debug, Default)]
pub struct MemoryLog {
    lines: Mutex<Vec<String>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => lines.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// True if any line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }
}

impl LogSink for MemoryLog {
    fn append(&self, line: &str) {
        match self.lines.lock() {
            Ok(mut lines) => lines.push(line.to_string()),
            Err(poisoned) => poisoned.into_inner().push(line.to_string()),
        }
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLog;

impl LogSink for NullLog {
    fn append(&self, _line: &str) {}
}

/// Writes timestamped lines to a sink.
pub(crate) struct RunLog<'a> {
    sink: &'a dyn LogSink,
}

impl<'a> RunLog<'a> {
    pub(crate) fn new(sink: &'a dyn LogSink) -> Self {
        RunLog { sink }
    }

    pub(crate) fn info(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        tracing::info!("{}", message);
        self.write(message);
    }

    pub(crate) fn warn(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        tracing::warn!("{}", message);
        self.write(message);
    }

    pub(crate) fn error(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        tracing::error!("{}", message);
        self.write(&format!("ERROR: {}", message));
    }

    fn write(&self, message: &str) {
        let line = format!("[{}] {}", Local::now().format("%H:%M:%S"), message);
        self.sink.append(&line);
    }
}
