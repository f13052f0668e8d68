//! Host-facing log sink
//!
//! The host shows plugin messages in its own log window. Everything the relay
//! wants the user to see goes through [`LogSink::log`]; the same message is
//! also emitted as a `tracing` event so it lands in the diagnostic log file.

use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Name the relay reports under in the host's log window
pub const PLUGIN_NAME: &str = "SwarfarmLogger";

/// Severity understood by the host's log window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Debug,
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogKind::Debug => "debug",
            LogKind::Info => "info",
            LogKind::Success => "success",
            LogKind::Warning => "warning",
            LogKind::Error => "error",
        };
        f.write_str(s)
    }
}

/// One message for the host's log window
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    #[serde(rename = "type")]
    pub kind: LogKind,
    pub source: String,
    pub name: String,
    pub message: String,
}

/// The host's `log(entry)` contract
pub trait LogSink: Send + Sync {
    fn log(&self, entry: LogEntry);
}

/// Sink that drops every entry; the `tracing` mirror still records them
#[derive(Debug, Default)]
pub struct NullSink;

impl LogSink for NullSink {
    fn log(&self, _entry: LogEntry) {}
}

/// Sink that keeps every entry in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All entries received so far, oldest first
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    /// Messages of a given kind, oldest first
    pub fn messages(&self, kind: LogKind) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.message.clone())
            .collect()
    }

    pub fn count(&self, kind: LogKind) -> usize {
        self.entries.lock().iter().filter(|e| e.kind == kind).count()
    }

    /// True if any entry's message contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.entries.lock().iter().any(|e| e.message.contains(needle))
    }
}

impl LogSink for MemorySink {
    fn log(&self, entry: LogEntry) {
        self.entries.lock().push(entry);
    }
}

/// Cheap, cloneable front end over a [`LogSink`]
#[derive(Clone)]
pub struct Reporter {
    sink: Arc<dyn LogSink>,
}

impl Reporter {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.emit(LogKind::Debug, message.into());
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(LogKind::Info, message.into());
    }

    pub fn success(&self, message: impl Into<String>) {
        self.emit(LogKind::Success, message.into());
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.emit(LogKind::Warning, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(LogKind::Error, message.into());
    }

    fn emit(&self, kind: LogKind, message: String) {
        match kind {
            LogKind::Debug => tracing::debug!(plugin = PLUGIN_NAME, "{}", message),
            LogKind::Info | LogKind::Success => {
                tracing::info!(plugin = PLUGIN_NAME, kind = %kind, "{}", message)
            }
            LogKind::Warning => tracing::warn!(plugin = PLUGIN_NAME, "{}", message),
            LogKind::Error => tracing::error!(plugin = PLUGIN_NAME, "{}", message),
        }

        self.sink.log(LogEntry {
            kind,
            source: "plugin".to_string(),
            name: PLUGIN_NAME.to_string(),
            message,
        });
    }
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reporter_fills_in_source_and_name() {
        let sink = Arc::new(MemorySink::new());
        let reporter = Reporter::new(sink.clone());

        reporter.success("done");
        reporter.error("broken");

        let entries = sink.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, LogKind::Success);
        assert_eq!(entries[0].source, "plugin");
        assert_eq!(entries[0].name, PLUGIN_NAME);
        assert_eq!(sink.messages(LogKind::Error), vec!["broken".to_string()]);
        assert!(sink.contains("bro"));
    }

    #[test]
    fn test_log_entry_serializes_host_shape() {
        let entry = LogEntry {
            kind: LogKind::Warning,
            source: "plugin".to_string(),
            name: PLUGIN_NAME.to_string(),
            message: "careful".to_string(),
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["type"], "warning");
        assert_eq!(value["name"], "SwarfarmLogger");
    }
}
