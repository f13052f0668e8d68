//! Terminal stand-in for the host's log window

use std::io::Write;

use swarfarm_logger_core::{LogEntry, LogKind, LogSink};

/// Prints each entry as `[kind] name: message`
///
/// Debug entries are only shown when `show_debug` is set, the same way the
/// host hides them unless its debug view is open.
pub struct ConsoleSink {
    show_debug: bool,
}

impl ConsoleSink {
    pub fn new(show_debug: bool) -> Self {
        Self { show_debug }
    }
}

impl LogSink for ConsoleSink {
    fn log(&self, entry: LogEntry) {
        if entry.kind == LogKind::Debug && !self.show_debug {
            return;
        }

        let line = format_entry(&entry);
        let mut stdout = std::io::stdout().lock();
        // A closed pipe must not take the relay down
        let _ = writeln!(stdout, "{}", line);
    }
}

pub fn format_entry(entry: &LogEntry) -> String {
    format!("[{}] {}: {}", entry.kind, entry.name, entry.message)
}
