//! Bundled terminal sinks.
//!
//! The engine core never prints; it hands events to a sink. These sinks
//! cover the stock run modes: a colored terminal sink, a plain sink for runs
//! hosted in a parent tool's terminal, and pass-through defaults for GUI
//! hosts that install their own receiver.

use chrono::Local;
use colored::Colorize;
use std::sync::Arc;

use crate::config::RunMode;
use crate::events::{CollectingSink, EngineEvent, EventSink, NullSink};

fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

fn tagged(tag: &str, text: &str) -> String {
    format!("    {} - {:<8}: {}", timestamp(), tag, text)
}

/// Colored sink for interactive terminal runs.
///
/// Severity messages carry a timestamp and severity tag; headers print as
/// produced by the container.
pub struct TerminalSink;

impl EventSink for TerminalSink {
    fn emit(&self, event: &EngineEvent) {
        match event {
            EngineEvent::Header(text) => println!("{}", text.cyan().bold()),
            EngineEvent::Info(text) => println!("{}", tagged("INFO", text).cyan()),
            EngineEvent::Success(text) => println!("{}", tagged("SUCCESS", text).green()),
            EngineEvent::Warning(text) => println!("{}", tagged("WARNING", text).yellow()),
            EngineEvent::Failure(text) => println!("{}", tagged("FAILED", text).red()),
        }
    }
}

/// Plain sink for runs hosted inside another tool's terminal, where ANSI
/// colors would end up in a log pane.
pub struct ParentTerminalSink;

impl EventSink for ParentTerminalSink {
    fn emit(&self, event: &EngineEvent) {
        match event {
            EngineEvent::Header(text) => println!("{text}"),
            EngineEvent::Info(text) => println!("{}", tagged("INFO", text)),
            EngineEvent::Success(text) => println!("{}", tagged("SUCCESS", text)),
            EngineEvent::Warning(text) => println!("{}", tagged("WARNING", text)),
            EngineEvent::Failure(text) => println!("{}", tagged("FAILED", text)),
        }
    }
}

/// The stock sink for a run mode.
///
/// GUI trees get a discarding sink; a graphical host is expected to install
/// its own receiver (a [`CollectingSink`] it drains, or a custom bridge).
pub fn default_sink(mode: RunMode) -> Arc<dyn EventSink> {
    match mode {
        RunMode::Terminal => Arc::new(TerminalSink),
        RunMode::ParentTerminal => Arc::new(ParentTerminalSink),
        RunMode::Gui => Arc::new(NullSink),
    }
}

/// Convenience constructor for a buffering sink a host can drain.
pub fn collecting_sink() -> Arc<CollectingSink> {
    Arc::new(CollectingSink::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_lines_carry_tag_and_text() {
        let line = tagged("FAILED", "disk check went sideways");
        assert!(line.contains("FAILED"));
        assert!(line.contains("disk check went sideways"));
        assert!(line.starts_with("    "));
    }

    #[test]
    fn default_sinks_exist_for_every_mode() {
        // Smoke: construction must not panic for any mode.
        let _ = default_sink(RunMode::Terminal);
        let _ = default_sink(RunMode::ParentTerminal);
        let _ = default_sink(RunMode::Gui);
    }
}
