//! Engine events and their delivery.
//!
//! The core emits five kinds of events while a container runs: one per
//! message severity plus a header-display event. Events are delivered
//! synchronously to a single [`EventSink`] per run tree through a
//! [`Messenger`], which applies the configured display filter. The sink owns
//! every color, format and output decision.

use std::sync::{Arc, Mutex};

use crate::config::{DisplayMessages, SharedConfig};

/// Message severity, used for display filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Failure,
}

/// An event emitted by the run tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Info(String),
    Success(String),
    Warning(String),
    Failure(String),
    /// A section header (container, process or dependency banner).
    Header(String),
}

impl EngineEvent {
    pub fn text(&self) -> &str {
        match self {
            EngineEvent::Info(text)
            | EngineEvent::Success(text)
            | EngineEvent::Warning(text)
            | EngineEvent::Failure(text)
            | EngineEvent::Header(text) => text,
        }
    }

    /// The severity of a message event; headers have none.
    pub fn severity(&self) -> Option<Severity> {
        match self {
            EngineEvent::Info(_) => Some(Severity::Info),
            EngineEvent::Success(_) => Some(Severity::Success),
            EngineEvent::Warning(_) => Some(Severity::Warning),
            EngineEvent::Failure(_) => Some(Severity::Failure),
            EngineEvent::Header(_) => None,
        }
    }
}

/// Receiver for engine events.
///
/// One sink serves a whole run tree: the root container installs it and every
/// nested unit shares the same [`Messenger`].
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &EngineEvent);
}

/// Event dispatcher shared across a run tree.
///
/// Applies the `display_messages` filter before forwarding to the sink.
/// Headers are only forwarded when every message category is displayed.
#[derive(Clone)]
pub struct Messenger {
    sink: Arc<dyn EventSink>,
    config: SharedConfig,
}

impl Messenger {
    pub fn new(sink: Arc<dyn EventSink>, config: SharedConfig) -> Self {
        Self { sink, config }
    }

    pub fn info(&self, text: impl Into<String>) {
        self.message(Severity::Info, text.into());
    }

    pub fn success(&self, text: impl Into<String>) {
        self.message(Severity::Success, text.into());
    }

    pub fn warning(&self, text: impl Into<String>) {
        self.message(Severity::Warning, text.into());
    }

    pub fn failure(&self, text: impl Into<String>) {
        self.message(Severity::Failure, text.into());
    }

    /// Emit a section header. Suppressed unless all messages are displayed.
    pub fn header(&self, text: impl Into<String>) {
        let text = text.into();
        if text.is_empty() {
            return;
        }
        if self.config.display_messages() == DisplayMessages::All {
            self.sink.emit(&EngineEvent::Header(text));
        }
    }

    /// Emit a header event bypassing the display filter. Used for layout
    /// lines whose gating the caller computes itself.
    pub(crate) fn raw_header(&self, text: impl Into<String>) {
        self.sink.emit(&EngineEvent::Header(text.into()));
    }

    fn message(&self, severity: Severity, text: String) {
        if text.is_empty() {
            return;
        }
        if !self.permitted(severity) {
            return;
        }
        let event = match severity {
            Severity::Info => EngineEvent::Info(text),
            Severity::Success => EngineEvent::Success(text),
            Severity::Warning => EngineEvent::Warning(text),
            Severity::Failure => EngineEvent::Failure(text),
        };
        self.sink.emit(&event);
    }

    fn permitted(&self, severity: Severity) -> bool {
        match self.config.display_messages() {
            DisplayMessages::All => true,
            DisplayMessages::None => false,
            DisplayMessages::Info => severity == Severity::Info,
            DisplayMessages::Success => severity == Severity::Success,
            DisplayMessages::Warning => severity == Severity::Warning,
            DisplayMessages::Failure => severity == Severity::Failure,
        }
    }
}

/// Sink that buffers every event it receives.
///
/// The default sink for GUI-driven trees, where the host drains the buffer
/// into its own widgets; also the assertion point for tests.
#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<EngineEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone the buffered events.
    pub fn snapshot(&self) -> Vec<EngineEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Drain the buffered events.
    pub fn take(&self) -> Vec<EngineEvent> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: &EngineEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Sink that discards everything.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &EngineEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;

    fn messenger_with(display: DisplayMessages) -> (Arc<CollectingSink>, Messenger) {
        let sink = Arc::new(CollectingSink::new());
        let config = RunConfig::builder().display_messages(display).build().shared();
        let messenger = Messenger::new(sink.clone(), config);
        (sink, messenger)
    }

    #[test]
    fn all_forwards_every_category() {
        let (sink, messenger) = messenger_with(DisplayMessages::All);
        messenger.info("i");
        messenger.success("s");
        messenger.warning("w");
        messenger.failure("f");
        messenger.header("h");
        assert_eq!(sink.snapshot().len(), 5);
    }

    #[test]
    fn none_suppresses_everything() {
        let (sink, messenger) = messenger_with(DisplayMessages::None);
        messenger.info("i");
        messenger.failure("f");
        messenger.header("h");
        assert!(sink.snapshot().is_empty());
    }

    #[test]
    fn single_category_filters_pass_only_their_severity() {
        let (sink, messenger) = messenger_with(DisplayMessages::Failure);
        messenger.info("i");
        messenger.success("s");
        messenger.failure("f");
        let events = sink.snapshot();
        assert_eq!(events, vec![EngineEvent::Failure("f".to_string())]);
    }

    #[test]
    fn headers_require_the_all_filter() {
        let (sink, messenger) = messenger_with(DisplayMessages::Info);
        messenger.header("banner");
        assert!(sink.snapshot().is_empty());

        let (sink, messenger) = messenger_with(DisplayMessages::All);
        messenger.header("banner");
        assert_eq!(sink.snapshot().len(), 1);
    }

    #[test]
    fn empty_messages_are_dropped() {
        let (sink, messenger) = messenger_with(DisplayMessages::All);
        messenger.failure("");
        messenger.header("");
        assert!(sink.snapshot().is_empty());
    }
}
