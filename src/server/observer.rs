//! Observer callbacks
//!
//! The operator console (or anything else embedding the relay) receives the
//! relay's log lines and status changes through [`RelayObserver`]. The core
//! has no knowledge of how they are displayed.

use std::fmt;
use std::sync::Arc;

use crate::registry::ConnectionId;

/// Severity of a log event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// One notable event, as a human-readable line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub level: LogLevel,
    /// Connection the event concerns, if any
    pub session_id: Option<ConnectionId>,
    pub message: String,
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Listener lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Stopped,
    Listening,
}

/// Callbacks invoked by the relay
///
/// All methods have empty defaults. They are called from connection tasks,
/// so implementations must be cheap and must not block.
pub trait RelayObserver: Send + Sync + 'static {
    /// Called for every notable event (connect, disconnect, malformed
    /// frame, unresolved target, errors)
    fn on_log(&self, event: &LogEvent) {
        let _ = event;
    }

    /// Called after every registry change with the current names
    fn on_client_list_changed(&self, names: &[String]) {
        let _ = names;
    }

    /// Called when the listener starts or stops
    fn on_state_changed(&self, state: ListenerState) {
        let _ = state;
    }
}

/// Observer that ignores everything (tracing output still applies)
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl RelayObserver for NoopObserver {}

/// Hands log lines and status changes to the observer
///
/// Call sites emit their own structured `tracing` event next to each line.
#[derive(Clone)]
pub(crate) struct EventSink {
    observer: Arc<dyn RelayObserver>,
}

impl EventSink {
    pub(crate) fn new(observer: Arc<dyn RelayObserver>) -> Self {
        Self { observer }
    }

    pub(crate) fn debug(&self, session_id: Option<ConnectionId>, message: impl Into<String>) {
        self.emit(LogLevel::Debug, session_id, message.into());
    }

    pub(crate) fn info(&self, session_id: Option<ConnectionId>, message: impl Into<String>) {
        self.emit(LogLevel::Info, session_id, message.into());
    }

    pub(crate) fn warn(&self, session_id: Option<ConnectionId>, message: impl Into<String>) {
        self.emit(LogLevel::Warn, session_id, message.into());
    }

    pub(crate) fn error(&self, session_id: Option<ConnectionId>, message: impl Into<String>) {
        self.emit(LogLevel::Error, session_id, message.into());
    }

    pub(crate) fn client_list(&self, names: &[String]) {
        self.observer.on_client_list_changed(names);
    }

    pub(crate) fn state(&self, state: ListenerState) {
        self.observer.on_state_changed(state);
    }

    fn emit(&self, level: LogLevel, session_id: Option<ConnectionId>, message: String) {
        self.observer.on_log(&LogEvent {
            level,
            session_id,
            message,
        });
    }
}
