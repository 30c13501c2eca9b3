// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Diagnostic events emitted by compute functions.
//!
//! A compute function records events through its
//! [`ComputeEnv`](crate::engine::ComputeEnv). Events recorded during a
//! successful computation are stored on the entry when it transitions to
//! done (never on an errored transition) and replayed to the event sink:
//! once when the key is built, and once per later evaluation in which a
//! requested root transitively depends on it. Replay always delivers a
//! child's events before any event of a key that depends on it.
//!
//! The sink owns an optional regex tag filter: events carrying a tag that
//! does not match are dropped at the sink; events without a tag always pass.

use regex::Regex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::graph::{Graph, Key, NodeState};

/// Severity of a diagnostic event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Info,
    Progress,
    Warning,
    Error,
}

/// Event payloads may be text or raw bytes; the original encoding is
/// preserved through storage and replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventMessage {
    Text(String),
    Bytes(Vec<u8>),
}

impl EventMessage {
    /// The message as text, if it is textual.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            EventMessage::Text(text) => Some(text),
            EventMessage::Bytes(_) => None,
        }
    }
}

impl From<&str> for EventMessage {
    fn from(text: &str) -> Self {
        EventMessage::Text(text.to_string())
    }
}

impl From<String> for EventMessage {
    fn from(text: String) -> Self {
        EventMessage::Text(text)
    }
}

impl From<Vec<u8>> for EventMessage {
    fn from(bytes: Vec<u8>) -> Self {
        EventMessage::Bytes(bytes)
    }
}

/// One diagnostic event: kind, optional source location, optional tag for
/// filtering, and the message payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    pub location: Option<String>,
    pub tag: Option<String>,
    pub message: EventMessage,
}

impl Event {
    pub fn new(kind: EventKind, message: impl Into<EventMessage>) -> Self {
        Self {
            kind,
            location: None,
            tag: None,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<EventMessage>) -> Self {
        Self::new(EventKind::Info, message)
    }

    pub fn progress(message: impl Into<EventMessage>) -> Self {
        Self::new(EventKind::Progress, message)
    }

    pub fn warning(message: impl Into<EventMessage>) -> Self {
        Self::new(EventKind::Warning, message)
    }

    pub fn error(message: impl Into<EventMessage>) -> Self {
        Self::new(EventKind::Error, message)
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

/// Consumer of diagnostic events. Implementations serialize writes
/// internally; `report` may be called from any worker.
pub trait EventSink: Send + Sync {
    fn report(&self, event: Event);
}

/// Event sink that applies the tag filter, stores passing events in order,
/// and tracks whether any error-kind event was reported.
pub struct CollectingEventSink {
    filter: Option<Regex>,
    events: Mutex<Vec<Event>>,
    has_errors: AtomicBool,
}

impl CollectingEventSink {
    /// Sink without a tag filter: every event passes.
    pub fn new() -> Self {
        Self {
            filter: None,
            events: Mutex::new(Vec::new()),
            has_errors: AtomicBool::new(false),
        }
    }

    /// Sink whose tag filter is the given regex pattern.
    pub fn with_filter(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            filter: Some(Regex::new(pattern)?),
            ..Self::new()
        })
    }

    /// Snapshot of the events reported so far, in order.
    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of events reported so far.
    pub fn count(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether any error-kind event passed the filter.
    pub fn has_errors(&self) -> bool {
        self.has_errors.load(Ordering::Acquire)
    }
}

impl Default for CollectingEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for CollectingEventSink {
    fn report(&self, event: Event) {
        if let (Some(filter), Some(tag)) = (&self.filter, &event.tag) {
            if !filter.is_match(tag) {
                return;
            }
        }
        if event.kind == EventKind::Error {
            self.has_errors.store(true, Ordering::Release);
        }
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

/// Per-evaluation replay bookkeeping: each done entry's stored events reach
/// the sink at most once per evaluation, children before parents.
pub(crate) struct EventReplayer {
    replayed: HashSet<Key>,
}

impl EventReplayer {
    pub(crate) fn new() -> Self {
        Self {
            replayed: HashSet::new(),
        }
    }

    /// Replay the stored events of `key`'s done subgraph, depth-first in
    /// request order, skipping anything already replayed this evaluation.
    pub(crate) fn replay(&mut self, graph: &dyn Graph, key: &Key, sink: &dyn EventSink) {
        if !self.replayed.insert(key.clone()) {
            return;
        }
        let entry = match graph.get(key) {
            Some(entry) if entry.state() == NodeState::Done => entry,
            _ => return,
        };
        for dep in entry.flat_deps() {
            if let Some(child) = graph.get(&dep) {
                if child.state() == NodeState::Done {
                    self.replay(graph, &dep, sink);
                }
            }
        }
        for event in entry.stored_events() {
            sink.report(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_without_tags_always_pass() {
        let sink = CollectingEventSink::with_filter("^keep$").expect("valid regex");
        sink.report(Event::warning("untagged"));
        sink.report(Event::warning("tagged").with_tag("drop"));
        sink.report(Event::warning("kept").with_tag("keep"));

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].message.as_text(), Some("untagged"));
        assert_eq!(events[1].message.as_text(), Some("kept"));
    }

    #[test]
    fn error_events_set_the_flag() {
        let sink = CollectingEventSink::new();
        assert!(!sink.has_errors());

        sink.report(Event::info("fine"));
        assert!(!sink.has_errors());

        sink.report(Event::error("broken"));
        assert!(sink.has_errors());
    }

    #[test]
    fn filtered_error_does_not_set_the_flag() {
        let sink = CollectingEventSink::with_filter("^keep$").expect("valid regex");
        sink.report(Event::error("dropped").with_tag("other"));
        assert!(!sink.has_errors());
        assert_eq!(sink.count(), 0);
    }

    #[test]
    fn report_order_is_preserved() {
        let sink = CollectingEventSink::new();
        for i in 0..5 {
            sink.report(Event::info(format!("event-{}", i)));
        }
        let messages: Vec<_> = sink
            .events()
            .into_iter()
            .map(|e| e.message.as_text().map(str::to_string))
            .collect();
        assert_eq!(
            messages,
            (0..5)
                .map(|i| Some(format!("event-{}", i)))
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn bytes_payloads_survive_the_sink() {
        let sink = CollectingEventSink::new();
        sink.report(Event::info(vec![0u8, 159, 146]));
        assert_eq!(
            sink.events()[0].message,
            EventMessage::Bytes(vec![0u8, 159, 146])
        );
    }
}
