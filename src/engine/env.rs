//! The per-invocation view handed to a compute function.

use crate::errors::{ComputeError, ErrorInfo};
use crate::events::{Event, EventKind, EventMessage};
use crate::graph::{Graph, Key, NodeState, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Everything one compute run told the environment, harvested by the worker
/// after the invocation returns.
pub(crate) struct EnvOutcome {
    pub(crate) groups: Vec<Vec<Key>>,
    pub(crate) catches: HashMap<Key, Vec<String>>,
    pub(crate) missing: bool,
    pub(crate) failed_children: Vec<(Key, ErrorInfo)>,
    pub(crate) events: Vec<Event>,
}

/// Environment for one invocation of a compute function.
///
/// Dep requests are recorded as ordered groups: each `get_values` call
/// opens a new group, `get_value` opens a group of one. A dep requested
/// again later in the same run keeps its first group assignment. Values are
/// read live from the graph: deps that are done return their value, deps
/// that are not yet terminal return `None` and set the missing flag, which
/// tells the scheduler to suspend the key until every requested dep
/// signals.
///
/// Errored deps requested through the plain getters surface as unrecovered
/// child errors: the current key fails with the union of their root causes
/// at its next terminal step. The `_or_catch` getters deliver a matching
/// domain error into the compute function instead, giving it the chance to
/// recover with an alternate value.
pub struct ComputeEnv {
    graph: Arc<dyn Graph>,
    key: Key,
    tag: Option<String>,
    groups: Vec<Vec<Key>>,
    requested: HashSet<Key>,
    catches: HashMap<Key, Vec<String>>,
    missing: bool,
    failed_children: Vec<(Key, ErrorInfo)>,
    failed_index: HashSet<Key>,
    events: Vec<Event>,
}

impl ComputeEnv {
    pub(crate) fn new(graph: Arc<dyn Graph>, key: Key, tag: Option<String>) -> Self {
        Self {
            graph,
            key,
            tag,
            groups: Vec::new(),
            requested: HashSet::new(),
            catches: HashMap::new(),
            missing: false,
            failed_children: Vec::new(),
            failed_index: HashSet::new(),
            events: Vec::new(),
        }
    }

    /// The key this invocation is computing.
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Request a single dep. Returns its value if done, otherwise `None`
    /// (and the missing flag is set unless the dep already failed).
    pub async fn get_value(&mut self, key: &Key) -> Option<Value> {
        self.record_group(std::slice::from_ref(key));
        self.fetch(key)
    }

    /// Request a batch of deps as one group, so the scheduler can build them
    /// in parallel. Results align with `keys`.
    pub async fn get_values(&mut self, keys: &[Key]) -> Vec<Option<Value>> {
        self.record_group(keys);
        keys.iter().map(|key| self.fetch(key)).collect()
    }

    /// Like [`get_value`](Self::get_value), but if the dep failed with a
    /// domain error whose kind is among `kinds`, that error is returned for
    /// the compute function to recover from.
    pub async fn get_value_or_catch(
        &mut self,
        key: &Key,
        kinds: &[&str],
    ) -> Result<Option<Value>, ComputeError> {
        self.record_group(std::slice::from_ref(key));
        self.record_catch(key, kinds);
        self.fetch_catching(key)
    }

    /// Batch form of [`get_value_or_catch`](Self::get_value_or_catch). All
    /// keys are recorded as one group; the first matching child error in
    /// request order is returned.
    pub async fn get_values_or_catch(
        &mut self,
        keys: &[Key],
        kinds: &[&str],
    ) -> Result<Vec<Option<Value>>, ComputeError> {
        self.record_group(keys);
        for key in keys {
            self.record_catch(key, kinds);
        }
        let mut values = Vec::with_capacity(keys.len());
        let mut caught = None;
        for key in keys {
            match self.fetch_catching(key) {
                Ok(value) => values.push(value),
                Err(error) => {
                    if caught.is_none() {
                        caught = Some(error);
                    }
                    values.push(None);
                }
            }
        }
        match caught {
            Some(error) => Err(error),
            None => Ok(values),
        }
    }

    /// True iff any dep requested in this invocation was not yet done.
    pub fn values_missing(&self) -> bool {
        self.missing
    }

    /// Record a diagnostic event. The key's tag is stamped on untagged
    /// events so the sink's filter can match against it.
    pub fn emit(&mut self, mut event: Event) {
        if event.tag.is_none() {
            event.tag = self.tag.clone();
        }
        self.events.push(event);
    }

    pub fn info(&mut self, message: impl Into<EventMessage>) {
        self.emit(Event::new(EventKind::Info, message));
    }

    pub fn progress(&mut self, message: impl Into<EventMessage>) {
        self.emit(Event::new(EventKind::Progress, message));
    }

    pub fn warning(&mut self, message: impl Into<EventMessage>) {
        self.emit(Event::new(EventKind::Warning, message));
    }

    pub fn error(&mut self, message: impl Into<EventMessage>) {
        self.emit(Event::new(EventKind::Error, message));
    }

    pub(crate) fn into_outcome(self) -> EnvOutcome {
        EnvOutcome {
            groups: self.groups,
            catches: self.catches,
            missing: self.missing,
            failed_children: self.failed_children,
            events: self.events,
        }
    }

    fn record_group(&mut self, keys: &[Key]) {
        let fresh: Vec<Key> = keys
            .iter()
            .filter(|key| self.requested.insert((*key).clone()))
            .cloned()
            .collect();
        if !fresh.is_empty() {
            self.groups.push(fresh);
        }
    }

    fn record_catch(&mut self, key: &Key, kinds: &[&str]) {
        let declared = self.catches.entry(key.clone()).or_default();
        for kind in kinds {
            if !declared.iter().any(|k| k == kind) {
                declared.push((*kind).to_string());
            }
        }
    }

    fn record_failed(&mut self, key: &Key, info: ErrorInfo) {
        if self.failed_index.insert(key.clone()) {
            self.failed_children.push((key.clone(), info));
        }
    }

    fn fetch(&mut self, key: &Key) -> Option<Value> {
        match self.graph.get(key) {
            Some(entry) => match entry.state() {
                NodeState::Done => entry.value(),
                NodeState::Errored => {
                    self.record_failed(key, entry.error().unwrap_or_default());
                    None
                }
                _ => {
                    self.missing = true;
                    None
                }
            },
            None => {
                self.missing = true;
                None
            }
        }
    }

    fn fetch_catching(&mut self, key: &Key) -> Result<Option<Value>, ComputeError> {
        let entry = match self.graph.get(key) {
            Some(entry) => entry,
            None => {
                self.missing = true;
                return Ok(None);
            }
        };
        match entry.state() {
            NodeState::Done => Ok(entry.value()),
            NodeState::Errored => {
                let info = entry.error().unwrap_or_default();
                let declared = self.catches.get(key).cloned().unwrap_or_default();
                match &info.exception {
                    Some(exception) if exception.matches_any(&declared) => {
                        Err(exception.clone())
                    }
                    _ => {
                        self.record_failed(key, info);
                        Ok(None)
                    }
                }
            }
            _ => {
                self.missing = true;
                Ok(None)
            }
        }
    }
}
