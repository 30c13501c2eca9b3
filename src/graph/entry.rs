// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The per-key record kept by the graph store.
//!
//! Every entry guards its mutable state with its own lock, which is never
//! held across an await point. The locking discipline between two related
//! entries is always child-before-parent: reverse-dep registration takes
//! only the child's lock, dep-group recording takes only the parent's, and
//! signaling takes the child's lock to read the transition and the parent's
//! lock independently to deliver it. This keeps the lock graph acyclic even
//! when the key graph has cycles.

use crate::errors::ErrorInfo;
use crate::events::Event;
use crate::graph::{Key, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

/// Lifecycle of an entry within one evaluation. `Done` and `Errored` are
/// terminal; an entry transitions to a terminal state at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeState {
    #[default]
    New,
    InProgress,
    Done,
    Errored,
}

impl NodeState {
    pub fn is_terminal(self) -> bool {
        matches!(self, NodeState::Done | NodeState::Errored)
    }
}

#[derive(Default)]
struct EntryInner {
    state: NodeState,
    value: Option<Value>,
    error: Option<ErrorInfo>,
    /// Dep groups in request order across restarts of the current run.
    dep_groups: Vec<Vec<Key>>,
    dep_index: HashSet<Key>,
    /// Keys that requested this entry, in registration order.
    rdeps: Vec<Key>,
    rdep_index: HashSet<Key>,
    /// Error kinds declared catchable per child during the latest run.
    catches: HashMap<Key, Vec<String>>,
    /// Signals awaited before the entry is ready again; `None` while not
    /// suspended.
    pending: Option<usize>,
    /// Terminal-dep signals received since the last ready transition.
    signaled: usize,
    restarts: u32,
    events: Vec<Event>,
}

/// The graph node for one key.
pub struct NodeEntry {
    inner: Mutex<EntryInner>,
}

impl NodeEntry {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(EntryInner::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, EntryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> NodeState {
        self.lock().state
    }

    pub fn is_terminal(&self) -> bool {
        self.lock().state.is_terminal()
    }

    /// The value, once the entry is done.
    pub fn value(&self) -> Option<Value> {
        self.lock().value.clone()
    }

    /// The error info, once the entry is errored.
    pub fn error(&self) -> Option<ErrorInfo> {
        self.lock().error.clone()
    }

    /// Dep groups in the order the compute function requested them.
    pub fn direct_deps(&self) -> Vec<Vec<Key>> {
        self.lock().dep_groups.clone()
    }

    /// All requested deps flattened in request order.
    pub fn flat_deps(&self) -> Vec<Key> {
        self.lock().dep_groups.iter().flatten().cloned().collect()
    }

    /// Keys that depend on this entry, in registration order.
    pub fn reverse_deps(&self) -> Vec<Key> {
        self.lock().rdeps.clone()
    }

    /// How many times the current run was suspended on missing deps.
    pub fn restarts(&self) -> u32 {
        self.lock().restarts
    }

    /// Events recorded by the successful computation of this key.
    pub fn stored_events(&self) -> Vec<Event> {
        self.lock().events.clone()
    }

    /// Begin (or resume) computing this key. Dep groups and catch
    /// declarations reset at the start of each compute run. Returns false if
    /// the entry already reached a terminal state.
    pub(crate) fn mark_in_progress(&self) -> bool {
        let mut inner = self.lock();
        if inner.state.is_terminal() {
            return false;
        }
        inner.state = NodeState::InProgress;
        inner.dep_groups.clear();
        inner.dep_index.clear();
        inner.catches.clear();
        true
    }

    /// Record one dep group. Keys already requested earlier in this run keep
    /// their original group assignment and are dropped here.
    pub(crate) fn add_dep_group(&self, group: Vec<Key>) {
        let mut inner = self.lock();
        let fresh: Vec<Key> = group
            .into_iter()
            .filter(|key| inner.dep_index.insert(key.clone()))
            .collect();
        if !fresh.is_empty() {
            inner.dep_groups.push(fresh);
        }
    }

    /// Record the error kinds this key declared catchable for `child`.
    pub(crate) fn record_catch(&self, child: &Key, kinds: &[String]) {
        let mut inner = self.lock();
        let declared = inner.catches.entry(child.clone()).or_default();
        for kind in kinds {
            if !declared.contains(kind) {
                declared.push(kind.clone());
            }
        }
    }

    /// The error kinds declared catchable for `child` in the latest run.
    pub(crate) fn declared_catches(&self, child: &Key) -> Vec<String> {
        self.lock().catches.get(child).cloned().unwrap_or_default()
    }

    /// Register `parent` as a reverse dep and report whether this entry is
    /// already terminal. Both happen under one lock: a non-terminal entry is
    /// guaranteed to signal the parent at its terminal transition, a
    /// terminal one is guaranteed not to.
    pub(crate) fn add_reverse_dep(&self, parent: &Key) -> bool {
        let mut inner = self.lock();
        if inner.rdep_index.insert(parent.clone()) {
            inner.rdeps.push(parent.clone());
        }
        inner.state.is_terminal()
    }

    /// Suspend this entry awaiting `awaited` dep signals. Returns true if
    /// every awaited signal already arrived, in which case the caller must
    /// re-enqueue the key immediately.
    pub(crate) fn begin_suspension(&self, awaited: usize) -> bool {
        let mut inner = self.lock();
        inner.restarts += 1;
        if inner.signaled >= awaited {
            inner.pending = None;
            inner.signaled = 0;
            true
        } else {
            inner.pending = Some(awaited);
            false
        }
    }

    /// Record one terminal-dep signal. Returns true exactly when the signal
    /// completes the awaited set, flipping the entry from waiting to ready.
    pub(crate) fn signal_dep(&self) -> bool {
        let mut inner = self.lock();
        inner.signaled += 1;
        match inner.pending {
            Some(awaited) if inner.signaled >= awaited => {
                inner.pending = None;
                inner.signaled = 0;
                true
            }
            _ => false,
        }
    }

    /// Transition to done, storing the value and the events recorded by the
    /// successful computation. Returns false if already terminal.
    pub(crate) fn set_value(&self, value: Value, events: Vec<Event>) -> bool {
        let mut inner = self.lock();
        if inner.state.is_terminal() {
            return false;
        }
        inner.state = NodeState::Done;
        inner.value = Some(value);
        inner.events = events;
        true
    }

    /// Transition to errored. Events are never stored on this transition.
    /// Returns false if already terminal.
    pub(crate) fn set_error(&self, error: ErrorInfo) -> bool {
        let mut inner = self.lock();
        if inner.state.is_terminal() {
            return false;
        }
        inner.state = NodeState::Errored;
        inner.error = Some(error);
        true
    }
}
