// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The shared key-to-entry store.
//!
//! The store supports concurrent lookup and insertion; all per-entry
//! mutation goes through [`NodeEntry`]'s own lock. The [`Graph`] trait is
//! the seam the evaluator works against, so tests and embedders can wrap
//! the store or substitute their own.

use crate::graph::{GraphObserver, GraphOp, HookPhase, Key, NodeEntry};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Operations the evaluator needs from a graph implementation.
#[async_trait]
pub trait Graph: Send + Sync {
    /// Look up or create the entry for `key`.
    async fn create_if_absent(&self, key: &Key) -> Arc<NodeEntry>;

    /// Look up the entry for `key`, if it exists.
    fn get(&self, key: &Key) -> Option<Arc<NodeEntry>>;

    /// Register `parent` as a reverse dep of `child`. Returns whether the
    /// child is already terminal: a terminal child will not signal, a
    /// non-terminal one is now guaranteed to.
    async fn add_reverse_dep(&self, child: &Key, parent: &Key) -> bool;

    /// Deliver a terminal-dep signal from `child` to `parent`. Returns true
    /// exactly when the signal flips the parent from waiting to ready.
    async fn signal(&self, parent: &Key, child: &Key) -> bool;
}

/// In-memory graph store: a concurrent map of keys to entries, with
/// optional observer hooks around entry operations.
pub struct InMemoryGraph {
    nodes: RwLock<HashMap<Key, Arc<NodeEntry>>>,
    observer: Option<Arc<dyn GraphObserver>>,
}

impl InMemoryGraph {
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
            observer: None,
        }
    }

    /// Store whose entry operations fire the given observer's hooks.
    pub fn with_observer(observer: Arc<dyn GraphObserver>) -> Self {
        Self {
            observer: Some(observer),
            ..Self::new()
        }
    }

    /// Number of entries in the store.
    pub fn len(&self) -> usize {
        self.nodes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn hook(&self, key: &Key, op: GraphOp, phase: HookPhase, other: Option<&Key>) {
        if let Some(observer) = &self.observer {
            observer.on_op(key, op, phase, other).await;
        }
    }
}

impl Default for InMemoryGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Graph for InMemoryGraph {
    async fn create_if_absent(&self, key: &Key) -> Arc<NodeEntry> {
        self.hook(key, GraphOp::CreateIfAbsent, HookPhase::Before, None)
            .await;
        let entry = {
            let existing = self
                .nodes
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(key)
                .cloned();
            match existing {
                Some(entry) => entry,
                None => self
                    .nodes
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(NodeEntry::new()))
                    .clone(),
            }
        };
        self.hook(key, GraphOp::CreateIfAbsent, HookPhase::After, None)
            .await;
        entry
    }

    fn get(&self, key: &Key) -> Option<Arc<NodeEntry>> {
        self.nodes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    async fn add_reverse_dep(&self, child: &Key, parent: &Key) -> bool {
        self.hook(child, GraphOp::AddReverseDep, HookPhase::Before, Some(parent))
            .await;
        let entry = self.create_if_absent(child).await;
        let terminal = entry.add_reverse_dep(parent);
        self.hook(child, GraphOp::AddReverseDep, HookPhase::After, Some(parent))
            .await;
        terminal
    }

    async fn signal(&self, parent: &Key, child: &Key) -> bool {
        self.hook(parent, GraphOp::Signal, HookPhase::Before, Some(child))
            .await;
        let ready = match self.get(parent) {
            Some(entry) => entry.signal_dep(),
            None => false,
        };
        self.hook(parent, GraphOp::Signal, HookPhase::After, Some(child))
            .await;
        ready
    }
}
