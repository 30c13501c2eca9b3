// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observer hooks for deterministic graph-store testing.

use crate::graph::Key;
use async_trait::async_trait;

/// Entry operation an observer can intercept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphOp {
    CreateIfAbsent,
    AddReverseDep,
    Signal,
}

/// Whether the hook fires before or after the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    Before,
    After,
}

/// Listener invoked around graph-store operations.
///
/// Hooks fire before and after each intercepted operation and may block for
/// an arbitrary amount of time; the evaluator tolerates blocking here, which
/// is what makes race-ordering tests deterministic. `other` carries the
/// related key: the parent being registered for `AddReverseDep`, the
/// signaling child for `Signal`.
#[async_trait]
pub trait GraphObserver: Send + Sync {
    async fn on_op(&self, key: &Key, op: GraphOp, phase: HookPhase, other: Option<&Key>);
}
