// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for evaluator lifecycle events.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// An evaluation began for a set of requested roots.
pub struct EvaluationStarted {
    pub root_count: usize,
    pub parallelism: usize,
    pub keep_going: bool,
}

impl Display for EvaluationStarted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Starting evaluation of {} root(s): parallelism={}, keep_going={}",
            self.root_count, self.parallelism, self.keep_going
        )
    }
}

impl StructuredLog for EvaluationStarted {
    fn log(&self) {
        tracing::info!(
            root_count = self.root_count,
            parallelism = self.parallelism,
            keep_going = self.keep_going,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "evaluation",
            span_name = name,
            root_count = self.root_count,
            parallelism = self.parallelism,
            keep_going = self.keep_going,
        )
    }
}

/// An evaluation ran to quiescence and produced a result.
pub struct EvaluationCompleted {
    pub built_count: usize,
    pub error_count: usize,
    pub duration: Duration,
}

impl Display for EvaluationCompleted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Evaluation completed in {:?}: {} built, {} errored root(s)",
            self.duration, self.built_count, self.error_count
        )
    }
}

impl StructuredLog for EvaluationCompleted {
    fn log(&self) {
        tracing::info!(
            built_count = self.built_count,
            error_count = self.error_count,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "evaluation_completed",
            span_name = name,
            built_count = self.built_count,
            error_count = self.error_count,
        )
    }
}

/// An evaluation shut down before quiescence.
pub struct EvaluationAborted<'a> {
    pub reason: &'a str,
}

impl Display for EvaluationAborted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Evaluation aborted: {}", self.reason)
    }
}

impl StructuredLog for EvaluationAborted<'_> {
    fn log(&self) {
        tracing::warn!(reason = self.reason, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("evaluation_aborted", span_name = name, reason = self.reason)
    }
}

/// One node's compute raised a domain error.
pub struct NodeFailed {
    pub key: String,
    pub kind: String,
    pub catastrophic: bool,
}

impl Display for NodeFailed {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Node '{}' failed with {} error '{}'",
            self.key,
            if self.catastrophic {
                "catastrophic"
            } else {
                "domain"
            },
            self.kind
        )
    }
}

impl StructuredLog for NodeFailed {
    fn log(&self) {
        tracing::warn!(
            key = %self.key,
            kind = %self.kind,
            catastrophic = self.catastrophic,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "node_failed",
            span_name = name,
            key = %self.key,
            kind = %self.kind,
        )
    }
}

/// Cycle detection attributed cycles to a requested root.
pub struct CycleDetected {
    pub root: String,
    pub cycle_count: usize,
}

impl Display for CycleDetected {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Detected {} dependency cycle(s) reachable from '{}'",
            self.cycle_count, self.root
        )
    }
}

impl StructuredLog for CycleDetected {
    fn log(&self) {
        tracing::warn!(root = %self.root, cycle_count = self.cycle_count, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "cycle_detected",
            span_name = name,
            root = %self.root,
            cycle_count = self.cycle_count,
        )
    }
}
