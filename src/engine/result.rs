// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The structure an evaluation hands back.

use crate::errors::{ErrorInfo, EvalError};
use crate::graph::{Key, Value};
use std::collections::HashMap;

/// Maps each requested root to a value, an error, or neither.
///
/// A root absent from both maps was not attempted; that only happens under
/// fail-fast, when shutdown preempted it. `top_level_error` carries the
/// exception that triggered a fail-fast or catastrophic shutdown.
#[derive(Debug, Default)]
pub struct EvaluationResult {
    values: HashMap<Key, Value>,
    errors: HashMap<Key, ErrorInfo>,
    top_level_error: Option<EvalError>,
}

impl EvaluationResult {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert_value(&mut self, key: Key, value: Value) {
        self.values.insert(key, value);
    }

    pub(crate) fn insert_error(&mut self, key: Key, error: ErrorInfo) {
        self.errors.insert(key, error);
    }

    pub(crate) fn set_top_level_error(&mut self, error: EvalError) {
        self.top_level_error = Some(error);
    }

    /// The value computed for `key`, if it completed successfully.
    pub fn get(&self, key: &Key) -> Option<&Value> {
        self.values.get(key)
    }

    /// The error recorded for `key`, if it failed or sat on a cycle.
    pub fn error(&self, key: &Key) -> Option<&ErrorInfo> {
        self.errors.get(key)
    }

    /// True iff any root failed or a shutdown exception was recorded.
    pub fn has_error(&self) -> bool {
        !self.errors.is_empty() || self.top_level_error.is_some()
    }

    /// The exception that triggered a fail-fast or catastrophic shutdown.
    pub fn top_level_error(&self) -> Option<&EvalError> {
        self.top_level_error.as_ref()
    }

    /// All successfully computed roots.
    pub fn value_map(&self) -> &HashMap<Key, Value> {
        &self.values
    }

    /// All failed roots.
    pub fn error_map(&self) -> &HashMap<Key, ErrorInfo> {
        &self.errors
    }
}
