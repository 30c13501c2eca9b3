// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Error descriptors attached to graph entries.

use crate::errors::ComputeError;
use crate::graph::Key;
use std::collections::BTreeSet;

/// One detected dependency cycle, as seen from a requested root.
///
/// `cycle` is the closed path (first key is the cycle entry point; the last
/// key depends back on the first, so first != last). `path_to_cycle` is the
/// chain of ancestors from a requested root down to the cycle entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleInfo {
    pub cycle: Vec<Key>,
    pub path_to_cycle: Vec<Key>,
}

/// Why an entry transitioned to the errored state.
///
/// `root_causes` holds the keys whose own failure (not inherited) produced
/// this error; it is an ordered set so identical outcomes report identical
/// causes. `exception` carries the triggering domain error where one exists;
/// cycle-only errors have none. An entry may report both cycles and an
/// exception when both were discovered.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorInfo {
    pub exception: Option<ComputeError>,
    pub root_causes: BTreeSet<Key>,
    pub cycles: Vec<CycleInfo>,
    pub catastrophic: bool,
}

impl ErrorInfo {
    /// Error info for a key whose own compute raised `error`.
    pub fn from_compute_error(key: &Key, error: ComputeError) -> Self {
        let mut root_causes = BTreeSet::new();
        root_causes.insert(key.clone());
        Self {
            catastrophic: error.is_catastrophic(),
            exception: Some(error),
            root_causes,
            cycles: Vec::new(),
        }
    }

    /// Error info inherited from failed children.
    pub fn propagated(exception: Option<ComputeError>, root_causes: BTreeSet<Key>) -> Self {
        Self {
            exception,
            root_causes,
            cycles: Vec::new(),
            catastrophic: false,
        }
    }

    /// Error info for a key on (or above) one or more dependency cycles.
    pub fn from_cycles(cycles: Vec<CycleInfo>) -> Self {
        Self {
            exception: None,
            root_causes: BTreeSet::new(),
            cycles,
            catastrophic: false,
        }
    }

    /// Whether any cycle was attributed to this entry.
    pub fn has_cycles(&self) -> bool {
        !self.cycles.is_empty()
    }
}
