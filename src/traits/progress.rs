// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observer callbacks for evaluation progress.

use crate::graph::{Key, Value};

/// How a key reached the progress receiver's `evaluated` callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationState {
    /// Computed in a single pass this evaluation.
    Built,
    /// Found already done when taken off the work queue.
    Clean,
    /// Computed this evaluation after at least one suspension.
    RestartedBuilt,
}

/// Receiver of scheduling callbacks. `enqueueing` fires exactly once per key
/// per evaluation, the first time the key is added to the work queue;
/// `evaluated` fires when a key completes successfully (or is found already
/// clean). Callbacks run on worker tasks and must not block for long.
pub trait ProgressReceiver: Send + Sync {
    fn enqueueing(&self, key: &Key) {
        let _ = key;
    }

    fn evaluated(&self, key: &Key, value: Option<&Value>, state: EvaluationState) {
        let _ = (key, value, state);
    }
}
