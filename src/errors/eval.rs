// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Top-level evaluation failures.

use crate::errors::ComputeError;
use crate::graph::Key;
use thiserror::Error;

/// Failures surfaced by the evaluator itself, as opposed to errors recorded
/// on individual entries.
///
/// `Unrecoverable` and `Cancelled` abort the evaluation and are returned as
/// `Err` from [`ParallelEvaluator::evaluate`](crate::engine::ParallelEvaluator::evaluate);
/// they are never stored on an entry. `NodeFailed` and `Catastrophic` are the
/// top-level exception carried by the evaluation result when fail-fast or a
/// catastrophic error fired.
#[derive(Debug, Error)]
pub enum EvalError {
    /// A compute function raised an unclassified error. Always fatal.
    #[error("Unrecoverable error while evaluating node '{key}' (requested by nodes '{requested_by}'): {source}")]
    Unrecoverable {
        key: Key,
        requested_by: String,
        #[source]
        source: anyhow::Error,
    },

    /// The first domain error observed under fail-fast.
    #[error("error while evaluating node '{key}': {source}")]
    NodeFailed {
        key: Key,
        #[source]
        source: ComputeError,
    },

    /// A compute function raised a marked-catastrophic error.
    #[error("catastrophic error while evaluating node '{key}': {source}")]
    Catastrophic {
        key: Key,
        #[source]
        source: ComputeError,
    },

    /// External cancellation was observed by the workers.
    #[error("evaluation was cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecoverable_message_names_node_and_requesters() {
        let err = EvalError::Unrecoverable {
            key: Key::new("node", "a"),
            requested_by: "node:top".to_string(),
            source: anyhow::anyhow!("index out of bounds"),
        };
        let message = err.to_string();
        assert!(message.contains("Unrecoverable error while evaluating node 'node:a'"));
        assert!(message.contains("requested by nodes 'node:top'"));
        assert!(message.contains("index out of bounds"));
    }

    #[test]
    fn cancelled_message_is_stable() {
        assert_eq!(EvalError::Cancelled.to_string(), "evaluation was cancelled");
    }
}
