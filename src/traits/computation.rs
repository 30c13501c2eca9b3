//! The compute-function abstraction.

use crate::engine::ComputeEnv;
use crate::errors::ComputeError;
use crate::graph::{Key, Value};
use async_trait::async_trait;

/// Why a compute invocation failed.
///
/// `Domain` carries a declared [`ComputeError`]: the key transitions to
/// errored and evaluation continues according to the failure policy.
/// `Unexpected` wraps anything else; the evaluator treats it as
/// unrecoverable and aborts with the requester chain in the message.
#[derive(Debug)]
pub enum ComputeFailure {
    Domain(ComputeError),
    Unexpected(anyhow::Error),
}

impl From<ComputeError> for ComputeFailure {
    fn from(error: ComputeError) -> Self {
        ComputeFailure::Domain(error)
    }
}

impl From<anyhow::Error> for ComputeFailure {
    fn from(error: anyhow::Error) -> Self {
        ComputeFailure::Unexpected(error)
    }
}

/// A pure function from key to value, declaring its dependencies at runtime
/// through the environment.
///
/// Contract:
/// - `Ok(Some(value))` completes the key.
/// - `Ok(None)` means "I need more deps; re-run me" and is only legal when
///   [`ComputeEnv::values_missing`] is true. The evaluator re-invokes the
///   function after every dep in its most recent request set reaches a
///   terminal state.
/// - `Err` fails the key (domain error) or the evaluation (unexpected).
///
/// Invocations must be deterministic with respect to dep values: re-runs
/// after a suspension are expected to re-request the same deps in the same
/// groups.
#[async_trait]
pub trait Computation: Send + Sync {
    async fn compute(&self, key: &Key, env: &mut ComputeEnv) -> Result<Option<Value>, ComputeFailure>;

    /// Optional tag stamped on events this key emits; the event sink matches
    /// its regex filter against it.
    fn extract_tag(&self, key: &Key) -> Option<String> {
        let _ = key;
        None
    }
}
