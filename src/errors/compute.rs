// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Domain errors raised by compute functions.

use crate::graph::Key;
use thiserror::Error;

/// A declared domain error raised by a compute function.
///
/// The `kind` is a runtime tag used for catch matching: a parent that
/// requested the failing child through
/// [`ComputeEnv::get_value_or_catch`](crate::engine::ComputeEnv::get_value_or_catch)
/// with a matching kind receives the error inside its own compute invocation
/// and may recover. Kinds that were not declared catchable propagate as
/// dependency errors instead.
///
/// A catastrophic error halts all further evaluation, even under keep-going.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ComputeError {
    kind: String,
    message: String,
    catastrophic: bool,
    cause: Option<Key>,
}

impl ComputeError {
    /// Create a domain error with the given kind tag and message.
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            catastrophic: false,
            cause: None,
        }
    }

    /// Create a catastrophic error. Catastrophic errors abort the whole
    /// evaluation regardless of the keep-going setting.
    pub fn catastrophic(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            catastrophic: true,
            ..Self::new(kind, message)
        }
    }

    /// Attach the child key whose failure caused this error.
    pub fn with_cause(mut self, cause: Key) -> Self {
        self.cause = Some(cause);
        self
    }

    /// The runtime kind tag used for catch matching.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Human-readable description.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether this error halts evaluation even under keep-going.
    pub fn is_catastrophic(&self) -> bool {
        self.catastrophic
    }

    /// The child key whose failure caused this error, if any.
    pub fn cause(&self) -> Option<&Key> {
        self.cause.as_ref()
    }

    /// Whether this error's kind is among the given catchable kinds.
    pub fn matches_any(&self, kinds: &[String]) -> bool {
        kinds.iter().any(|k| k == &self.kind)
    }
}
