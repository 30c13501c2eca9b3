// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Key and value model for the dependency graph.
//!
//! A [`Key`] names one computation: the `family` selects the registered
//! compute function, the `argument` is an opaque token the function
//! interprets. Keys are value-equal and hashable; two keys with the same
//! family and argument denote the same graph node. The `Ord` implementation
//! exists so that root-cause sets and cycle reports iterate in a stable
//! order regardless of scheduling.
//!
//! A [`Value`] is the opaque, immutable payload produced by a successful
//! computation. Payloads are raw bytes; text helpers are provided for the
//! common case.

use std::fmt;
use std::sync::Arc;

/// Identifies one computation in the graph.
///
/// # Examples
///
/// ```
/// use keyloom::graph::Key;
///
/// let a = Key::new("file", "src/lib.rs");
/// let b = Key::new("file", "src/lib.rs");
/// assert_eq!(a, b);
/// assert_eq!(a.to_string(), "file:src/lib.rs");
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key {
    family: Arc<str>,
    argument: Arc<str>,
}

impl Key {
    /// Create a key for the given function family and argument token.
    pub fn new(family: impl Into<Arc<str>>, argument: impl Into<Arc<str>>) -> Self {
        Self {
            family: family.into(),
            argument: argument.into(),
        }
    }

    /// The function family this key belongs to.
    pub fn family(&self) -> &str {
        &self.family
    }

    /// The opaque argument token.
    pub fn argument(&self) -> &str {
        &self.argument
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.argument.is_empty() {
            write!(f, "{}", self.family)
        } else {
            write!(f, "{}:{}", self.family, self.argument)
        }
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self)
    }
}

/// The opaque, immutable payload of a successfully computed key.
///
/// Values are cheaply cloneable (shared bytes). Equality is byte equality.
#[derive(Clone, PartialEq, Eq)]
pub struct Value(Arc<[u8]>);

impl Value {
    /// Wrap raw bytes as a value.
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self(bytes.into())
    }

    /// The raw payload bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The payload as UTF-8 text, if it is valid UTF-8.
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Self(Arc::from(text.as_bytes().to_vec()))
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Self(Arc::from(text.into_bytes()))
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Arc::from(bytes))
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_text() {
            Some(text) => write!(f, "Value({:?})", text),
            None => write!(f, "Value({} bytes)", self.0.len()),
        }
    }
}
