// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! Each message type implements `Display` for human-readable output plus
//! [`StructuredLog`] for machine-readable fields and span creation. Keeping
//! the messages in one place avoids magic strings in the engine and keeps
//! log output consistent.

pub mod engine;

use tracing::Span;

/// Messages that support structured logging and tracing spans.
pub trait StructuredLog {
    /// Emit a log event carrying both the human-readable message and the
    /// structured fields. The level is chosen by the message's meaning.
    fn log(&self);

    /// Create a span with this message's fields as attributes.
    fn span(&self, name: &str) -> Span;
}
