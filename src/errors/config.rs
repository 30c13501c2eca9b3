// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors raised while loading or validating evaluator configuration.

use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid YAML for the expected shape.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Parallelism must allow at least one worker.
    #[error("parallelism must be at least 1")]
    ZeroParallelism,

    /// The event filter is not a valid regular expression.
    #[error("invalid event filter '{pattern}': {source}")]
    InvalidEventFilter {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
