// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Evaluator configuration.
//!
//! Configuration is typically loaded from a YAML file:
//!
//! ```yaml
//! parallelism: 64
//! keep_going: true
//! cycle_report_limit: 20
//! event_filter: "^build/"
//! ```
//!
//! Every field is optional and defaults to the evaluator's built-in
//! defaults. Validation rejects a zero worker pool and event filters that
//! are not valid regular expressions.

use crate::engine::{EvaluatorOptions, DEFAULT_CYCLE_REPORT_LIMIT, DEFAULT_PARALLELISM};
use crate::errors::ConfigError;
use crate::events::CollectingEventSink;
use serde::Deserialize;
use std::fs;
use std::path::Path;

fn default_parallelism() -> usize {
    DEFAULT_PARALLELISM
}

fn default_cycle_report_limit() -> usize {
    DEFAULT_CYCLE_REPORT_LIMIT
}

/// Configuration for one evaluator instance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EvaluatorConfig {
    /// Maximum number of concurrently running compute invocations.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,

    /// Continue past individual failures instead of failing fast.
    #[serde(default)]
    pub keep_going: bool,

    /// Cap on the cycles reported per requested root.
    #[serde(default = "default_cycle_report_limit")]
    pub cycle_report_limit: usize,

    /// Regex matched against event tags; non-matching tagged events are
    /// dropped at the sink.
    #[serde(default)]
    pub event_filter: Option<String>,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            parallelism: DEFAULT_PARALLELISM,
            keep_going: false,
            cycle_report_limit: DEFAULT_CYCLE_REPORT_LIMIT,
            event_filter: None,
        }
    }
}

impl EvaluatorConfig {
    /// Check the configuration for values the evaluator cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.parallelism == 0 {
            return Err(ConfigError::ZeroParallelism);
        }
        if let Some(pattern) = &self.event_filter {
            regex::Regex::new(pattern).map_err(|source| ConfigError::InvalidEventFilter {
                pattern: pattern.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// The evaluator options this configuration describes.
    pub fn options(&self) -> EvaluatorOptions {
        EvaluatorOptions {
            parallelism: self.parallelism,
            keep_going: self.keep_going,
            cycle_report_limit: self.cycle_report_limit,
        }
    }

    /// Build an event sink honoring the configured tag filter.
    pub fn event_sink(&self) -> Result<CollectingEventSink, ConfigError> {
        match &self.event_filter {
            Some(pattern) => CollectingEventSink::with_filter(pattern).map_err(|source| {
                ConfigError::InvalidEventFilter {
                    pattern: pattern.clone(),
                    source,
                }
            }),
            None => Ok(CollectingEventSink::new()),
        }
    }
}

/// Load and validate evaluator configuration from a YAML file.
pub fn load_config(path: impl AsRef<Path>) -> Result<EvaluatorConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let config: EvaluatorConfig = serde_yaml::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_the_engine() {
        let config = EvaluatorConfig::default();
        assert_eq!(config.parallelism, DEFAULT_PARALLELISM);
        assert!(!config.keep_going);
        assert_eq!(config.cycle_report_limit, DEFAULT_CYCLE_REPORT_LIMIT);
        assert!(config.event_filter.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_yaml_fills_in_defaults() {
        let config: EvaluatorConfig = serde_yaml::from_str("keep_going: true").expect("parses");
        assert!(config.keep_going);
        assert_eq!(config.parallelism, DEFAULT_PARALLELISM);
    }

    #[test]
    fn load_config_round_trips_a_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "parallelism: 8").expect("write");
        writeln!(file, "keep_going: true").expect("write");
        writeln!(file, "event_filter: \"^build/\"").expect("write");

        let config = load_config(file.path()).expect("loads");
        assert_eq!(config.parallelism, 8);
        assert!(config.keep_going);
        assert_eq!(config.event_filter.as_deref(), Some("^build/"));
        assert_eq!(config.options().parallelism, 8);
    }

    #[test]
    fn zero_parallelism_is_rejected() {
        let config: EvaluatorConfig = serde_yaml::from_str("parallelism: 0").expect("parses");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroParallelism)
        ));
    }

    #[test]
    fn invalid_event_filter_is_rejected() {
        let config: EvaluatorConfig =
            serde_yaml::from_str("event_filter: \"([unclosed\"").expect("parses");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidEventFilter { .. })
        ));
    }

    #[test]
    fn missing_file_reports_the_path() {
        let error = load_config("/definitely/not/here.yaml").expect_err("fails");
        assert!(error.to_string().contains("/definitely/not/here.yaml"));
    }
}
