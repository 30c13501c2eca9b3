// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The family-to-computation registry.
//!
//! Immutable once handed to the evaluator: build it up front, wrap it in an
//! `Arc`, and share it across evaluations.

use crate::traits::Computation;
use std::collections::HashMap;
use std::sync::Arc;

/// Static mapping from key family to its compute function.
pub struct ComputationRegistry {
    computations: HashMap<String, Arc<dyn Computation>>,
}

impl ComputationRegistry {
    pub fn new() -> Self {
        Self {
            computations: HashMap::new(),
        }
    }

    /// Register the computation for a family, replacing any previous one.
    pub fn register(
        mut self,
        family: impl Into<String>,
        computation: Arc<dyn Computation>,
    ) -> Self {
        self.computations.insert(family.into(), computation);
        self
    }

    /// The computation for a family, if registered.
    pub fn get(&self, family: &str) -> Option<Arc<dyn Computation>> {
        self.computations.get(family).cloned()
    }

    pub fn contains(&self, family: &str) -> bool {
        self.computations.contains_key(family)
    }

    pub fn len(&self) -> usize {
        self.computations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.computations.is_empty()
    }
}

impl Default for ComputationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ComputeEnv;
    use crate::graph::{Key, Value};
    use crate::traits::ComputeFailure;
    use async_trait::async_trait;

    struct Constant(&'static str);

    #[async_trait]
    impl Computation for Constant {
        async fn compute(
            &self,
            _key: &Key,
            _env: &mut ComputeEnv,
        ) -> Result<Option<Value>, ComputeFailure> {
            Ok(Some(Value::from(self.0)))
        }
    }

    #[test]
    fn lookup_by_family() {
        let registry = ComputationRegistry::new()
            .register("leaf", Arc::new(Constant("x")))
            .register("branch", Arc::new(Constant("y")));

        assert!(registry.contains("leaf"));
        assert!(registry.get("branch").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn later_registration_wins() {
        let registry = ComputationRegistry::new()
            .register("leaf", Arc::new(Constant("old")))
            .register("leaf", Arc::new(Constant("new")));
        assert_eq!(registry.len(), 1);
    }
}
