// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Post-scheduling error bubbling.
//!
//! After a fail-fast or catastrophic shutdown the scheduler leaves the
//! ancestors of the failed key unfinished. This single-threaded pass walks
//! from the failed key upward through reverse deps along one path toward a
//! requested root, assigning errors as it goes. A parent that declared the
//! child's error kind catchable gets one recovery retry: its compute runs
//! again with the error deliverable through the catch; the retry only
//! sticks if every other dep it needs is already built.

use crate::engine::env::ComputeEnv;
use crate::errors::{ComputeError, ErrorInfo};
use crate::graph::{Graph, Key, NodeEntry};
use crate::registry::ComputationRegistry;
use std::sync::Arc;

/// Walk the first-errored key's ancestry, erroring each parent in turn with
/// the shutdown exception and the inherited root causes.
pub(crate) async fn bubble_error(
    graph: &Arc<dyn Graph>,
    registry: &ComputationRegistry,
    origin: &Key,
    first_error: &ComputeError,
) {
    let mut current = origin.clone();
    loop {
        let entry = match graph.get(&current) {
            Some(entry) => entry,
            None => return,
        };
        let child_info = entry.error().unwrap_or_default();

        let parent = entry.reverse_deps().into_iter().find(|candidate| {
            graph
                .get(candidate)
                .map_or(false, |entry| !entry.is_terminal())
        });
        let parent = match parent {
            Some(parent) => parent,
            None => return,
        };
        let parent_entry = match graph.get(&parent) {
            Some(entry) => entry,
            None => return,
        };

        let declared = parent_entry.declared_catches(&current);
        let opted_in = child_info
            .exception
            .as_ref()
            .map_or(false, |exception| exception.matches_any(&declared));
        if opted_in && retry_with_recovery(graph, registry, &parent, &parent_entry).await {
            tracing::debug!(parent = %parent, child = %current, "parent recovered during bubbling");
            return;
        }

        parent_entry.set_error(ErrorInfo {
            exception: Some(first_error.clone()),
            root_causes: child_info.root_causes.clone(),
            cycles: Vec::new(),
            catastrophic: child_info.catastrophic,
        });
        current = parent;
    }
}

/// Re-run the parent's compute with the child error deliverable through its
/// declared catch. Returns true iff the retry produced a value with no
/// missing deps and no further unrecovered children.
async fn retry_with_recovery(
    graph: &Arc<dyn Graph>,
    registry: &ComputationRegistry,
    parent: &Key,
    parent_entry: &Arc<NodeEntry>,
) -> bool {
    let computation = match registry.get(parent.family()) {
        Some(computation) => computation,
        None => return false,
    };
    if !parent_entry.mark_in_progress() {
        return false;
    }
    let mut env = ComputeEnv::new(
        graph.clone(),
        parent.clone(),
        computation.extract_tag(parent),
    );
    let result = computation.compute(parent, &mut env).await;
    let outcome = env.into_outcome();
    for group in outcome.groups {
        parent_entry.add_dep_group(group);
    }
    for (child, kinds) in &outcome.catches {
        parent_entry.record_catch(child, kinds);
    }

    match result {
        Ok(Some(value)) if !outcome.missing && outcome.failed_children.is_empty() => {
            parent_entry.set_value(value, outcome.events)
        }
        _ => false,
    }
}
