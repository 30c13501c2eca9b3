// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod entry;
mod key;
mod observer;
mod store;

pub use entry::{NodeEntry, NodeState};
pub use key::{Key, Value};
pub use observer::{GraphObserver, GraphOp, HookPhase};
pub use store::{Graph, InMemoryGraph};
