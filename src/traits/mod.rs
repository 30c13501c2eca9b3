// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod computation;
pub mod progress;

pub use computation::{Computation, ComputeFailure};
pub use progress::{EvaluationState, ProgressReceiver};
