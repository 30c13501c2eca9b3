// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod bubbling;
mod cycles;
mod env;
mod evaluator;
mod result;
mod work_queue;


pub use env::ComputeEnv;
pub use evaluator::{
    EvaluatorOptions, ParallelEvaluator, DEFAULT_CYCLE_REPORT_LIMIT, DEFAULT_PARALLELISM,
};
pub use result::EvaluationResult;
