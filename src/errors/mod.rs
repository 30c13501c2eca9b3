// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod compute;
mod config;
mod eval;
mod info;

pub use compute::ComputeError;
pub use config::ConfigError;
pub use eval::EvalError;
pub use info::{CycleInfo, ErrorInfo};
