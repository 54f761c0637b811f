// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

pub mod anthropic;
pub mod openai;
pub mod planner;

pub use anthropic::*;
pub use openai::*;
pub use planner::*;
