// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

pub mod error;
pub mod history;
pub mod model;

pub use error::*;
pub use history::*;
pub use model::*;
