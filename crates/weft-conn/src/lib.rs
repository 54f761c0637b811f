// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

pub mod error;
pub mod manager;
pub mod transport;

pub use error::*;
pub use manager::*;
pub use transport::*;
