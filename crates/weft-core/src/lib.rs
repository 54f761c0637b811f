// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

pub mod capability;
pub mod error;
pub mod llm;
pub mod protocol;
pub mod retry;

pub use capability::*;
pub use error::*;
pub use llm::*;
pub use protocol::*;
pub use retry::*;
