// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Command execution against editor capabilities.
//!
//! [`CommandDispatcher`] maps task commands onto an injected
//! [`EditorCapabilities`] implementation; [`WorkspaceCapabilities`] backs
//! that surface with a directory tree, and [`AssistedCapabilities`] layers a
//! chat backend over it for the generation-flavored commands.

pub mod assist;
pub mod capabilities;
pub mod dispatch;
pub mod workspace;

pub use assist::AssistedCapabilities;
pub use capabilities::{CapabilityResult, EditorCapabilities};
pub use dispatch::CommandDispatcher;
pub use workspace::WorkspaceCapabilities;
