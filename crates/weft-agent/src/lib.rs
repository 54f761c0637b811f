// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Agent loops tying the connection to command execution.
//!
//! Two modes share the same queue machinery: [`GoalSession`] submits a goal
//! and collects its results; [`Relay`] serves a peer that drives the
//! conversation itself. Both feed tasks to a [`TaskQueue`], which executes
//! them one at a time and sends results back over the connection.

pub mod error;
pub mod goal;
pub mod link;
pub mod queue;
pub mod relay;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::AgentError;
pub use goal::{GoalReport, GoalSession, GoalState, GoalStatus};
pub use link::PeerLink;
pub use queue::{QueueConfig, ResultSink, TaskCompletion, TaskQueue};
pub use relay::Relay;
