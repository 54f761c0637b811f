// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use thiserror::Error;

use weft_conn::error::ConnError;

use crate::goal::GoalState;

#[derive(Debug, Error)]
pub enum AgentError {
	/// The queue worker has stopped; nothing can be enqueued.
	#[error("task worker stopped")]
	WorkerStopped,

	/// A goal was submitted while another one is still in flight.
	#[error("a goal is already active")]
	GoalActive,

	/// Cancel was requested outside an active goal.
	#[error("no goal to cancel in state {0}")]
	InvalidState(GoalState),

	#[error(transparent)]
	Connection(#[from] ConnError),
}
