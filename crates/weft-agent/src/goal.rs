// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Goal lifecycle: send one goal, collect the result stream.
//!
//! One goal at a time. The session sends `goal`, feeds the peer's `task`
//! messages into the queue, and finishes on `complete` once every enqueued
//! task has reported. Cancellation and connection failure both end the goal
//! early with whatever results already exist; partial progress is returned,
//! never dropped.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use weft_conn::error::ConnError;
use weft_core::protocol::{Envelope, FailureKind, TaskOutcome, TaskRequest, TaskResult};

use crate::error::AgentError;
use crate::link::PeerLink;
use crate::queue::{TaskCompletion, TaskQueue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalState {
	Idle,
	/// Goal message is on its way to the peer.
	Sent,
	/// Tasks and results are streaming.
	Collecting,
	Completed,
	Cancelled,
	Failed,
}

impl fmt::Display for GoalState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let state = match self {
			GoalState::Idle => "idle",
			GoalState::Sent => "sent",
			GoalState::Collecting => "collecting",
			GoalState::Completed => "completed",
			GoalState::Cancelled => "cancelled",
			GoalState::Failed => "failed",
		};
		write!(f, "{state}")
	}
}

/// How a goal ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalStatus {
	Completed,
	Cancelled,
	Failed,
}

/// Everything a finished goal produced, in task arrival order.
#[derive(Debug)]
pub struct GoalReport {
	pub status: GoalStatus,
	pub results: Vec<TaskResult>,
	pub failure: Option<String>,
}

/// Drives one goal at a time against a connected peer.
pub struct GoalSession {
	link: Arc<dyn PeerLink>,
	queue: TaskQueue,
	completions: AsyncMutex<mpsc::UnboundedReceiver<TaskCompletion>>,
	state_tx: watch::Sender<GoalState>,
	cancel_flag: Mutex<CancellationToken>,
	active: AsyncMutex<()>,
}

/// How the collecting loop ended.
enum CollectEnd {
	Complete,
	Cancelled,
	Failed(String),
}

impl GoalSession {
	pub fn new(
		link: Arc<dyn PeerLink>,
		queue: TaskQueue,
		completions: mpsc::UnboundedReceiver<TaskCompletion>,
	) -> Self {
		let (state_tx, _) = watch::channel(GoalState::Idle);
		Self {
			link,
			queue,
			completions: AsyncMutex::new(completions),
			state_tx,
			cancel_flag: Mutex::new(CancellationToken::new()),
			active: AsyncMutex::new(()),
		}
	}

	pub fn state(&self) -> GoalState {
		*self.state_tx.borrow()
	}

	pub fn subscribe_state(&self) -> watch::Receiver<GoalState> {
		self.state_tx.subscribe()
	}

	fn transition(&self, next: GoalState) {
		let previous = self.state_tx.send_replace(next);
		if previous != next {
			info!(from = %previous, to = %next, "goal state changed");
		}
	}

	/// Submits a goal and runs it to a terminal state. Connects first if the
	/// link is down. Errors only when another goal is already in flight;
	/// runtime failures come back inside the report.
	pub async fn run(&self, content: &str) -> Result<GoalReport, AgentError> {
		let _guard = self
			.active
			.try_lock()
			.map_err(|_| AgentError::GoalActive)?;

		let cancel = CancellationToken::new();
		*self.cancel_flag.lock().unwrap() = cancel.clone();

		self.transition(GoalState::Sent);

		if let Err(error) = self.link.ensure_connected().await {
			warn!(error = %error, "could not reach peer for goal");
			return Ok(self.finish(GoalStatus::Failed, Vec::new(), Some(error.to_string())));
		}

		if let Err(error) = self.link.send(&Envelope::goal(content)).await {
			warn!(error = %error, "failed to send goal");
			return Ok(self.finish(GoalStatus::Failed, Vec::new(), Some(error.to_string())));
		}

		info!(goal = content, "goal submitted");
		self.transition(GoalState::Collecting);

		let mut completions = self.completions.lock().await;
		let mut goal_seqs: HashSet<u64> = HashSet::new();
		let mut results: Vec<TaskResult> = Vec::new();

		// Receive until the peer signals completion. Task execution runs
		// behind the queue; completions are drained afterwards.
		let end = loop {
			tokio::select! {
				_ = cancel.cancelled() => break CollectEnd::Cancelled,
				received = self.link.receive() => match received {
					Ok(Envelope::Task { command, args }) => {
						let request = TaskRequest { command, args };
						match self.queue.enqueue(request) {
							Ok(seq) => {
								goal_seqs.insert(seq);
							}
							Err(error) => break CollectEnd::Failed(error.to_string()),
						}
					}
					Ok(Envelope::Complete) => break CollectEnd::Complete,
					Ok(other) => {
						debug!(kind = other.kind(), "ignoring message while collecting");
					}
					// A malformed message is dropped; the stream continues.
					Err(ConnError::Protocol(error)) => {
						warn!(error = %error, "dropping malformed message");
					}
					Err(error) => break CollectEnd::Failed(error.to_string()),
				},
			}
		};

		match end {
			CollectEnd::Complete => {
				// The final task may still be executing; every enqueued task
				// reports exactly once.
				while results.len() < goal_seqs.len() {
					let completion = tokio::select! {
						_ = cancel.cancelled() => {
							drain_ready(&mut completions, &goal_seqs, &mut results);
							return Ok(self.finish(GoalStatus::Cancelled, results, None));
						}
						completion = completions.recv() => completion,
					};

					match completion {
						Some(c) if !goal_seqs.contains(&c.seq) => {
							debug!(seq = c.seq, "discarding completion from an earlier goal");
						}
						Some(c) if is_cancelled(&c.result) => {
							drain_ready(&mut completions, &goal_seqs, &mut results);
							return Ok(self.finish(GoalStatus::Cancelled, results, None));
						}
						Some(c) => results.push(c.result),
						None => {
							return Ok(self.finish(
								GoalStatus::Failed,
								results,
								Some("task worker stopped".to_string()),
							));
						}
					}
				}

				Ok(self.finish(GoalStatus::Completed, results, None))
			}
			CollectEnd::Cancelled => {
				drain_ready(&mut completions, &goal_seqs, &mut results);
				Ok(self.finish(GoalStatus::Cancelled, results, None))
			}
			CollectEnd::Failed(reason) => {
				drain_ready(&mut completions, &goal_seqs, &mut results);
				Ok(self.finish(GoalStatus::Failed, results, Some(reason)))
			}
		}
	}

	/// Cancels the in-flight goal: tells the peer, aborts the current task,
	/// and wakes the collecting loop. Errors with [`AgentError::InvalidState`]
	/// when no goal is active.
	pub async fn cancel(&self) -> Result<(), AgentError> {
		let state = self.state();
		if !matches!(state, GoalState::Sent | GoalState::Collecting) {
			return Err(AgentError::InvalidState(state));
		}

		info!("cancelling goal");

		if let Err(error) = self.link.send(&Envelope::Cancel).await {
			warn!(error = %error, "failed to send cancel to peer");
		}

		self.queue.cancel_current();
		self.cancel_flag.lock().unwrap().cancel();
		Ok(())
	}

	fn finish(
		&self,
		status: GoalStatus,
		results: Vec<TaskResult>,
		failure: Option<String>,
	) -> GoalReport {
		let state = match status {
			GoalStatus::Completed => GoalState::Completed,
			GoalStatus::Cancelled => GoalState::Cancelled,
			GoalStatus::Failed => GoalState::Failed,
		};
		self.transition(state);

		info!(
				status = %state,
				results = results.len(),
				"goal finished"
		);

		GoalReport {
			status,
			results,
			failure,
		}
	}
}

fn is_cancelled(result: &TaskResult) -> bool {
	matches!(
		result.outcome,
		TaskOutcome::Failure {
			kind: FailureKind::Cancelled,
			..
		}
	)
}

/// Collects already-finished results without waiting; used on the cancel and
/// failure paths so partial progress survives.
fn drain_ready(
	completions: &mut mpsc::UnboundedReceiver<TaskCompletion>,
	goal_seqs: &HashSet<u64>,
	results: &mut Vec<TaskResult>,
) {
	while let Ok(completion) = completions.try_recv() {
		if goal_seqs.contains(&completion.seq) && !is_cancelled(&completion.result) {
			results.push(completion.result);
		}
	}
}
