// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Serial task execution.
//!
//! Tasks arrive from the peer faster than they run; the queue buffers them
//! without bound and a single worker drains them in arrival order, one in
//! flight at a time. Cancellation targets only the in-flight task, pending
//! ones are untouched.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use weft_bridge::CommandDispatcher;
use weft_core::capability::CapabilityContext;
use weft_core::protocol::{FailureKind, TaskOutcome, TaskRequest, TaskResult};
use weft_conn::error::ConnError;

use crate::error::AgentError;

/// Where finished results go on their way back to the peer. Delivery failure
/// is logged and swallowed by the worker; execution continues.
#[async_trait]
pub trait ResultSink: Send + Sync {
	async fn deliver(&self, result: &TaskResult) -> Result<(), ConnError>;
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
	/// Hard ceiling on a single task. The worker abandons the task and
	/// records a timeout failure when it fires; `None` removes the bound.
	pub task_timeout: Option<Duration>,
}

impl Default for QueueConfig {
	fn default() -> Self {
		Self {
			task_timeout: Some(Duration::from_secs(300)),
		}
	}
}

/// A finished task, reported in completion order. Completion order equals
/// enqueue order because the worker is serial.
#[derive(Debug, Clone)]
pub struct TaskCompletion {
	pub seq: u64,
	pub result: TaskResult,
}

struct QueueItem {
	seq: u64,
	request: TaskRequest,
}

/// Unbounded FIFO with a single background worker.
pub struct TaskQueue {
	items_tx: mpsc::UnboundedSender<QueueItem>,
	current: Arc<Mutex<Option<CancellationToken>>>,
	shutdown: CancellationToken,
	seq: AtomicU64,
}

impl TaskQueue {
	/// Spawns the worker and returns the queue handle plus the completion
	/// stream. Dropping the receiver is fine; completions are then discarded.
	pub fn start(
		dispatcher: CommandDispatcher,
		sink: Arc<dyn ResultSink>,
		config: QueueConfig,
	) -> (Self, mpsc::UnboundedReceiver<TaskCompletion>) {
		let (items_tx, items_rx) = mpsc::unbounded_channel();
		let (completions_tx, completions_rx) = mpsc::unbounded_channel();
		let current = Arc::new(Mutex::new(None));
		let shutdown = CancellationToken::new();

		tokio::spawn(run_worker(
			items_rx,
			dispatcher,
			sink,
			completions_tx,
			current.clone(),
			config,
			shutdown.clone(),
		));

		let queue = Self {
			items_tx,
			current,
			shutdown,
			seq: AtomicU64::new(0),
		};

		(queue, completions_rx)
	}

	/// Appends a task. Never blocks; the queue has no depth limit.
	pub fn enqueue(&self, request: TaskRequest) -> Result<u64, AgentError> {
		let seq = self.seq.fetch_add(1, Ordering::Relaxed);

		debug!(seq, command = %request.command, "task enqueued");

		self.items_tx
			.send(QueueItem { seq, request })
			.map_err(|_| AgentError::WorkerStopped)?;

		Ok(seq)
	}

	/// Cancels the in-flight task, if any. Pending tasks still run; when the
	/// worker is idle this does nothing.
	pub fn cancel_current(&self) {
		let current = self.current.lock().unwrap();
		match current.as_ref() {
			Some(token) => {
				info!("cancelling in-flight task");
				token.cancel();
			}
			None => debug!("cancel requested with no task in flight"),
		}
	}

	/// Stops the worker. The in-flight task is cancelled rather than awaited.
	pub fn shutdown(&self) {
		self.cancel_current();
		self.shutdown.cancel();
	}
}

async fn run_worker(
	mut items_rx: mpsc::UnboundedReceiver<QueueItem>,
	dispatcher: CommandDispatcher,
	sink: Arc<dyn ResultSink>,
	completions_tx: mpsc::UnboundedSender<TaskCompletion>,
	current: Arc<Mutex<Option<CancellationToken>>>,
	config: QueueConfig,
	shutdown: CancellationToken,
) {
	loop {
		let item = tokio::select! {
			_ = shutdown.cancelled() => break,
			item = items_rx.recv() => match item {
				Some(item) => item,
				None => break,
			},
		};

		let seq = item.seq;
		let result = execute_one(&dispatcher, item, &config, &current).await;
		let cancelled = matches!(
			result.outcome,
			TaskOutcome::Failure {
				kind: FailureKind::Cancelled,
				..
			}
		);

		// A cancelled task produces no wire result; the peer initiated or was
		// told about the cancellation already.
		if !cancelled {
			if let Err(error) = sink.deliver(&result).await {
				warn!(
						seq,
						command = %result.command,
						error = %error,
						"failed to deliver task result"
				);
			}
		}

		let _ = completions_tx.send(TaskCompletion { seq, result });
	}

	info!("task worker stopped");
}

async fn execute_one(
	dispatcher: &CommandDispatcher,
	item: QueueItem,
	config: &QueueConfig,
	current: &Mutex<Option<CancellationToken>>,
) -> TaskResult {
	let token = CancellationToken::new();
	*current.lock().unwrap() = Some(token.clone());

	let command = item.request.command.clone();
	debug!(seq = item.seq, command = %command, "task started");

	// Run the dispatch on its own task so a panicking capability surfaces as
	// a JoinError here instead of killing the worker.
	let ctx = CapabilityContext::new(token.clone());
	let dispatcher = dispatcher.clone();
	let request = item.request;
	let mut handle = tokio::spawn(async move {
		dispatcher
			.dispatch(&request.command, &request.args, &ctx)
			.await
	});

	let result = tokio::select! {
		joined = &mut handle => match joined {
			Ok(result) => result,
			Err(join_error) if join_error.is_panic() => {
				error!(seq = item.seq, command = %command, "task panicked");
				TaskResult::failure(
					command.clone(),
					FailureKind::Capability,
					format!("task panicked: {command}"),
				)
			}
			Err(_) => {
				TaskResult::failure(command.clone(), FailureKind::Cancelled, "task aborted")
			}
		},
		_ = token.cancelled() => {
			handle.abort();
			info!(seq = item.seq, command = %command, "task cancelled");
			TaskResult::failure(command.clone(), FailureKind::Cancelled, "task cancelled")
		}
		_ = deadline(config.task_timeout) => {
			token.cancel();
			handle.abort();
			let secs = config.task_timeout.unwrap_or_default().as_secs();
			warn!(
					seq = item.seq,
					command = %command,
					timeout_secs = secs,
					"task timed out"
			);
			TaskResult::failure(
				command.clone(),
				FailureKind::Timeout,
				format!("task exceeded {secs}s"),
			)
		}
	};

	*current.lock().unwrap() = None;

	debug!(
			seq = item.seq,
			command = %command,
			success = result.outcome.is_success(),
			"task finished"
	);

	result
}

/// Sleeps the configured bound, or never resolves when the bound is off.
async fn deadline(timeout: Option<Duration>) {
	match timeout {
		Some(duration) => tokio::time::sleep(duration).await,
		None => std::future::pending().await,
	}
}
