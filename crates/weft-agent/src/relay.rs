// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Peer-driven mode: the remote planner opens goals on its own schedule and
//! streams tasks; this side just executes and answers. The loop runs until
//! the connection is lost for good or shutdown is requested.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use weft_conn::error::ConnError;
use weft_core::protocol::{Envelope, TaskRequest};

use crate::error::AgentError;
use crate::link::PeerLink;
use crate::queue::TaskQueue;

pub struct Relay {
	link: Arc<dyn PeerLink>,
	queue: TaskQueue,
	shutdown: CancellationToken,
}

impl Relay {
	pub fn new(link: Arc<dyn PeerLink>, queue: TaskQueue) -> Self {
		Self {
			link,
			queue,
			shutdown: CancellationToken::new(),
		}
	}

	/// Token that ends [`run`](Self::run); hand it to a signal handler.
	pub fn shutdown_token(&self) -> CancellationToken {
		self.shutdown.clone()
	}

	/// Connects and serves the peer until shutdown or connection loss. Task
	/// execution and result delivery happen on the queue worker; this loop
	/// only routes inbound messages.
	pub async fn run(&self) -> Result<(), AgentError> {
		self.link.ensure_connected().await?;
		info!("relay ready");

		loop {
			tokio::select! {
				_ = self.shutdown.cancelled() => {
					info!("relay shutting down");
					self.queue.shutdown();
					return Ok(());
				}
				received = self.link.receive() => match received {
					Ok(Envelope::Task { command, args }) => {
						let request = TaskRequest { command, args };
						if self.queue.enqueue(request).is_err() {
							warn!("task worker stopped; relay exiting");
							return Err(AgentError::WorkerStopped);
						}
					}
					Ok(Envelope::Cancel) => {
						info!("peer requested cancellation");
						self.queue.cancel_current();
					}
					Ok(other) => {
						debug!(kind = other.kind(), "ignoring message in relay mode");
					}
					Err(ConnError::Protocol(error)) => {
						warn!(error = %error, "dropping malformed message");
					}
					Err(error) => {
						warn!(error = %error, "connection lost; relay exiting");
						self.queue.shutdown();
						return Err(error.into());
					}
				},
			}
		}
	}
}
