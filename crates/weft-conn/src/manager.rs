// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Connection lifecycle and the retrying send/receive primitives.
//!
//! One manager owns one outbound connection. Transport-class failures are
//! retried under the configured [`RetryConfig`]; contract violations
//! (`NotConnected`) and malformed input (`Protocol`) are surfaced on the
//! first occurrence. State transitions are published on a watch channel so
//! UIs, logs, and tests can observe them without polling; the transitions
//! themselves never raise.

use std::fmt;

use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use weft_core::protocol::Envelope;
use weft_core::retry::{retry, RetryConfig};

use crate::error::ConnError;
use crate::transport::{Dialer, MessageSink, MessageStream};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
	Disconnected,
	Connecting,
	Connected,
	Failed,
}

impl fmt::Display for ConnectionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			ConnectionState::Disconnected => "disconnected",
			ConnectionState::Connecting => "connecting",
			ConnectionState::Connected => "connected",
			ConnectionState::Failed => "failed",
		};
		write!(f, "{s}")
	}
}

/// Owns the single outbound connection to the planner peer.
///
/// The write and read halves sit behind separate async locks, so one task may
/// block in [`receive`](Self::receive) while another sends — the cancel
/// handshake depends on exactly that.
pub struct ConnectionManager {
	endpoint: String,
	dialer: Box<dyn Dialer>,
	retry_config: RetryConfig,
	writer: Mutex<Option<Box<dyn MessageSink>>>,
	reader: Mutex<Option<Box<dyn MessageStream>>>,
	state_tx: watch::Sender<ConnectionState>,
}

impl ConnectionManager {
	pub fn new(endpoint: impl Into<String>, dialer: Box<dyn Dialer>, retry_config: RetryConfig) -> Self {
		let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
		Self {
			endpoint: endpoint.into(),
			dialer,
			retry_config,
			writer: Mutex::new(None),
			reader: Mutex::new(None),
			state_tx,
		}
	}

	pub fn endpoint(&self) -> &str {
		&self.endpoint
	}

	pub fn state(&self) -> ConnectionState {
		*self.state_tx.borrow()
	}

	/// Watch connection-state transitions; the receiver starts at the
	/// current state.
	pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
		self.state_tx.subscribe()
	}

	fn transition(&self, next: ConnectionState) {
		let prev = self.state_tx.send_replace(next);
		if prev != next {
			info!(from = %prev, to = %next, "connection state changed");
		}
	}

	/// Establish the connection, retrying transport failures.
	///
	/// Exhaustion reports state `Failed` and raises `ConnectionFailed`; a
	/// later call re-enters `Connecting` from any state.
	pub async fn connect(&self) -> Result<(), ConnError> {
		self.transition(ConnectionState::Connecting);

		let dialed = retry(&self.retry_config, || async move {
			self.dialer.dial(&self.endpoint).await
		})
		.await;

		match dialed {
			Ok((sink, stream)) => {
				*self.writer.lock().await = Some(sink);
				*self.reader.lock().await = Some(stream);
				self.transition(ConnectionState::Connected);
				Ok(())
			}
			Err(err) => {
				let err = self.after_exhaustion(err);
				self.transition(ConnectionState::Failed);
				Err(err)
			}
		}
	}

	/// Serialize one envelope and write it, retrying transport failures.
	pub async fn send(&self, envelope: &Envelope) -> Result<(), ConnError> {
		if self.state() != ConnectionState::Connected {
			return Err(ConnError::NotConnected);
		}

		let text =
			serde_json::to_string(envelope).map_err(|e| ConnError::Protocol(e.to_string()))?;

		let sent = retry(&self.retry_config, || {
			let text = text.clone();
			async move {
				let mut guard = self.writer.lock().await;
				let sink = guard.as_mut().ok_or(ConnError::NotConnected)?;
				sink.send_text(text).await
			}
		})
		.await;

		match sent {
			Ok(()) => {
				debug!(kind = envelope.kind(), "message sent");
				Ok(())
			}
			Err(err) => {
				let err = self.after_exhaustion(err);
				if matches!(err, ConnError::ConnectionFailed { .. }) {
					self.transition(ConnectionState::Disconnected);
				}
				Err(err)
			}
		}
	}

	/// Block until one protocol message arrives.
	///
	/// Undecodable text raises `Protocol` without retry and without tearing
	/// the connection down; transport failures are retried like
	/// [`send`](Self::send).
	pub async fn receive(&self) -> Result<Envelope, ConnError> {
		if self.state() != ConnectionState::Connected {
			return Err(ConnError::NotConnected);
		}

		let received = retry(&self.retry_config, || async move {
			let mut guard = self.reader.lock().await;
			let stream = guard.as_mut().ok_or(ConnError::NotConnected)?;
			match stream.next_text().await? {
				Some(text) => serde_json::from_str::<Envelope>(&text)
					.map_err(|e| ConnError::Protocol(format!("undecodable message: {e}"))),
				None => Err(ConnError::Transport("closed by peer".to_string())),
			}
		})
		.await;

		match received {
			Ok(envelope) => {
				debug!(kind = envelope.kind(), "message received");
				Ok(envelope)
			}
			Err(err) => {
				let err = self.after_exhaustion(err);
				if matches!(err, ConnError::ConnectionFailed { .. }) {
					self.transition(ConnectionState::Disconnected);
				}
				Err(err)
			}
		}
	}

	/// Drop the transport; state becomes `Disconnected`. Idempotent.
	pub async fn close(&self) {
		if let Some(mut sink) = self.writer.lock().await.take() {
			if let Err(e) = sink.close().await {
				warn!(error = %e, "close handshake failed");
			}
		}
		*self.reader.lock().await = None;
		self.transition(ConnectionState::Disconnected);
	}

	/// Retry has already run its course; fold the terminal transport error
	/// into the operation-level failure.
	fn after_exhaustion(&self, err: ConnError) -> ConnError {
		match err {
			ConnError::Transport(message) => ConnError::ConnectionFailed {
				attempts: self.retry_config.max_attempts.max(1),
				message,
			},
			other => other,
		}
	}
}
