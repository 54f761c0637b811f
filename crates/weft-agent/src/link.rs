// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Seam between the agent loops and the connection.

use async_trait::async_trait;

use weft_conn::error::ConnError;
use weft_conn::manager::{ConnectionManager, ConnectionState};
use weft_core::protocol::{Envelope, TaskResult};

use crate::queue::ResultSink;

/// The envelope-level operations the goal session and relay need. Implemented
/// by [`ConnectionManager`]; tests substitute channel-backed fakes.
#[async_trait]
pub trait PeerLink: Send + Sync {
	/// Establishes the connection unless it is already up.
	async fn ensure_connected(&self) -> Result<(), ConnError>;

	async fn send(&self, envelope: &Envelope) -> Result<(), ConnError>;

	async fn receive(&self) -> Result<Envelope, ConnError>;
}

#[async_trait]
impl PeerLink for ConnectionManager {
	async fn ensure_connected(&self) -> Result<(), ConnError> {
		if self.state() == ConnectionState::Connected {
			return Ok(());
		}
		self.connect().await
	}

	async fn send(&self, envelope: &Envelope) -> Result<(), ConnError> {
		ConnectionManager::send(self, envelope).await
	}

	async fn receive(&self) -> Result<Envelope, ConnError> {
		ConnectionManager::receive(self).await
	}
}

#[async_trait]
impl ResultSink for ConnectionManager {
	async fn deliver(&self, result: &TaskResult) -> Result<(), ConnError> {
		ConnectionManager::send(self, &result.to_envelope()).await
	}
}
