// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use thiserror::Error;

use weft_core::retry::RetryableError;

/// Connection-layer errors.
///
/// Only `Transport` is transient: retry wraps it, and exhaustion is reported
/// as `ConnectionFailed`. The remaining variants are contract or input
/// violations and propagate on the first occurrence.
#[derive(Debug, Error)]
pub enum ConnError {
	/// A single transport-level failure (refused, reset, closed mid-operation).
	#[error("transport failure: {0}")]
	Transport(String),

	/// Transport retries exhausted for one operation.
	#[error("connection failed after {attempts} attempt(s): {message}")]
	ConnectionFailed { attempts: u32, message: String },

	/// Operation requires an established connection.
	#[error("not connected")]
	NotConnected,

	/// The peer sent something that does not decode as a protocol message.
	#[error("protocol error: {0}")]
	Protocol(String),

	/// The configured endpoint is not a usable URL.
	#[error("invalid endpoint: {0}")]
	Endpoint(String),
}

impl RetryableError for ConnError {
	fn is_retryable(&self) -> bool {
		matches!(self, ConnError::Transport(_))
	}
}
