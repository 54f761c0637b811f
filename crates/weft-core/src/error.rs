// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Error types shared across the workspace.

use thiserror::Error;

use crate::retry::RetryableError;

/// Failure raised by a capability implementation.
///
/// The dispatcher catches every variant at its boundary and folds it into a
/// task failure; none of these ever cross the worker loop.
#[derive(Debug, Error)]
pub enum CapabilityError {
	#[error("not found: {0}")]
	NotFound(String),

	#[error("already exists: {0}")]
	AlreadyExists(String),

	/// Path escapes the workspace root or is otherwise malformed.
	#[error("invalid path: {0}")]
	InvalidPath(String),

	#[error("io failure: {0}")]
	Io(#[from] std::io::Error),

	/// An LLM-backed command was invoked on a capability set with no
	/// assistant attached.
	#[error("assistant unavailable: {0}")]
	AssistantUnavailable(String),

	#[error("execution failed: {0}")]
	ExecutionFailed(String),

	/// The capability observed its cancellation token at a checkpoint.
	#[error("cancelled")]
	Cancelled,

	#[error(transparent)]
	Llm(#[from] LlmError),
}

/// Errors from chat-completion backends.
#[derive(Debug, Clone, Error)]
pub enum LlmError {
	/// Transport-level HTTP failure (connect, TLS, mid-body disconnect).
	#[error("http error: {0}")]
	Http(String),

	#[error("request timed out")]
	Timeout,

	#[error("rate limited")]
	RateLimited { retry_after_secs: Option<u64> },

	/// The provider answered with an error body.
	#[error("api error: {0}")]
	Api(String),

	#[error("invalid response: {0}")]
	InvalidResponse(String),

	#[error("configuration error: {0}")]
	Config(String),
}

impl RetryableError for LlmError {
	fn is_retryable(&self) -> bool {
		matches!(
			self,
			LlmError::Http(_) | LlmError::Timeout | LlmError::RateLimited { .. }
		)
	}
}
