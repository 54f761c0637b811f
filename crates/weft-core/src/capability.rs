// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Execution context handed to every capability invocation.
//!
//! Cancellation here is cooperative: the token is an explicit, required
//! parameter, and a capability is expected to call [`CapabilityContext::checkpoint`]
//! (or await under the token) between units of work. An invocation that never
//! looks at its token runs until its next suspension point, where the worker
//! abandons it.

use tokio_util::sync::CancellationToken;

use crate::error::CapabilityError;

/// Per-invocation context: the cancellation signal for the in-flight task.
#[derive(Debug, Clone)]
pub struct CapabilityContext {
	cancel: CancellationToken,
}

impl CapabilityContext {
	pub fn new(cancel: CancellationToken) -> Self {
		Self { cancel }
	}

	pub fn cancel_token(&self) -> &CancellationToken {
		&self.cancel
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled()
	}

	/// Cooperative cancellation point: returns `Err(Cancelled)` once the
	/// token has fired, otherwise `Ok(())`.
	pub fn checkpoint(&self) -> Result<(), CapabilityError> {
		if self.cancel.is_cancelled() {
			Err(CapabilityError::Cancelled)
		} else {
			Ok(())
		}
	}
}

impl Default for CapabilityContext {
	/// A context that can never be cancelled, for call sites outside the
	/// queue (direct capability use, planning previews).
	fn default() -> Self {
		Self::new(CancellationToken::new())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn checkpoint_passes_until_token_fires() {
		let token = CancellationToken::new();
		let ctx = CapabilityContext::new(token.clone());

		assert!(ctx.checkpoint().is_ok());
		token.cancel();
		assert!(matches!(ctx.checkpoint(), Err(CapabilityError::Cancelled)));
		assert!(ctx.is_cancelled());
	}

	#[test]
	fn default_context_is_never_cancelled() {
		let ctx = CapabilityContext::default();
		assert!(!ctx.is_cancelled());
		assert!(ctx.checkpoint().is_ok());
	}
}
