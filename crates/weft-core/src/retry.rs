// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Bounded exponential-backoff retry for fallible async operations.
//!
//! Retry is a value, not an annotation: call sites hold a [`RetryConfig`]
//! and wrap individual operations with [`retry`], so the policy is visible
//! in the signature and testable on its own. Whether a failure is worth
//! retrying is decided by the error type via [`RetryableError`].

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, error, warn};

/// Errors that can classify themselves as transient.
///
/// Only errors reporting `true` are retried; everything else propagates
/// immediately without sleeping.
pub trait RetryableError {
	fn is_retryable(&self) -> bool;
}

/// Retry policy applied to one wrapped call.
#[derive(Debug, Clone)]
pub struct RetryConfig {
	/// Total attempts including the first; `1` means a bare call.
	pub max_attempts: u32,
	/// Delay before the second attempt.
	pub base_delay: Duration,
	/// Upper bound on any single delay.
	pub max_delay: Duration,
	/// Multiplier applied to the delay after each failed attempt.
	pub backoff_factor: f64,
	/// Scale each delay by a random factor in [0.5, 1.0); never lengthens it.
	pub jitter: bool,
}

impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			base_delay: Duration::from_secs(1),
			max_delay: Duration::from_secs(60),
			backoff_factor: 2.0,
			jitter: false,
		}
	}
}

impl RetryConfig {
	/// Delay to sleep after `failed_attempts` consecutive failures:
	/// `base * factor^(failed_attempts - 1)`, capped at `max_delay`.
	pub fn backoff_delay(&self, failed_attempts: u32) -> Duration {
		let exponent = failed_attempts.saturating_sub(1).min(31) as i32;
		let raw = self.base_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
		let capped = raw.min(self.max_delay.as_secs_f64());
		let scaled = if self.jitter {
			capped * (0.5 + fastrand::f64() / 2.0)
		} else {
			capped
		};
		Duration::from_secs_f64(scaled)
	}
}

/// Run `operation` under `config`, sleeping between retryable failures.
///
/// Returns the first success, or the last error once attempts are exhausted.
/// A non-retryable error propagates immediately, whatever the attempt count.
pub async fn retry<T, E, F, Fut>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
	E: RetryableError + fmt::Display,
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T, E>>,
{
	let max_attempts = config.max_attempts.max(1);
	let mut attempt = 1u32;

	loop {
		match operation().await {
			Ok(value) => return Ok(value),
			Err(err) if err.is_retryable() && attempt < max_attempts => {
				let delay = config.backoff_delay(attempt);
				warn!(
					attempt,
					max_attempts,
					delay_ms = delay.as_millis() as u64,
					error = %err,
					"attempt failed, retrying after backoff"
				);
				tokio::time::sleep(delay).await;
				attempt += 1;
			}
			Err(err) => {
				if err.is_retryable() {
					error!(attempt, error = %err, "attempts exhausted");
				} else {
					debug!(attempt, error = %err, "error is not retryable, propagating");
				}
				return Err(err);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicU32, Ordering};
	use std::sync::Arc;

	#[derive(Debug)]
	struct TestError {
		retryable: bool,
		attempt: u32,
	}

	impl fmt::Display for TestError {
		fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
			write!(f, "failure on attempt {}", self.attempt)
		}
	}

	impl RetryableError for TestError {
		fn is_retryable(&self) -> bool {
			self.retryable
		}
	}

	fn fast_config(max_attempts: u32) -> RetryConfig {
		RetryConfig {
			max_attempts,
			base_delay: Duration::from_millis(1),
			max_delay: Duration::from_millis(4),
			backoff_factor: 2.0,
			jitter: false,
		}
	}

	#[tokio::test]
	async fn always_failing_operation_runs_exactly_max_attempts_times() {
		let calls = Arc::new(AtomicU32::new(0));
		let counter = calls.clone();

		let result: Result<(), TestError> = retry(&fast_config(3), || {
			let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
			async move {
				Err(TestError {
					retryable: true,
					attempt,
				})
			}
		})
		.await;

		assert_eq!(calls.load(Ordering::SeqCst), 3);
		assert_eq!(result.unwrap_err().attempt, 3);
	}

	#[tokio::test]
	async fn non_retryable_error_propagates_after_one_call() {
		let calls = Arc::new(AtomicU32::new(0));
		let counter = calls.clone();

		let result: Result<(), TestError> = retry(&fast_config(5), || {
			let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
			async move {
				Err(TestError {
					retryable: false,
					attempt,
				})
			}
		})
		.await;

		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert!(result.is_err());
	}

	#[tokio::test]
	async fn single_attempt_config_is_a_bare_call() {
		let calls = Arc::new(AtomicU32::new(0));
		let counter = calls.clone();

		let result: Result<(), TestError> = retry(&fast_config(1), || {
			let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
			async move {
				Err(TestError {
					retryable: true,
					attempt,
				})
			}
		})
		.await;

		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert!(result.is_err());
	}

	#[tokio::test]
	async fn succeeds_on_third_attempt_after_two_transient_failures() {
		let calls = Arc::new(AtomicU32::new(0));
		let counter = calls.clone();

		let result: Result<u32, TestError> = retry(&fast_config(3), || {
			let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
			async move {
				if attempt < 3 {
					Err(TestError {
						retryable: true,
						attempt,
					})
				} else {
					Ok(attempt)
				}
			}
		})
		.await;

		assert_eq!(result.unwrap(), 3);
		assert_eq!(calls.load(Ordering::SeqCst), 3);
	}

	#[test]
	fn backoff_doubles_then_caps() {
		let config = RetryConfig {
			max_attempts: 10,
			base_delay: Duration::from_secs(1),
			max_delay: Duration::from_secs(60),
			backoff_factor: 2.0,
			jitter: false,
		};

		assert_eq!(config.backoff_delay(1), Duration::from_secs(1));
		assert_eq!(config.backoff_delay(2), Duration::from_secs(2));
		assert_eq!(config.backoff_delay(3), Duration::from_secs(4));
		assert_eq!(config.backoff_delay(7), Duration::from_secs(60));
	}

	#[test]
	fn jitter_never_lengthens_a_delay() {
		let jittered = RetryConfig {
			jitter: true,
			..RetryConfig::default()
		};
		let plain = RetryConfig::default();

		for failed_attempts in 1..=8 {
			let upper = plain.backoff_delay(failed_attempts);
			for _ in 0..32 {
				let delay = jittered.backoff_delay(failed_attempts);
				assert!(delay <= upper);
				assert!(delay >= upper / 2);
			}
		}
	}
}
