// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Command dispatch: one command name, one capability invocation.
//!
//! `dispatch` never raises. Unknown commands, missing arguments, and
//! capability failures all come back as normal task failures, because the
//! peer may legitimately be ahead of or behind this build of the bridge.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info};

use weft_core::capability::CapabilityContext;
use weft_core::error::CapabilityError;
use weft_core::protocol::{commands, FailureKind, TaskOutcome, TaskResult};

use crate::capabilities::EditorCapabilities;

/// Maps task commands onto the injected capability set.
#[derive(Clone)]
pub struct CommandDispatcher {
	capabilities: Arc<dyn EditorCapabilities>,
}

impl CommandDispatcher {
	pub fn new(capabilities: Arc<dyn EditorCapabilities>) -> Self {
		Self { capabilities }
	}

	/// Execute one command. Always produces exactly one result; errors of
	/// every class are folded into the outcome.
	pub async fn dispatch(
		&self,
		command: &str,
		args: &Map<String, Value>,
		ctx: &CapabilityContext,
	) -> TaskResult {
		debug!(command, "dispatching");

		let outcome = match self.invoke(command, args, ctx).await {
			Ok(payload) => TaskOutcome::Success(payload),
			Err(outcome) => outcome,
		};

		match &outcome {
			TaskOutcome::Success(_) => debug!(command, "command succeeded"),
			TaskOutcome::Failure { kind, message } => {
				info!(command, kind = %kind, message, "command failed");
			}
		}

		TaskResult {
			command: command.to_string(),
			outcome,
		}
	}

	async fn invoke(
		&self,
		command: &str,
		args: &Map<String, Value>,
		ctx: &CapabilityContext,
	) -> Result<Value, TaskOutcome> {
		let caps = &self.capabilities;

		let result = match command {
			commands::SEND_MESSAGE => {
				caps.send_message(required_str(args, command, "content")?, ctx)
					.await
			}
			commands::ANALYZE_PROJECT => caps.analyze_project(ctx).await,
			commands::SUGGEST_IMPROVEMENTS => {
				caps.suggest_improvements(required_str(args, command, "file_path")?, ctx)
					.await
			}
			commands::GENERATE_CODE => {
				caps.generate_code(required_str(args, command, "prompt")?, ctx)
					.await
			}
			commands::REFACTOR_CODE => {
				caps.refactor_code(
					required_str(args, command, "file_path")?,
					required_str(args, command, "refactor_type")?,
					ctx,
				)
				.await
			}
			commands::RUN_TESTS => {
				caps.run_tests(optional_str(args, command, "test_path")?, ctx)
					.await
			}
			commands::CREATE_FILE => {
				caps.create_file(
					required_str(args, command, "file_path")?,
					required_str(args, command, "content")?,
					ctx,
				)
				.await
			}
			commands::READ_FILE => {
				caps.read_file(required_str(args, command, "file_path")?, ctx)
					.await
			}
			commands::UPDATE_FILE => {
				caps.update_file(
					required_str(args, command, "file_path")?,
					required_str(args, command, "content")?,
					ctx,
				)
				.await
			}
			commands::DELETE_FILE => {
				caps.delete_file(required_str(args, command, "file_path")?, ctx)
					.await
			}
			commands::SEARCH_AND_REPLACE => {
				caps.search_and_replace(
					required_str(args, command, "search_pattern")?,
					required_str(args, command, "replace_pattern")?,
					ctx,
				)
				.await
			}
			commands::GET_CONTEXT => caps.get_context(ctx).await,
			commands::SET_CONTEXT => {
				caps.set_context(required_value(args, command, "context")?, ctx)
					.await
			}
			commands::GET_HISTORY => caps.get_history(ctx).await,
			commands::CLEAR_HISTORY => caps.clear_history(ctx).await,
			_ => {
				return Err(TaskOutcome::failure(
					FailureKind::UnknownCommand,
					format!("Unknown command: {command}"),
				))
			}
		};

		result.map_err(failure_outcome)
	}
}

fn failure_outcome(err: CapabilityError) -> TaskOutcome {
	let kind = match err {
		CapabilityError::Cancelled => FailureKind::Cancelled,
		_ => FailureKind::Capability,
	};
	TaskOutcome::failure(kind, err.to_string())
}

fn required_str<'a>(
	args: &'a Map<String, Value>,
	command: &str,
	key: &str,
) -> Result<&'a str, TaskOutcome> {
	match args.get(key) {
		Some(Value::String(s)) => Ok(s),
		Some(_) => Err(TaskOutcome::failure(
			FailureKind::InvalidArgs,
			format!("argument '{key}' of {command} must be a string"),
		)),
		None => Err(TaskOutcome::failure(
			FailureKind::InvalidArgs,
			format!("{command} requires argument '{key}'"),
		)),
	}
}

fn optional_str<'a>(
	args: &'a Map<String, Value>,
	command: &str,
	key: &str,
) -> Result<Option<&'a str>, TaskOutcome> {
	match args.get(key) {
		None | Some(Value::Null) => Ok(None),
		Some(Value::String(s)) => Ok(Some(s)),
		Some(_) => Err(TaskOutcome::failure(
			FailureKind::InvalidArgs,
			format!("argument '{key}' of {command} must be a string"),
		)),
	}
}

fn required_value(
	args: &Map<String, Value>,
	command: &str,
	key: &str,
) -> Result<Value, TaskOutcome> {
	args.get(key).cloned().ok_or_else(|| {
		TaskOutcome::failure(
			FailureKind::InvalidArgs,
			format!("{command} requires argument '{key}'"),
		)
	})
}
