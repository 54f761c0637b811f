// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Wire protocol for the goal/task conversation.
//!
//! The remote planner and the local bridge exchange JSON objects with a
//! `type` discriminator. A caller submits a `goal`; the planner streams back
//! `task` messages, each naming a command and its arguments; the bridge
//! answers every task with a `result`; a `complete` sentinel closes the goal
//! and `cancel` aborts it from either side.
//!
//! ## Key Types
//! - `Envelope`: the tagged wire message
//! - `TaskRequest`: one command + arguments, as carried by a task message
//! - `TaskResult` / `TaskOutcome`: the normalized outcome of executing one task
//! - `commands`: the recognized command names

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

/// Command names recognized by the dispatcher.
pub mod commands {
	pub const SEND_MESSAGE: &str = "send_message";
	pub const ANALYZE_PROJECT: &str = "analyze_project";
	pub const SUGGEST_IMPROVEMENTS: &str = "suggest_improvements";
	pub const GENERATE_CODE: &str = "generate_code";
	pub const REFACTOR_CODE: &str = "refactor_code";
	pub const RUN_TESTS: &str = "run_tests";
	pub const CREATE_FILE: &str = "create_file";
	pub const READ_FILE: &str = "read_file";
	pub const UPDATE_FILE: &str = "update_file";
	pub const DELETE_FILE: &str = "delete_file";
	pub const SEARCH_AND_REPLACE: &str = "search_and_replace";
	pub const GET_CONTEXT: &str = "get_context";
	pub const SET_CONTEXT: &str = "set_context";
	pub const GET_HISTORY: &str = "get_history";
	pub const CLEAR_HISTORY: &str = "clear_history";

	/// Every command the dispatcher recognizes, in dispatch-table order.
	pub const ALL: [&str; 15] = [
		SEND_MESSAGE,
		ANALYZE_PROJECT,
		SUGGEST_IMPROVEMENTS,
		GENERATE_CODE,
		REFACTOR_CODE,
		RUN_TESTS,
		CREATE_FILE,
		READ_FILE,
		UPDATE_FILE,
		DELETE_FILE,
		SEARCH_AND_REPLACE,
		GET_CONTEXT,
		SET_CONTEXT,
		GET_HISTORY,
		CLEAR_HISTORY,
	];

	pub fn is_known(command: &str) -> bool {
		ALL.contains(&command)
	}
}

/// A protocol message as it appears on the wire.
///
/// `complete` and `cancel` carry no payload; a missing `args` object on a
/// task is treated as empty rather than rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Envelope {
	Goal {
		content: String,
	},
	Task {
		command: String,
		#[serde(default)]
		args: Map<String, Value>,
	},
	Result {
		command: String,
		result: Value,
	},
	Complete,
	Cancel,
}

impl Envelope {
	pub fn goal(content: impl Into<String>) -> Self {
		Envelope::Goal {
			content: content.into(),
		}
	}

	pub fn task(command: impl Into<String>, args: Map<String, Value>) -> Self {
		Envelope::Task {
			command: command.into(),
			args,
		}
	}

	/// Discriminator string, for logging.
	pub fn kind(&self) -> &'static str {
		match self {
			Envelope::Goal { .. } => "goal",
			Envelope::Task { .. } => "task",
			Envelope::Result { .. } => "result",
			Envelope::Complete => "complete",
			Envelope::Cancel => "cancel",
		}
	}
}

/// One command to execute: the unit of work flowing through the task queue.
///
/// Serializes to the same `{command, args}` shape the task envelope carries,
/// which is also the shape the planner emits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRequest {
	pub command: String,
	#[serde(default)]
	pub args: Map<String, Value>,
}

impl TaskRequest {
	pub fn new(command: impl Into<String>, args: Map<String, Value>) -> Self {
		Self {
			command: command.into(),
			args,
		}
	}

	pub fn into_envelope(self) -> Envelope {
		Envelope::Task {
			command: self.command,
			args: self.args,
		}
	}
}

/// Classification of a failed task outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
	/// The command name is not in the dispatch table.
	UnknownCommand,
	/// A required argument was missing or had the wrong type.
	InvalidArgs,
	/// The capability itself failed.
	Capability,
	/// The in-flight task was cancelled.
	Cancelled,
	/// The task exceeded the per-task execution bound.
	Timeout,
}

impl fmt::Display for FailureKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			FailureKind::UnknownCommand => "unknown_command",
			FailureKind::InvalidArgs => "invalid_args",
			FailureKind::Capability => "capability",
			FailureKind::Cancelled => "cancelled",
			FailureKind::Timeout => "timeout",
		};
		write!(f, "{s}")
	}
}

/// Normalized outcome of one dispatched task: a success payload or a
/// classified error. Every dispatch produces exactly one of these.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
	Success(Value),
	Failure { kind: FailureKind, message: String },
}

impl TaskOutcome {
	pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
		TaskOutcome::Failure {
			kind,
			message: message.into(),
		}
	}

	pub fn is_success(&self) -> bool {
		matches!(self, TaskOutcome::Success(_))
	}

	pub fn error_message(&self) -> Option<&str> {
		match self {
			TaskOutcome::Success(_) => None,
			TaskOutcome::Failure { message, .. } => Some(message),
		}
	}

	/// Wire form of the `result` field: the success payload itself, or an
	/// `{"error": <message>}` object.
	pub fn to_wire(&self) -> Value {
		match self {
			TaskOutcome::Success(payload) => payload.clone(),
			TaskOutcome::Failure { message, .. } => json!({ "error": message }),
		}
	}

	/// Inverse of [`to_wire`](Self::to_wire), used on the collecting side.
	/// An object whose `error` field is a string is read as a failure; the
	/// failure kind is not carried on the wire, so it comes back as
	/// `Capability`.
	pub fn from_wire(value: &Value) -> Self {
		if let Some(message) = value.get("error").and_then(Value::as_str) {
			if value.as_object().map(|o| o.len()) == Some(1) {
				return TaskOutcome::Failure {
					kind: FailureKind::Capability,
					message: message.to_string(),
				};
			}
		}
		TaskOutcome::Success(value.clone())
	}
}

/// The outcome of one task, tagged with the command that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskResult {
	pub command: String,
	pub outcome: TaskOutcome,
}

impl TaskResult {
	pub fn success(command: impl Into<String>, payload: Value) -> Self {
		Self {
			command: command.into(),
			outcome: TaskOutcome::Success(payload),
		}
	}

	pub fn failure(command: impl Into<String>, kind: FailureKind, message: impl Into<String>) -> Self {
		Self {
			command: command.into(),
			outcome: TaskOutcome::failure(kind, message),
		}
	}

	pub fn to_envelope(&self) -> Envelope {
		Envelope::Result {
			command: self.command.clone(),
			result: self.outcome.to_wire(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn task_defaults_args_to_empty() {
		let parsed: Envelope = serde_json::from_str(r#"{"type":"task","command":"read_file"}"#).unwrap();
		assert_eq!(
			parsed,
			Envelope::Task {
				command: "read_file".to_string(),
				args: Map::new(),
			}
		);
	}

	#[test]
	fn complete_and_cancel_are_bare_objects() {
		assert_eq!(
			serde_json::to_string(&Envelope::Complete).unwrap(),
			r#"{"type":"complete"}"#
		);
		assert_eq!(
			serde_json::to_string(&Envelope::Cancel).unwrap(),
			r#"{"type":"cancel"}"#
		);
	}

	#[test]
	fn goal_carries_content() {
		let json = serde_json::to_string(&Envelope::goal("refactor foo.py")).unwrap();
		assert_eq!(json, r#"{"type":"goal","content":"refactor foo.py"}"#);
	}

	#[test]
	fn unknown_discriminator_is_rejected() {
		let err = serde_json::from_str::<Envelope>(r#"{"type":"telemetry"}"#);
		assert!(err.is_err());
	}

	#[test]
	fn failure_outcome_serializes_as_error_object() {
		let result = TaskResult::failure("read_file", FailureKind::Capability, "no such file");
		let envelope = result.to_envelope();
		let json = serde_json::to_value(&envelope).unwrap();
		assert_eq!(json["type"], "result");
		assert_eq!(json["command"], "read_file");
		assert_eq!(json["result"]["error"], "no such file");
	}

	#[test]
	fn success_outcome_passes_payload_through() {
		let result = TaskResult::success("read_file", json!({ "content": "fn main() {}" }));
		let envelope = result.to_envelope();
		let json = serde_json::to_value(&envelope).unwrap();
		assert_eq!(json["result"]["content"], "fn main() {}");
	}

	#[test]
	fn wire_error_object_reads_back_as_failure() {
		let outcome = TaskOutcome::from_wire(&json!({ "error": "boom" }));
		assert!(!outcome.is_success());
		assert_eq!(outcome.error_message(), Some("boom"));
	}

	#[test]
	fn wire_payload_with_extra_fields_is_not_a_failure() {
		// Only a bare {"error": ...} object marks a failure; a payload that
		// happens to contain an error field among others stays a success.
		let outcome = TaskOutcome::from_wire(&json!({ "error": "x", "line": 3 }));
		assert!(outcome.is_success());
	}

	#[test]
	fn every_command_is_known() {
		for command in commands::ALL {
			assert!(commands::is_known(command));
		}
		assert!(!commands::is_known("launch_missiles"));
	}

	fn arb_args() -> impl Strategy<Value = Map<String, Value>> {
		proptest::collection::btree_map(r"[a-z_]{1,12}", r"[a-zA-Z0-9 ./_-]{0,40}", 0..4).prop_map(
			|m| {
				m.into_iter()
					.map(|(k, v)| (k, Value::String(v)))
					.collect()
			},
		)
	}

	fn arb_envelope() -> impl Strategy<Value = Envelope> {
		prop_oneof![
			r"[a-zA-Z0-9 .,]{0,60}".prop_map(Envelope::goal),
			(proptest::sample::select(commands::ALL.to_vec()), arb_args())
				.prop_map(|(command, args)| Envelope::task(command, args)),
			(proptest::sample::select(commands::ALL.to_vec()), arb_args()).prop_map(
				|(command, args)| Envelope::Result {
					command: command.to_string(),
					result: Value::Object(args),
				}
			),
			Just(Envelope::Complete),
			Just(Envelope::Cancel),
		]
	}

	proptest! {
		/// **Purpose**: Every envelope survives a trip through its JSON wire form.
		///
		/// **Why Important**: Both peers parse each other's output; a lossy
		/// representation would silently corrupt the conversation.
		#[test]
		fn envelope_json_roundtrip(envelope in arb_envelope()) {
			let json = serde_json::to_string(&envelope).unwrap();
			let decoded: Envelope = serde_json::from_str(&json).unwrap();
			prop_assert_eq!(envelope, decoded);
		}

		/// **Purpose**: The `type` discriminator always matches `kind()`.
		///
		/// **Why Important**: Log lines and dispatch decisions both key off the
		/// discriminator; the two views must never drift apart.
		#[test]
		fn envelope_kind_matches_wire_tag(envelope in arb_envelope()) {
			let json = serde_json::to_value(&envelope).unwrap();
			prop_assert_eq!(json["type"].as_str().unwrap(), envelope.kind());
		}
	}
}
