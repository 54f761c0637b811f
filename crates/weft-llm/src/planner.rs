// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Goal-to-task planning.
//!
//! Two model calls: a prose breakdown of the goal first, then a second
//! call that converts the breakdown into the wire task shape. Output is
//! validated against the dispatch command table before anything reaches
//! a queue, so a hallucinated command dies here and not on the peer.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};
use weft_core::error::LlmError;
use weft_core::llm::{ChatBackend, ChatTurn};
use weft_core::protocol::{commands, TaskRequest};

const OUTLINE_SYSTEM_PROMPT: &str =
	"You are an AI assistant that helps to break down coding goals into specific tasks.";

fn convert_system_prompt() -> String {
	format!(
		"You are an AI assistant that converts high-level coding plans into specific tasks \
		 for a coding assistant. Reply with a JSON array only; each element is an object with \
		 a \"command\" string and an \"args\" object. Valid commands: {}.",
		commands::ALL.join(", ")
	)
}

#[derive(Debug, Error)]
pub enum PlanError {
	#[error(transparent)]
	Backend(#[from] LlmError),

	#[error("plan is not valid task JSON: {0}")]
	Parse(String),

	#[error("plan names unknown command: {0}")]
	UnknownCommand(String),
}

/// Turns a free-form goal into an ordered, validated task list.
pub struct Planner {
	backend: Arc<dyn ChatBackend>,
}

impl Planner {
	pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
		Self { backend }
	}

	pub async fn plan(&self, goal: &str) -> Result<Vec<TaskRequest>, PlanError> {
		let outline = self.outline(goal).await?;
		debug!(outline_len = outline.len(), "produced goal outline");

		let tasks = self.convert(&outline).await?;
		info!(goal = %goal, task_count = tasks.len(), "planned goal");

		Ok(tasks)
	}

	async fn outline(&self, goal: &str) -> Result<String, PlanError> {
		let turns = [
			ChatTurn::system(OUTLINE_SYSTEM_PROMPT),
			ChatTurn::user(format!(
				"Break down this coding goal into specific tasks: {goal}"
			)),
		];

		Ok(self.backend.complete(&turns).await?)
	}

	async fn convert(&self, outline: &str) -> Result<Vec<TaskRequest>, PlanError> {
		let turns = [
			ChatTurn::system(convert_system_prompt()),
			ChatTurn::user(format!("Convert this plan into a list of tasks:\n\n{outline}")),
		];

		let reply = self.backend.complete(&turns).await?;
		parse_task_list(&reply)
	}
}

fn parse_task_list(reply: &str) -> Result<Vec<TaskRequest>, PlanError> {
	let body = strip_code_fence(reply);
	let tasks: Vec<TaskRequest> =
		serde_json::from_str(body).map_err(|e| PlanError::Parse(e.to_string()))?;

	for task in &tasks {
		if !commands::is_known(&task.command) {
			return Err(PlanError::UnknownCommand(task.command.clone()));
		}
	}

	Ok(tasks)
}

/// Models often wrap JSON in a markdown fence despite instructions;
/// tolerate that one decoration.
fn strip_code_fence(reply: &str) -> &str {
	let trimmed = reply.trim();
	let Some(rest) = trimmed.strip_prefix("```") else {
		return trimmed;
	};
	let rest = rest.strip_prefix("json").unwrap_or(rest);
	let rest = rest.strip_suffix("```").unwrap_or(rest);
	rest.trim()
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use std::collections::VecDeque;
	use std::sync::Mutex;

	struct ScriptedBackend {
		replies: Mutex<VecDeque<Result<String, LlmError>>>,
		calls: Mutex<Vec<Vec<ChatTurn>>>,
	}

	impl ScriptedBackend {
		fn new(replies: Vec<Result<String, LlmError>>) -> Self {
			Self {
				replies: Mutex::new(replies.into()),
				calls: Mutex::new(Vec::new()),
			}
		}
	}

	#[async_trait]
	impl ChatBackend for ScriptedBackend {
		async fn complete(&self, turns: &[ChatTurn]) -> Result<String, LlmError> {
			self.calls.lock().unwrap().push(turns.to_vec());
			self.replies
				.lock()
				.unwrap()
				.pop_front()
				.unwrap_or_else(|| Err(LlmError::Api("script exhausted".to_string())))
		}
	}

	fn planner_with(replies: Vec<Result<String, LlmError>>) -> (Planner, Arc<ScriptedBackend>) {
		let backend = Arc::new(ScriptedBackend::new(replies));
		(Planner::new(backend.clone()), backend)
	}

	#[tokio::test]
	async fn plan_produces_validated_tasks() {
		let (planner, _) = planner_with(vec![
			Ok("1. create the module\n2. check it".to_string()),
			Ok(r#"[
				{"command": "create_file", "args": {"path": "src/parse.rs", "content": ""}},
				{"command": "read_file", "args": {"path": "src/parse.rs"}}
			]"#
			.to_string()),
		]);

		let tasks = planner.plan("add a parser module").await.unwrap();

		assert_eq!(tasks.len(), 2);
		assert_eq!(tasks[0].command, "create_file");
		assert_eq!(tasks[1].args["path"], "src/parse.rs");
	}

	#[tokio::test]
	async fn fenced_json_is_tolerated() {
		let (planner, _) = planner_with(vec![
			Ok("outline".to_string()),
			Ok("```json\n[{\"command\": \"run_tests\", \"args\": {}}]\n```".to_string()),
		]);

		let tasks = planner.plan("run the suite").await.unwrap();
		assert_eq!(tasks.len(), 1);
		assert_eq!(tasks[0].command, "run_tests");
	}

	#[tokio::test]
	async fn unknown_command_is_rejected() {
		let (planner, _) = planner_with(vec![
			Ok("outline".to_string()),
			Ok(r#"[{"command": "rm_rf", "args": {}}]"#.to_string()),
		]);

		let err = planner.plan("clean up").await.unwrap_err();
		assert!(matches!(err, PlanError::UnknownCommand(cmd) if cmd == "rm_rf"));
	}

	#[tokio::test]
	async fn non_json_reply_is_a_parse_error() {
		let (planner, _) = planner_with(vec![
			Ok("outline".to_string()),
			Ok("sure, here is the plan:".to_string()),
		]);

		let err = planner.plan("anything").await.unwrap_err();
		assert!(matches!(err, PlanError::Parse(_)));
	}

	#[tokio::test]
	async fn backend_error_propagates() {
		let (planner, _) = planner_with(vec![Err(LlmError::Timeout)]);

		let err = planner.plan("anything").await.unwrap_err();
		assert!(matches!(err, PlanError::Backend(LlmError::Timeout)));
	}

	#[tokio::test]
	async fn convert_call_carries_the_outline() {
		let (planner, backend) = planner_with(vec![
			Ok("first build the thing".to_string()),
			Ok("[]".to_string()),
		]);

		planner.plan("build the thing").await.unwrap();

		let calls = backend.calls.lock().unwrap();
		assert_eq!(calls.len(), 2);
		assert!(calls[1][1].content.contains("first build the thing"));
	}

	#[test]
	fn code_fence_stripping() {
		assert_eq!(strip_code_fence("[1]"), "[1]");
		assert_eq!(strip_code_fence("```json\n[1]\n```"), "[1]");
		assert_eq!(strip_code_fence("```\n[1]\n```"), "[1]");
		assert_eq!(strip_code_fence("  [1]  "), "[1]");
	}

	#[test]
	fn prompt_names_every_command() {
		let prompt = convert_system_prompt();
		for command in commands::ALL {
			assert!(prompt.contains(command), "missing {command}");
		}
	}
}
