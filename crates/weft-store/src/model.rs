// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use weft_core::llm::ChatRole;

/// One remembered conversational exchange: the goal text the operator
/// submitted, or a summary of what a streamed task produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
	pub role: ChatRole,
	pub content: String,
	pub at: String,
}

impl ConversationEntry {
	pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
		Self {
			role,
			content: content.into(),
			at: Utc::now().to_rfc3339(),
		}
	}
}

/// Summary of one finished goal run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GoalRecord {
	pub id: String,
	pub goal: String,
	pub status: String,
	pub tasks: u64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub failure: Option<String>,
	pub at: String,
}

impl GoalRecord {
	pub fn new(goal: impl Into<String>, status: impl Into<String>, tasks: u64) -> Self {
		Self {
			id: format!("G-{}", Uuid::new_v4()),
			goal: goal.into(),
			status: status.into(),
			tasks,
			failure: None,
			at: Utc::now().to_rfc3339(),
		}
	}

	pub fn with_failure(mut self, failure: impl Into<String>) -> Self {
		self.failure = Some(failure.into());
		self
	}
}
