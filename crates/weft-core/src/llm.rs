// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Chat-completion boundary.
//!
//! The core never talks to a provider directly; goal planners and the
//! LLM-assisted capability layer go through [`ChatBackend`], so tests can
//! substitute a scripted backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
	System,
	User,
	Assistant,
}

/// One turn of a conversation, in the shape chat-completion APIs expect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
	pub role: ChatRole,
	pub content: String,
}

impl ChatTurn {
	pub fn system(content: impl Into<String>) -> Self {
		Self {
			role: ChatRole::System,
			content: content.into(),
		}
	}

	pub fn user(content: impl Into<String>) -> Self {
		Self {
			role: ChatRole::User,
			content: content.into(),
		}
	}

	pub fn assistant(content: impl Into<String>) -> Self {
		Self {
			role: ChatRole::Assistant,
			content: content.into(),
		}
	}
}

/// A chat-completion provider: conversation in, response text out.
#[async_trait]
pub trait ChatBackend: Send + Sync {
	async fn complete(&self, turns: &[ChatTurn]) -> Result<String, LlmError>;
}
