// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! LLM-assisted capability decorator.
//!
//! Routes `suggest_improvements`, `generate_code`, and `refactor_code` to a
//! [`ChatBackend`]; every other command is forwarded to the wrapped set
//! untouched. File access goes through the inner capabilities so path
//! validation stays in one place.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info};

use weft_core::capability::CapabilityContext;
use weft_core::error::CapabilityError;
use weft_core::llm::{ChatBackend, ChatTurn};

use crate::capabilities::{CapabilityResult, EditorCapabilities};

const SUGGEST_SYSTEM: &str = "You are a code reviewer. Given a source file, reply with a short list \
	of concrete improvements. Plain text, one suggestion per line.";

const GENERATE_SYSTEM: &str = "You are a code generator. Reply with only the code for the request, \
	no commentary and no markdown fences.";

const REFACTOR_SYSTEM: &str = "You are a refactoring assistant. Apply the requested refactoring \
	and reply with the complete updated file, no commentary and no markdown fences.";

pub struct AssistedCapabilities {
	inner: Arc<dyn EditorCapabilities>,
	backend: Arc<dyn ChatBackend>,
}

impl AssistedCapabilities {
	pub fn new(inner: Arc<dyn EditorCapabilities>, backend: Arc<dyn ChatBackend>) -> Self {
		Self { inner, backend }
	}

	async fn file_content(
		&self,
		file_path: &str,
		ctx: &CapabilityContext,
	) -> Result<String, CapabilityError> {
		let payload = self.inner.read_file(file_path, ctx).await?;
		Ok(payload["content"].as_str().unwrap_or_default().to_string())
	}
}

#[async_trait]
impl EditorCapabilities for AssistedCapabilities {
	async fn send_message(&self, content: &str, ctx: &CapabilityContext) -> CapabilityResult {
		self.inner.send_message(content, ctx).await
	}

	async fn analyze_project(&self, ctx: &CapabilityContext) -> CapabilityResult {
		self.inner.analyze_project(ctx).await
	}

	async fn suggest_improvements(
		&self,
		file_path: &str,
		ctx: &CapabilityContext,
	) -> CapabilityResult {
		let content = self.file_content(file_path, ctx).await?;

		debug!(file_path, bytes = content.len(), "requesting suggestions");

		let turns = [
			ChatTurn::system(SUGGEST_SYSTEM),
			ChatTurn::user(format!("File: {file_path}\n\n{content}")),
		];
		let suggestions = self.backend.complete(&turns).await?;

		Ok(json!({
			"file_path": file_path,
			"suggestions": suggestions,
		}))
	}

	async fn generate_code(&self, prompt: &str, ctx: &CapabilityContext) -> CapabilityResult {
		ctx.checkpoint()?;

		debug!(prompt_len = prompt.len(), "generating code");

		let turns = [ChatTurn::system(GENERATE_SYSTEM), ChatTurn::user(prompt)];
		let code = self.backend.complete(&turns).await?;

		Ok(json!({ "code": code }))
	}

	async fn refactor_code(
		&self,
		file_path: &str,
		refactor_kind: &str,
		ctx: &CapabilityContext,
	) -> CapabilityResult {
		let content = self.file_content(file_path, ctx).await?;

		debug!(file_path, refactor_kind, "requesting refactor");

		let turns = [
			ChatTurn::system(REFACTOR_SYSTEM),
			ChatTurn::user(format!(
				"Refactoring: {refactor_kind}\nFile: {file_path}\n\n{content}"
			)),
		];
		let updated = self.backend.complete(&turns).await?;

		// Abandoned here rather than after the write if cancel landed while
		// the backend was thinking.
		ctx.checkpoint()?;
		self.inner.update_file(file_path, &updated, ctx).await?;

		info!(file_path, refactor_kind, "applied refactor");

		Ok(json!({
			"file_path": file_path,
			"refactor_type": refactor_kind,
			"applied": true,
		}))
	}

	async fn run_tests(
		&self,
		test_path: Option<&str>,
		ctx: &CapabilityContext,
	) -> CapabilityResult {
		self.inner.run_tests(test_path, ctx).await
	}

	async fn create_file(
		&self,
		file_path: &str,
		content: &str,
		ctx: &CapabilityContext,
	) -> CapabilityResult {
		self.inner.create_file(file_path, content, ctx).await
	}

	async fn read_file(&self, file_path: &str, ctx: &CapabilityContext) -> CapabilityResult {
		self.inner.read_file(file_path, ctx).await
	}

	async fn update_file(
		&self,
		file_path: &str,
		content: &str,
		ctx: &CapabilityContext,
	) -> CapabilityResult {
		self.inner.update_file(file_path, content, ctx).await
	}

	async fn delete_file(&self, file_path: &str, ctx: &CapabilityContext) -> CapabilityResult {
		self.inner.delete_file(file_path, ctx).await
	}

	async fn search_and_replace(
		&self,
		search: &str,
		replace: &str,
		ctx: &CapabilityContext,
	) -> CapabilityResult {
		self.inner.search_and_replace(search, replace, ctx).await
	}

	async fn get_context(&self, ctx: &CapabilityContext) -> CapabilityResult {
		self.inner.get_context(ctx).await
	}

	async fn set_context(&self, context: Value, ctx: &CapabilityContext) -> CapabilityResult {
		self.inner.set_context(context, ctx).await
	}

	async fn get_history(&self, ctx: &CapabilityContext) -> CapabilityResult {
		self.inner.get_history(ctx).await
	}

	async fn clear_history(&self, ctx: &CapabilityContext) -> CapabilityResult {
		self.inner.clear_history(ctx).await
	}
}
