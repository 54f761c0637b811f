// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! The capability surface tasks execute against.
//!
//! One trait, one method per recognized command. The dispatcher is generic
//! over this interface, so production sets (workspace-rooted, LLM-assisted)
//! and test stubs plug in interchangeably. Every method takes the
//! per-invocation [`CapabilityContext`]; long-running implementations are
//! expected to poll its cancellation token between units of work.

use async_trait::async_trait;
use serde_json::Value;

use weft_core::capability::CapabilityContext;
use weft_core::error::CapabilityError;

pub type CapabilityResult = Result<Value, CapabilityError>;

#[async_trait]
pub trait EditorCapabilities: Send + Sync {
	/// Deliver a chat message to the session.
	async fn send_message(&self, content: &str, ctx: &CapabilityContext) -> CapabilityResult;

	/// Summarize the project under the capability root.
	async fn analyze_project(&self, ctx: &CapabilityContext) -> CapabilityResult;

	/// Review one file and propose improvements.
	async fn suggest_improvements(
		&self,
		file_path: &str,
		ctx: &CapabilityContext,
	) -> CapabilityResult;

	/// Produce code from a free-form prompt.
	async fn generate_code(&self, prompt: &str, ctx: &CapabilityContext) -> CapabilityResult;

	/// Propose a refactoring of one file (`refactor_kind` names the shape,
	/// e.g. `extract_method`).
	async fn refactor_code(
		&self,
		file_path: &str,
		refactor_kind: &str,
		ctx: &CapabilityContext,
	) -> CapabilityResult;

	/// Run the test suite, optionally narrowed to one path.
	async fn run_tests(
		&self,
		test_path: Option<&str>,
		ctx: &CapabilityContext,
	) -> CapabilityResult;

	async fn create_file(
		&self,
		file_path: &str,
		content: &str,
		ctx: &CapabilityContext,
	) -> CapabilityResult;

	async fn read_file(&self, file_path: &str, ctx: &CapabilityContext) -> CapabilityResult;

	async fn update_file(
		&self,
		file_path: &str,
		content: &str,
		ctx: &CapabilityContext,
	) -> CapabilityResult;

	async fn delete_file(&self, file_path: &str, ctx: &CapabilityContext) -> CapabilityResult;

	/// Literal (non-regex) search and replace across the project's text files.
	async fn search_and_replace(
		&self,
		search: &str,
		replace: &str,
		ctx: &CapabilityContext,
	) -> CapabilityResult;

	async fn get_context(&self, ctx: &CapabilityContext) -> CapabilityResult;

	async fn set_context(&self, context: Value, ctx: &CapabilityContext) -> CapabilityResult;

	async fn get_history(&self, ctx: &CapabilityContext) -> CapabilityResult;

	async fn clear_history(&self, ctx: &CapabilityContext) -> CapabilityResult;
}
