// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Capability set backed by a workspace directory on disk.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use weft_core::capability::CapabilityContext;
use weft_core::error::CapabilityError;

use crate::capabilities::{CapabilityResult, EditorCapabilities};

const MAX_OUTPUT_BYTES: usize = 256 * 1024; // per stream

/// Directories never traversed by project analysis or search-and-replace.
const SKIPPED_DIRS: &[&str] = &["target", "node_modules", ".git"];

/// Session state carried across tasks within one connection.
#[derive(Default)]
struct SessionState {
	context: Value,
	history: Vec<Value>,
}

/// Implements the command surface against a directory tree plus in-memory
/// session state. The three assistant-flavored commands fail here; wrap this
/// in [`AssistedCapabilities`](crate::assist::AssistedCapabilities) to route
/// them to a chat backend.
pub struct WorkspaceCapabilities {
	root: PathBuf,
	test_command: Option<String>,
	state: Mutex<SessionState>,
}

impl WorkspaceCapabilities {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self {
			root: root.into(),
			test_command: None,
			state: Mutex::new(SessionState {
				context: Value::Object(serde_json::Map::new()),
				history: Vec::new(),
			}),
		}
	}

	/// Shell command invoked by `run_tests`, e.g. `cargo test` or `pytest`.
	pub fn with_test_command(mut self, command: impl Into<String>) -> Self {
		self.test_command = Some(command.into());
		self
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	fn canonical_root(&self) -> Result<PathBuf, CapabilityError> {
		self.root
			.canonicalize()
			.map_err(|_| CapabilityError::NotFound(self.root.display().to_string()))
	}

	/// Resolves a path that must already exist to its canonical form inside
	/// the workspace root.
	fn resolve_existing(&self, raw: &str) -> Result<PathBuf, CapabilityError> {
		let path = Path::new(raw);
		let absolute = if path.is_absolute() {
			path.to_path_buf()
		} else {
			self.root.join(path)
		};

		let canonical = absolute
			.canonicalize()
			.map_err(|_| CapabilityError::NotFound(raw.to_string()))?;

		if !canonical.starts_with(self.canonical_root()?) {
			return Err(CapabilityError::InvalidPath(raw.to_string()));
		}

		Ok(canonical)
	}

	/// Resolves a path that may not exist yet. Parent traversal is rejected
	/// outright because the target cannot be canonicalized.
	fn resolve_new(&self, raw: &str) -> Result<PathBuf, CapabilityError> {
		let path = Path::new(raw);
		let relative = if path.is_absolute() {
			path.strip_prefix(&self.root)
				.map_err(|_| CapabilityError::InvalidPath(raw.to_string()))?
		} else {
			path
		};

		for component in relative.components() {
			match component {
				Component::Normal(_) | Component::CurDir => {}
				_ => return Err(CapabilityError::InvalidPath(raw.to_string())),
			}
		}

		Ok(self.root.join(relative))
	}

	fn skip_dir(name: &str) -> bool {
		name.starts_with('.') || SKIPPED_DIRS.contains(&name)
	}

	/// Collects every regular file under the root, skipping hidden and build
	/// directories. Iterative so deep trees cannot blow the stack.
	async fn collect_files(&self, ctx: &CapabilityContext) -> Result<Vec<PathBuf>, CapabilityError> {
		let mut pending = vec![self.canonical_root()?];
		let mut files = Vec::new();

		while let Some(dir) = pending.pop() {
			ctx.checkpoint()?;

			let mut entries = tokio::fs::read_dir(&dir).await?;
			while let Some(entry) = entries.next_entry().await? {
				let file_type = entry.file_type().await?;
				let name = entry.file_name();
				let name = name.to_string_lossy();

				if file_type.is_dir() {
					if !Self::skip_dir(&name) {
						pending.push(entry.path());
					}
				} else if file_type.is_file() && !name.starts_with('.') {
					files.push(entry.path());
				}
			}
		}

		Ok(files)
	}

	fn truncate_stream(output: &[u8]) -> (String, bool) {
		if output.len() <= MAX_OUTPUT_BYTES {
			(String::from_utf8_lossy(output).to_string(), false)
		} else {
			let content = String::from_utf8_lossy(&output[..MAX_OUTPUT_BYTES]).to_string();
			(content, true)
		}
	}

	fn assistant_required(command: &str) -> CapabilityError {
		CapabilityError::AssistantUnavailable(format!("{command} requires a chat backend"))
	}
}

#[async_trait]
impl EditorCapabilities for WorkspaceCapabilities {
	async fn send_message(&self, content: &str, _ctx: &CapabilityContext) -> CapabilityResult {
		let entry = json!({
			"kind": "message",
			"content": content,
			"at": chrono::Utc::now().to_rfc3339(),
		});

		let mut state = self.state.lock().await;
		state.history.push(entry);

		debug!(length = content.len(), "recorded message");
		Ok(json!({ "delivered": true }))
	}

	async fn analyze_project(&self, ctx: &CapabilityContext) -> CapabilityResult {
		let mut pending = vec![self.canonical_root()?];
		let mut files: u64 = 0;
		let mut directories: u64 = 0;
		let mut total_bytes: u64 = 0;
		let mut by_extension: BTreeMap<String, u64> = BTreeMap::new();

		while let Some(dir) = pending.pop() {
			ctx.checkpoint()?;

			let mut entries = tokio::fs::read_dir(&dir).await?;
			while let Some(entry) = entries.next_entry().await? {
				let file_type = entry.file_type().await?;
				let name = entry.file_name();
				let name = name.to_string_lossy();

				if file_type.is_dir() {
					if !Self::skip_dir(&name) {
						directories += 1;
						pending.push(entry.path());
					}
				} else if file_type.is_file() && !name.starts_with('.') {
					files += 1;
					total_bytes += entry.metadata().await?.len();

					let extension = entry
						.path()
						.extension()
						.and_then(|e| e.to_str())
						.unwrap_or("(none)")
						.to_string();
					*by_extension.entry(extension).or_insert(0) += 1;
				}
			}
		}

		info!(files, directories, total_bytes, "analyzed project");

		Ok(json!({
			"root": self.root.display().to_string(),
			"files": files,
			"directories": directories,
			"total_bytes": total_bytes,
			"by_extension": by_extension,
		}))
	}

	async fn suggest_improvements(
		&self,
		_file_path: &str,
		_ctx: &CapabilityContext,
	) -> CapabilityResult {
		Err(Self::assistant_required("suggest_improvements"))
	}

	async fn generate_code(&self, _prompt: &str, _ctx: &CapabilityContext) -> CapabilityResult {
		Err(Self::assistant_required("generate_code"))
	}

	async fn refactor_code(
		&self,
		_file_path: &str,
		_refactor_kind: &str,
		_ctx: &CapabilityContext,
	) -> CapabilityResult {
		Err(Self::assistant_required("refactor_code"))
	}

	async fn run_tests(
		&self,
		test_path: Option<&str>,
		ctx: &CapabilityContext,
	) -> CapabilityResult {
		let base = self.test_command.as_deref().ok_or_else(|| {
			CapabilityError::ExecutionFailed("no test command configured".to_string())
		})?;

		let command_line = match test_path {
			Some(path) => {
				// Validate before splicing into the command line.
				self.resolve_existing(path)?;
				format!("{base} {path}")
			}
			None => base.to_string(),
		};

		debug!(command = %command_line, "running tests");

		let mut cmd = Command::new("sh");
		cmd.arg("-c")
			.arg(&command_line)
			.current_dir(&self.root)
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.kill_on_drop(true);

		let output = tokio::select! {
			output = cmd.output() => output?,
			_ = ctx.cancel_token().cancelled() => {
				warn!(command = %command_line, "test run cancelled");
				return Err(CapabilityError::Cancelled);
			}
		};

		let (stdout, stdout_truncated) = Self::truncate_stream(&output.stdout);
		let (stderr, stderr_truncated) = Self::truncate_stream(&output.stderr);

		info!(
				exit_code = ?output.status.code(),
				passed = output.status.success(),
				"test run finished"
		);

		Ok(json!({
			"command": command_line,
			"exit_code": output.status.code(),
			"passed": output.status.success(),
			"stdout": stdout,
			"stderr": stderr,
			"truncated": stdout_truncated || stderr_truncated,
		}))
	}

	async fn create_file(
		&self,
		file_path: &str,
		content: &str,
		_ctx: &CapabilityContext,
	) -> CapabilityResult {
		let path = self.resolve_new(file_path)?;

		if path.exists() {
			return Err(CapabilityError::AlreadyExists(file_path.to_string()));
		}

		if let Some(parent) = path.parent() {
			tokio::fs::create_dir_all(parent).await?;
		}
		tokio::fs::write(&path, content).await?;

		info!(path = %path.display(), bytes = content.len(), "created file");
		Ok(json!({ "file_path": file_path, "bytes": content.len() }))
	}

	async fn read_file(&self, file_path: &str, _ctx: &CapabilityContext) -> CapabilityResult {
		let path = self.resolve_existing(file_path)?;
		let content = tokio::fs::read_to_string(&path).await?;

		debug!(path = %path.display(), bytes = content.len(), "read file");
		Ok(json!({ "file_path": file_path, "content": content }))
	}

	async fn update_file(
		&self,
		file_path: &str,
		content: &str,
		_ctx: &CapabilityContext,
	) -> CapabilityResult {
		let path = self.resolve_existing(file_path)?;
		tokio::fs::write(&path, content).await?;

		info!(path = %path.display(), bytes = content.len(), "updated file");
		Ok(json!({ "file_path": file_path, "bytes": content.len() }))
	}

	async fn delete_file(&self, file_path: &str, _ctx: &CapabilityContext) -> CapabilityResult {
		let path = self.resolve_existing(file_path)?;
		tokio::fs::remove_file(&path).await?;

		info!(path = %path.display(), "deleted file");
		Ok(json!({ "file_path": file_path, "deleted": true }))
	}

	async fn search_and_replace(
		&self,
		search: &str,
		replace: &str,
		ctx: &CapabilityContext,
	) -> CapabilityResult {
		if search.is_empty() {
			return Err(CapabilityError::ExecutionFailed(
				"search pattern is empty".to_string(),
			));
		}

		let mut files_changed: u64 = 0;
		let mut replacements: u64 = 0;

		for path in self.collect_files(ctx).await? {
			ctx.checkpoint()?;

			// Binary files fail UTF-8 decoding and are skipped.
			let Ok(content) = tokio::fs::read_to_string(&path).await else {
				continue;
			};

			let count = content.matches(search).count() as u64;
			if count == 0 {
				continue;
			}

			tokio::fs::write(&path, content.replace(search, replace)).await?;
			files_changed += 1;
			replacements += count;
		}

		info!(files_changed, replacements, "search and replace complete");
		Ok(json!({
			"files_changed": files_changed,
			"replacements": replacements,
		}))
	}

	async fn get_context(&self, _ctx: &CapabilityContext) -> CapabilityResult {
		let state = self.state.lock().await;
		Ok(state.context.clone())
	}

	async fn set_context(&self, context: Value, _ctx: &CapabilityContext) -> CapabilityResult {
		let mut state = self.state.lock().await;
		state.context = context;

		debug!("session context replaced");
		Ok(json!({ "updated": true }))
	}

	async fn get_history(&self, _ctx: &CapabilityContext) -> CapabilityResult {
		let state = self.state.lock().await;
		Ok(Value::Array(state.history.clone()))
	}

	async fn clear_history(&self, _ctx: &CapabilityContext) -> CapabilityResult {
		let mut state = self.state.lock().await;
		let cleared = state.history.len();
		state.history.clear();

		debug!(cleared, "cleared session history");
		Ok(json!({ "cleared": cleared }))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;
	use tokio_util::sync::CancellationToken;

	fn setup_workspace() -> TempDir {
		tempfile::tempdir().unwrap()
	}

	fn caps(workspace: &TempDir) -> WorkspaceCapabilities {
		WorkspaceCapabilities::new(workspace.path())
	}

	#[tokio::test]
	async fn create_then_read_roundtrips_content() {
		let workspace = setup_workspace();
		let caps = caps(&workspace);
		let ctx = CapabilityContext::default();

		caps.create_file("src/lib.rs", "pub fn answer() -> u32 { 42 }", &ctx)
			.await
			.unwrap();

		let result = caps.read_file("src/lib.rs", &ctx).await.unwrap();
		assert_eq!(result["content"], "pub fn answer() -> u32 { 42 }");
	}

	#[tokio::test]
	async fn create_refuses_to_clobber_an_existing_file() {
		let workspace = setup_workspace();
		std::fs::write(workspace.path().join("notes.md"), "original").unwrap();
		let caps = caps(&workspace);
		let ctx = CapabilityContext::default();

		let result = caps.create_file("notes.md", "overwrite", &ctx).await;

		assert!(matches!(result, Err(CapabilityError::AlreadyExists(_))));
		let on_disk = std::fs::read_to_string(workspace.path().join("notes.md")).unwrap();
		assert_eq!(on_disk, "original");
	}

	#[tokio::test]
	async fn update_requires_the_file_to_exist() {
		let workspace = setup_workspace();
		let caps = caps(&workspace);
		let ctx = CapabilityContext::default();

		let result = caps.update_file("ghost.txt", "content", &ctx).await;

		assert!(matches!(result, Err(CapabilityError::NotFound(_))));
	}

	#[tokio::test]
	async fn delete_removes_the_file() {
		let workspace = setup_workspace();
		std::fs::write(workspace.path().join("doomed.txt"), "bye").unwrap();
		let caps = caps(&workspace);
		let ctx = CapabilityContext::default();

		caps.delete_file("doomed.txt", &ctx).await.unwrap();

		assert!(!workspace.path().join("doomed.txt").exists());
	}

	#[tokio::test]
	async fn paths_outside_the_workspace_are_rejected() {
		let workspace = setup_workspace();
		let caps = caps(&workspace);
		let ctx = CapabilityContext::default();

		let traversal = caps.read_file("../../../etc/passwd", &ctx).await;
		assert!(matches!(
			traversal,
			Err(CapabilityError::NotFound(_)) | Err(CapabilityError::InvalidPath(_))
		));

		let absolute = caps.create_file("/tmp/elsewhere.txt", "x", &ctx).await;
		assert!(matches!(absolute, Err(CapabilityError::InvalidPath(_))));

		let parent = caps.create_file("../escape.txt", "x", &ctx).await;
		assert!(matches!(parent, Err(CapabilityError::InvalidPath(_))));
	}

	#[tokio::test]
	async fn search_and_replace_touches_only_matching_files() {
		let workspace = setup_workspace();
		std::fs::write(workspace.path().join("a.txt"), "old old old").unwrap();
		std::fs::write(workspace.path().join("b.txt"), "nothing here").unwrap();
		let caps = caps(&workspace);
		let ctx = CapabilityContext::default();

		let result = caps.search_and_replace("old", "new", &ctx).await.unwrap();

		assert_eq!(result["files_changed"], 1);
		assert_eq!(result["replacements"], 3);
		let changed = std::fs::read_to_string(workspace.path().join("a.txt")).unwrap();
		assert_eq!(changed, "new new new");
		let untouched = std::fs::read_to_string(workspace.path().join("b.txt")).unwrap();
		assert_eq!(untouched, "nothing here");
	}

	#[tokio::test]
	async fn search_and_replace_skips_hidden_and_build_directories() {
		let workspace = setup_workspace();
		std::fs::create_dir_all(workspace.path().join("target")).unwrap();
		std::fs::create_dir_all(workspace.path().join(".git")).unwrap();
		std::fs::write(workspace.path().join("target/out.txt"), "old").unwrap();
		std::fs::write(workspace.path().join(".git/config"), "old").unwrap();
		std::fs::write(workspace.path().join("visible.txt"), "old").unwrap();
		let caps = caps(&workspace);
		let ctx = CapabilityContext::default();

		let result = caps.search_and_replace("old", "new", &ctx).await.unwrap();

		assert_eq!(result["files_changed"], 1);
		let skipped = std::fs::read_to_string(workspace.path().join("target/out.txt")).unwrap();
		assert_eq!(skipped, "old");
	}

	#[tokio::test]
	async fn analyze_project_counts_files_by_extension() {
		let workspace = setup_workspace();
		std::fs::create_dir_all(workspace.path().join("src")).unwrap();
		std::fs::write(workspace.path().join("src/main.rs"), "fn main() {}").unwrap();
		std::fs::write(workspace.path().join("src/lib.rs"), "").unwrap();
		std::fs::write(workspace.path().join("README.md"), "# hi").unwrap();
		let caps = caps(&workspace);
		let ctx = CapabilityContext::default();

		let result = caps.analyze_project(&ctx).await.unwrap();

		assert_eq!(result["files"], 3);
		assert_eq!(result["directories"], 1);
		assert_eq!(result["by_extension"]["rs"], 2);
		assert_eq!(result["by_extension"]["md"], 1);
	}

	#[tokio::test]
	async fn assistant_commands_fail_without_a_backend() {
		let workspace = setup_workspace();
		let caps = caps(&workspace);
		let ctx = CapabilityContext::default();

		for result in [
			caps.suggest_improvements("a.rs", &ctx).await,
			caps.generate_code("write a parser", &ctx).await,
			caps.refactor_code("a.rs", "extract_method", &ctx).await,
		] {
			assert!(matches!(
				result,
				Err(CapabilityError::AssistantUnavailable(_))
			));
		}
	}

	#[tokio::test]
	async fn context_round_trips_and_defaults_to_empty_object() {
		let workspace = setup_workspace();
		let caps = caps(&workspace);
		let ctx = CapabilityContext::default();

		assert_eq!(caps.get_context(&ctx).await.unwrap(), json!({}));

		caps.set_context(json!({ "open_files": ["a.rs"] }), &ctx)
			.await
			.unwrap();

		assert_eq!(
			caps.get_context(&ctx).await.unwrap(),
			json!({ "open_files": ["a.rs"] })
		);
	}

	#[tokio::test]
	async fn history_records_messages_until_cleared() {
		let workspace = setup_workspace();
		let caps = caps(&workspace);
		let ctx = CapabilityContext::default();

		caps.send_message("first", &ctx).await.unwrap();
		caps.send_message("second", &ctx).await.unwrap();

		let history = caps.get_history(&ctx).await.unwrap();
		let entries = history.as_array().unwrap();
		assert_eq!(entries.len(), 2);
		assert_eq!(entries[0]["content"], "first");

		let cleared = caps.clear_history(&ctx).await.unwrap();
		assert_eq!(cleared["cleared"], 2);
		assert_eq!(
			caps.get_history(&ctx).await.unwrap().as_array().unwrap().len(),
			0
		);
	}

	#[tokio::test]
	async fn run_tests_without_configured_command_fails() {
		let workspace = setup_workspace();
		let caps = caps(&workspace);
		let ctx = CapabilityContext::default();

		let result = caps.run_tests(None, &ctx).await;

		assert!(matches!(result, Err(CapabilityError::ExecutionFailed(_))));
	}

	#[tokio::test]
	async fn run_tests_reports_exit_status_and_output() {
		let workspace = setup_workspace();
		let caps = WorkspaceCapabilities::new(workspace.path()).with_test_command("echo all green");
		let ctx = CapabilityContext::default();

		let result = caps.run_tests(None, &ctx).await.unwrap();

		assert_eq!(result["exit_code"], 0);
		assert_eq!(result["passed"], true);
		assert_eq!(result["stdout"], "all green\n");
	}

	#[tokio::test]
	async fn run_tests_failure_is_reported_not_raised() {
		let workspace = setup_workspace();
		let caps = WorkspaceCapabilities::new(workspace.path()).with_test_command("exit 3");
		let ctx = CapabilityContext::default();

		let result = caps.run_tests(None, &ctx).await.unwrap();

		assert_eq!(result["exit_code"], 3);
		assert_eq!(result["passed"], false);
	}

	#[tokio::test]
	async fn cancelled_context_interrupts_long_operations() {
		let workspace = setup_workspace();
		std::fs::write(workspace.path().join("a.txt"), "x").unwrap();
		let caps = caps(&workspace);

		let token = CancellationToken::new();
		token.cancel();
		let ctx = CapabilityContext::new(token);

		let result = caps.search_and_replace("x", "y", &ctx).await;

		assert!(matches!(result, Err(CapabilityError::Cancelled)));
	}
}
