// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Subcommand implementations plus the wiring they share.

pub mod goal;
pub mod history;
pub mod plan;
pub mod run;

use std::sync::Arc;

use anyhow::{bail, Context};

use weft_bridge::{AssistedCapabilities, CommandDispatcher, EditorCapabilities, WorkspaceCapabilities};
use weft_conn::{ConnectionManager, WsDialer};
use weft_core::llm::ChatBackend;
use weft_llm::{AnthropicBackend, AnthropicConfig, OpenAiBackend, OpenAiConfig};
use weft_store::JsonHistoryStore;

use crate::config::Settings;

/// Connection manager over the configured endpoint.
fn connection(settings: &Settings) -> Arc<ConnectionManager> {
	Arc::new(ConnectionManager::new(
		settings.endpoint.clone(),
		Box::new(WsDialer),
		settings.retry.clone(),
	))
}

/// Chat backend from the `[llm]` settings; `None` when no provider is
/// configured.
fn chat_backend(settings: &Settings) -> anyhow::Result<Option<Arc<dyn ChatBackend>>> {
	let Some(llm) = &settings.llm else {
		return Ok(None);
	};

	let backend: Arc<dyn ChatBackend> = match llm.provider.as_str() {
		"openai" => {
			let mut config = OpenAiConfig::new(llm.api_key.clone());
			if let Some(model) = &llm.model {
				config = config.with_model(model);
			}
			if let Some(base_url) = &llm.base_url {
				config = config.with_base_url(base_url);
			}
			Arc::new(OpenAiBackend::new(config)?)
		}
		"anthropic" => {
			let mut config = AnthropicConfig::new(llm.api_key.clone());
			if let Some(model) = &llm.model {
				config = config.with_model(model);
			}
			if let Some(base_url) = &llm.base_url {
				config = config.with_base_url(base_url);
			}
			Arc::new(AnthropicBackend::new(config)?)
		}
		other => bail!("unknown llm provider '{other}' (expected openai or anthropic)"),
	};

	Ok(Some(backend))
}

/// Dispatcher over the workspace capabilities, LLM-assisted when a chat
/// provider is configured.
fn dispatcher(settings: &Settings) -> anyhow::Result<CommandDispatcher> {
	let mut workspace = WorkspaceCapabilities::new(settings.workspace.clone());
	if let Some(test_command) = &settings.test_command {
		workspace = workspace.with_test_command(test_command);
	}
	let workspace: Arc<dyn EditorCapabilities> = Arc::new(workspace);

	let capabilities: Arc<dyn EditorCapabilities> = match chat_backend(settings)? {
		Some(backend) => Arc::new(AssistedCapabilities::new(workspace, backend)),
		None => workspace,
	};

	Ok(CommandDispatcher::new(capabilities))
}

fn history_store(settings: &Settings) -> anyhow::Result<JsonHistoryStore> {
	match &settings.history_dir {
		Some(dir) => {
			std::fs::create_dir_all(dir)
				.with_context(|| format!("creating history directory {}", dir.display()))?;
			Ok(JsonHistoryStore::new(dir.clone()))
		}
		None => Ok(JsonHistoryStore::from_xdg()?),
	}
}
