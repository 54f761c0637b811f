// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Layered configuration: flags over `WEFT_*` environment variables over an
//! optional TOML file over built-in defaults. Flag/env precedence is clap's;
//! this module only merges the file layer underneath.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use serde::Deserialize;
use tracing::debug;

use weft_agent::QueueConfig;
use weft_core::retry::RetryConfig;

const DEFAULT_ENDPOINT: &str = "ws://127.0.0.1:8765";
const DEFAULT_TASK_TIMEOUT_SECS: u64 = 300;

/// Flags shared by every subcommand.
#[derive(Debug, Clone, Args)]
pub struct Overrides {
	/// Config file (default: ~/.config/weft/config.toml)
	#[arg(long, env = "WEFT_CONFIG", global = true)]
	pub config: Option<PathBuf>,

	/// Planner endpoint, ws:// or wss://
	#[arg(long, env = "WEFT_ENDPOINT", global = true)]
	pub endpoint: Option<String>,

	/// Directory the editor capabilities operate on
	#[arg(long, env = "WEFT_WORKSPACE", global = true)]
	pub workspace: Option<PathBuf>,

	/// Shell command run_tests invokes, e.g. "cargo test"
	#[arg(long, env = "WEFT_TEST_COMMAND", global = true)]
	pub test_command: Option<String>,

	/// Per-task execution bound in seconds; 0 disables the bound
	#[arg(long, env = "WEFT_TASK_TIMEOUT", global = true)]
	pub task_timeout: Option<u64>,

	/// Chat provider: openai or anthropic
	#[arg(long, env = "WEFT_LLM_PROVIDER", global = true)]
	pub llm_provider: Option<String>,

	/// Chat provider API key
	#[arg(long, env = "WEFT_LLM_API_KEY", global = true, hide_env_values = true)]
	pub llm_api_key: Option<String>,

	/// Chat model name
	#[arg(long, env = "WEFT_LLM_MODEL", global = true)]
	pub llm_model: Option<String>,

	/// Chat provider base URL, for compatible endpoints
	#[arg(long, env = "WEFT_LLM_BASE_URL", global = true)]
	pub llm_base_url: Option<String>,

	/// Directory for conversation and goal history
	#[arg(long, env = "WEFT_HISTORY_DIR", global = true)]
	pub history_dir: Option<PathBuf>,
}

/// config.toml shape. Retry tuning lives only here; it has no flags.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
	endpoint: Option<String>,
	workspace: Option<PathBuf>,
	test_command: Option<String>,
	task_timeout: Option<u64>,
	history_dir: Option<PathBuf>,
	#[serde(default)]
	retry: RetrySection,
	llm: Option<LlmSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RetrySection {
	max_attempts: Option<u32>,
	base_delay_ms: Option<u64>,
	max_delay_ms: Option<u64>,
	backoff_factor: Option<f64>,
	jitter: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct LlmSection {
	provider: Option<String>,
	api_key: Option<String>,
	model: Option<String>,
	base_url: Option<String>,
}

/// Everything the subcommands need, fully merged.
#[derive(Debug, Clone)]
pub struct Settings {
	pub endpoint: String,
	pub workspace: PathBuf,
	pub test_command: Option<String>,
	/// `None` means the per-task bound is disabled.
	pub task_timeout: Option<Duration>,
	pub history_dir: Option<PathBuf>,
	pub retry: RetryConfig,
	pub llm: Option<LlmSettings>,
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
	pub provider: String,
	pub api_key: String,
	pub model: Option<String>,
	pub base_url: Option<String>,
}

impl Settings {
	pub fn load(overrides: &Overrides) -> anyhow::Result<Self> {
		let file = load_file(overrides.config.as_deref())?;
		Ok(Self::merge(overrides, file))
	}

	fn merge(overrides: &Overrides, file: FileConfig) -> Self {
		let endpoint = overrides
			.endpoint
			.clone()
			.or(file.endpoint)
			.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

		let workspace = overrides
			.workspace
			.clone()
			.or(file.workspace)
			.unwrap_or_else(|| PathBuf::from("."));

		let timeout_secs = overrides
			.task_timeout
			.or(file.task_timeout)
			.unwrap_or(DEFAULT_TASK_TIMEOUT_SECS);
		let task_timeout = (timeout_secs != 0).then(|| Duration::from_secs(timeout_secs));

		let defaults = RetryConfig::default();
		let retry = RetryConfig {
			max_attempts: file.retry.max_attempts.unwrap_or(defaults.max_attempts),
			base_delay: file
				.retry
				.base_delay_ms
				.map(Duration::from_millis)
				.unwrap_or(defaults.base_delay),
			max_delay: file
				.retry
				.max_delay_ms
				.map(Duration::from_millis)
				.unwrap_or(defaults.max_delay),
			backoff_factor: file.retry.backoff_factor.unwrap_or(defaults.backoff_factor),
			jitter: file.retry.jitter.unwrap_or(defaults.jitter),
		};

		let file_llm = file.llm.unwrap_or(LlmSection {
			provider: None,
			api_key: None,
			model: None,
			base_url: None,
		});
		let llm = overrides
			.llm_provider
			.clone()
			.or(file_llm.provider)
			.map(|provider| LlmSettings {
				provider,
				api_key: overrides
					.llm_api_key
					.clone()
					.or(file_llm.api_key)
					.unwrap_or_default(),
				model: overrides.llm_model.clone().or(file_llm.model),
				base_url: overrides.llm_base_url.clone().or(file_llm.base_url),
			});

		Self {
			endpoint,
			workspace,
			test_command: overrides.test_command.clone().or(file.test_command),
			task_timeout,
			history_dir: overrides.history_dir.clone().or(file.history_dir),
			retry,
			llm,
		}
	}

	pub fn queue_config(&self) -> QueueConfig {
		QueueConfig {
			task_timeout: self.task_timeout,
		}
	}
}

fn load_file(explicit: Option<&Path>) -> anyhow::Result<FileConfig> {
	let path = match explicit {
		Some(path) => path.to_path_buf(),
		None => match dirs::config_dir() {
			Some(dir) => dir.join("weft").join("config.toml"),
			None => return Ok(FileConfig::default()),
		},
	};

	if !path.exists() {
		// Only an explicitly named file has to exist.
		if explicit.is_some() {
			anyhow::bail!("config file not found: {}", path.display());
		}
		return Ok(FileConfig::default());
	}

	let text = std::fs::read_to_string(&path)
		.with_context(|| format!("reading {}", path.display()))?;
	let config = toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;

	debug!(path = %path.display(), "loaded config file");
	Ok(config)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn no_overrides() -> Overrides {
		Overrides {
			config: None,
			endpoint: None,
			workspace: None,
			test_command: None,
			task_timeout: None,
			llm_provider: None,
			llm_api_key: None,
			llm_model: None,
			llm_base_url: None,
			history_dir: None,
		}
	}

	fn parse_file(text: &str) -> FileConfig {
		toml::from_str(text).unwrap()
	}

	#[test]
	fn defaults_without_file_or_flags() {
		let settings = Settings::merge(&no_overrides(), FileConfig::default());

		assert_eq!(settings.endpoint, DEFAULT_ENDPOINT);
		assert_eq!(settings.workspace, PathBuf::from("."));
		assert_eq!(settings.task_timeout, Some(Duration::from_secs(300)));
		assert_eq!(settings.retry.max_attempts, 3);
		assert!(settings.llm.is_none());
		assert!(settings.test_command.is_none());
	}

	#[test]
	fn file_values_apply_when_no_flags() {
		let file = parse_file(
			r#"
			endpoint = "wss://planner.example/agent"
			workspace = "/srv/project"
			test_command = "cargo test"
			task_timeout = 60

			[retry]
			max_attempts = 5
			base_delay_ms = 250
			jitter = true

			[llm]
			provider = "anthropic"
			api_key = "sk-test"
			model = "claude-sonnet-4-5"
			"#,
		);

		let settings = Settings::merge(&no_overrides(), file);

		assert_eq!(settings.endpoint, "wss://planner.example/agent");
		assert_eq!(settings.workspace, PathBuf::from("/srv/project"));
		assert_eq!(settings.test_command.as_deref(), Some("cargo test"));
		assert_eq!(settings.task_timeout, Some(Duration::from_secs(60)));
		assert_eq!(settings.retry.max_attempts, 5);
		assert_eq!(settings.retry.base_delay, Duration::from_millis(250));
		assert!(settings.retry.jitter);

		let llm = settings.llm.unwrap();
		assert_eq!(llm.provider, "anthropic");
		assert_eq!(llm.api_key, "sk-test");
		assert_eq!(llm.model.as_deref(), Some("claude-sonnet-4-5"));
	}

	#[test]
	fn flags_win_over_the_file() {
		let file = parse_file(r#"endpoint = "ws://from-file:1""#);
		let overrides = Overrides {
			endpoint: Some("ws://from-flag:2".to_string()),
			..no_overrides()
		};

		let settings = Settings::merge(&overrides, file);
		assert_eq!(settings.endpoint, "ws://from-flag:2");
	}

	#[test]
	fn zero_timeout_disables_the_bound() {
		let overrides = Overrides {
			task_timeout: Some(0),
			..no_overrides()
		};

		let settings = Settings::merge(&overrides, FileConfig::default());
		assert_eq!(settings.task_timeout, None);
		assert_eq!(settings.queue_config().task_timeout, None);
	}

	#[test]
	fn provider_flag_combines_with_file_api_key() {
		let file = parse_file(
			r#"
			[llm]
			api_key = "sk-from-file"
			"#,
		);
		let overrides = Overrides {
			llm_provider: Some("openai".to_string()),
			..no_overrides()
		};

		let llm = Settings::merge(&overrides, file).llm.unwrap();
		assert_eq!(llm.provider, "openai");
		assert_eq!(llm.api_key, "sk-from-file");
	}

	#[test]
	fn unknown_file_keys_are_rejected() {
		let result: Result<FileConfig, _> = toml::from_str(r#"endpont = "typo""#);
		assert!(result.is_err());
	}

	#[test]
	fn explicit_missing_config_file_is_an_error() {
		let err = load_file(Some(Path::new("/nonexistent/weft.toml"))).unwrap_err();
		assert!(err.to_string().contains("not found"));
	}
}
