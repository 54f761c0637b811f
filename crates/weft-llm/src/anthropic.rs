// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Anthropic Messages API backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace};
use weft_core::error::LlmError;
use weft_core::llm::{ChatBackend, ChatRole, ChatTurn};
use weft_core::retry::{retry, RetryConfig};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_MAX_TOKENS: u32 = 4096;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Connection settings for the Anthropic Messages API.
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
	pub api_key: String,
	pub base_url: String,
	pub model: String,
	pub max_tokens: u32,
}

impl AnthropicConfig {
	pub fn new(api_key: impl Into<String>) -> Self {
		Self {
			api_key: api_key.into(),
			base_url: DEFAULT_BASE_URL.to_string(),
			model: DEFAULT_MODEL.to_string(),
			max_tokens: DEFAULT_MAX_TOKENS,
		}
	}

	pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
		self.base_url = base_url.into();
		self
	}

	pub fn with_model(mut self, model: impl Into<String>) -> Self {
		self.model = model.into();
		self
	}

	pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
		self.max_tokens = max_tokens;
		self
	}
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
	model: &'a str,
	max_tokens: u32,
	#[serde(skip_serializing_if = "Option::is_none")]
	system: Option<String>,
	messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
	role: &'static str,
	content: &'a str,
}

/// The Messages API takes system text as a top-level field, not a message
/// role; lift system turns out and keep the rest in order.
fn split_turns(turns: &[ChatTurn]) -> (Option<String>, Vec<AnthropicMessage<'_>>) {
	let mut system_parts = Vec::new();
	let mut messages = Vec::new();

	for turn in turns {
		match turn.role {
			ChatRole::System => system_parts.push(turn.content.as_str()),
			ChatRole::User => messages.push(AnthropicMessage {
				role: "user",
				content: &turn.content,
			}),
			ChatRole::Assistant => messages.push(AnthropicMessage {
				role: "assistant",
				content: &turn.content,
			}),
		}
	}

	let system = if system_parts.is_empty() {
		None
	} else {
		Some(system_parts.join("\n\n"))
	};

	(system, messages)
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
	id: String,
	model: String,
	content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
	Text { text: String },
	#[serde(other)]
	Other,
}

impl MessagesResponse {
	fn text(&self) -> String {
		self.content
			.iter()
			.filter_map(|block| match block {
				ContentBlock::Text { text } => Some(text.as_str()),
				ContentBlock::Other => None,
			})
			.collect()
	}
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
	error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
	message: String,
}

/// Chat backend over the Anthropic Messages API.
pub struct AnthropicBackend {
	config: AnthropicConfig,
	http_client: Client,
	retry_config: RetryConfig,
}

impl AnthropicBackend {
	pub fn new(config: AnthropicConfig) -> Result<Self, LlmError> {
		if config.api_key.is_empty() {
			return Err(LlmError::Config("api key is empty".to_string()));
		}

		let http_client = Client::builder()
			.timeout(REQUEST_TIMEOUT)
			.build()
			.map_err(|e| LlmError::Http(e.to_string()))?;

		let retry_config = RetryConfig {
			max_attempts: 3,
			base_delay: Duration::from_millis(500),
			max_delay: Duration::from_secs(30),
			backoff_factor: 2.0,
			jitter: true,
		};

		info!(
				model = %config.model,
				base_url = %config.base_url,
				"initialized anthropic backend"
		);

		Ok(Self {
			config,
			http_client,
			retry_config,
		})
	}

	pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
		self.retry_config = retry_config;
		self
	}

	fn build_request(&self, turns: &[ChatTurn]) -> reqwest::RequestBuilder {
		let (system, messages) = split_turns(turns);
		let request = MessagesRequest {
			model: &self.config.model,
			max_tokens: self.config.max_tokens,
			system,
			messages,
		};
		let url = format!("{}/v1/messages", self.config.base_url);

		trace!(
				url = %url,
				model = %self.config.model,
				turn_count = turns.len(),
				"building messages request"
		);

		self.http_client
			.post(&url)
			.header("content-type", "application/json")
			.header("x-api-key", &self.config.api_key)
			.header("anthropic-version", ANTHROPIC_VERSION)
			.json(&request)
	}

	async fn handle_error_response(&self, response: reqwest::Response) -> LlmError {
		let status = response.status();

		debug!(status = %status, "received error response");

		if status.as_u16() == 401 {
			return LlmError::Api("authentication failed".to_string());
		}

		if status.as_u16() == 429 {
			let retry_after = response
				.headers()
				.get("retry-after")
				.and_then(|v| v.to_str().ok())
				.and_then(|v| v.parse().ok());

			return LlmError::RateLimited {
				retry_after_secs: retry_after,
			};
		}

		// 408 and 5xx are transient server trouble, not a rejected request.
		if status.as_u16() == 408 || status.is_server_error() {
			return LlmError::Http(format!("HTTP {status}"));
		}

		match response.json::<ApiErrorBody>().await {
			Ok(body) => {
				error!(message = %body.error.message, "provider api error");
				LlmError::Api(body.error.message)
			}
			Err(e) => {
				error!(
						status = %status,
						parse_error = %e,
						"failed to parse error response"
				);
				LlmError::Api(format!("HTTP {status}"))
			}
		}
	}
}

#[async_trait]
impl ChatBackend for AnthropicBackend {
	async fn complete(&self, turns: &[ChatTurn]) -> Result<String, LlmError> {
		debug!(
			turn_count = turns.len(),
			model = %self.config.model,
			"starting completion request"
		);

		let result = retry(&self.retry_config, || async {
			let response = self.build_request(turns).send().await.map_err(|e| {
				if e.is_timeout() {
					LlmError::Timeout
				} else {
					LlmError::Http(e.to_string())
				}
			})?;

			if !response.status().is_success() {
				return Err(self.handle_error_response(response).await);
			}

			let completion: MessagesResponse = response
				.json()
				.await
				.map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

			trace!(
					response_id = %completion.id,
					model = %completion.model,
					"received messages response"
			);

			let text = completion.text();
			if text.is_empty() {
				return Err(LlmError::InvalidResponse(
					"response carried no text content".to_string(),
				));
			}

			Ok(text)
		})
		.await;

		match result {
			Ok(content) => {
				info!(content_len = content.len(), "completion request successful");
				Ok(content)
			}
			Err(e) => {
				error!(error = %e, "completion request failed");
				Err(e)
			}
		}
	}
}
