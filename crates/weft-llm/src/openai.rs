// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! OpenAI-compatible Chat Completions backend.
//!
//! Also the right backend for any provider that mimics this API shape;
//! point `base_url` at the compatible endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace};
use weft_core::error::LlmError;
use weft_core::llm::{ChatBackend, ChatRole, ChatTurn};
use weft_core::retry::{retry, RetryConfig};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Connection settings for an OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
	pub api_key: String,
	pub base_url: String,
	pub model: String,
}

impl OpenAiConfig {
	pub fn new(api_key: impl Into<String>) -> Self {
		Self {
			api_key: api_key.into(),
			base_url: DEFAULT_BASE_URL.to_string(),
			model: DEFAULT_MODEL.to_string(),
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
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
	model: &'a str,
	messages: Vec<WireMessage<'a>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
	role: ChatRole,
	content: &'a str,
}

fn wire_messages(turns: &[ChatTurn]) -> Vec<WireMessage<'_>> {
	turns
		.iter()
		.map(|turn| WireMessage {
			role: turn.role,
			content: &turn.content,
		})
		.collect()
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
	id: String,
	model: String,
	choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
	message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
	#[serde(default)]
	content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
	error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
	message: String,
}

/// Chat backend over an OpenAI-compatible Chat Completions API.
pub struct OpenAiBackend {
	config: OpenAiConfig,
	http_client: Client,
	retry_config: RetryConfig,
}

impl OpenAiBackend {
	pub fn new(config: OpenAiConfig) -> Result<Self, LlmError> {
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
				"initialized openai backend"
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
		let request = ChatCompletionRequest {
			model: &self.config.model,
			messages: wire_messages(turns),
			temperature: None,
		};
		let url = format!("{}/chat/completions", self.config.base_url);

		trace!(
				url = %url,
				model = %self.config.model,
				turn_count = turns.len(),
				"building chat completion request"
		);

		self.http_client
			.post(&url)
			.header("Content-Type", "application/json")
			.header("Authorization", format!("Bearer {}", self.config.api_key))
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
impl ChatBackend for OpenAiBackend {
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

			let completion: ChatCompletionResponse = response
				.json()
				.await
				.map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

			trace!(
					response_id = %completion.id,
					model = %completion.model,
					"received completion response"
			);

			completion
				.choices
				.into_iter()
				.next()
				.and_then(|choice| choice.message.content)
				.filter(|content| !content.is_empty())
				.ok_or_else(|| LlmError::InvalidResponse("no content in first choice".to_string()))
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
