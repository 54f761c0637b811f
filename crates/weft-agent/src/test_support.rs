// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Test doubles shared by the queue, goal, and relay unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::sync::{mpsc, Mutex as AsyncMutex};

use weft_bridge::capabilities::{CapabilityResult, EditorCapabilities};
use weft_core::capability::CapabilityContext;
use weft_core::error::CapabilityError;
use weft_core::protocol::{Envelope, TaskRequest, TaskResult};
use weft_conn::error::ConnError;

use crate::link::PeerLink;
use crate::queue::ResultSink;

/// Capability set driven by `send_message` content: `sleep:<ms>` waits (and
/// honors cancellation), `panic` panics, `fail` errors, anything else echoes.
pub(crate) struct MockCapabilities;

#[async_trait]
impl EditorCapabilities for MockCapabilities {
	async fn send_message(&self, content: &str, ctx: &CapabilityContext) -> CapabilityResult {
		if let Some(ms) = content.strip_prefix("sleep:") {
			let ms: u64 = ms.parse().unwrap();
			tokio::select! {
				_ = tokio::time::sleep(Duration::from_millis(ms)) => {}
				_ = ctx.cancel_token().cancelled() => {
					return Err(CapabilityError::Cancelled);
				}
			}
		}
		if content == "panic" {
			panic!("scripted panic");
		}
		if content == "fail" {
			return Err(CapabilityError::ExecutionFailed("scripted".to_string()));
		}
		Ok(json!({ "echo": content }))
	}

	async fn analyze_project(&self, _ctx: &CapabilityContext) -> CapabilityResult {
		Ok(json!({}))
	}

	async fn suggest_improvements(&self, _f: &str, _ctx: &CapabilityContext) -> CapabilityResult {
		Ok(json!({}))
	}

	async fn generate_code(&self, _p: &str, _ctx: &CapabilityContext) -> CapabilityResult {
		Ok(json!({}))
	}

	async fn refactor_code(
		&self,
		file_path: &str,
		refactor_kind: &str,
		_ctx: &CapabilityContext,
	) -> CapabilityResult {
		Ok(json!({ "file_path": file_path, "refactor_type": refactor_kind }))
	}

	async fn run_tests(&self, _t: Option<&str>, _ctx: &CapabilityContext) -> CapabilityResult {
		Ok(json!({}))
	}

	async fn create_file(&self, _f: &str, _c: &str, _ctx: &CapabilityContext) -> CapabilityResult {
		Ok(json!({}))
	}

	async fn read_file(&self, _f: &str, _ctx: &CapabilityContext) -> CapabilityResult {
		Ok(json!({}))
	}

	async fn update_file(&self, _f: &str, _c: &str, _ctx: &CapabilityContext) -> CapabilityResult {
		Ok(json!({}))
	}

	async fn delete_file(&self, _f: &str, _ctx: &CapabilityContext) -> CapabilityResult {
		Ok(json!({}))
	}

	async fn search_and_replace(
		&self,
		_s: &str,
		_r: &str,
		_ctx: &CapabilityContext,
	) -> CapabilityResult {
		Ok(json!({}))
	}

	async fn get_context(&self, _ctx: &CapabilityContext) -> CapabilityResult {
		Ok(json!({}))
	}

	async fn set_context(&self, _c: Value, _ctx: &CapabilityContext) -> CapabilityResult {
		Ok(json!({}))
	}

	async fn get_history(&self, _ctx: &CapabilityContext) -> CapabilityResult {
		Ok(json!([]))
	}

	async fn clear_history(&self, _ctx: &CapabilityContext) -> CapabilityResult {
		Ok(json!({}))
	}
}

/// Builds a `send_message` task whose content drives [`MockCapabilities`].
pub(crate) fn message_task(content: &str) -> TaskRequest {
	let mut args = Map::new();
	args.insert("content".to_string(), json!(content));
	TaskRequest::new("send_message", args)
}

/// Channel-backed peer: tests feed inbound envelopes (or errors) through the
/// returned sender and inspect everything the agent sent via [`MockLink::sent`].
pub(crate) struct MockLink {
	inbound: AsyncMutex<mpsc::UnboundedReceiver<Result<Envelope, ConnError>>>,
	outbound: Mutex<Vec<Envelope>>,
	fail_sends: AtomicBool,
}

pub(crate) type InboundScript = mpsc::UnboundedSender<Result<Envelope, ConnError>>;

impl MockLink {
	pub(crate) fn new() -> (Arc<Self>, InboundScript) {
		let (tx, rx) = mpsc::unbounded_channel();
		let link = Arc::new(Self {
			inbound: AsyncMutex::new(rx),
			outbound: Mutex::new(Vec::new()),
			fail_sends: AtomicBool::new(false),
		});
		(link, tx)
	}

	pub(crate) fn fail_sends(&self) {
		self.fail_sends.store(true, Ordering::SeqCst);
	}

	pub(crate) fn sent(&self) -> Vec<Envelope> {
		self.outbound.lock().unwrap().clone()
	}

	/// Waits until `predicate` matches some sent envelope. Panics after two
	/// seconds to keep a broken test from hanging the suite.
	pub(crate) async fn wait_for_sent(&self, predicate: impl Fn(&Envelope) -> bool) {
		for _ in 0..200 {
			if self.sent().iter().any(&predicate) {
				return;
			}
			tokio::time::sleep(Duration::from_millis(10)).await;
		}
		panic!("expected envelope was never sent: {:?}", self.sent());
	}
}

#[async_trait]
impl PeerLink for MockLink {
	async fn ensure_connected(&self) -> Result<(), ConnError> {
		Ok(())
	}

	async fn send(&self, envelope: &Envelope) -> Result<(), ConnError> {
		if self.fail_sends.load(Ordering::SeqCst) {
			return Err(ConnError::Transport("scripted send failure".to_string()));
		}
		self.outbound.lock().unwrap().push(envelope.clone());
		Ok(())
	}

	async fn receive(&self) -> Result<Envelope, ConnError> {
		match self.inbound.lock().await.recv().await {
			Some(scripted) => scripted,
			None => Err(ConnError::ConnectionFailed {
				attempts: 3,
				message: "peer script exhausted".to_string(),
			}),
		}
	}
}

#[async_trait]
impl ResultSink for MockLink {
	async fn deliver(&self, result: &TaskResult) -> Result<(), ConnError> {
		self.send(&result.to_envelope()).await
	}
}
