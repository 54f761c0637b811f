// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! `weft goal` - submit one goal, print its results, persist history.

use std::sync::Arc;

use tracing::{debug, info, warn};

use weft_agent::{GoalSession, GoalStatus, TaskQueue};
use weft_core::llm::ChatRole;
use weft_core::protocol::TaskResult;
use weft_store::{ConversationEntry, GoalRecord, HistoryStore};

use crate::config::Settings;

pub async fn execute(settings: &Settings, text: &str) -> anyhow::Result<()> {
	let store = super::history_store(settings)?;
	let manager = super::connection(settings);
	let dispatcher = super::dispatcher(settings)?;
	let (queue, completions) =
		TaskQueue::start(dispatcher, manager.clone(), settings.queue_config());
	let session = Arc::new(GoalSession::new(manager.clone(), queue, completions));

	store
		.append_entry(&ConversationEntry::new(ChatRole::User, text))
		.await?;

	// Ctrl-C becomes the protocol-level cancel handshake, not a hard exit:
	// partial results still come back below.
	{
		let session = session.clone();
		tokio::spawn(async move {
			if tokio::signal::ctrl_c().await.is_ok() {
				info!("interrupt received, cancelling goal");
				if let Err(error) = session.cancel().await {
					debug!(error = %error, "interrupt arrived after the goal ended");
				}
			}
		});
	}

	let report = session.run(text).await?;
	manager.close().await;

	for result in &report.results {
		println!("{}", render(result));
		let entry = ConversationEntry::new(ChatRole::System, summarize(result));
		if let Err(error) = store.append_entry(&entry).await {
			warn!(error = %error, "failed to record task in history");
		}
	}

	let status = match report.status {
		GoalStatus::Completed => "completed",
		GoalStatus::Cancelled => "cancelled",
		GoalStatus::Failed => "failed",
	};
	let mut record = GoalRecord::new(text, status, report.results.len() as u64);
	if let Some(failure) = &report.failure {
		record = record.with_failure(failure.clone());
	}
	store.append_goal(&record).await?;

	println!("goal {status}: {} task result(s)", report.results.len());
	if let Some(failure) = report.failure {
		anyhow::bail!("goal failed: {failure}");
	}
	Ok(())
}

fn summarize(result: &TaskResult) -> String {
	match result.outcome.error_message() {
		None => format!("task {}: ok", result.command),
		Some(message) => format!("task {}: {message}", result.command),
	}
}

fn render(result: &TaskResult) -> String {
	format!("{} -> {}", result.command, result.outcome.to_wire())
}
