// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! `weft history` - inspect or clear the stored goal/conversation history.

use weft_core::llm::ChatRole;
use weft_store::HistoryStore;

use crate::config::Settings;

pub async fn show(settings: &Settings, limit: usize) -> anyhow::Result<()> {
	let store = super::history_store(settings)?;

	let goals = store.goals().await?;
	if goals.is_empty() {
		println!("no goals recorded");
	} else {
		println!("goals:");
		for record in &goals[goals.len().saturating_sub(limit)..] {
			match &record.failure {
				Some(failure) => println!(
					"  {} [{}] {} ({} task(s)) - {}",
					record.at, record.status, record.goal, record.tasks, failure
				),
				None => println!(
					"  {} [{}] {} ({} task(s))",
					record.at, record.status, record.goal, record.tasks
				),
			}
		}
	}

	let conversation = store.conversation().await?;
	if !conversation.is_empty() {
		println!("conversation:");
		for entry in &conversation[conversation.len().saturating_sub(limit)..] {
			println!("  {} {}: {}", entry.at, role_label(entry.role), entry.content);
		}
	}

	Ok(())
}

pub async fn clear(settings: &Settings) -> anyhow::Result<()> {
	let store = super::history_store(settings)?;
	store.clear().await?;
	println!("history cleared");
	Ok(())
}

fn role_label(role: ChatRole) -> &'static str {
	match role {
		ChatRole::System => "system",
		ChatRole::User => "user",
		ChatRole::Assistant => "assistant",
	}
}
