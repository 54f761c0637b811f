// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! `weft plan` - LLM-only decomposition preview, no connection involved.

use anyhow::Context;

use weft_llm::Planner;

use crate::config::Settings;

pub async fn execute(settings: &Settings, text: &str) -> anyhow::Result<()> {
	let backend = super::chat_backend(settings)?
		.context("plan requires an [llm] provider in the configuration")?;

	let planner = Planner::new(backend);
	let tasks = planner.plan(text).await?;

	println!("{}", serde_json::to_string_pretty(&tasks)?);
	Ok(())
}
