// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! `weft run` - peer-driven relay mode.

use tracing::info;

use weft_agent::{Relay, TaskQueue};

use crate::config::Settings;

pub async fn execute(settings: &Settings) -> anyhow::Result<()> {
	let manager = super::connection(settings);
	let dispatcher = super::dispatcher(settings)?;
	let (queue, _completions) =
		TaskQueue::start(dispatcher, manager.clone(), settings.queue_config());

	let relay = Relay::new(manager.clone(), queue);

	let shutdown = relay.shutdown_token();
	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			info!("interrupt received, shutting down");
			shutdown.cancel();
		}
	});

	info!(endpoint = %settings.endpoint, workspace = %settings.workspace.display(), "serving planner tasks");
	let outcome = relay.run().await;
	manager.close().await;

	Ok(outcome?)
}
