// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! `weft` - bridge between a remote goal planner and local editor
//! capabilities.
//!
//! The binary is thin: it loads settings, wires the connection manager,
//! dispatcher, queue, and session together, and hands off to one subcommand.
//! Everything it composes lives in the library crates.

mod commands;
mod config;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use config::{Overrides, Settings};

#[derive(Debug, Parser)]
#[command(name = "weft", version, about = "Goal-driven task bridge")]
struct Cli {
	#[command(flatten)]
	overrides: Overrides,

	#[command(subcommand)]
	command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
	/// Serve the planner: execute streamed tasks until shutdown
	Run,
	/// Submit one goal and collect its results
	Goal {
		/// Goal text, e.g. "refactor foo.py"
		text: String,
	},
	/// Preview the task decomposition of a goal without connecting
	Plan {
		/// Goal text to decompose
		text: String,
	},
	/// Show or clear stored history
	History {
		/// Most recent entries to show
		#[arg(long, default_value_t = 20)]
		limit: usize,

		#[command(subcommand)]
		command: Option<HistoryCommand>,
	},
}

#[derive(Debug, Subcommand)]
enum HistoryCommand {
	/// Delete all stored conversation and goal history
	Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
		)
		.init();

	let cli = Cli::parse();
	let settings = Settings::load(&cli.overrides)?;

	match cli.command {
		Command::Run => commands::run::execute(&settings).await,
		Command::Goal { text } => commands::goal::execute(&settings, &text).await,
		Command::Plan { text } => commands::plan::execute(&settings, &text).await,
		Command::History {
			command: Some(HistoryCommand::Clear),
			..
		} => commands::history::clear(&settings).await,
		Command::History { limit, command: None } => {
			commands::history::show(&settings, limit).await
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn cli_parses_goal_with_global_flags() {
		let cli = Cli::parse_from([
			"weft",
			"--endpoint",
			"ws://127.0.0.1:9000",
			"goal",
			"refactor foo.py",
		]);

		assert_eq!(cli.overrides.endpoint.as_deref(), Some("ws://127.0.0.1:9000"));
		assert!(matches!(cli.command, Command::Goal { text } if text == "refactor foo.py"));
	}

	#[test]
	fn cli_parses_history_clear() {
		let cli = Cli::parse_from(["weft", "history", "clear"]);
		assert!(matches!(
			cli.command,
			Command::History {
				command: Some(HistoryCommand::Clear),
				..
			}
		));
	}

	#[test]
	fn cli_defaults_history_limit() {
		let cli = Cli::parse_from(["weft", "history"]);
		assert!(matches!(
			cli.command,
			Command::History {
				limit: 20,
				command: None
			}
		));
	}
}
