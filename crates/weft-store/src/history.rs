// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Durable goal/conversation history.
//!
//! Two flat JSON files under a history directory: the running
//! conversation (goals submitted plus per-task summaries) and one
//! record per finished goal run. Writes go through a `.tmp` rename so
//! a crash mid-save never corrupts what was already on disk.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::model::{ConversationEntry, GoalRecord};

const CONVERSATION_FILE: &str = "conversation_history.json";
const GOAL_FILE: &str = "goal_history.json";

#[async_trait]
pub trait HistoryStore: Send + Sync {
	async fn append_entry(&self, entry: &ConversationEntry) -> Result<(), StoreError>;
	async fn conversation(&self) -> Result<Vec<ConversationEntry>, StoreError>;
	async fn append_goal(&self, record: &GoalRecord) -> Result<(), StoreError>;
	async fn goals(&self) -> Result<Vec<GoalRecord>, StoreError>;
	async fn clear(&self) -> Result<(), StoreError>;
}

pub struct JsonHistoryStore {
	history_dir: PathBuf,
}

impl JsonHistoryStore {
	pub fn new(history_dir: PathBuf) -> Self {
		Self { history_dir }
	}

	pub fn from_xdg() -> Result<Self, StoreError> {
		let data_dir = dirs::data_dir().ok_or_else(|| {
			StoreError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				"could not determine XDG data directory",
			))
		})?;

		let history_dir = data_dir.join("weft").join("history");
		std::fs::create_dir_all(&history_dir)?;

		info!(
				history_dir = %history_dir.display(),
				"initialized history store"
		);

		Ok(Self::new(history_dir))
	}

	fn file_path(&self, name: &str) -> PathBuf {
		self.history_dir.join(name)
	}

	async fn load_list<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>, StoreError> {
		let path = self.file_path(name);

		if !path.exists() {
			debug!(path = %path.display(), "history file not found, starting empty");
			return Ok(Vec::new());
		}

		let contents = tokio::fs::read_to_string(&path).await?;
		let items: Vec<T> = serde_json::from_str(&contents)?;

		Ok(items)
	}

	async fn save_list<T: Serialize>(&self, name: &str, items: &[T]) -> Result<(), StoreError> {
		tokio::fs::create_dir_all(&self.history_dir).await?;

		let path = self.file_path(name);
		let tmp_path = self.file_path(&format!("{name}.tmp"));

		let json = serde_json::to_string_pretty(items)?;

		tokio::fs::write(&tmp_path, &json).await?;
		tokio::fs::rename(&tmp_path, &path).await?;

		debug!(
				path = %path.display(),
				count = items.len(),
				"saved history file"
		);

		Ok(())
	}
}

#[async_trait]
impl HistoryStore for JsonHistoryStore {
	async fn append_entry(&self, entry: &ConversationEntry) -> Result<(), StoreError> {
		let mut entries: Vec<ConversationEntry> = self.load_list(CONVERSATION_FILE).await?;
		entries.push(entry.clone());
		self.save_list(CONVERSATION_FILE, &entries).await
	}

	async fn conversation(&self) -> Result<Vec<ConversationEntry>, StoreError> {
		self.load_list(CONVERSATION_FILE).await
	}

	async fn append_goal(&self, record: &GoalRecord) -> Result<(), StoreError> {
		let mut records: Vec<GoalRecord> = self.load_list(GOAL_FILE).await?;
		records.push(record.clone());
		self.save_list(GOAL_FILE, &records).await
	}

	async fn goals(&self) -> Result<Vec<GoalRecord>, StoreError> {
		self.load_list(GOAL_FILE).await
	}

	async fn clear(&self) -> Result<(), StoreError> {
		for name in [CONVERSATION_FILE, GOAL_FILE] {
			let path = self.file_path(name);
			if path.exists() {
				tokio::fs::remove_file(&path).await?;
			}
		}

		info!("cleared stored history");

		Ok(())
	}
}
