// Copyright 2025 itscheems
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

mod file;
mod memory;
pub mod recorder;

use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use file::{DEFAULT_RECORD_LIMIT, FileRecordStore};
pub use memory::MemoryRecordStore;
pub use recorder::{CompletionStats, MetadataRecorder};

/// Error types for backup record operations
#[derive(Debug, Error)]
pub enum RecordError {
	#[error("Record store unavailable: {0}")]
	Unavailable(String),
	#[error("Backup record already exists for {0}")]
	Duplicate(String),
	#[error("Backup record not found: {0}")]
	NotFound(String),
	#[error("Backup record {id} is already {status}")]
	AlreadyFinalized { id: String, status: BackupStatus },
	#[error("Record storage error: {0}")]
	Storage(String),
}

/// What caused a backup attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupType {
	Manual,
	Scheduled,
	Initial,
}

impl fmt::Display for BackupType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			BackupType::Manual => "manual",
			BackupType::Scheduled => "scheduled",
			BackupType::Initial => "initial",
		};
		f.write_str(s)
	}
}

/// Lifecycle of a backup attempt
///
/// Moves `InProgress -> Completed | Failed` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupStatus {
	InProgress,
	Completed,
	Failed,
}

impl BackupStatus {
	pub fn is_terminal(self) -> bool {
		!matches!(self, BackupStatus::InProgress)
	}
}

impl fmt::Display for BackupStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			BackupStatus::InProgress => "in_progress",
			BackupStatus::Completed => "completed",
			BackupStatus::Failed => "failed",
		};
		f.write_str(s)
	}
}

/// Persisted metadata for one backup attempt
///
/// Records are an audit trail. The backup directory stays the source of
/// truth for what can be restored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupRecord {
	pub id: String,
	pub file_name: String,
	pub backup_type: BackupType,
	pub triggered_by: String,
	pub status: BackupStatus,
	pub started_at: DateTime<Utc>,
	pub completed_at: Option<DateTime<Utc>>,
	pub size: Option<u64>,
	pub compressed_size: Option<u64>,
	pub document_count: Option<usize>,
	#[serde(default)]
	pub collections: BTreeMap<String, usize>,
	pub error: Option<String>,
}

impl BackupRecord {
	pub fn new(file_name: &str, backup_type: BackupType, triggered_by: &str) -> Self {
		Self {
			id: Uuid::new_v4().to_string(),
			file_name: file_name.to_string(),
			backup_type,
			triggered_by: triggered_by.to_string(),
			status: BackupStatus::InProgress,
			started_at: Utc::now(),
			completed_at: None,
			size: None,
			compressed_size: None,
			document_count: None,
			collections: BTreeMap::new(),
			error: None,
		}
	}

	fn ensure_open(&self) -> Result<(), RecordError> {
		if self.status.is_terminal() {
			return Err(RecordError::AlreadyFinalized {
				id: self.id.clone(),
				status: self.status,
			});
		}
		Ok(())
	}

	/// Mark the attempt successful and attach its statistics
	pub fn complete(&mut self, stats: CompletionStats) -> Result<(), RecordError> {
		self.ensure_open()?;

		self.status = BackupStatus::Completed;
		self.completed_at = Some(Utc::now());
		self.size = Some(stats.size);
		self.compressed_size = Some(stats.compressed_size);
		self.document_count = Some(stats.document_count);
		self.collections = stats.collections;
		Ok(())
	}

	/// Mark the attempt failed with the error that ended it
	pub fn fail(&mut self, error: &str) -> Result<(), RecordError> {
		self.ensure_open()?;

		self.status = BackupStatus::Failed;
		self.completed_at = Some(Utc::now());
		self.error = Some(error.to_string());
		Ok(())
	}
}

/// Record Store trait - persistence for backup records
///
/// Records are keyed by artifact file name; at most one record may exist per
/// file name. Implementations must refuse to overwrite a record whose stored
/// status is already terminal, so a stale finalize can never flip a
/// completed attempt to failed.
pub trait RecordStore: Send + Sync {
	/// Check that the store is reachable
	fn ping(&self) -> Result<(), RecordError>;

	/// Insert a new record, failing with `Duplicate` if its file name is taken
	fn insert(&self, record: &BackupRecord) -> Result<(), RecordError>;

	/// Replace an existing record that is still in progress
	fn update(&self, record: &BackupRecord) -> Result<(), RecordError>;

	/// Fetch a record by id
	fn get(&self, id: &str) -> Result<BackupRecord, RecordError>;

	/// Most recent records first, at most `limit`
	fn recent(&self, limit: usize) -> Result<Vec<BackupRecord>, RecordError>;
}

/// Shared insert/update rules for the bundled stores
pub(crate) fn apply_insert(
	records: &mut Vec<BackupRecord>,
	record: &BackupRecord,
) -> Result<(), RecordError> {
	if records.iter().any(|r| r.file_name == record.file_name) {
		return Err(RecordError::Duplicate(record.file_name.clone()));
	}
	records.push(record.clone());
	Ok(())
}

pub(crate) fn apply_update(
	records: &mut [BackupRecord],
	record: &BackupRecord,
) -> Result<(), RecordError> {
	let stored = records
		.iter_mut()
		.find(|r| r.id == record.id)
		.ok_or_else(|| RecordError::NotFound(record.id.clone()))?;

	stored.ensure_open()?;
	*stored = record.clone();
	Ok(())
}

pub(crate) fn newest_first(records: &[BackupRecord], limit: usize) -> Vec<BackupRecord> {
	let mut sorted = records.to_vec();
	sorted.sort_by(|a, b| {
		b.started_at
			.cmp(&a.started_at)
			.then_with(|| b.file_name.cmp(&a.file_name))
	});
	sorted.truncate(limit);
	sorted
}
