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

//! Backup orchestration
//!
//! `create_backup` runs one of two paths:
//!
//! - **Full path** (record store reachable): drop the newest existing
//!   artifact pair, create an in-progress record, enumerate, serialize,
//!   compress, complete the record, then apply retention.
//! - **File-only path** (record store unreachable, or the record could not
//!   be created): clear the backup directory, then serialize and compress.
//!   No record is kept and `backup_id` is `None`.
//!
//! Every failure after the record exists finalizes it as failed. Files left
//! by a failed attempt are removed so they are never offered for restore.
//!
//! Create and restore share one in-flight slot. A caller that finds the slot
//! taken gets `BackupError::InProgress` immediately.

use std::{
	path::{Path, PathBuf},
	sync::{
		Arc,
		atomic::{AtomicBool, Ordering},
	},
	time::Instant,
};

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
	catalog::{self, BackupStats, HistoryEntry},
	compress::{self, CompressError},
	config::BackupConfig,
	fsutil,
	record::{
		BackupRecord, BackupType, CompletionStats, MetadataRecorder, RecordError, RecordStore,
	},
	restore::{RestoreEngine, RestoreError, RestoreReport},
	retention::{RetentionError, RetentionManager},
	snapshot::{
		self, SnapshotError, SnapshotSerializer, WrittenSnapshot, compressed_file_name,
		enumerate_collections,
	},
	store::{DocumentStore, StoreError},
};

/// Error types for orchestrated backup operations
#[derive(Debug, Error)]
pub enum BackupError {
	#[error("A backup or restore is already in progress")]
	InProgress,
	#[error(transparent)]
	Store(#[from] StoreError),
	#[error(transparent)]
	Snapshot(#[from] SnapshotError),
	#[error(transparent)]
	Compress(#[from] CompressError),
	#[error(transparent)]
	Record(#[from] RecordError),
	#[error(transparent)]
	Retention(#[from] RetentionError),
	#[error(transparent)]
	Restore(#[from] RestoreError),
}

/// Outcome of a successful backup
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupReport {
	pub file_name: String,
	pub size: u64,
	pub compressed_size: u64,
	pub document_count: usize,
	/// Id of the backup record; `None` when the file-only path was taken
	pub backup_id: Option<String>,
}

/// Artifact and compressed sibling produced by one attempt
struct Produced {
	snapshot: WrittenSnapshot,
	compressed_size: u64,
}

/// Releases the in-flight slot when dropped
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
	fn drop(&mut self) {
		self.0.store(false, Ordering::Release);
	}
}

/// Backup Orchestrator - the single entry point for backup operations
pub struct BackupOrchestrator {
	store: Arc<dyn DocumentStore>,
	recorder: MetadataRecorder,
	serializer: SnapshotSerializer,
	retention: RetentionManager,
	restorer: RestoreEngine,
	backup_dir: PathBuf,
	backup_enabled: bool,
	in_flight: AtomicBool,
}

impl BackupOrchestrator {
	pub fn new(
		store: Arc<dyn DocumentStore>,
		records: Arc<dyn RecordStore>,
		config: &BackupConfig,
	) -> Self {
		Self {
			store,
			recorder: MetadataRecorder::new(records),
			serializer: SnapshotSerializer::new(&config.backup_dir),
			retention: RetentionManager::new(config.retention_count),
			restorer: RestoreEngine::new(&config.backup_dir),
			backup_dir: config.backup_dir.clone(),
			backup_enabled: config.enabled,
			in_flight: AtomicBool::new(false),
		}
	}

	pub fn backup_dir(&self) -> &Path {
		&self.backup_dir
	}

	/// Whether a backup or restore is running right now
	pub fn is_busy(&self) -> bool {
		self.in_flight.load(Ordering::Acquire)
	}

	fn try_acquire(&self) -> Result<InFlightGuard<'_>, BackupError> {
		self.in_flight
			.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
			.map(|_| InFlightGuard(&self.in_flight))
			.map_err(|_| BackupError::InProgress)
	}

	/// Create a backup of every collection
	pub fn create_backup(
		&self,
		backup_type: BackupType,
		triggered_by: &str,
	) -> Result<BackupReport, BackupError> {
		let _guard = self.try_acquire().inspect_err(|_| {
			warn!(
				target: "backup",
				backup_type = %backup_type,
				triggered_by = triggered_by,
				"Backup rejected, another operation is in progress"
			);
		})?;

		let start = Instant::now();
		info!(
			target: "backup",
			backup_type = %backup_type,
			triggered_by = triggered_by,
			"Backup started"
		);

		let result = if self.recorder.is_available() {
			self.full_backup(backup_type, triggered_by)
		} else {
			warn!(target: "backup", "Record store unavailable, taking file-only backup path");
			self.file_only_backup()
		};

		match &result {
			Ok(report) => info!(
				target: "backup",
				file_name = %report.file_name,
				size_bytes = report.size,
				compressed_bytes = report.compressed_size,
				documents = report.document_count,
				backup_id = ?report.backup_id,
				total_ms = start.elapsed().as_millis(),
				"Backup completed"
			),
			Err(e) => error!(
				target: "backup",
				backup_type = %backup_type,
				error = %e,
				total_ms = start.elapsed().as_millis(),
				"Backup failed"
			),
		}

		result
	}

	fn full_backup(
		&self,
		backup_type: BackupType,
		triggered_by: &str,
	) -> Result<BackupReport, BackupError> {
		if let Err(e) = self.retention.delete_latest(&self.backup_dir) {
			warn!(target: "backup", error = %e, "Failed to delete latest backup before new one");
		}

		let (captured_at, file_name) = self.next_capture();

		let record = match self.recorder.begin(&file_name, backup_type, triggered_by) {
			Ok(record) => record,
			Err(e) => {
				warn!(
					target: "backup",
					error = %e,
					"Could not create backup record, falling back to file-only path"
				);
				return self.file_only_backup();
			}
		};

		match self.produce(captured_at).and_then(|p| self.finish_record(&record, p)) {
			Ok(report) => {
				if let Err(e) = self.retention.cleanup(&self.backup_dir) {
					warn!(target: "backup", error = %e, "Retention cleanup failed");
				}
				Ok(report)
			}
			Err(e) => {
				self.discard_failed(&file_name, &e);
				if let Err(record_err) = self.recorder.fail(&record.id, &e.to_string()) {
					error!(
						target: "backup",
						backup_id = %record.id,
						error = %record_err,
						"Failed to mark backup record as failed"
					);
				}
				Err(e)
			}
		}
	}

	fn finish_record(
		&self,
		record: &BackupRecord,
		produced: Produced,
	) -> Result<BackupReport, BackupError> {
		let stats = CompletionStats {
			size: produced.snapshot.size,
			compressed_size: produced.compressed_size,
			document_count: produced.snapshot.document_count,
			collections: produced.snapshot.collection_counts.clone(),
		};
		self.recorder.complete(&record.id, stats)?;

		Ok(report(produced, Some(record.id.clone())))
	}

	fn file_only_backup(&self) -> Result<BackupReport, BackupError> {
		self.retention.delete_all(&self.backup_dir)?;

		let (captured_at, file_name) = self.next_capture();

		match self.produce(captured_at) {
			Ok(produced) => Ok(report(produced, None)),
			Err(e) => {
				self.discard_failed(&file_name, &e);
				Err(e)
			}
		}
	}

	/// Capture time whose artifact name is not yet taken
	fn next_capture(&self) -> (DateTime<Utc>, String) {
		let mut at = Utc::now();
		loop {
			let file_name = snapshot::artifact_file_name(&snapshot::format_timestamp(at));
			if !self.backup_dir.join(&file_name).exists() {
				return (at, file_name);
			}
			at += TimeDelta::milliseconds(1);
		}
	}

	/// Enumerate, serialize and compress
	fn produce(&self, captured_at: DateTime<Utc>) -> Result<Produced, BackupError> {
		let collections = enumerate_collections(self.store.as_ref())?;
		let artifact = self
			.serializer
			.capture(self.store.as_ref(), &collections, captured_at)?;
		let snapshot = self.serializer.write(&artifact)?;

		let compressed_path = self
			.backup_dir
			.join(compressed_file_name(&snapshot.file_name));
		let compressed_size = compress::compress_file(&snapshot.path, &compressed_path)?;

		Ok(Produced {
			snapshot,
			compressed_size,
		})
	}

	/// Remove whatever a failed attempt left under its final names
	fn discard_failed(&self, file_name: &str, cause: &BackupError) {
		// The name belongs to an artifact this attempt did not write
		if matches!(cause, BackupError::Snapshot(SnapshotError::AlreadyExists(_))) {
			return;
		}

		let path = self.backup_dir.join(file_name);
		for target in [path.with_file_name(compressed_file_name(file_name)), path] {
			if let Err(e) = fsutil::remove_if_exists(&target) {
				warn!(
					target: "backup",
					path = %target.display(),
					error = %e,
					"Failed to remove files of failed backup"
				);
			}
		}
	}

	/// Replace the contents of every collection in `file_name`
	pub fn restore_backup(&self, file_name: &str) -> Result<RestoreReport, BackupError> {
		let _guard = self.try_acquire()?;

		self.restorer
			.restore(self.store.as_ref(), file_name)
			.inspect_err(|e| {
				error!(target: "restore", file_name = file_name, error = %e, "Restore failed");
			})
			.map_err(BackupError::from)
	}

	/// Backups on disk, newest first
	pub fn backup_history(&self) -> Vec<HistoryEntry> {
		match catalog::list_artifacts(&self.backup_dir) {
			Ok(artifacts) => artifacts.iter().map(HistoryEntry::from).collect(),
			Err(e) => {
				error!(target: "backup", error = %e, "Failed to list backup history");
				Vec::new()
			}
		}
	}

	/// Aggregate statistics over the backup directory
	pub fn backup_stats(&self) -> BackupStats {
		match catalog::list_artifacts(&self.backup_dir) {
			Ok(artifacts) => BackupStats::from_artifacts(&artifacts, self.backup_enabled),
			Err(e) => {
				error!(target: "backup", error = %e, "Failed to compute backup stats");
				BackupStats::empty(self.backup_enabled)
			}
		}
	}

	/// Delete the newest artifact pair; errors are logged, never returned
	pub fn delete_latest_backup(&self) {
		let Ok(_guard) = self.try_acquire() else {
			warn!(target: "backup", "Skipping delete-latest, an operation is in progress");
			return;
		};

		if let Err(e) = self.retention.delete_latest(&self.backup_dir) {
			error!(target: "backup", error = %e, "Failed to delete latest backup");
		}
	}

	/// Delete every artifact; errors are logged, never returned
	pub fn delete_all_backups(&self) {
		let Ok(_guard) = self.try_acquire() else {
			warn!(target: "backup", "Skipping delete-all, an operation is in progress");
			return;
		};

		if let Err(e) = self.retention.delete_all(&self.backup_dir) {
			error!(target: "backup", error = %e, "Failed to delete backups");
		}
	}

	/// Recent backup records from the metadata store
	///
	/// Audit data only; restorability is decided by the directory.
	pub fn audit_trail(&self, limit: usize) -> Vec<BackupRecord> {
		self.recorder.recent(limit).unwrap_or_else(|e| {
			warn!(target: "backup", error = %e, "Failed to read backup records");
			Vec::new()
		})
	}
}

fn report(produced: Produced, backup_id: Option<String>) -> BackupReport {
	BackupReport {
		file_name: produced.snapshot.file_name,
		size: produced.snapshot.size,
		compressed_size: produced.compressed_size,
		document_count: produced.snapshot.document_count,
		backup_id,
	}
}
