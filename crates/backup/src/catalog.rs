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

//! Backup directory catalog
//!
//! The backup directory is the source of truth for what can be restored.
//! History and statistics are projections over a fresh directory scan and
//! never consult the record store.

use std::{
	fs, io,
	path::{Path, PathBuf},
	time::SystemTime,
};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::snapshot::{compressed_file_name, is_artifact_name};

/// One snapshot artifact found in the backup directory
#[derive(Debug, Clone)]
pub struct ArtifactEntry {
	pub file_name: String,
	pub path: PathBuf,
	pub size: u64,
	/// Size of the `.gz` sibling, if one exists
	pub compressed_size: Option<u64>,
	pub modified: SystemTime,
}

impl ArtifactEntry {
	pub fn compressed_path(&self) -> PathBuf {
		self.path.with_file_name(compressed_file_name(&self.file_name))
	}

	pub fn created_at(&self) -> DateTime<Utc> {
		DateTime::<Utc>::from(self.modified)
	}
}

/// List snapshot artifacts, newest first
///
/// Ordered by modification time descending, ties broken by file name
/// descending. A missing directory is an empty catalog. Compressed files,
/// temp files and anything else not named like an artifact are skipped.
pub fn list_artifacts(dir: &Path) -> io::Result<Vec<ArtifactEntry>> {
	let entries = match fs::read_dir(dir) {
		Ok(entries) => entries,
		Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
		Err(e) => return Err(e),
	};

	let mut artifacts = Vec::new();
	for entry in entries {
		let entry = entry?;
		let file_name = entry.file_name().to_string_lossy().into_owned();
		if !is_artifact_name(&file_name) {
			continue;
		}

		let meta = match entry.metadata() {
			Ok(meta) if meta.is_file() => meta,
			Ok(_) => continue,
			// Removed between read_dir and stat by a concurrent cleanup
			Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
			Err(e) => return Err(e),
		};

		let path = entry.path();
		let compressed_size = fs::metadata(path.with_file_name(compressed_file_name(&file_name)))
			.ok()
			.filter(|m| m.is_file())
			.map(|m| m.len());

		artifacts.push(ArtifactEntry {
			file_name,
			path,
			size: meta.len(),
			compressed_size,
			modified: meta.modified()?,
		});
	}

	artifacts.sort_by(|a, b| {
		b.modified
			.cmp(&a.modified)
			.then_with(|| b.file_name.cmp(&a.file_name))
	});
	Ok(artifacts)
}

/// One row of backup history
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
	pub file_name: String,
	pub created_at: DateTime<Utc>,
	pub size: u64,
	pub compressed_size: Option<u64>,
}

impl From<&ArtifactEntry> for HistoryEntry {
	fn from(entry: &ArtifactEntry) -> Self {
		Self {
			file_name: entry.file_name.clone(),
			created_at: entry.created_at(),
			size: entry.size,
			compressed_size: entry.compressed_size,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestBackup {
	pub file_name: String,
	pub created_at: DateTime<Utc>,
	pub size: u64,
}

/// Aggregate view of the backup directory
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupStats {
	pub total_backups: usize,
	pub latest_backup: Option<LatestBackup>,
	/// Sum of the uncompressed artifact sizes
	pub total_size: u64,
	pub backup_enabled: bool,
}

impl BackupStats {
	pub fn empty(backup_enabled: bool) -> Self {
		Self {
			total_backups: 0,
			latest_backup: None,
			total_size: 0,
			backup_enabled,
		}
	}

	/// Build stats from an already-sorted listing
	pub fn from_artifacts(artifacts: &[ArtifactEntry], backup_enabled: bool) -> Self {
		Self {
			total_backups: artifacts.len(),
			latest_backup: artifacts.first().map(|a| LatestBackup {
				file_name: a.file_name.clone(),
				created_at: a.created_at(),
				size: a.size,
			}),
			total_size: artifacts.iter().map(|a| a.size).sum(),
			backup_enabled,
		}
	}
}
