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

//! Restore engine
//!
//! Restoring is destructive and scoped by the artifact itself:
//!
//! 1. Validate the file name and load the artifact
//! 2. For every collection named in the artifact, delete all documents
//! 3. Insert the artifact's documents (empty collections stay empty)
//!
//! Collections that are not named in the artifact are never touched.

use std::{
	path::{Path, PathBuf},
	time::Instant,
};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
	snapshot::{SnapshotArtifact, SnapshotError, is_artifact_name},
	store::{DocumentStore, StoreError},
};

/// Error types for restore operations
#[derive(Debug, Error)]
pub enum RestoreError {
	#[error("Invalid backup file name: {0}")]
	InvalidName(String),
	#[error("Backup file not found: {0}")]
	NotFound(String),
	#[error("Failed to load backup: {0}")]
	Load(#[from] SnapshotError),
	#[error("Failed to restore collection {collection}: {source}")]
	Collection {
		collection: String,
		source: StoreError,
	},
}

/// Outcome of a successful restore
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreReport {
	pub restored_collections: Vec<String>,
	pub total_documents: usize,
}

/// Restore Engine - replaces collection contents with an artifact's contents
pub struct RestoreEngine {
	backup_dir: PathBuf,
}

impl RestoreEngine {
	pub fn new(backup_dir: impl Into<PathBuf>) -> Self {
		Self {
			backup_dir: backup_dir.into(),
		}
	}

	/// Resolve a bare artifact file name inside the backup directory
	pub fn resolve(&self, file_name: &str) -> Result<PathBuf, RestoreError> {
		if !is_artifact_name(file_name) {
			return Err(RestoreError::InvalidName(file_name.to_string()));
		}

		let path = self.backup_dir.join(file_name);
		if !path.is_file() {
			return Err(RestoreError::NotFound(file_name.to_string()));
		}
		Ok(path)
	}

	/// Restore every collection in `file_name` into `store`
	///
	/// Aborts on the first collection error. Collections processed before the
	/// failure keep their restored contents.
	pub fn restore(
		&self,
		store: &dyn DocumentStore,
		file_name: &str,
	) -> Result<RestoreReport, RestoreError> {
		let start = Instant::now();
		let path = self.resolve(file_name)?;
		let artifact = SnapshotArtifact::read(&path)?;

		info!(
			target: "restore",
			file_name = file_name,
			snapshot_timestamp = %artifact.timestamp,
			collections = artifact.collections.len(),
			"Restoring backup"
		);

		let report = apply(store, artifact)?;

		info!(
			target: "restore",
			file_name = file_name,
			restored_collections = report.restored_collections.len(),
			total_documents = report.total_documents,
			restore_ms = start.elapsed().as_millis(),
			"Backup restored"
		);
		Ok(report)
	}

	pub fn backup_dir(&self) -> &Path {
		&self.backup_dir
	}
}

fn apply(store: &dyn DocumentStore, artifact: SnapshotArtifact) -> Result<RestoreReport, RestoreError> {
	let mut report = RestoreReport {
		restored_collections: Vec::with_capacity(artifact.collections.len()),
		total_documents: 0,
	};

	for (collection, documents) in artifact.collections {
		let wrap = |source| RestoreError::Collection {
			collection: collection.clone(),
			source,
		};

		let removed = store.delete_all(&collection).map_err(wrap)?;
		let inserted = if documents.is_empty() {
			0
		} else {
			store.insert_many(&collection, documents).map_err(wrap)?
		};

		debug!(
			target: "restore",
			collection = %collection,
			removed = removed,
			inserted = inserted,
			"Collection restored"
		);

		report.total_documents += inserted;
		report.restored_collections.push(collection);
	}

	Ok(report)
}
