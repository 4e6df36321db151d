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

use std::{
	collections::BTreeMap,
	io::{self, BufWriter, Write},
	path::{Path, PathBuf},
	time::Instant,
};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::{SnapshotArtifact, SnapshotError};
use crate::{
	fsutil,
	store::{DocumentStore, StoreError},
};

/// List every collection present right now
///
/// No caching: each call goes to the store, so collections created or
/// dropped since the previous backup are picked up. Names are sorted so
/// artifacts are deterministic.
pub fn enumerate_collections(store: &dyn DocumentStore) -> Result<Vec<String>, StoreError> {
	let mut names = store.list_collections()?;
	names.sort();
	names.dedup();

	debug!(target: "backup", collections = names.len(), "Collections enumerated");
	Ok(names)
}

/// Result of writing an artifact to disk
#[derive(Debug, Clone)]
pub struct WrittenSnapshot {
	pub file_name: String,
	pub path: PathBuf,
	pub size: u64,
	pub document_count: usize,
	pub collection_counts: BTreeMap<String, usize>,
}

/// Snapshot Serializer - dumps collections into a versioned artifact
///
/// Capture reads collection by collection; each collection is internally
/// consistent but the artifact as a whole is not a transactional snapshot.
///
/// Writing goes to a hidden temp file in the backup directory that is only
/// renamed to `backup-<ts>.json` once complete, so an interrupted write never
/// shows up as a restorable artifact.
pub struct SnapshotSerializer {
	backup_dir: PathBuf,
}

impl SnapshotSerializer {
	pub fn new(backup_dir: impl Into<PathBuf>) -> Self {
		Self {
			backup_dir: backup_dir.into(),
		}
	}

	pub fn backup_dir(&self) -> &Path {
		&self.backup_dir
	}

	/// Read every document of every named collection
	pub fn capture(
		&self,
		store: &dyn DocumentStore,
		collections: &[String],
		captured_at: DateTime<Utc>,
	) -> Result<SnapshotArtifact, SnapshotError> {
		let mut artifact = SnapshotArtifact::new(captured_at);

		for name in collections {
			let documents = store.find_all(name)?;
			debug!(
				target: "backup",
				collection = %name,
				documents = documents.len(),
				"Collection captured"
			);
			artifact.collections.insert(name.clone(), documents);
		}

		Ok(artifact)
	}

	/// Persist an artifact under its timestamp-derived name
	///
	/// Fails with `AlreadyExists` rather than replacing an existing artifact.
	pub fn write(&self, artifact: &SnapshotArtifact) -> Result<WrittenSnapshot, SnapshotError> {
		let start = Instant::now();
		let file_name = artifact.file_name();
		let path = self.backup_dir.join(&file_name);

		if path.exists() {
			return Err(SnapshotError::AlreadyExists(file_name));
		}

		let mut tmp = fsutil::temp_file_beside(&path).map_err(|e| SnapshotError::io(&path, e))?;
		{
			let mut writer = BufWriter::new(tmp.as_file_mut());
			serde_json::to_writer_pretty(&mut writer, artifact)?;
			writer.flush().map_err(|e| SnapshotError::io(&path, e))?;
		}

		let size = tmp
			.as_file()
			.metadata()
			.map_err(|e| SnapshotError::io(&path, e))?
			.len();

		fsutil::persist_new(tmp, &path).map_err(|e| {
			if e.kind() == io::ErrorKind::AlreadyExists {
				SnapshotError::AlreadyExists(file_name.clone())
			} else {
				SnapshotError::io(&path, e)
			}
		})?;

		let written = WrittenSnapshot {
			file_name,
			path,
			size,
			document_count: artifact.document_count(),
			collection_counts: artifact.collection_counts(),
		};

		info!(
			target: "backup",
			file_name = %written.file_name,
			size_bytes = written.size,
			documents = written.document_count,
			collections = written.collection_counts.len(),
			write_ms = start.elapsed().as_millis(),
			"Snapshot artifact written"
		);
		Ok(written)
	}
}
