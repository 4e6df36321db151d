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
	fs, io,
	path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
	catalog::{self, ArtifactEntry},
	fsutil,
	snapshot::{COMPRESSED_SUFFIX, is_artifact_name},
};

/// Default number of snapshot artifacts kept on disk
pub const DEFAULT_RETENTION_COUNT: usize = 10;

/// Smallest window; the artifact a backup just wrote always survives cleanup
pub const MIN_RETENTION_COUNT: usize = 1;

/// Error types for retention and maintenance operations
#[derive(Debug, Error)]
pub enum RetentionError {
	#[error("Failed to list backup directory {path}: {source}")]
	List { path: PathBuf, source: io::Error },
	#[error("Failed to delete {path}: {source}")]
	Delete { path: PathBuf, source: io::Error },
}

/// Retention Manager - bounds the number of artifacts kept on disk
///
/// The window is recomputed from a directory scan on every call; nothing is
/// persisted. Artifacts are ranked newest first (modification time, then
/// file name) and everything past `keep` is deleted with its `.gz` sibling.
#[derive(Debug, Clone)]
pub struct RetentionManager {
	keep: usize,
}

impl Default for RetentionManager {
	fn default() -> Self {
		Self::new(DEFAULT_RETENTION_COUNT)
	}
}

impl RetentionManager {
	/// Keep the newest `keep` artifacts, never fewer than [`MIN_RETENTION_COUNT`]
	pub fn new(keep: usize) -> Self {
		if keep < MIN_RETENTION_COUNT {
			warn!(
				target: "retention",
				requested = keep,
				keep = MIN_RETENTION_COUNT,
				"Retention count too small, clamping"
			);
		}
		Self {
			keep: keep.max(MIN_RETENTION_COUNT),
		}
	}

	pub fn keep(&self) -> usize {
		self.keep
	}

	/// Delete every artifact outside the retention window
	///
	/// Returns the number of artifacts deleted. Idempotent: a second call
	/// with no new artifacts deletes nothing.
	pub fn cleanup(&self, dir: &Path) -> Result<usize, RetentionError> {
		let artifacts = list(dir)?;
		if artifacts.len() <= self.keep {
			return Ok(0);
		}

		let expired = &artifacts[self.keep..];
		for artifact in expired {
			delete_pair(artifact)?;
		}

		debug!(
			target: "retention",
			deleted_count = expired.len(),
			retained_count = self.keep,
			"Old backups cleaned up"
		);
		Ok(expired.len())
	}

	/// Delete the most recent artifact pair, returning its file name
	pub fn delete_latest(&self, dir: &Path) -> Result<Option<String>, RetentionError> {
		let Some(latest) = list(dir)?.into_iter().next() else {
			return Ok(None);
		};

		delete_pair(&latest)?;
		info!(target: "retention", file_name = %latest.file_name, "Deleted latest backup");
		Ok(Some(latest.file_name))
	}

	/// Delete every artifact, compressed file and leftover temp file
	///
	/// Returns the number of files removed.
	pub fn delete_all(&self, dir: &Path) -> Result<usize, RetentionError> {
		let entries = match fs::read_dir(dir) {
			Ok(entries) => entries,
			Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
			Err(source) => {
				return Err(RetentionError::List {
					path: dir.to_path_buf(),
					source,
				});
			}
		};

		// Compressed files go first so no `.gz` is left without its source
		let mut targets: Vec<(bool, PathBuf)> = entries
			.filter_map(|entry| entry.ok())
			.filter_map(|entry| {
				let name = entry.file_name().to_string_lossy().into_owned();
				let is_compressed = name
					.strip_suffix(COMPRESSED_SUFFIX)
					.is_some_and(is_artifact_name);
				let owned = is_compressed || is_artifact_name(&name) || fsutil::is_temp_file(&name);
				owned.then(|| (!is_compressed, entry.path()))
			})
			.collect();
		targets.sort();

		let mut removed = 0;
		for (_, path) in targets {
			if remove(&path)? {
				removed += 1;
			}
		}

		info!(target: "retention", removed_files = removed, "Deleted all backups");
		Ok(removed)
	}
}

fn list(dir: &Path) -> Result<Vec<ArtifactEntry>, RetentionError> {
	catalog::list_artifacts(dir).map_err(|source| RetentionError::List {
		path: dir.to_path_buf(),
		source,
	})
}

fn remove(path: &Path) -> Result<bool, RetentionError> {
	fsutil::remove_if_exists(path).map_err(|source| RetentionError::Delete {
		path: path.to_path_buf(),
		source,
	})
}

fn delete_pair(artifact: &ArtifactEntry) -> Result<(), RetentionError> {
	remove(&artifact.compressed_path())?;
	remove(&artifact.path)?;
	Ok(())
}
