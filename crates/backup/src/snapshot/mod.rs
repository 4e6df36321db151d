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

pub mod serializer;

use std::{
	collections::BTreeMap,
	fs, io,
	path::{Path, PathBuf},
};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::{Document, StoreError};
pub use serializer::{SnapshotSerializer, WrittenSnapshot, enumerate_collections};

/// Version tag written into every artifact
pub const FORMAT_VERSION: &str = "1.0";

/// File name prefix of snapshot artifacts
pub const ARTIFACT_PREFIX: &str = "backup-";

/// File name extension of snapshot artifacts
pub const ARTIFACT_EXTENSION: &str = ".json";

/// Suffix appended to an artifact name for its compressed sibling
pub const COMPRESSED_SUFFIX: &str = ".gz";

/// Error types for snapshot operations
#[derive(Debug, Error)]
pub enum SnapshotError {
	#[error("Failed to read from document store: {0}")]
	Store(#[from] StoreError),
	#[error("Snapshot I/O error on {path}: {source}")]
	Io { path: PathBuf, source: io::Error },
	#[error("Snapshot serialization failed: {0}")]
	Serialization(#[from] serde_json::Error),
	#[error("Snapshot already exists: {0}")]
	AlreadyExists(String),
	#[error("Unsupported snapshot version: {0}")]
	UnsupportedVersion(String),
}

impl SnapshotError {
	pub(crate) fn io(path: &Path, source: io::Error) -> Self {
		SnapshotError::Io {
			path: path.to_path_buf(),
			source,
		}
	}
}

/// Snapshot Artifact - the full dump of every collection at one instant
///
/// The artifact is self-describing: restoring it touches exactly the
/// collections named in `collections` and nothing else.
///
/// On disk it is a JSON object:
/// `{ "timestamp": ISO-8601, "version": "1.0", "collections": { name: [docs] } }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotArtifact {
	pub timestamp: String,
	pub version: String,
	pub collections: BTreeMap<String, Vec<Document>>,
}

impl SnapshotArtifact {
	pub fn new(captured_at: DateTime<Utc>) -> Self {
		Self {
			timestamp: format_timestamp(captured_at),
			version: FORMAT_VERSION.to_string(),
			collections: BTreeMap::new(),
		}
	}

	/// File name derived from the capture timestamp
	pub fn file_name(&self) -> String {
		artifact_file_name(&self.timestamp)
	}

	pub fn document_count(&self) -> usize {
		self.collections.values().map(Vec::len).sum()
	}

	pub fn collection_counts(&self) -> BTreeMap<String, usize> {
		self.collections
			.iter()
			.map(|(name, docs)| (name.clone(), docs.len()))
			.collect()
	}

	/// Parse an artifact file, rejecting versions this build cannot restore
	pub fn read(path: &Path) -> Result<Self, SnapshotError> {
		let bytes = fs::read(path).map_err(|e| SnapshotError::io(path, e))?;
		let artifact: SnapshotArtifact = serde_json::from_slice(&bytes)?;

		if artifact.version != FORMAT_VERSION {
			return Err(SnapshotError::UnsupportedVersion(artifact.version));
		}
		Ok(artifact)
	}
}

/// ISO-8601 UTC timestamp with millisecond precision, e.g. `2024-01-01T00:00:00.000Z`
pub fn format_timestamp(at: DateTime<Utc>) -> String {
	at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `backup-<timestamp>.json` with `:` and `.` replaced so the name is filesystem-safe
pub fn artifact_file_name(timestamp: &str) -> String {
	format!(
		"{}{}{}",
		ARTIFACT_PREFIX,
		timestamp.replace([':', '.'], "-"),
		ARTIFACT_EXTENSION
	)
}

pub fn compressed_file_name(file_name: &str) -> String {
	format!("{}{}", file_name, COMPRESSED_SUFFIX)
}

/// Whether `name` is a bare snapshot artifact file name
///
/// Rejects anything carrying a path component, so callers can join it onto
/// the backup directory safely.
pub fn is_artifact_name(name: &str) -> bool {
	name.len() > ARTIFACT_PREFIX.len() + ARTIFACT_EXTENSION.len()
		&& name.starts_with(ARTIFACT_PREFIX)
		&& name.ends_with(ARTIFACT_EXTENSION)
		&& !name.contains(['/', '\\'])
		&& !name.contains("..")
}
