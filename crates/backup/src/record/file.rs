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
	collections::HashSet,
	fs, io,
	path::{Path, PathBuf},
	sync::Mutex,
};

use tracing::debug;

use super::{BackupRecord, RecordError, RecordStore, apply_insert, apply_update, newest_first};
use crate::fsutil;

/// Default number of records kept in the record file
pub const DEFAULT_RECORD_LIMIT: usize = 1000;

/// JSON-file record store
///
/// All records live in one JSON array that is rewritten atomically on every
/// change. The file is re-read on each call so several handles in one
/// process observe each other's writes.
///
/// The file is bounded: once it holds more than `limit` records, each insert
/// drops the oldest finalized ones. In-progress records are never dropped.
pub struct FileRecordStore {
	path: PathBuf,
	limit: usize,
	lock: Mutex<()>,
}

impl FileRecordStore {
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, RecordError> {
		let path = path.into();
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| {
				RecordError::Unavailable(format!("cannot create {}: {}", parent.display(), e))
			})?;
		}

		Ok(Self {
			path,
			limit: DEFAULT_RECORD_LIMIT,
			lock: Mutex::new(()),
		})
	}

	/// Keep at most `limit` records (at least one)
	pub fn with_limit(mut self, limit: usize) -> Self {
		self.limit = limit.max(1);
		self
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn limit(&self) -> usize {
		self.limit
	}

	fn load(&self) -> Result<Vec<BackupRecord>, RecordError> {
		match fs::read(&self.path) {
			Ok(bytes) => serde_json::from_slice(&bytes)
				.map_err(|e| RecordError::Storage(format!("corrupt record file: {}", e))),
			Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
			Err(e) => Err(RecordError::Unavailable(e.to_string())),
		}
	}

	fn save(&self, records: &[BackupRecord]) -> Result<(), RecordError> {
		let bytes = serde_json::to_vec_pretty(records)
			.map_err(|e| RecordError::Storage(e.to_string()))?;
		fsutil::write_atomic(&self.path, &bytes).map_err(|e| RecordError::Storage(e.to_string()))
	}

	fn modify(
		&self,
		f: impl FnOnce(&mut Vec<BackupRecord>) -> Result<(), RecordError>,
	) -> Result<(), RecordError> {
		let _guard = self
			.lock
			.lock()
			.map_err(|_| RecordError::Storage("record lock poisoned".to_string()))?;

		let mut records = self.load()?;
		f(&mut records)?;
		self.save(&records)
	}
}

impl RecordStore for FileRecordStore {
	fn ping(&self) -> Result<(), RecordError> {
		let dir = self
			.path
			.parent()
			.filter(|p| !p.as_os_str().is_empty())
			.unwrap_or_else(|| Path::new("."));

		match fs::metadata(dir) {
			Ok(meta) if meta.is_dir() => Ok(()),
			Ok(_) => Err(RecordError::Unavailable(format!(
				"{} is not a directory",
				dir.display()
			))),
			Err(e) => Err(RecordError::Unavailable(e.to_string())),
		}
	}

	fn insert(&self, record: &BackupRecord) -> Result<(), RecordError> {
		self.modify(|records| {
			apply_insert(records, record)?;
			let pruned = prune_finalized(records, self.limit);
			if pruned > 0 {
				debug!(target: "backup", pruned_records = pruned, "Oldest backup records pruned");
			}
			Ok(())
		})
	}

	fn update(&self, record: &BackupRecord) -> Result<(), RecordError> {
		self.modify(|records| apply_update(records, record))
	}

	fn get(&self, id: &str) -> Result<BackupRecord, RecordError> {
		self.load()?
			.into_iter()
			.find(|r| r.id == id)
			.ok_or_else(|| RecordError::NotFound(id.to_string()))
	}

	fn recent(&self, limit: usize) -> Result<Vec<BackupRecord>, RecordError> {
		Ok(newest_first(&self.load()?, limit))
	}
}

/// Drop the oldest finalized records until at most `limit` remain
fn prune_finalized(records: &mut Vec<BackupRecord>, limit: usize) -> usize {
	let excess = records.len().saturating_sub(limit);
	if excess == 0 {
		return 0;
	}

	let mut finalized: Vec<_> = records
		.iter()
		.filter(|r| r.status.is_terminal())
		.map(|r| (r.started_at, r.id.clone()))
		.collect();
	finalized.sort();

	let expired: HashSet<String> = finalized
		.into_iter()
		.take(excess)
		.map(|(_, id)| id)
		.collect();
	records.retain(|r| !expired.contains(&r.id));
	expired.len()
}
