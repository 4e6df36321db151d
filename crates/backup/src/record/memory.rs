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

use std::sync::{
	Mutex,
	atomic::{AtomicBool, Ordering},
};

use super::{BackupRecord, RecordError, RecordStore, apply_insert, apply_update, newest_first};

/// In-memory record store
///
/// No durability. The availability switch lets tests and embedders exercise
/// the degraded (file-only) backup path.
pub struct MemoryRecordStore {
	records: Mutex<Vec<BackupRecord>>,
	available: AtomicBool,
}

impl MemoryRecordStore {
	pub fn new() -> Self {
		Self {
			records: Mutex::new(Vec::new()),
			available: AtomicBool::new(true),
		}
	}

	pub fn set_available(&self, available: bool) {
		self.available.store(available, Ordering::SeqCst);
	}

	fn with_records<T>(
		&self,
		f: impl FnOnce(&mut Vec<BackupRecord>) -> Result<T, RecordError>,
	) -> Result<T, RecordError> {
		self.ping()?;
		let mut records = self
			.records
			.lock()
			.map_err(|_| RecordError::Storage("record lock poisoned".to_string()))?;
		f(&mut records)
	}
}

impl Default for MemoryRecordStore {
	fn default() -> Self {
		Self::new()
	}
}

impl RecordStore for MemoryRecordStore {
	fn ping(&self) -> Result<(), RecordError> {
		if self.available.load(Ordering::SeqCst) {
			Ok(())
		} else {
			Err(RecordError::Unavailable("not connected".to_string()))
		}
	}

	fn insert(&self, record: &BackupRecord) -> Result<(), RecordError> {
		self.with_records(|records| apply_insert(records, record))
	}

	fn update(&self, record: &BackupRecord) -> Result<(), RecordError> {
		self.with_records(|records| apply_update(records, record))
	}

	fn get(&self, id: &str) -> Result<BackupRecord, RecordError> {
		self.with_records(|records| {
			records
				.iter()
				.find(|r| r.id == id)
				.cloned()
				.ok_or_else(|| RecordError::NotFound(id.to_string()))
		})
	}

	fn recent(&self, limit: usize) -> Result<Vec<BackupRecord>, RecordError> {
		self.with_records(|records| Ok(newest_first(records, limit)))
	}
}
