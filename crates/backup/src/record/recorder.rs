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

use std::{collections::BTreeMap, sync::Arc};

use tracing::{debug, warn};

use super::{BackupRecord, BackupType, RecordError, RecordStore};

/// Statistics attached to a completed backup record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionStats {
	pub size: u64,
	pub compressed_size: u64,
	pub document_count: usize,
	pub collections: BTreeMap<String, usize>,
}

/// Metadata Recorder - lifecycle bookkeeping for backup attempts
///
/// The orchestrator is the only caller. A record is created before any file
/// I/O happens and finalized exactly once when the attempt ends.
#[derive(Clone)]
pub struct MetadataRecorder {
	store: Arc<dyn RecordStore>,
}

impl MetadataRecorder {
	pub fn new(store: Arc<dyn RecordStore>) -> Self {
		Self { store }
	}

	/// Whether the metadata store can currently be reached
	pub fn is_available(&self) -> bool {
		match self.store.ping() {
			Ok(()) => true,
			Err(e) => {
				debug!(target: "backup", error = %e, "Record store not reachable");
				false
			}
		}
	}

	/// Create the in-progress record for a new attempt
	pub fn begin(
		&self,
		file_name: &str,
		backup_type: BackupType,
		triggered_by: &str,
	) -> Result<BackupRecord, RecordError> {
		let record = BackupRecord::new(file_name, backup_type, triggered_by);
		self.store.insert(&record)?;

		debug!(
			target: "backup",
			backup_id = %record.id,
			file_name = file_name,
			"Backup record created"
		);
		Ok(record)
	}

	/// Finalize a record as completed
	pub fn complete(&self, id: &str, stats: CompletionStats) -> Result<BackupRecord, RecordError> {
		let mut record = self.store.get(id)?;
		record.complete(stats)?;
		self.store.update(&record)?;
		Ok(record)
	}

	/// Finalize a record as failed
	///
	/// A record that already reached a terminal state is left untouched and
	/// `AlreadyFinalized` is returned.
	pub fn fail(&self, id: &str, error: &str) -> Result<BackupRecord, RecordError> {
		let mut record = self.store.get(id)?;
		if let Err(e) = record.fail(error) {
			warn!(
				target: "backup",
				backup_id = id,
				status = %record.status,
				"Ignoring failure for a finalized backup record"
			);
			return Err(e);
		}
		self.store.update(&record)?;
		Ok(record)
	}

	/// Most recent backup records, newest first
	pub fn recent(&self, limit: usize) -> Result<Vec<BackupRecord>, RecordError> {
		self.store.recent(limit)
	}
}
