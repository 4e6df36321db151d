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

//! Campus Backup
//!
//! Full-database backup and restore for the school administration backend.
//! Collections are discovered at backup time, dumped into one versioned JSON
//! artifact, gzip-compressed, tracked in a metadata store and rotated on
//! disk. Restore replaces the contents of every collection in an artifact.
//!
//! Architecture:
//! - `DocumentStore` / `RecordStore` traits at the database boundary
//! - Backup directory as the source of truth for what can be restored
//! - Record store as an audit trail only
//! - One in-flight backup or restore at a time
//! - Background scheduler thread for initial and periodic backups

pub mod catalog;
pub mod compress;
pub mod config;
mod fsutil;
pub mod logging;
pub mod orchestrator;
pub mod record;
pub mod restore;
pub mod retention;
pub mod scheduler;
pub mod snapshot;
pub mod store;

pub use catalog::{ArtifactEntry, BackupStats, HistoryEntry, LatestBackup};
pub use config::BackupConfig;
pub use orchestrator::{BackupError, BackupOrchestrator, BackupReport};
pub use record::{
	BackupRecord, BackupStatus, BackupType, FileRecordStore, MemoryRecordStore, MetadataRecorder,
	RecordStore,
};
pub use restore::{RestoreEngine, RestoreReport};
pub use retention::RetentionManager;
pub use scheduler::{BackupScheduler, SchedulerConfig};
pub use snapshot::{SnapshotArtifact, SnapshotSerializer};
pub use store::{Document, DocumentStore, FileDocumentStore, MemoryDocumentStore};
