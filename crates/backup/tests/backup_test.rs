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

//! Integration tests for the backup subsystem
//!
//! These tests verify:
//! - Backup then restore reproduces every captured collection exactly
//! - Compression round-trips byte for byte
//! - Retention and the delete-latest-first policy of the full path
//! - The file-only path taken when the record store is down
//! - Failure reporting, record finalization and the in-flight guard

use std::{
	fs::{self, File},
	path::{Path, PathBuf},
	sync::{Arc, Barrier},
	thread,
	time::{Duration, SystemTime},
};

use serde_json::json;
use tempfile::TempDir;

use campus_backup::{
	BackupConfig, BackupError, BackupOrchestrator, BackupRecord, BackupStatus, BackupType, Document,
	DocumentStore, FileDocumentStore, FileRecordStore, MemoryDocumentStore, MemoryRecordStore,
	RecordStore, RetentionManager, catalog, compress, record::RecordError, snapshot,
	store::StoreError,
};

fn config(dir: &Path) -> BackupConfig {
	BackupConfig {
		backup_dir: dir.to_path_buf(),
		..BackupConfig::default()
	}
}

fn school_store() -> Arc<MemoryDocumentStore> {
	Arc::new(
		MemoryDocumentStore::new()
			.with_collection(
				"students",
				vec![
					json!({"_id": "s1", "name": "Ada", "grade": 10}),
					json!({"_id": "s2", "name": "Alan", "grade": 11}),
				],
			)
			.with_collection(
				"announcements",
				vec![json!({"_id": "a1", "title": "Exam week"})],
			)
			.with_collection("audit_logs", vec![]),
	)
}

/// Seed `count` fake artifacts (with `.gz` siblings); index 0 is the oldest
fn seed_artifacts(dir: &Path, count: usize) -> Vec<String> {
	fs::create_dir_all(dir).unwrap();
	(0..count)
		.map(|i| {
			let name = format!("backup-2023-01-{:02}T00-00-00-000Z.json", i + 1);
			let path = dir.join(&name);
			fs::write(&path, br#"{"timestamp":"x","version":"1.0","collections":{}}"#).unwrap();
			fs::write(dir.join(format!("{}.gz", name)), b"gz").unwrap();
			let mtime = SystemTime::now() - Duration::from_secs(10_000 - i as u64 * 100);
			File::options()
				.write(true)
				.open(&path)
				.unwrap()
				.set_modified(mtime)
				.unwrap();
			name
		})
		.collect()
}

fn artifact_names(dir: &Path) -> Vec<String> {
	catalog::list_artifacts(dir)
		.unwrap()
		.into_iter()
		.map(|a| a.file_name)
		.collect()
}

#[test]
fn test_backup_then_restore_reproduces_captured_state() {
	let dir = TempDir::new().unwrap();
	let store = school_store();
	let records = Arc::new(MemoryRecordStore::new());
	let orchestrator = BackupOrchestrator::new(store.clone(), records, &config(dir.path()));

	let report = orchestrator
		.create_backup(BackupType::Manual, "admin")
		.unwrap();
	assert_eq!(report.document_count, 3);
	assert!(report.backup_id.is_some());

	let captured_students = store.find_all("students").unwrap();

	// Mutate after capture, including a collection the artifact does not know
	store.delete_all("students").unwrap();
	store
		.insert_many("students", vec![json!({"_id": "s9", "name": "Intruder"})])
		.unwrap();
	store
		.insert_many("announcements", vec![json!({"_id": "a2", "title": "New"})])
		.unwrap();
	store
		.insert_many("documents", vec![json!({"_id": "d1", "file": "timetable.pdf"})])
		.unwrap();

	let restored = orchestrator.restore_backup(&report.file_name).unwrap();

	assert_eq!(
		restored.restored_collections,
		vec!["announcements", "audit_logs", "students"]
	);
	assert_eq!(restored.total_documents, 3);
	assert_eq!(store.find_all("students").unwrap(), captured_students);
	assert_eq!(
		store.find_all("announcements").unwrap(),
		vec![json!({"_id": "a1", "title": "Exam week"})]
	);
	assert!(store.find_all("audit_logs").unwrap().is_empty());
	// Not named in the artifact, left alone
	assert_eq!(store.find_all("documents").unwrap().len(), 1);
}

#[test]
fn test_compressed_artifact_decompresses_to_original_bytes() {
	let dir = TempDir::new().unwrap();
	let orchestrator = BackupOrchestrator::new(
		school_store(),
		Arc::new(MemoryRecordStore::new()),
		&config(dir.path()),
	);

	let report = orchestrator
		.create_backup(BackupType::Manual, "admin")
		.unwrap();

	let original = fs::read(dir.path().join(&report.file_name)).unwrap();
	let compressed_path = dir
		.path()
		.join(snapshot::compressed_file_name(&report.file_name));

	assert_eq!(
		report.compressed_size,
		fs::metadata(&compressed_path).unwrap().len()
	);
	assert_eq!(compress::decompress_file(&compressed_path).unwrap(), original);
}

#[test]
fn test_repeated_manual_backups_stay_within_retention() {
	let dir = TempDir::new().unwrap();
	let orchestrator = BackupOrchestrator::new(
		school_store(),
		Arc::new(MemoryRecordStore::new()),
		&config(dir.path()),
	);

	for _ in 0..13 {
		orchestrator
			.create_backup(BackupType::Manual, "admin")
			.unwrap();

		let artifacts = catalog::list_artifacts(dir.path()).unwrap();
		assert!(artifacts.len() <= 10);
		assert!(artifacts.iter().all(|a| a.compressed_size.is_some()));
	}
}

#[test]
fn test_full_path_with_twelve_existing_artifacts() {
	let dir = TempDir::new().unwrap();
	let seeded = seed_artifacts(dir.path(), 12);

	let orchestrator = BackupOrchestrator::new(
		school_store(),
		Arc::new(MemoryRecordStore::new()),
		&config(dir.path()),
	);
	let report = orchestrator
		.create_backup(BackupType::Manual, "admin")
		.unwrap();

	let remaining = artifact_names(dir.path());
	assert_eq!(remaining.len(), 10);
	assert_eq!(remaining[0], report.file_name);

	// Newest seeded pair is replaced by the new backup, the two oldest expire
	assert!(!remaining.contains(&seeded[11]));
	assert!(!remaining.contains(&seeded[0]));
	assert!(!remaining.contains(&seeded[1]));
	for name in &seeded[2..11] {
		assert!(remaining.contains(name), "{} should be retained", name);
	}

	assert!(!dir.path().join(format!("{}.gz", seeded[0])).exists());
	assert!(!dir.path().join(format!("{}.gz", seeded[11])).exists());
}

#[test]
fn test_cleanup_twice_changes_nothing_the_second_time() {
	let dir = TempDir::new().unwrap();
	seed_artifacts(dir.path(), 14);
	let retention = RetentionManager::default();

	assert_eq!(retention.cleanup(dir.path()).unwrap(), 4);
	let before: Vec<_> = fs::read_dir(dir.path())
		.unwrap()
		.map(|e| e.unwrap().file_name())
		.collect();

	assert_eq!(retention.cleanup(dir.path()).unwrap(), 0);
	let after: Vec<_> = fs::read_dir(dir.path())
		.unwrap()
		.map(|e| e.unwrap().file_name())
		.collect();
	assert_eq!(before.len(), after.len());
	assert_eq!(after.len(), 20);
}

#[test]
fn test_degraded_path_when_record_store_is_down() {
	let dir = TempDir::new().unwrap();
	seed_artifacts(dir.path(), 5);

	let records = Arc::new(MemoryRecordStore::new());
	records.set_available(false);
	let orchestrator = BackupOrchestrator::new(school_store(), records.clone(), &config(dir.path()));

	let report = orchestrator
		.create_backup(BackupType::Manual, "admin")
		.unwrap();

	assert!(report.backup_id.is_none());
	assert_eq!(artifact_names(dir.path()), vec![report.file_name.clone()]);
	assert!(
		dir.path()
			.join(snapshot::compressed_file_name(&report.file_name))
			.exists()
	);

	let leftovers: Vec<_> = fs::read_dir(dir.path())
		.unwrap()
		.map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
		.collect();
	assert_eq!(leftovers.len(), 2);

	records.set_available(true);
	assert!(records.recent(10).unwrap().is_empty());
}

#[test]
fn test_restore_scenario_overwrites_prior_contents() {
	let dir = TempDir::new().unwrap();
	let doc1 = json!({"_id": "1", "name": "Ada Lovelace", "class": "10A"});
	let doc2 = json!({"_id": "2", "name": "Alan Turing", "class": "11B"});
	fs::write(
		dir.path().join("backup-2024-01-01T00-00-00-000Z.json"),
		serde_json::to_vec(&json!({
			"timestamp": "2024-01-01T00:00:00.000Z",
			"version": "1.0",
			"collections": { "students": [doc1, doc2] }
		}))
		.unwrap(),
	)
	.unwrap();

	let store = Arc::new(MemoryDocumentStore::new().with_collection(
		"students",
		vec![json!({"_id": "old-1"}), json!({"_id": "old-2"}), json!({"_id": "old-3"})],
	));
	let orchestrator = BackupOrchestrator::new(
		store.clone(),
		Arc::new(MemoryRecordStore::new()),
		&config(dir.path()),
	);

	let report = orchestrator
		.restore_backup("backup-2024-01-01T00-00-00-000Z.json")
		.unwrap();

	assert_eq!(report.restored_collections, vec!["students"]);
	assert_eq!(report.total_documents, 2);
	assert_eq!(store.find_all("students").unwrap(), vec![doc1, doc2]);
}

#[test]
fn test_restore_of_unknown_file_is_an_error() {
	let dir = TempDir::new().unwrap();
	let orchestrator = BackupOrchestrator::new(
		school_store(),
		Arc::new(MemoryRecordStore::new()),
		&config(dir.path()),
	);

	assert!(matches!(
		orchestrator.restore_backup("backup-2099-01-01T00-00-00-000Z.json"),
		Err(BackupError::Restore(_))
	));
	assert!(orchestrator.restore_backup("../../etc/passwd").is_err());
}

#[test]
fn test_stats_and_history_on_empty_directory() {
	let dir = TempDir::new().unwrap();
	let orchestrator = BackupOrchestrator::new(
		school_store(),
		Arc::new(MemoryRecordStore::new()),
		&config(&dir.path().join("never-created")),
	);

	let stats = orchestrator.backup_stats();
	assert_eq!(stats.total_backups, 0);
	assert!(stats.latest_backup.is_none());
	assert_eq!(stats.total_size, 0);
	assert!(stats.backup_enabled);

	assert!(orchestrator.backup_history().is_empty());
}

#[test]
fn test_history_and_stats_follow_directory() {
	let dir = TempDir::new().unwrap();
	seed_artifacts(dir.path(), 3);
	let orchestrator = BackupOrchestrator::new(
		school_store(),
		Arc::new(MemoryRecordStore::new()),
		&config(dir.path()),
	);

	let history = orchestrator.backup_history();
	assert_eq!(history.len(), 3);
	assert_eq!(history[0].file_name, "backup-2023-01-03T00-00-00-000Z.json");
	assert!(history[0].created_at > history[1].created_at);
	assert_eq!(history[0].compressed_size, Some(2));

	let stats = orchestrator.backup_stats();
	assert_eq!(stats.total_backups, 3);
	assert_eq!(
		stats.latest_backup.unwrap().file_name,
		"backup-2023-01-03T00-00-00-000Z.json"
	);
	assert_eq!(stats.total_size, history.iter().map(|h| h.size).sum::<u64>());
}

#[test]
fn test_maintenance_operations_swallow_errors() {
	let dir = TempDir::new().unwrap();
	// A regular file where the backup directory should be
	let not_a_dir = dir.path().join("backups");
	fs::write(&not_a_dir, b"oops").unwrap();

	let orchestrator = BackupOrchestrator::new(
		school_store(),
		Arc::new(MemoryRecordStore::new()),
		&config(&not_a_dir),
	);

	orchestrator.delete_latest_backup();
	orchestrator.delete_all_backups();
	assert!(orchestrator.backup_history().is_empty());
	assert_eq!(orchestrator.backup_stats().total_backups, 0);
	assert!(not_a_dir.is_file());
}

#[test]
fn test_delete_latest_and_delete_all() {
	let dir = TempDir::new().unwrap();
	let seeded = seed_artifacts(dir.path(), 4);
	let orchestrator = BackupOrchestrator::new(
		school_store(),
		Arc::new(MemoryRecordStore::new()),
		&config(dir.path()),
	);

	orchestrator.delete_latest_backup();
	let remaining = artifact_names(dir.path());
	assert_eq!(remaining.len(), 3);
	assert!(!remaining.contains(&seeded[3]));

	orchestrator.delete_all_backups();
	assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

/// Store that fails reads of one collection
struct FlakyStore {
	inner: MemoryDocumentStore,
	broken: &'static str,
}

impl DocumentStore for FlakyStore {
	fn list_collections(&self) -> Result<Vec<String>, StoreError> {
		self.inner.list_collections()
	}

	fn find_all(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
		if collection == self.broken {
			return Err(StoreError::ReadFailed {
				collection: collection.to_string(),
				reason: "cursor killed".to_string(),
			});
		}
		self.inner.find_all(collection)
	}

	fn delete_all(&self, collection: &str) -> Result<usize, StoreError> {
		self.inner.delete_all(collection)
	}

	fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<usize, StoreError> {
		self.inner.insert_many(collection, documents)
	}
}

#[test]
fn test_collection_read_error_fails_attempt_and_record() {
	let dir = TempDir::new().unwrap();
	let store = Arc::new(FlakyStore {
		inner: MemoryDocumentStore::new()
			.with_collection("students", vec![json!({"n": 1})])
			.with_collection("users", vec![json!({"n": 2})]),
		broken: "users",
	});
	let records = Arc::new(MemoryRecordStore::new());
	let orchestrator = BackupOrchestrator::new(store, records.clone(), &config(dir.path()));

	let err = orchestrator
		.create_backup(BackupType::Scheduled, "system")
		.unwrap_err();
	assert!(err.to_string().contains("users"));

	let recorded = records.recent(1).unwrap();
	assert_eq!(recorded[0].status, BackupStatus::Failed);
	assert!(
		recorded[0]
			.error
			.as_deref()
			.unwrap_or_default()
			.contains("cursor killed")
	);
	assert!(artifact_names(dir.path()).is_empty());
}

/// Store whose first read parks until the test releases it
struct GatedStore {
	inner: MemoryDocumentStore,
	entered: Barrier,
	release: Barrier,
	gated: std::sync::atomic::AtomicBool,
}

impl DocumentStore for GatedStore {
	fn list_collections(&self) -> Result<Vec<String>, StoreError> {
		if !self.gated.swap(true, std::sync::atomic::Ordering::SeqCst) {
			self.entered.wait();
			self.release.wait();
		}
		self.inner.list_collections()
	}

	fn find_all(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
		self.inner.find_all(collection)
	}

	fn delete_all(&self, collection: &str) -> Result<usize, StoreError> {
		self.inner.delete_all(collection)
	}

	fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<usize, StoreError> {
		self.inner.insert_many(collection, documents)
	}
}

#[test]
fn test_overlapping_backup_is_rejected() {
	let dir = TempDir::new().unwrap();
	let store = Arc::new(GatedStore {
		inner: MemoryDocumentStore::new().with_collection("students", vec![json!({"n": 1})]),
		entered: Barrier::new(2),
		release: Barrier::new(2),
		gated: std::sync::atomic::AtomicBool::new(false),
	});
	let orchestrator = Arc::new(BackupOrchestrator::new(
		store.clone(),
		Arc::new(MemoryRecordStore::new()),
		&config(dir.path()),
	));

	let first = {
		let orchestrator = orchestrator.clone();
		thread::spawn(move || orchestrator.create_backup(BackupType::Scheduled, "system"))
	};

	store.entered.wait();
	assert!(orchestrator.is_busy());
	assert!(matches!(
		orchestrator.create_backup(BackupType::Manual, "admin"),
		Err(BackupError::InProgress)
	));
	store.release.wait();

	assert!(first.join().unwrap().is_ok());
	assert!(!orchestrator.is_busy());
	assert_eq!(artifact_names(dir.path()).len(), 1);
}

#[test]
fn test_file_backed_stores_end_to_end() {
	let root = TempDir::new().unwrap();
	let data_dir = root.path().join("data");
	let backup_dir: PathBuf = root.path().join("backups");

	let store = Arc::new(FileDocumentStore::open(&data_dir).unwrap());
	store
		.insert_many("teachers", vec![json!({"name": "Grace"}), json!({"name": "Edsger"})])
		.unwrap();
	store
		.insert_many("announcements", vec![json!({"title": "Sports day"})])
		.unwrap();

	let records = Arc::new(FileRecordStore::open(root.path().join("meta/records.json")).unwrap());
	let cfg = BackupConfig {
		backup_dir: backup_dir.clone(),
		data_dir: data_dir.clone(),
		..BackupConfig::default()
	};
	let orchestrator = BackupOrchestrator::new(store.clone(), records.clone(), &cfg);

	let report = orchestrator
		.create_backup(BackupType::Initial, "system")
		.unwrap();
	let record = records.get(report.backup_id.as_deref().unwrap()).unwrap();
	assert_eq!(record.status, BackupStatus::Completed);
	assert_eq!(record.document_count, Some(3));

	store.delete_all("teachers").unwrap();
	orchestrator.restore_backup(&report.file_name).unwrap();

	let reopened = FileDocumentStore::open(&data_dir).unwrap();
	assert_eq!(reopened.find_all("teachers").unwrap().len(), 2);

	let trail = orchestrator.audit_trail(5);
	assert_eq!(trail.len(), 1);
	assert_eq!(trail[0].file_name, report.file_name);
}

#[test]
fn test_zero_retention_keeps_the_new_backup() {
	let dir = TempDir::new().unwrap();
	seed_artifacts(dir.path(), 3);
	let orchestrator = BackupOrchestrator::new(
		school_store(),
		Arc::new(MemoryRecordStore::new()),
		&BackupConfig {
			retention_count: 0,
			..config(dir.path())
		},
	);

	let report = orchestrator
		.create_backup(BackupType::Manual, "admin")
		.unwrap();

	assert!(dir.path().join(&report.file_name).is_file());
	assert_eq!(artifact_names(dir.path()), vec![report.file_name]);
}

#[test]
fn test_file_store_backs_up_every_collection_on_disk() {
	let root = TempDir::new().unwrap();
	let data_dir = root.path().join("data");
	fs::create_dir_all(&data_dir).unwrap();
	fs::write(data_dir.join("Student Records.json"), br#"[{"name": "Ada"}]"#).unwrap();
	fs::write(data_dir.join("students.json"), br#"[{"name": "Alan"}]"#).unwrap();

	let orchestrator = BackupOrchestrator::new(
		Arc::new(FileDocumentStore::open(&data_dir).unwrap()),
		Arc::new(MemoryRecordStore::new()),
		&config(&root.path().join("backups")),
	);
	let report = orchestrator
		.create_backup(BackupType::Manual, "admin")
		.unwrap();
	assert_eq!(report.document_count, 2);

	// A collection file the store cannot address fails the attempt outright
	fs::write(data_dir.join("bad\\name.json"), b"[]").unwrap();
	assert!(matches!(
		orchestrator.create_backup(BackupType::Manual, "admin"),
		Err(BackupError::Store(StoreError::InvalidCollection(_)))
	));
}

/// Store that blocks the compressed output path of the attempt in progress
///
/// The record for an attempt exists before enumeration, so its file name is
/// known here; a directory at `<name>.gz` makes the final rename fail.
struct CompressBlockingStore {
	inner: MemoryDocumentStore,
	records: Arc<MemoryRecordStore>,
	backup_dir: PathBuf,
}

impl DocumentStore for CompressBlockingStore {
	fn list_collections(&self) -> Result<Vec<String>, StoreError> {
		let attempt = &self.records.recent(1).unwrap()[0];
		let blocker = self
			.backup_dir
			.join(snapshot::compressed_file_name(&attempt.file_name));
		fs::create_dir_all(blocker.join("occupied")).unwrap();
		self.inner.list_collections()
	}

	fn find_all(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
		self.inner.find_all(collection)
	}

	fn delete_all(&self, collection: &str) -> Result<usize, StoreError> {
		self.inner.delete_all(collection)
	}

	fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<usize, StoreError> {
		self.inner.insert_many(collection, documents)
	}
}

#[test]
fn test_compression_failure_fails_attempt() {
	let dir = TempDir::new().unwrap();
	let records = Arc::new(MemoryRecordStore::new());
	let store = Arc::new(CompressBlockingStore {
		inner: MemoryDocumentStore::new().with_collection("students", vec![json!({"n": 1})]),
		records: records.clone(),
		backup_dir: dir.path().to_path_buf(),
	});
	let orchestrator = BackupOrchestrator::new(store, records.clone(), &config(dir.path()));

	assert!(matches!(
		orchestrator.create_backup(BackupType::Manual, "admin"),
		Err(BackupError::Compress(_))
	));

	let record = &records.recent(1).unwrap()[0];
	assert_eq!(record.status, BackupStatus::Failed);
	assert!(record.error.is_some());
	assert!(!dir.path().join(&record.file_name).exists());
	assert!(artifact_names(dir.path()).is_empty());
	assert!(!orchestrator.is_busy());
}

/// Record store that refuses to store completed records
struct NoCompletionRecords {
	inner: MemoryRecordStore,
}

impl RecordStore for NoCompletionRecords {
	fn ping(&self) -> Result<(), RecordError> {
		self.inner.ping()
	}

	fn insert(&self, record: &BackupRecord) -> Result<(), RecordError> {
		self.inner.insert(record)
	}

	fn update(&self, record: &BackupRecord) -> Result<(), RecordError> {
		if record.status == BackupStatus::Completed {
			return Err(RecordError::Storage("write concern failed".to_string()));
		}
		self.inner.update(record)
	}

	fn get(&self, id: &str) -> Result<BackupRecord, RecordError> {
		self.inner.get(id)
	}

	fn recent(&self, limit: usize) -> Result<Vec<BackupRecord>, RecordError> {
		self.inner.recent(limit)
	}
}

#[test]
fn test_record_completion_failure_discards_artifact() {
	let dir = TempDir::new().unwrap();
	let records = Arc::new(NoCompletionRecords {
		inner: MemoryRecordStore::new(),
	});
	let orchestrator = BackupOrchestrator::new(school_store(), records.clone(), &config(dir.path()));

	assert!(matches!(
		orchestrator.create_backup(BackupType::Scheduled, "system"),
		Err(BackupError::Record(RecordError::Storage(_)))
	));

	let record = &records.recent(1).unwrap()[0];
	assert_eq!(record.status, BackupStatus::Failed);
	assert!(
		record
			.error
			.as_deref()
			.unwrap_or_default()
			.contains("write concern failed")
	);
	assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}
