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

//! Backup daemon entry point
//!
//! Wires up:
//! - Document store (directory of JSON collections)
//! - Record store (backup metadata)
//! - Backup orchestrator
//! - Scheduler (initial backup after start, then periodic)

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::info;

use campus_backup::{
	BackupConfig, BackupOrchestrator, BackupScheduler, DocumentStore, FileDocumentStore,
	FileRecordStore, RecordStore, logging::init_logging,
};

#[tokio::main]
async fn main() -> Result<()> {
	init_logging()?;

	let config = match std::env::var("BACKUP_CONFIG_FILE") {
		Ok(path) => BackupConfig::from_file(&path)
			.with_context(|| format!("Failed to load configuration from {}", path))?,
		Err(_) => BackupConfig::from_env().unwrap_or_else(|e| {
			info!(target: "server", error = %e, "Using default configuration");
			BackupConfig::default()
		}),
	};

	info!(target: "server", "Starting campus backup daemon");
	info!(target: "server", "Backup directory: {}", config.backup_dir.display());
	info!(target: "server", "Data directory: {}", config.data_dir.display());
	info!(target: "server", "Retention: {} backups", config.retention_count);

	let store: Arc<dyn DocumentStore> = Arc::new(
		FileDocumentStore::open(&config.data_dir).context("Failed to open document store")?,
	);
	let records: Arc<dyn RecordStore> = Arc::new(
		FileRecordStore::open(&config.records_path)
			.context("Failed to open record store")?
			.with_limit(config.records_limit),
	);
	let orchestrator = Arc::new(BackupOrchestrator::new(store, records, &config));

	let scheduler = if config.enabled {
		info!(
			target: "server",
			"Scheduling backups: first in {}s, then every {}s",
			config.initial_delay_secs, config.interval_secs
		);
		Some(
			BackupScheduler::start(orchestrator.clone(), config.scheduler())
				.context("Failed to start backup scheduler")?,
		)
	} else {
		info!(target: "server", "Scheduled backups disabled");
		None
	};

	signal::ctrl_c()
		.await
		.context("Failed to listen for shutdown signal")?;
	info!(target: "server", "Shutting down...");

	// Joins the scheduler thread, which finishes any backup already running
	if let Some(scheduler) = scheduler {
		tokio::task::spawn_blocking(move || scheduler.shutdown())
			.await
			.context("Scheduler shutdown task failed")?;
	}

	info!(target: "server", "Shutdown complete");
	Ok(())
}
