// Copyright 2025 chenjjiaa
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

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
	record::DEFAULT_RECORD_LIMIT, retention::DEFAULT_RETENTION_COUNT, scheduler::SchedulerConfig,
};

// Logging configuration constants
/// Default log level (can be overridden by RUST_LOG environment variable)
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default log directory component name
pub const LOG_COMPONENT_NAME: &str = "backup";

/// Default console output enabled (can be overridden by LOG_TO_CONSOLE environment variable)
pub const DEFAULT_LOG_TO_CONSOLE: bool = false;

// Backup configuration constants
/// Environment variable prefix, e.g. `BACKUP_BACKUP_DIR`, `BACKUP_INTERVAL_SECS`
pub const ENV_PREFIX: &str = "BACKUP";

/// Default directory holding snapshot artifacts
pub const DEFAULT_BACKUP_DIR: &str = "backups";

/// Default directory of the file-backed document store
pub const DEFAULT_DATA_DIR: &str = "data";

/// Default location of the backup record file
pub const DEFAULT_RECORDS_PATH: &str = "metadata/backup_records.json";

/// Delay between process start and the initial backup
pub const DEFAULT_INITIAL_DELAY_SECS: u64 = 10;

/// Interval between scheduled backups (24 hours)
pub const DEFAULT_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Backup subsystem configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
	/// Directory where artifacts are written and listed
	pub backup_dir: PathBuf,
	/// Directory of the document store served by this process
	pub data_dir: PathBuf,
	/// File holding backup records
	pub records_path: PathBuf,
	/// Number of backup records kept in the record file
	pub records_limit: usize,
	/// Number of most recent artifacts kept by cleanup
	pub retention_count: usize,
	/// Seconds between process start and the initial backup
	pub initial_delay_secs: u64,
	/// Seconds between scheduled backups
	pub interval_secs: u64,
	/// Whether the scheduler runs at all
	pub enabled: bool,
}

impl Default for BackupConfig {
	fn default() -> Self {
		Self {
			backup_dir: PathBuf::from(DEFAULT_BACKUP_DIR),
			data_dir: PathBuf::from(DEFAULT_DATA_DIR),
			records_path: PathBuf::from(DEFAULT_RECORDS_PATH),
			records_limit: DEFAULT_RECORD_LIMIT,
			retention_count: DEFAULT_RETENTION_COUNT,
			initial_delay_secs: DEFAULT_INITIAL_DELAY_SECS,
			interval_secs: DEFAULT_INTERVAL_SECS,
			enabled: true,
		}
	}
}

impl BackupConfig {
	/// Load configuration from environment variables
	pub fn from_env() -> Result<Self, config::ConfigError> {
		dotenv::dotenv().ok();

		let cfg = config::Config::builder()
			.add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
			.build()?;

		cfg.try_deserialize::<Self>()?.validated()
	}

	/// Load configuration from file, with environment overrides
	pub fn from_file(path: &str) -> Result<Self, config::ConfigError> {
		dotenv::dotenv().ok();

		let cfg = config::Config::builder()
			.add_source(config::File::with_name(path))
			.add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
			.build()?;

		cfg.try_deserialize::<Self>()?.validated()
	}

	/// Reject values the backup subsystem cannot run with
	pub fn validated(self) -> Result<Self, config::ConfigError> {
		if self.retention_count == 0 {
			return Err(config::ConfigError::Message(
				"retention_count must be at least 1".to_string(),
			));
		}
		if self.records_limit == 0 {
			return Err(config::ConfigError::Message(
				"records_limit must be at least 1".to_string(),
			));
		}
		if self.interval_secs == 0 {
			return Err(config::ConfigError::Message(
				"interval_secs must be at least 1".to_string(),
			));
		}
		Ok(self)
	}

	pub fn scheduler(&self) -> SchedulerConfig {
		SchedulerConfig {
			initial_delay: Duration::from_secs(self.initial_delay_secs),
			interval: Duration::from_secs(self.interval_secs),
		}
	}
}
