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
	io,
	sync::Arc,
	thread::{self, JoinHandle},
	time::Duration,
};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error, info, warn};

use crate::{
	config::{DEFAULT_INITIAL_DELAY_SECS, DEFAULT_INTERVAL_SECS},
	orchestrator::{BackupError, BackupOrchestrator},
	record::BackupType,
};

/// Who scheduled backups are attributed to
pub const SYSTEM_TRIGGER: &str = "system";

/// Configuration for the backup scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
	/// Delay between start and the initial backup
	pub initial_delay: Duration,
	/// Interval between scheduled backups
	pub interval: Duration,
}

impl Default for SchedulerConfig {
	fn default() -> Self {
		Self {
			initial_delay: Duration::from_secs(DEFAULT_INITIAL_DELAY_SECS),
			interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
		}
	}
}

/// Backup Scheduler - triggers backups on a timer
///
/// Runs on its own thread: one `initial` backup shortly after start, then a
/// `scheduled` backup every interval. Failed runs are logged and simply
/// retried on the next tick; there is no backoff.
///
/// Overlap with manual backups is settled by the orchestrator's in-flight
/// guard. A tick that lands on a running operation is skipped.
pub struct BackupScheduler {
	thread_handle: Option<JoinHandle<()>>,
	shutdown_tx: Option<Sender<()>>,
}

impl BackupScheduler {
	/// Spawn the scheduler thread
	pub fn start(
		orchestrator: Arc<BackupOrchestrator>,
		config: SchedulerConfig,
	) -> io::Result<Self> {
		let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(1);

		let thread_handle = thread::Builder::new()
			.name("backup-scheduler".to_string())
			.spawn(move || {
				info!(
					target: "scheduler",
					initial_delay_secs = config.initial_delay.as_secs(),
					interval_secs = config.interval.as_secs(),
					"Backup scheduler started"
				);
				Self::run_schedule_loop(orchestrator.as_ref(), &config, &shutdown_rx);
				info!(target: "scheduler", "Backup scheduler stopped");
			})
			.inspect_err(|e| {
				error!(target: "scheduler", error = %e, "Failed to spawn backup scheduler thread");
			})?;

		Ok(Self {
			thread_handle: Some(thread_handle),
			shutdown_tx: Some(shutdown_tx),
		})
	}

	pub fn is_running(&self) -> bool {
		self.thread_handle
			.as_ref()
			.is_some_and(|handle| !handle.is_finished())
	}

	fn run_schedule_loop(
		orchestrator: &BackupOrchestrator,
		config: &SchedulerConfig,
		shutdown: &Receiver<()>,
	) {
		if !Self::wait(shutdown, config.initial_delay) {
			return;
		}
		Self::run_once(orchestrator, BackupType::Initial);

		while Self::wait(shutdown, config.interval) {
			Self::run_once(orchestrator, BackupType::Scheduled);
		}
	}

	/// Sleep for `timeout`; false means shutdown was requested
	fn wait(shutdown: &Receiver<()>, timeout: Duration) -> bool {
		match shutdown.recv_timeout(timeout) {
			Err(RecvTimeoutError::Timeout) => true,
			Ok(()) | Err(RecvTimeoutError::Disconnected) => false,
		}
	}

	fn run_once(orchestrator: &BackupOrchestrator, backup_type: BackupType) {
		match orchestrator.create_backup(backup_type, SYSTEM_TRIGGER) {
			Ok(report) => {
				debug!(
					target: "scheduler",
					backup_type = %backup_type,
					file_name = %report.file_name,
					"Scheduled backup finished"
				);
			}
			Err(BackupError::InProgress) => {
				warn!(
					target: "scheduler",
					backup_type = %backup_type,
					"Skipping tick, another backup operation is running"
				);
			}
			Err(e) => {
				// Already logged by the orchestrator; the next tick is the retry
				debug!(target: "scheduler", backup_type = %backup_type, error = %e, "Tick failed");
			}
		}
	}

	pub fn shutdown(mut self) {
		info!(target: "scheduler", "Shutting down backup scheduler");
		self.stop();
	}

	fn stop(&mut self) {
		if let Some(tx) = self.shutdown_tx.take() {
			let _ = tx.try_send(());
		}

		if let Some(handle) = self.thread_handle.take()
			&& let Err(e) = handle.join()
		{
			warn!(target: "scheduler", error = ?e, "Backup scheduler thread panicked");
		}
	}
}

impl Drop for BackupScheduler {
	fn drop(&mut self) {
		self.stop();
	}
}
