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

//! Small filesystem helpers shared by the stores and the serializer

use std::{
	fs,
	io::{self, Write},
	path::Path,
};

use tempfile::NamedTempFile;

/// Prefix of in-flight temp files; directory scans skip anything starting with it
pub const TEMP_PREFIX: &str = ".campus-";

/// Suffix of in-flight temp files
pub const TEMP_SUFFIX: &str = ".tmp";

/// Create a temp file next to `path` so the final rename stays on one filesystem
pub fn temp_file_beside(path: &Path) -> io::Result<NamedTempFile> {
	let dir = path
		.parent()
		.filter(|p| !p.as_os_str().is_empty())
		.unwrap_or_else(|| Path::new("."));
	fs::create_dir_all(dir)?;

	tempfile::Builder::new()
		.prefix(TEMP_PREFIX)
		.suffix(TEMP_SUFFIX)
		.tempfile_in(dir)
}

/// Flush a temp file to disk and move it to its final name
pub fn persist(mut file: NamedTempFile, path: &Path) -> io::Result<()> {
	file.flush()?;
	file.as_file().sync_all()?;
	file.persist(path).map_err(|e| e.error)?;
	Ok(())
}

/// Like [`persist`], but fails with `AlreadyExists` instead of replacing `path`
pub fn persist_new(mut file: NamedTempFile, path: &Path) -> io::Result<()> {
	file.flush()?;
	file.as_file().sync_all()?;
	file.persist_noclobber(path).map_err(|e| e.error)?;
	Ok(())
}

/// Write `bytes` to `path` so readers see either the old file or the whole new one
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
	let mut file = temp_file_beside(path)?;
	file.write_all(bytes)?;
	persist(file, path)
}

/// Remove a file, treating "already gone" as success
pub fn remove_if_exists(path: &Path) -> io::Result<bool> {
	match fs::remove_file(path) {
		Ok(()) => Ok(true),
		Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
		Err(e) => Err(e),
	}
}

pub fn is_temp_file(file_name: &str) -> bool {
	file_name.starts_with(TEMP_PREFIX) && file_name.ends_with(TEMP_SUFFIX)
}
