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
	fs, io,
	path::{Path, PathBuf},
	sync::Mutex,
};

use super::{Document, DocumentStore, StoreError, validate_collection_name};
use crate::fsutil;

const COLLECTION_EXTENSION: &str = "json";

/// Directory-backed document store
///
/// Each collection is one file `{data_dir}/{name}.json` holding a JSON array
/// of documents. Writes go through a temp file and a rename, so a crash never
/// leaves a truncated collection behind.
///
/// Characteristics:
/// - Whole-collection rewrites (fine for administrative data volumes)
/// - Writers serialized by a process-local mutex
/// - Collections appear on first insert and disappear when their file is removed
pub struct FileDocumentStore {
	data_dir: PathBuf,
	write_lock: Mutex<()>,
}

impl FileDocumentStore {
	/// Open a store rooted at `data_dir`, creating the directory if needed
	pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let data_dir = data_dir.into();
		fs::create_dir_all(&data_dir).map_err(|e| {
			StoreError::Unavailable(format!("cannot create {}: {}", data_dir.display(), e))
		})?;

		Ok(Self {
			data_dir,
			write_lock: Mutex::new(()),
		})
	}

	pub fn data_dir(&self) -> &Path {
		&self.data_dir
	}

	fn collection_path(&self, collection: &str) -> Result<PathBuf, StoreError> {
		validate_collection_name(collection)?;
		Ok(self
			.data_dir
			.join(format!("{}.{}", collection, COLLECTION_EXTENSION)))
	}

	fn load(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
		let path = self.collection_path(collection)?;
		let read_failed = |reason: String| StoreError::ReadFailed {
			collection: collection.to_string(),
			reason,
		};

		match fs::read(&path) {
			Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| read_failed(e.to_string())),
			Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
			Err(e) => Err(read_failed(e.to_string())),
		}
	}

	fn store(&self, collection: &str, documents: &[Document]) -> Result<(), StoreError> {
		let path = self.collection_path(collection)?;
		let write_failed = |reason: String| StoreError::WriteFailed {
			collection: collection.to_string(),
			reason,
		};

		let bytes = serde_json::to_vec(documents).map_err(|e| write_failed(e.to_string()))?;
		fsutil::write_atomic(&path, &bytes).map_err(|e| write_failed(e.to_string()))
	}
}

impl DocumentStore for FileDocumentStore {
	fn list_collections(&self) -> Result<Vec<String>, StoreError> {
		let entries = fs::read_dir(&self.data_dir).map_err(|e| {
			StoreError::Unavailable(format!("cannot list {}: {}", self.data_dir.display(), e))
		})?;

		let mut names = Vec::new();
		for entry in entries.filter_map(|entry| entry.ok()) {
			if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
				continue;
			}
			let path = entry.path();
			if path.extension().and_then(|e| e.to_str()) != Some(COLLECTION_EXTENSION) {
				continue;
			}
			let Some(stem) = path.file_stem() else {
				continue;
			};
			// Dot-files are never collections; the store's own temp files live there too
			if stem.as_encoded_bytes().starts_with(b".") {
				continue;
			}

			// Fail rather than return a partial listing
			let name = stem
				.to_str()
				.ok_or_else(|| StoreError::InvalidCollection(stem.to_string_lossy().into_owned()))?;
			validate_collection_name(name)?;
			names.push(name.to_string());
		}

		names.sort();
		Ok(names)
	}

	fn find_all(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
		self.load(collection)
	}

	fn delete_all(&self, collection: &str) -> Result<usize, StoreError> {
		let _guard = self
			.write_lock
			.lock()
			.map_err(|_| StoreError::Unavailable("write lock poisoned".to_string()))?;

		let existing = self.load(collection)?;
		if existing.is_empty() {
			return Ok(0);
		}

		self.store(collection, &[])?;
		Ok(existing.len())
	}

	fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<usize, StoreError> {
		let _guard = self
			.write_lock
			.lock()
			.map_err(|_| StoreError::Unavailable("write lock poisoned".to_string()))?;

		let inserted = documents.len();
		let mut existing = self.load(collection)?;
		existing.extend(documents);
		self.store(collection, &existing)?;

		Ok(inserted)
	}
}
