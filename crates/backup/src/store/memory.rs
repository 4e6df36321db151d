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
	collections::BTreeMap,
	sync::{
		RwLock,
		atomic::{AtomicBool, Ordering},
	},
};

use super::{Document, DocumentStore, StoreError};

/// In-memory document store
///
/// Holds every collection in a single map behind a lock. Suitable for:
/// - Unit and integration tests
/// - Embedding the backup subsystem without a database
///
/// The availability switch simulates a dropped database connection.
pub struct MemoryDocumentStore {
	collections: RwLock<BTreeMap<String, Vec<Document>>>,
	available: AtomicBool,
}

impl MemoryDocumentStore {
	pub fn new() -> Self {
		Self {
			collections: RwLock::new(BTreeMap::new()),
			available: AtomicBool::new(true),
		}
	}

	/// Seed a collection, replacing any previous contents
	pub fn with_collection(self, name: &str, documents: Vec<Document>) -> Self {
		if let Ok(mut collections) = self.collections.write() {
			collections.insert(name.to_string(), documents);
		}
		self
	}

	/// Drop a collection entirely
	pub fn drop_collection(&self, name: &str) -> bool {
		self.collections
			.write()
			.map(|mut c| c.remove(name).is_some())
			.unwrap_or(false)
	}

	pub fn set_available(&self, available: bool) {
		self.available.store(available, Ordering::SeqCst);
	}

	fn check_available(&self) -> Result<(), StoreError> {
		if self.available.load(Ordering::SeqCst) {
			Ok(())
		} else {
			Err(StoreError::Unavailable("connection closed".to_string()))
		}
	}

	fn poisoned() -> StoreError {
		StoreError::Unavailable("collection lock poisoned".to_string())
	}
}

impl Default for MemoryDocumentStore {
	fn default() -> Self {
		Self::new()
	}
}

impl DocumentStore for MemoryDocumentStore {
	fn list_collections(&self) -> Result<Vec<String>, StoreError> {
		self.check_available()?;
		let collections = self.collections.read().map_err(|_| Self::poisoned())?;
		Ok(collections.keys().cloned().collect())
	}

	fn find_all(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
		self.check_available()?;
		let collections = self.collections.read().map_err(|_| Self::poisoned())?;
		Ok(collections.get(collection).cloned().unwrap_or_default())
	}

	fn delete_all(&self, collection: &str) -> Result<usize, StoreError> {
		self.check_available()?;
		let mut collections = self.collections.write().map_err(|_| Self::poisoned())?;
		Ok(collections
			.get_mut(collection)
			.map(|docs| {
				let removed = docs.len();
				docs.clear();
				removed
			})
			.unwrap_or(0))
	}

	fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<usize, StoreError> {
		self.check_available()?;
		let mut collections = self.collections.write().map_err(|_| Self::poisoned())?;
		let inserted = documents.len();
		collections
			.entry(collection.to_string())
			.or_default()
			.extend(documents);
		Ok(inserted)
	}
}
