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

mod file;
mod memory;

use thiserror::Error;

pub use file::FileDocumentStore;
pub use memory::MemoryDocumentStore;

/// A schema-less document as stored in a collection
pub type Document = serde_json::Value;

/// Error types for document store operations
#[derive(Debug, Error)]
pub enum StoreError {
	#[error("Document store unavailable: {0}")]
	Unavailable(String),
	#[error("Failed to read collection {collection}: {reason}")]
	ReadFailed { collection: String, reason: String },
	#[error("Failed to write collection {collection}: {reason}")]
	WriteFailed { collection: String, reason: String },
	#[error("Invalid collection name: {0}")]
	InvalidCollection(String),
}

/// Document Store trait - the live database handle
///
/// The backup subsystem never knows the schema of the data it protects.
/// Collections are discovered at backup time and copied wholesale, so the
/// store only needs four primitive operations.
///
/// This abstraction allows different backing stores:
/// - In-memory maps (testing, embedding)
/// - A directory of JSON collection files (standalone daemon)
/// - An external document database
pub trait DocumentStore: Send + Sync {
	/// List the names of every collection currently present
	///
	/// Must reflect collections created or dropped since the last call.
	fn list_collections(&self) -> Result<Vec<String>, StoreError>;

	/// Fetch every document of a collection, in storage order
	fn find_all(&self, collection: &str) -> Result<Vec<Document>, StoreError>;

	/// Remove every document of a collection, returning how many were removed
	fn delete_all(&self, collection: &str) -> Result<usize, StoreError>;

	/// Append documents to a collection, creating it if needed
	fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<usize, StoreError>;
}

/// Reject names that cannot be used as a collection key on disk
///
/// Only names that would escape or alias the data directory are refused.
pub(crate) fn validate_collection_name(name: &str) -> Result<(), StoreError> {
	let valid = !name.is_empty()
		&& !name.starts_with('.')
		&& !name
			.chars()
			.any(|c| matches!(c, '/' | '\\') || c.is_control());

	if valid {
		Ok(())
	} else {
		Err(StoreError::InvalidCollection(name.to_string()))
	}
}
