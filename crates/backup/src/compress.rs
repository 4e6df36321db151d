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

//! Gzip compression of snapshot artifacts
//!
//! The compressed sibling is derived from exactly one artifact and is
//! written through a temp file, like the artifact itself. The uncompressed
//! source is left in place.

use std::{
	fs::File,
	io::{self, BufReader, BufWriter, Read, Write},
	path::{Path, PathBuf},
};

use flate2::{Compression, read::GzDecoder, write::GzEncoder};
use thiserror::Error;
use tracing::debug;

use crate::fsutil;

/// Error types for compression
#[derive(Debug, Error)]
pub enum CompressError {
	#[error("Failed to read {path}: {source}")]
	Read { path: PathBuf, source: io::Error },
	#[error("Failed to write {path}: {source}")]
	Write { path: PathBuf, source: io::Error },
	#[error("Compression stream failed for {path}: {source}")]
	Stream { path: PathBuf, source: io::Error },
}

/// Gzip `src` into `dst`, returning the compressed size in bytes
pub fn compress_file(src: &Path, dst: &Path) -> Result<u64, CompressError> {
	let read_err = |source: io::Error| CompressError::Read {
		path: src.to_path_buf(),
		source,
	};
	let write_err = |source: io::Error| CompressError::Write {
		path: dst.to_path_buf(),
		source,
	};

	let mut reader = BufReader::new(File::open(src).map_err(read_err)?);
	let mut tmp = fsutil::temp_file_beside(dst).map_err(write_err)?;

	{
		let mut encoder = GzEncoder::new(BufWriter::new(tmp.as_file_mut()), Compression::default());
		io::copy(&mut reader, &mut encoder).map_err(|source| CompressError::Stream {
			path: src.to_path_buf(),
			source,
		})?;
		let mut writer = encoder.finish().map_err(write_err)?;
		writer.flush().map_err(write_err)?;
	}

	let size = tmp.as_file().metadata().map_err(write_err)?.len();
	fsutil::persist(tmp, dst).map_err(write_err)?;

	debug!(
		target: "backup",
		src = %src.display(),
		dst = %dst.display(),
		compressed_bytes = size,
		"Artifact compressed"
	);
	Ok(size)
}

/// Read a gzip file back into memory
pub fn decompress_file(src: &Path) -> Result<Vec<u8>, CompressError> {
	let read_err = |source: io::Error| CompressError::Read {
		path: src.to_path_buf(),
		source,
	};

	let file = File::open(src).map_err(read_err)?;
	let mut decoder = GzDecoder::new(BufReader::new(file));
	let mut bytes = Vec::new();
	decoder.read_to_end(&mut bytes).map_err(read_err)?;
	Ok(bytes)
}
