//! Upload module
//!
//! Content-addressed upload pipeline: an existence check by hash, chunked
//! transport of the file bytes, and a finalize call that commits the
//! transmitted chunks into a gallery image.

use crate::client::{ClientError, FormPoster};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

pub mod chunked;
pub mod existence;
pub mod finalize;
pub mod orchestrator;

pub use existence::{ExistenceResult, Presence};
pub use orchestrator::{SyncReport, UploadOutcome, UploadState, Uploader};

/// Default number of hashes per existence query
pub const DEFAULT_EXISTENCE_BATCH_SIZE: usize = 100;

/// Upload errors
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("Got state {stat} while uploading chunk {position} of {hash}")]
    ChunkRejected {
        stat: String,
        position: u64,
        hash: ContentHash,
    },

    #[error(
        "Got state {stat} while adding image {filename} ({hash}){}",
        message_suffix(.message)
    )]
    FinalizeRejected {
        stat: String,
        filename: String,
        hash: ContentHash,
        message: String,
    },

    #[error("Server accepted image {filename} but reported no usable image id")]
    MissingImageId { filename: String },
}

fn message_suffix(message: &str) -> String {
    if message.is_empty() {
        String::new()
    } else {
        format!(": {message}")
    }
}

/// Invalid content hash
#[derive(Error, Debug, PartialEq, Eq)]
#[error("Invalid content hash '{0}': expected a non-empty hex string")]
pub struct HashError(pub String);

/// Hex digest of a file's bytes; dedup key and chunk transaction id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentHash(String);

impl ContentHash {
    /// Validate and normalise to lower case
    pub fn new(value: impl Into<String>) -> Result<Self, HashError> {
        let value = value.into();
        if value.is_empty() || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(HashError(value));
        }
        Ok(Self(value.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ContentHash {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// One local file to be synchronised
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: PathBuf,
    pub size: u64,
    pub hash: ContentHash,
    pub category_id: u64,
}

impl FileRecord {
    /// File name sent as `original_filename`
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.to_string_lossy().into_owned())
    }
}

/// Image created by a successful finalize
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteImage {
    pub image_id: u64,
    pub filename: String,
    pub category_id: u64,
    pub url: Option<String>,
}

/// Read-only configuration shared by every upload component for one run.
#[derive(Clone)]
pub struct UploadContext {
    poster: Arc<dyn FormPoster>,
    chunk_size: usize,
    existence_batch_size: usize,
}

impl UploadContext {
    /// Create a context with the default existence batch size
    pub fn new(poster: Arc<dyn FormPoster>, chunk_size: usize) -> Self {
        Self {
            poster,
            chunk_size,
            existence_batch_size: DEFAULT_EXISTENCE_BATCH_SIZE,
        }
    }

    /// Override the maximum number of hashes per existence query
    pub fn with_existence_batch_size(mut self, batch_size: usize) -> Self {
        self.existence_batch_size = batch_size;
        self
    }

    pub fn poster(&self) -> &dyn FormPoster {
        self.poster.as_ref()
    }

    /// Chunk size in bytes
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn existence_batch_size(&self) -> usize {
        self.existence_batch_size
    }

    /// Reject configurations that cannot upload anything
    pub fn validate(&self) -> Result<(), UploadError> {
        if self.chunk_size == 0 {
            return Err(UploadError::Config(
                "upload chunk size must be greater than zero (512 KiB is a sensible start)".into(),
            ));
        }
        if self.existence_batch_size == 0 {
            return Err(UploadError::Config(
                "existence batch size must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for UploadContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadContext")
            .field("chunk_size", &self.chunk_size)
            .field("existence_batch_size", &self.existence_batch_size)
            .finish_non_exhaustive()
    }
}
