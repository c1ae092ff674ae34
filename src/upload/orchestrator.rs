//! Upload orchestration
//!
//! Composes the existence check, chunked transport and finalize for each
//! file. Files are handled one at a time; a file is only finalized after
//! every one of its chunks was accepted.
//!
//! # Example
//!
//! ```no_run
//! use piwigo_uploadr::client::GalleryClient;
//! use piwigo_uploadr::upload::{ContentHash, FileRecord, UploadContext, Uploader};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(GalleryClient::new("https://gallery.example.com")?);
//! let uploader = Uploader::new(UploadContext::new(client, 512 * 1024));
//!
//! let file = FileRecord {
//!     path: "/photos/beach.jpg".into(),
//!     size: 1_048_576,
//!     hash: ContentHash::new("d41d8cd98f00b204e9800998ecf8427e")?,
//!     category_id: 3,
//! };
//! let outcome = uploader.upload_if_missing(&file).await?;
//! println!("{:?}", outcome);
//! # Ok(())
//! # }
//! ```

use super::{
    chunked, existence, finalize, ContentHash, FileRecord, Presence, RemoteImage, UploadContext,
    UploadError,
};
use crate::metrics;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

/// Per-file upload state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    NotStarted,
    Transmitting,
    Finalizing,
    Done,
    Failed,
}

impl UploadState {
    /// Whether `next` is a legal successor of `self`
    pub fn can_transition_to(self, next: UploadState) -> bool {
        use UploadState::*;

        matches!(
            (self, next),
            (NotStarted, Transmitting)
                | (Transmitting, Finalizing)
                | (Finalizing, Done)
                | (NotStarted, Failed)
                | (Transmitting, Failed)
                | (Finalizing, Failed)
        )
    }
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UploadState::NotStarted => "not_started",
            UploadState::Transmitting => "transmitting",
            UploadState::Finalizing => "finalizing",
            UploadState::Done => "done",
            UploadState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Tracks one file through its upload states
#[derive(Debug)]
struct FileUpload<'a> {
    file: &'a FileRecord,
    state: UploadState,
    failed_at: Option<UploadState>,
}

impl<'a> FileUpload<'a> {
    fn new(file: &'a FileRecord) -> Self {
        Self {
            file,
            state: UploadState::NotStarted,
            failed_at: None,
        }
    }

    fn advance(&mut self, next: UploadState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal upload transition {} -> {}",
            self.state,
            next
        );
        tracing::debug!(
            path = %self.file.path.display(),
            from = %self.state,
            to = %next,
            "Upload state changed"
        );
        self.state = next;
    }

    /// Mark as failed; returns the stage the failure happened in
    fn fail(&mut self) -> UploadState {
        let stage = self.state;
        self.advance(UploadState::Failed);
        self.failed_at = Some(stage);
        stage
    }
}

/// Result of handling one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Already on the server, nothing transferred
    Skipped { hash: ContentHash },
    Uploaded(RemoteImage),
}

impl UploadOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, UploadOutcome::Skipped { .. })
    }

    /// Id of the created image, if one was created
    pub fn image_id(&self) -> Option<u64> {
        match self {
            UploadOutcome::Uploaded(image) => Some(image.image_id),
            UploadOutcome::Skipped { .. } => None,
        }
    }
}

/// A file that could not be uploaded
#[derive(Debug)]
pub struct SyncFailure {
    pub path: PathBuf,
    pub stage: UploadState,
    pub error: UploadError,
}

/// Summary of a [`Uploader::sync`] run
#[derive(Debug, Default)]
pub struct SyncReport {
    pub uploaded: Vec<(PathBuf, RemoteImage)>,
    pub skipped: Vec<PathBuf>,
    pub failed: Vec<SyncFailure>,
}

impl SyncReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Runs uploads against one gallery session
pub struct Uploader {
    ctx: UploadContext,
}

impl Uploader {
    pub fn new(ctx: UploadContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &UploadContext {
        &self.ctx
    }

    /// Upload `file` unless the server already holds its content
    #[tracing::instrument(
        name = "upload.upload_if_missing",
        skip(self, file),
        fields(
            upload.path = %file.path.display(),
            upload.hash = %file.hash,
            upload.category = file.category_id
        ),
        err
    )]
    pub async fn upload_if_missing(&self, file: &FileRecord) -> Result<UploadOutcome, UploadError> {
        self.ctx.validate()?;

        let query = BTreeSet::from([file.hash.clone()]);
        let existence = existence::check_existence(&self.ctx, &query).await?;

        if let Some(Presence::Present(_)) = existence.get(&file.hash) {
            tracing::info!("File already present, skipping");
            metrics::record_upload_skipped();
            return Ok(UploadOutcome::Skipped {
                hash: file.hash.clone(),
            });
        }

        let mut tracker = FileUpload::new(file);
        self.transmit_and_finalize(&mut tracker)
            .await
            .map(UploadOutcome::Uploaded)
    }

    /// Upload every file whose content is missing remotely.
    ///
    /// Hashes are checked in batches before any transfer starts. A failing
    /// file is recorded and the run continues with the next one; only a
    /// configuration or existence-check error aborts the whole run.
    #[tracing::instrument(name = "upload.sync", skip(self, files), fields(files = files.len()), err)]
    pub async fn sync(&self, files: &[FileRecord]) -> Result<SyncReport, UploadError> {
        self.ctx.validate()?;

        let hashes: BTreeSet<ContentHash> = files.iter().map(|f| f.hash.clone()).collect();
        let existence = existence::check_existence(&self.ctx, &hashes).await?;

        let mut report = SyncReport::default();
        let mut uploaded: HashSet<&ContentHash> = HashSet::new();

        for file in files {
            let present = existence
                .get(&file.hash)
                .is_some_and(Presence::is_present);

            if present || uploaded.contains(&file.hash) {
                tracing::info!(path = %file.path.display(), "Skipping, content already present");
                metrics::record_upload_skipped();
                report.skipped.push(file.path.clone());
                continue;
            }

            // A copy of a hash that failed earlier in this run gets its own attempt.
            let mut tracker = FileUpload::new(file);
            match self.transmit_and_finalize(&mut tracker).await {
                Ok(image) => {
                    uploaded.insert(&file.hash);
                    report.uploaded.push((file.path.clone(), image));
                }
                Err(error) => report.failed.push(SyncFailure {
                    path: file.path.clone(),
                    stage: tracker.failed_at.unwrap_or(UploadState::NotStarted),
                    error,
                }),
            }
        }

        tracing::info!(
            uploaded = report.uploaded.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Sync finished"
        );

        Ok(report)
    }

    async fn transmit_and_finalize(
        &self,
        tracker: &mut FileUpload<'_>,
    ) -> Result<RemoteImage, UploadError> {
        let file = tracker.file;
        let start_time = Instant::now();

        tracing::info!(
            path = %file.path.display(),
            chunk_size = self.ctx.chunk_size(),
            size = file.size,
            "Uploading file"
        );

        tracker.advance(UploadState::Transmitting);
        if let Err(e) = chunked::send_file(&self.ctx, &file.path, &file.hash, file.size).await {
            return Err(self.record_failure(tracker, start_time, e));
        }

        tracker.advance(UploadState::Finalizing);
        let image = match finalize::finalize(
            &self.ctx,
            &file.file_name(),
            &file.hash,
            file.category_id,
        )
        .await
        {
            Ok(image) => image,
            Err(e) => return Err(self.record_failure(tracker, start_time, e)),
        };

        tracker.advance(UploadState::Done);

        let duration = start_time.elapsed();
        metrics::record_upload_duration(duration.as_secs_f64());
        metrics::record_upload_success(file.size);

        tracing::info!(
            path = %file.path.display(),
            image_id = image.image_id,
            duration_ms = duration.as_millis(),
            "Upload completed"
        );

        Ok(image)
    }

    fn record_failure(
        &self,
        tracker: &mut FileUpload<'_>,
        start_time: Instant,
        error: UploadError,
    ) -> UploadError {
        let stage = tracker.fail();
        metrics::record_upload_duration(start_time.elapsed().as_secs_f64());
        metrics::record_upload_failure(&stage.to_string());

        tracing::error!(
            path = %tracker.file.path.display(),
            stage = %stage,
            error = %error,
            "Upload failed"
        );

        error
    }
}
