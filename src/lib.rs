//! Piwigo Uploadr Library
//!
//! Uploads local images into a Piwigo photo gallery, skipping content the
//! gallery already holds.
//!
//! # Features
//!
//! - **Content Addressed**: files are identified by MD5, existing content is
//!   never transferred twice
//! - **Chunked Transfer**: large files go up as ordered base64 chunks and are
//!   committed with a single finalize call
//! - **Batched Lookups**: existence checks cover many hashes per request
//!
//! # Example
//!
//! ```no_run
//! use piwigo_uploadr::client::{session, GalleryClient};
//! use piwigo_uploadr::local;
//! use piwigo_uploadr::upload::{UploadContext, Uploader};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = Arc::new(GalleryClient::new("https://gallery.example.com")?);
//!     session::login(client.as_ref(), "admin", "secret").await?;
//!     let status = session::get_status(client.as_ref()).await?;
//!
//!     let ctx = UploadContext::new(client.clone(), status.chunk_size_bytes() as usize);
//!     let file = local::file_record("beach.jpg".as_ref(), 3)?;
//!     let outcome = Uploader::new(ctx).upload_if_missing(&file).await?;
//!     println!("{:?}", outcome);
//!
//!     session::logout(client.as_ref()).await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod local;
pub mod logging;
pub mod metrics;
pub mod upload;

// Re-export commonly used types
pub use client::GalleryClient;
pub use config::Config;
pub use upload::Uploader;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
