//! Chunked transport
//!
//! Sends a file as an ordered series of base64 encoded chunks, all tagged
//! with the file's content hash. Chunks go out strictly one at a time:
//! position N+1 is only sent once position N was accepted.

use super::{ContentHash, UploadContext, UploadError};
use crate::client::{decode_envelope, WsRequest};
use crate::metrics;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::path::Path;
use tokio::io::{AsyncRead, AsyncReadExt};

const METHOD_ADD_CHUNK: &str = "pwg.images.addChunk";

/// Transport type marker expected by the server
pub const CHUNK_TYPE: &str = "file";

/// One chunk ready for transmission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkTransmission {
    pub hash: ContentHash,
    pub position: u64,
    pub payload: String,
}

impl ChunkTransmission {
    /// Encode raw chunk bytes for transport
    pub fn encode(hash: &ContentHash, position: u64, data: &[u8]) -> Self {
        Self {
            hash: hash.clone(),
            position,
            payload: STANDARD.encode(data),
        }
    }

    /// Decode the payload back into raw bytes
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(&self.payload)
    }

    fn to_request(&self) -> WsRequest {
        WsRequest::new(METHOD_ADD_CHUNK)
            .field("data", self.payload.as_str())
            .field("original_sum", self.hash.as_str())
            .field("type", CHUNK_TYPE)
            .field("position", self.position.to_string())
    }
}

/// Number of chunks a file of `size` bytes splits into
pub fn expected_chunks(size: u64, chunk_size: usize) -> u64 {
    if chunk_size == 0 {
        return 0;
    }
    size.div_ceil(chunk_size as u64)
}

/// Read until `buf` is full or the stream ends; returns bytes read.
async fn fill_chunk<R>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]).await {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Upload the file at `path` chunk by chunk.
///
/// The read loop decides how many chunks are sent; `size` only feeds the
/// progress log. Returns the number of chunks the server accepted.
#[tracing::instrument(
    name = "upload.chunked.send_file",
    skip(ctx, size),
    fields(
        upload.hash = %hash,
        upload.bytes = size,
        upload.chunks = tracing::field::Empty
    ),
    err
)]
pub async fn send_file(
    ctx: &UploadContext,
    path: &Path,
    hash: &ContentHash,
    size: u64,
) -> Result<u64, UploadError> {
    let file = tokio::fs::File::open(path).await?;
    let sent = send_stream(ctx, file, hash, size).await?;
    tracing::Span::current().record("upload.chunks", sent);
    Ok(sent)
}

/// Upload everything readable from `reader` as chunks of `hash`
pub async fn send_stream<R>(
    ctx: &UploadContext,
    mut reader: R,
    hash: &ContentHash,
    size: u64,
) -> Result<u64, UploadError>
where
    R: AsyncRead + Unpin,
{
    let chunk_size = ctx.chunk_size();
    if chunk_size == 0 {
        return Err(UploadError::Config(
            "upload chunk size must be greater than zero".into(),
        ));
    }

    let total = expected_chunks(size, chunk_size);
    let mut buffer = vec![0u8; chunk_size];
    let mut position = 0u64;

    loop {
        let read = fill_chunk(&mut reader, &mut buffer).await?;
        if read == 0 {
            break;
        }

        tracing::trace!(position, total, hash = %hash, "Processing chunk");

        let chunk = ChunkTransmission::encode(hash, position, &buffer[..read]);
        send_chunk(ctx, &chunk).await?;
        metrics::record_chunk_sent(read as u64);

        position += 1;
        if read < chunk_size {
            break;
        }
    }

    Ok(position)
}

/// Send one chunk and require the server to accept it
pub async fn send_chunk(ctx: &UploadContext, chunk: &ChunkTransmission) -> Result<(), UploadError> {
    tracing::trace!(position = chunk.position, hash = %chunk.hash, "Uploading chunk");

    let body = ctx.poster().post_form(&chunk.to_request()).await?;
    let envelope = decode_envelope::<serde_json::Value>(&body)?;

    if !envelope.is_ok() {
        metrics::record_chunk_rejected();
        tracing::error!(
            stat = envelope.stat(),
            position = chunk.position,
            hash = %chunk.hash,
            "Chunk rejected"
        );
        return Err(UploadError::ChunkRejected {
            stat: envelope.stat().to_string(),
            position: chunk.position,
            hash: chunk.hash.clone(),
        });
    }

    Ok(())
}
