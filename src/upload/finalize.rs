//! Finalize: commit transmitted chunks into a gallery image.

use super::{ContentHash, RemoteImage, UploadContext, UploadError};
use crate::client::{decode_envelope, WsRequest};
use serde::Deserialize;

const METHOD_ADD: &str = "pwg.images.add";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImageId {
    Number(u64),
    Text(String),
}

impl ImageId {
    fn positive(&self) -> Option<u64> {
        let id = match self {
            ImageId::Number(n) => *n,
            ImageId::Text(s) => s.trim().parse().ok()?,
        };
        (id > 0).then_some(id)
    }
}

#[derive(Debug, Deserialize)]
struct AddResult {
    image_id: Option<ImageId>,
    #[serde(default)]
    url: Option<String>,
}

/// Turn the chunks uploaded under `hash` into an image in `category_id`.
///
/// Chunk completeness is the caller's responsibility.
#[tracing::instrument(
    name = "upload.finalize",
    skip(ctx),
    fields(upload.image_id = tracing::field::Empty),
    err
)]
pub async fn finalize(
    ctx: &UploadContext,
    filename: &str,
    hash: &ContentHash,
    category_id: u64,
) -> Result<RemoteImage, UploadError> {
    tracing::debug!(
        filename,
        hash = %hash,
        category_id,
        "Finalizing upload"
    );

    let request = WsRequest::new(METHOD_ADD)
        .field("original_sum", hash.as_str())
        .field("original_filename", filename)
        .field("name", filename)
        .field("categories", category_id.to_string());

    let body = ctx.poster().post_form(&request).await?;
    let envelope = decode_envelope::<serde_json::Value>(&body)?;

    if !envelope.is_ok() {
        tracing::error!(stat = envelope.stat(), filename, "Adding image failed");
        return Err(UploadError::FinalizeRejected {
            stat: envelope.stat().to_string(),
            filename: filename.to_string(),
            hash: hash.clone(),
            message: envelope.message.clone().unwrap_or_default(),
        });
    }

    let result = match envelope.result {
        Some(value) => Some(
            serde_json::from_value::<AddResult>(value).map_err(crate::client::ClientError::from)?,
        ),
        None => None,
    };
    let image_id = result
        .as_ref()
        .and_then(|r| r.image_id.as_ref())
        .and_then(ImageId::positive)
        .ok_or_else(|| UploadError::MissingImageId {
            filename: filename.to_string(),
        })?;

    tracing::Span::current().record("upload.image_id", image_id);

    Ok(RemoteImage {
        image_id,
        filename: filename.to_string(),
        category_id,
        url: result.and_then(|r| r.url),
    })
}
