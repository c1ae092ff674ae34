//! Existence check
//!
//! Asks the server which content hashes it already knows, in batches of at
//! most `existence_batch_size` hashes per `pwg.images.exist` call.

use super::{ContentHash, UploadContext, UploadError};
use crate::client::{decode_envelope, WsRequest};
use crate::metrics;
use std::collections::{BTreeMap, BTreeSet, HashMap};

const METHOD_EXIST: &str = "pwg.images.exist";

/// Whether the server already holds an image with a given hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presence {
    /// Known remotely; carries the server's marker (usually the image id)
    Present(String),
    Absent,
}

impl Presence {
    /// Classify one marker value from the server's mapping
    fn from_marker(marker: Option<&serde_json::Value>) -> Self {
        use serde_json::Value;

        match marker {
            None | Some(Value::Null) | Some(Value::Bool(false)) => Presence::Absent,
            Some(Value::String(s)) if s.is_empty() => Presence::Absent,
            Some(Value::String(s)) => Presence::Present(s.clone()),
            Some(other) => Presence::Present(other.to_string()),
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Presence::Present(_))
    }
}

/// Presence of every queried hash, each exactly once
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExistenceResult {
    entries: BTreeMap<ContentHash, Presence>,
}

impl ExistenceResult {
    pub fn get(&self, hash: &ContentHash) -> Option<&Presence> {
        self.entries.get(hash)
    }

    /// Hashes that must be uploaded
    pub fn missing(&self) -> BTreeSet<ContentHash> {
        self.entries
            .iter()
            .filter(|(_, presence)| !presence.is_present())
            .map(|(hash, _)| hash.clone())
            .collect()
    }

    /// Hashes already known remotely
    pub fn present(&self) -> BTreeSet<ContentHash> {
        self.entries
            .iter()
            .filter(|(_, presence)| presence.is_present())
            .map(|(hash, _)| hash.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ContentHash, &Presence)> {
        self.entries.iter()
    }
}

/// Look up the presence of every hash in `hashes`.
///
/// An empty set returns an empty result without touching the network.
pub async fn check_existence(
    ctx: &UploadContext,
    hashes: &BTreeSet<ContentHash>,
) -> Result<ExistenceResult, UploadError> {
    let mut result = ExistenceResult::default();
    if hashes.is_empty() {
        return Ok(result);
    }

    let batch_size = ctx.existence_batch_size();
    if batch_size == 0 {
        return Err(UploadError::Config(
            "existence batch size must be greater than zero".into(),
        ));
    }

    let all: Vec<&ContentHash> = hashes.iter().collect();
    for batch in all.chunks(batch_size) {
        let markers = query_batch(ctx, batch).await?;
        for hash in batch {
            let presence = Presence::from_marker(markers.get(hash.as_str()));
            if !presence.is_present() {
                tracing::trace!(hash = %hash, "Missing file");
            }
            result.entries.insert((*hash).clone(), presence);
        }
    }

    Ok(result)
}

/// Return the subset of `hashes` the server does not hold yet
pub async fn check_missing(
    ctx: &UploadContext,
    hashes: &BTreeSet<ContentHash>,
) -> Result<BTreeSet<ContentHash>, UploadError> {
    Ok(check_existence(ctx, hashes).await?.missing())
}

#[tracing::instrument(
    name = "upload.existence.query",
    skip(ctx, batch),
    fields(batch.len = batch.len()),
    err
)]
async fn query_batch(
    ctx: &UploadContext,
    batch: &[&ContentHash],
) -> Result<HashMap<String, serde_json::Value>, UploadError> {
    let joined = batch
        .iter()
        .map(|hash| hash.as_str())
        .collect::<Vec<_>>()
        .join(",");

    tracing::trace!(md5sum_list = %joined, "Looking up missing files");
    metrics::record_existence_query(batch.len());

    let request = WsRequest::new(METHOD_EXIST).field("md5sum_list", joined);
    let body = ctx.poster().post_form(&request).await?;
    let envelope = decode_envelope::<serde_json::Value>(&body)?;

    if envelope.stat.is_some() && !envelope.is_ok() {
        return Err(envelope.rejection(METHOD_EXIST).into());
    }

    // An empty mapping may be encoded as `[]`.
    match envelope.result {
        Some(serde_json::Value::Object(map)) => Ok(map.into_iter().collect()),
        Some(serde_json::Value::Array(items)) if items.is_empty() => Ok(HashMap::new()),
        Some(serde_json::Value::Null) | None => Ok(HashMap::new()),
        Some(other) => {
            let err = <serde_json::Error as serde::de::Error>::custom(format!(
                "expected a hash-to-marker mapping, got {}",
                other
            ));
            Err(crate::client::ClientError::Decode(err).into())
        }
    }
}
