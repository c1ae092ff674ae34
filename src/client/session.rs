//! Session management: login, status and logout.

use super::{decode_envelope, ClientError, FormPoster, WsRequest};
use serde::Deserialize;

const METHOD_LOGIN: &str = "pwg.session.login";
const METHOD_LOGOUT: &str = "pwg.session.logout";
const METHOD_GET_STATUS: &str = "pwg.session.getStatus";

/// Session state reported by the server after login
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionStatus {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub pwg_token: String,
    /// Comma-separated list of accepted file extensions
    #[serde(default)]
    pub upload_file_types: String,
    /// Chunk size for `pwg.images.addChunk`, in KiB
    #[serde(default)]
    pub upload_form_chunk_size: u64,
}

impl SessionStatus {
    /// Accepted upload extensions, lower-cased
    pub fn allowed_extensions(&self) -> Vec<String> {
        self.upload_file_types
            .split(',')
            .map(|ext| ext.trim().to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect()
    }

    /// Server-reported chunk size in bytes, saturating at `u64::MAX`
    pub fn chunk_size_bytes(&self) -> u64 {
        self.upload_form_chunk_size.saturating_mul(1024)
    }
}

/// Log in with the given credentials.
///
/// The session cookie is kept by the poster for subsequent calls.
#[tracing::instrument(name = "session.login", skip(poster, password), err)]
pub async fn login(
    poster: &dyn FormPoster,
    username: &str,
    password: &str,
) -> Result<(), ClientError> {
    if !poster.is_secure() {
        tracing::warn!("The gallery endpoint does not use https, credentials are sent unencrypted");
    }

    let request = WsRequest::new(METHOD_LOGIN)
        .field("username", username)
        .field("password", password);

    let body = poster.post_form(&request).await?;
    let envelope = decode_envelope::<serde_json::Value>(&body)?;

    if !envelope.is_ok() {
        let message = format!(
            "Login failed: {} - {}",
            envelope.err.unwrap_or_default(),
            envelope.message.as_deref().unwrap_or_default()
        );
        tracing::error!("{}", message);
        return Err(ClientError::Rejected {
            method: METHOD_LOGIN.to_string(),
            stat: envelope.stat().to_string(),
            code: envelope.err,
            message,
        });
    }

    tracing::info!(user = %username, "Login succeeded");
    Ok(())
}

/// Fetch the current session status
#[tracing::instrument(name = "session.get_status", skip(poster), err)]
pub async fn get_status(poster: &dyn FormPoster) -> Result<SessionStatus, ClientError> {
    let body = poster.post_form(&WsRequest::new(METHOD_GET_STATUS)).await?;
    let envelope = decode_envelope::<SessionStatus>(&body)?;

    if !envelope.is_ok() {
        tracing::error!(stat = envelope.stat(), "Could not get session state from server");
        return Err(envelope.rejection(METHOD_GET_STATUS));
    }

    let status = envelope.result.unwrap_or_default();
    tracing::debug!(
        user = %status.username,
        version = %status.version,
        chunk_size_kb = status.upload_form_chunk_size,
        "Fetched session status"
    );
    Ok(status)
}

/// End the session. A refused or undecodable logout is only logged.
#[tracing::instrument(name = "session.logout", skip(poster), err)]
pub async fn logout(poster: &dyn FormPoster) -> Result<(), ClientError> {
    let body = poster.post_form(&WsRequest::new(METHOD_LOGOUT)).await?;

    match decode_envelope::<serde_json::Value>(&body) {
        Ok(envelope) if envelope.is_ok() => tracing::info!("Logged out"),
        Ok(envelope) => tracing::error!(stat = envelope.stat(), "Logout failed"),
        Err(_) => tracing::error!("Logout response could not be decoded"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_extensions() {
        let status = SessionStatus {
            upload_file_types: "jpg, JPEG,png,,webp".into(),
            ..Default::default()
        };
        assert_eq!(status.allowed_extensions(), vec!["jpg", "jpeg", "png", "webp"]);
    }

    #[test]
    fn test_chunk_size_bytes() {
        let status = SessionStatus {
            upload_form_chunk_size: 500,
            ..Default::default()
        };
        assert_eq!(status.chunk_size_bytes(), 512_000);

        let huge = SessionStatus {
            upload_form_chunk_size: u64::MAX,
            ..Default::default()
        };
        assert_eq!(huge.chunk_size_bytes(), u64::MAX);
    }

    #[test]
    fn test_status_decodes_with_extra_fields() {
        let json = br#"{"stat":"ok","result":{
            "username":"admin","status":"webmaster","theme":"modus",
            "language":"en_GB","pwg_token":"abc","charset":"utf-8",
            "current_datetime":"2024-01-01 00:00:00","version":"14.0.0",
            "available_sizes":["square"],"upload_file_types":"jpg,png",
            "upload_form_chunk_size":500}}"#;

        let envelope = decode_envelope::<SessionStatus>(json).unwrap();
        let status = envelope.result.unwrap();
        assert_eq!(status.username, "admin");
        assert_eq!(status.upload_form_chunk_size, 500);
    }
}
