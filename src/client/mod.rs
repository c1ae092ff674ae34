//! Gallery web-service client
//!
//! Every remote operation is a form-encoded `POST` to a single endpoint,
//! `<base>/ws.php?format=json`, with a `method` field selecting the call.
//! Responses are JSON envelopes carrying a `stat` field.
//!
//! # Example
//!
//! ```no_run
//! use piwigo_uploadr::client::{FormPoster, GalleryClient, WsRequest};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = GalleryClient::new("https://gallery.example.com")?;
//! let body = client
//!     .post_form(&WsRequest::new("pwg.session.getStatus"))
//!     .await?;
//! println!("{}", String::from_utf8_lossy(&body));
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

pub mod session;

/// Value of `stat` on success
pub const STAT_OK: &str = "ok";

/// Web-service client errors
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid gallery URL: {0}")]
    InvalidUrl(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {0}")]
    HttpStatus(u16),

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{method} returned state {stat}: {message}")]
    Rejected {
        method: String,
        stat: String,
        code: Option<i64>,
        message: String,
    },
}

/// One web-service call: a method name plus ordered form fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WsRequest {
    method: &'static str,
    fields: Vec<(&'static str, String)>,
}

impl WsRequest {
    pub fn new(method: &'static str) -> Self {
        Self {
            method,
            fields: Vec::new(),
        }
    }

    /// Append a form field
    pub fn field(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.fields.push((name, value.into()));
        self
    }

    pub fn method(&self) -> &'static str {
        self.method
    }

    /// Look up a field value by name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Form pairs as sent on the wire, `method` first
    pub fn form(&self) -> Vec<(&str, &str)> {
        let mut form = Vec::with_capacity(self.fields.len() + 1);
        form.push(("method", self.method));
        form.extend(self.fields.iter().map(|(k, v)| (*k, v.as_str())));
        form
    }
}

/// Form-POST capability against an authenticated gallery session.
///
/// Implementations return the raw response body; callers decode it.
#[async_trait]
pub trait FormPoster: Send + Sync {
    async fn post_form(&self, request: &WsRequest) -> Result<Bytes, ClientError>;

    /// Whether the transport encrypts credentials in flight
    fn is_secure(&self) -> bool {
        true
    }
}

/// Common response envelope
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub stat: Option<String>,
    #[serde(default)]
    pub err: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
    pub result: Option<T>,
}

impl<T> Envelope<T> {
    pub fn is_ok(&self) -> bool {
        self.stat.as_deref() == Some(STAT_OK)
    }

    /// Reported state, `"missing"` when the server sent none
    pub fn stat(&self) -> &str {
        self.stat.as_deref().unwrap_or("missing")
    }

    /// Convert a non-ok envelope into a `Rejected` error
    pub fn rejection(&self, method: &str) -> ClientError {
        ClientError::Rejected {
            method: method.to_string(),
            stat: self.stat().to_string(),
            code: self.err,
            message: self.message.clone().unwrap_or_default(),
        }
    }
}

/// Decode a response body into an envelope
pub fn decode_envelope<T>(body: &[u8]) -> Result<Envelope<T>, ClientError>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_slice(body).map_err(|e| {
        tracing::error!(error = %e, "Failed to decode web-service response");
        ClientError::Decode(e)
    })
}

/// HTTP client bound to one gallery installation.
///
/// Holds a cookie store so the session established by login is reused by
/// every later call.
pub struct GalleryClient {
    endpoint: Url,
    http_client: reqwest::Client,
}

impl GalleryClient {
    /// Create a client for the gallery rooted at `base_url`
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let endpoint = Self::endpoint_for(base_url)?;
        let http_client = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(concat!("piwigo-uploadr/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            endpoint,
            http_client,
        })
    }

    /// Full web-service endpoint URL
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn endpoint_for(base_url: &str) -> Result<Url, ClientError> {
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ClientError::InvalidUrl(format!(
                "'{}' must start with http:// or https://",
                base_url
            )));
        }

        let mut base = Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let mut endpoint = base
            .join("ws.php")
            .map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        endpoint.set_query(Some("format=json"));
        Ok(endpoint)
    }
}

#[async_trait]
impl FormPoster for GalleryClient {
    #[tracing::instrument(
        name = "gallery.post_form",
        skip(self, request),
        fields(
            ws.method = request.method(),
            http.status_code = tracing::field::Empty
        ),
        err
    )]
    async fn post_form(&self, request: &WsRequest) -> Result<Bytes, ClientError> {
        let response = self
            .http_client
            .post(self.endpoint.clone())
            .form(&request.form())
            .send()
            .await?;

        let status = response.status();
        tracing::Span::current().record("http.status_code", status.as_u16());

        if !status.is_success() {
            return Err(ClientError::HttpStatus(status.as_u16()));
        }

        Ok(response.bytes().await?)
    }

    fn is_secure(&self) -> bool {
        self.endpoint.scheme() == "https"
    }
}
