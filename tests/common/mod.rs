//! Shared test infrastructure
//!
//! A wiremock-backed fake gallery plus helpers to inspect what it received.

#![allow(dead_code)]

use piwigo_uploadr::client::GalleryClient;
use piwigo_uploadr::upload::{ContentHash, FileRecord, UploadContext};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Match, Mock, MockBuilder, MockServer, Request, ResponseTemplate};

pub const HASH: &str = "0cc175b9c0f1b6a831c399e269772661";

/// Matches a form field by exact value
pub struct FormField(pub &'static str, pub String);

impl Match for FormField {
    fn matches(&self, request: &Request) -> bool {
        form(request).get(self.0) == Some(&self.1)
    }
}

/// Mock for one web-service method
pub fn ws_call(ws_method: &str) -> MockBuilder {
    Mock::given(method("POST"))
        .and(path("/ws.php"))
        .and(query_param("format", "json"))
        .and(FormField("method", ws_method.to_string()))
}

pub fn ok(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"stat": "ok", "result": result}))
}

pub fn fail(code: i64, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_json(json!({"stat": "fail", "err": code, "message": message}))
}

/// Upload context talking to `server`
pub fn context(server: &MockServer, chunk_size: usize) -> UploadContext {
    let client = GalleryClient::new(&server.uri()).unwrap();
    UploadContext::new(Arc::new(client), chunk_size)
}

pub fn hash(value: &str) -> ContentHash {
    ContentHash::new(value).unwrap()
}

/// Write `size` bytes of patterned data and describe the file
pub fn write_file(dir: &Path, name: &str, size: usize, hash_value: &str) -> FileRecord {
    let data: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
    let file_path = dir.join(name);
    std::fs::write(&file_path, &data).unwrap();

    FileRecord {
        path: file_path,
        size: size as u64,
        hash: hash(hash_value),
        category_id: 7,
    }
}

/// Decoded form fields of a received request
pub fn form(request: &Request) -> HashMap<String, String> {
    url::form_urlencoded::parse(&request.body)
        .into_owned()
        .collect()
}

/// Form fields of every received request, in arrival order
pub async fn received_forms(server: &MockServer) -> Vec<HashMap<String, String>> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(form)
        .collect()
}

/// Received requests for one method, in arrival order
pub async fn received_calls(server: &MockServer, ws_method: &str) -> Vec<HashMap<String, String>> {
    received_forms(server)
        .await
        .into_iter()
        .filter(|f| f.get("method").map(String::as_str) == Some(ws_method))
        .collect()
}
