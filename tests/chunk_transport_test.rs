//! Chunked Transport Integration Tests
//!
//! Verifies chunk count, sizes, ordering and failure handling of
//! `send_file` against a fake gallery that records arrival order.

mod common;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use common::{context, fail, hash, ok, received_calls, write_file, FormField, HASH};
use piwigo_uploadr::upload::chunked::send_file;
use piwigo_uploadr::upload::UploadError;
use serde_json::json;
use tempfile::TempDir;
use wiremock::MockServer;

async fn accepting_server() -> MockServer {
    let server = MockServer::start().await;
    common::ws_call("pwg.images.addChunk")
        .respond_with(ok(json!(null)))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_1025_bytes_in_512_byte_chunks() {
    let server = accepting_server().await;
    let dir = TempDir::new().unwrap();
    let file = write_file(dir.path(), "photo.jpg", 1025, HASH);

    let ctx = context(&server, 512);
    let sent = send_file(&ctx, &file.path, &file.hash, file.size)
        .await
        .unwrap();
    assert_eq!(sent, 3);

    let calls = received_calls(&server, "pwg.images.addChunk").await;
    let positions: Vec<&str> = calls.iter().map(|c| c["position"].as_str()).collect();
    assert_eq!(positions, vec!["0", "1", "2"]);

    let sizes: Vec<usize> = calls
        .iter()
        .map(|c| STANDARD.decode(&c["data"]).unwrap().len())
        .collect();
    assert_eq!(sizes, vec![512, 512, 1]);

    for call in &calls {
        assert_eq!(call["original_sum"], HASH);
        assert_eq!(call["type"], "file");
    }
}

#[tokio::test]
async fn test_reassembled_chunks_match_file() {
    let server = accepting_server().await;
    let dir = TempDir::new().unwrap();
    let file = write_file(dir.path(), "photo.jpg", 3000, HASH);

    let ctx = context(&server, 1000);
    send_file(&ctx, &file.path, &file.hash, file.size)
        .await
        .unwrap();

    let reassembled: Vec<u8> = received_calls(&server, "pwg.images.addChunk")
        .await
        .iter()
        .flat_map(|c| STANDARD.decode(&c["data"]).unwrap())
        .collect();

    assert_eq!(reassembled, std::fs::read(&file.path).unwrap());
}

#[tokio::test]
async fn test_chunk_count_matches_ceiling() {
    let server = accepting_server().await;
    let dir = TempDir::new().unwrap();
    let chunk_size = 64;

    let mut expected_total = 0;
    for (i, size) in [1usize, 63, 64, 65, 128, 200].into_iter().enumerate() {
        let file = write_file(dir.path(), &format!("f{i}.jpg"), size, HASH);
        let ctx = context(&server, chunk_size);

        let sent = send_file(&ctx, &file.path, &file.hash, file.size)
            .await
            .unwrap();
        assert_eq!(sent, size.div_ceil(chunk_size) as u64, "size {size}");
        expected_total += sent;
    }

    let calls = received_calls(&server, "pwg.images.addChunk").await;
    assert_eq!(calls.len() as u64, expected_total);
}

#[tokio::test]
async fn test_empty_file_sends_nothing() {
    let server = accepting_server().await;
    let dir = TempDir::new().unwrap();
    let file = write_file(dir.path(), "empty.jpg", 0, HASH);

    let ctx = context(&server, 512);
    let sent = send_file(&ctx, &file.path, &file.hash, file.size)
        .await
        .unwrap();

    assert_eq!(sent, 0);
    assert!(received_calls(&server, "pwg.images.addChunk").await.is_empty());
}

#[tokio::test]
async fn test_rejected_chunk_aborts_and_names_position() {
    let server = MockServer::start().await;
    common::ws_call("pwg.images.addChunk")
        .and(FormField("position", "2".into()))
        .respond_with(fail(500, "disk full"))
        .with_priority(1)
        .mount(&server)
        .await;
    common::ws_call("pwg.images.addChunk")
        .respond_with(ok(json!(null)))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let file = write_file(dir.path(), "photo.jpg", 2048, HASH);

    let ctx = context(&server, 512);
    let err = send_file(&ctx, &file.path, &file.hash, file.size)
        .await
        .unwrap_err();

    match &err {
        UploadError::ChunkRejected {
            stat,
            position,
            hash: rejected,
        } => {
            assert_eq!(stat, "fail");
            assert_eq!(*position, 2);
            assert_eq!(rejected, &hash(HASH));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    let message = err.to_string();
    assert!(message.contains("chunk 2"));
    assert!(message.contains(HASH));

    // Position 3 is never attempted.
    let calls = received_calls(&server, "pwg.images.addChunk").await;
    assert_eq!(calls.len(), 3);
}

#[tokio::test]
async fn test_missing_file_is_io_error() {
    let server = accepting_server().await;
    let dir = TempDir::new().unwrap();

    let ctx = context(&server, 512);
    let err = send_file(&ctx, &dir.path().join("gone.jpg"), &hash(HASH), 10)
        .await
        .unwrap_err();

    assert!(matches!(err, UploadError::Io(_)));
    assert!(received_calls(&server, "pwg.images.addChunk").await.is_empty());
}
