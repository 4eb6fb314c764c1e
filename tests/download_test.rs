//! Artifact download tests against a local HTTP server

mod support;

use localbox::backend::{ArtifactDownloader, DownloadError, InstalledModels, ModelSpec};
use localbox::progress::{NoOpHandler, ProgressEvent};
use std::time::Duration;
use support::RecordingProgress;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BODY: &[u8] = b"#!/bin/sh\necho fake llamafile\n";

/// Catalog entries hold static strings; tests leak one per spec
fn spec_for(url: String) -> ModelSpec {
    ModelSpec {
        name: "Tiny Test",
        file_name: "tiny.llamafile",
        size_gb: 0.001,
        source_url: Box::leak(url.into_boxed_str()),
    }
}

fn downloader() -> ArtifactDownloader {
    ArtifactDownloader::new(Duration::from_secs(5)).unwrap()
}

async fn serve_artifact(body: &'static [u8]) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/models/tiny.llamafile"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_download_strips_query_and_writes_file() {
    let server = serve_artifact(BODY).await;
    let temp = TempDir::new().unwrap();
    let spec = spec_for(format!("{}/models/tiny.llamafile?download=true", server.uri()));

    let artifact = downloader()
        .download(&spec, temp.path(), &NoOpHandler)
        .await
        .unwrap();

    assert_eq!(artifact.file_name, "tiny.llamafile");
    assert_eq!(artifact.local_path, temp.path().join("tiny.llamafile"));
    assert_eq!(std::fs::read(&artifact.local_path).unwrap(), BODY);
    assert!(!temp.path().join("tiny.llamafile.partial").exists());

    let installed = InstalledModels::scan(temp.path()).unwrap();
    assert_eq!(installed.len(), 1);
    assert!(installed.get("tiny.llamafile").is_some());
}

#[cfg(unix)]
#[tokio::test]
async fn test_download_marks_executable() {
    use std::os::unix::fs::PermissionsExt;

    let server = serve_artifact(BODY).await;
    let temp = TempDir::new().unwrap();
    let spec = spec_for(format!("{}/models/tiny.llamafile", server.uri()));

    let artifact = downloader()
        .download(&spec, temp.path(), &NoOpHandler)
        .await
        .unwrap();

    let mode = std::fs::metadata(&artifact.local_path)
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o111, 0o111);
}

#[tokio::test]
async fn test_download_creates_missing_directory() {
    let server = serve_artifact(BODY).await;
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("nested").join("models");
    let spec = spec_for(format!("{}/models/tiny.llamafile", server.uri()));

    let artifact = downloader()
        .download(&spec, &dest, &NoOpHandler)
        .await
        .unwrap();

    assert!(artifact.local_path.starts_with(&dest));
    assert!(artifact.local_path.is_file());
}

#[tokio::test]
async fn test_download_reports_progress() {
    let server = serve_artifact(BODY).await;
    let temp = TempDir::new().unwrap();
    let spec = spec_for(format!("{}/models/tiny.llamafile", server.uri()));
    let progress = RecordingProgress::default();

    downloader()
        .download(&spec, temp.path(), &progress)
        .await
        .unwrap();

    let events = progress.events();
    assert!(matches!(
        events.first(),
        Some(ProgressEvent::DownloadStarted { total_bytes: Some(n), .. }) if *n == BODY.len() as u64
    ));
    assert!(events.iter().any(|e| matches!(
        e,
        ProgressEvent::DownloadProgress { downloaded_bytes, .. } if *downloaded_bytes == BODY.len() as u64
    )));
    assert!(matches!(
        events.last(),
        Some(ProgressEvent::DownloadComplete { bytes, .. }) if *bytes == BODY.len() as u64
    ));
}

#[tokio::test]
async fn test_http_error_leaves_nothing_installed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let spec = spec_for(format!("{}/models/missing.llamafile", server.uri()));
    let progress = RecordingProgress::default();

    let result = downloader().download(&spec, temp.path(), &progress).await;

    match result {
        Err(DownloadError::HttpStatus { status, .. }) => assert_eq!(status, 404),
        other => panic!("Expected HttpStatus, got {:?}", other),
    }
    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    assert!(progress
        .events()
        .iter()
        .any(|e| matches!(e, ProgressEvent::DownloadFailed { .. })));
}

#[tokio::test]
async fn test_failed_finalize_removes_partial_file() {
    let server = serve_artifact(BODY).await;
    let temp = TempDir::new().unwrap();

    // A non-empty directory squatting on the final name makes the rename fail
    let blocker = temp.path().join("tiny.llamafile");
    std::fs::create_dir(&blocker).unwrap();
    std::fs::write(blocker.join("keep"), b"x").unwrap();

    let spec = spec_for(format!("{}/models/tiny.llamafile", server.uri()));
    let result = downloader().download(&spec, temp.path(), &NoOpHandler).await;

    assert!(matches!(result, Err(DownloadError::Write { .. })));
    assert!(!temp.path().join("tiny.llamafile.partial").exists());
    assert!(InstalledModels::scan(temp.path()).unwrap().is_empty());
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    // Reserve a port, then free it so nothing is listening there
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let temp = TempDir::new().unwrap();
    let spec = spec_for(format!("http://127.0.0.1:{}/models/tiny.llamafile", port));

    let result = downloader().download(&spec, temp.path(), &NoOpHandler).await;

    assert!(matches!(result, Err(DownloadError::Network { .. })));
    assert!(InstalledModels::scan(temp.path()).unwrap().is_empty());
}

#[tokio::test]
async fn test_url_without_file_name_rejected() {
    let temp = TempDir::new().unwrap();
    let spec = spec_for("http://127.0.0.1:9/models/".to_string());

    let result = downloader().download(&spec, temp.path(), &NoOpHandler).await;

    assert!(matches!(result, Err(DownloadError::InvalidUrl { .. })));
}

#[tokio::test]
async fn test_truncated_body_leaves_nothing_installed() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    // Announces more bytes than it sends, then hangs up
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 1024];
        let _ = socket.read(&mut request).await;
        socket
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 4096\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        socket.write_all(BODY).await.unwrap();
        socket.shutdown().await.unwrap();
    });

    let temp = TempDir::new().unwrap();
    let spec = spec_for(format!("http://{}/models/tiny.llamafile", addr));
    let progress = RecordingProgress::default();

    let result = downloader().download(&spec, temp.path(), &progress).await;
    server.await.unwrap();

    assert!(
        matches!(
            result,
            Err(DownloadError::Network { .. }) | Err(DownloadError::Incomplete { .. })
        ),
        "Expected a failed transfer, got {:?}",
        result
    );
    assert!(!temp.path().join("tiny.llamafile").exists());
    assert!(!temp.path().join("tiny.llamafile.partial").exists());
    assert!(InstalledModels::scan(temp.path()).unwrap().is_empty());
    assert!(progress
        .events()
        .iter()
        .any(|e| matches!(e, ProgressEvent::DownloadFailed { .. })));
}
