//! Tests for `HttpReleaseSource` against an in-process axum server.

#![allow(clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use iris_update_cli::application::ports::ReleaseSource;
use iris_update_cli::infra::http::HttpReleaseSource;
use iris_update_common::Release;

use crate::helpers::release;

struct Served {
    latest: Option<Release>,
    artifact: Vec<u8>,
    broken: bool,
}

async fn latest(State(served): State<Arc<Served>>) -> Response {
    if served.broken {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    match &served.latest {
        Some(r) => axum::Json(r.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn download(State(served): State<Arc<Served>>, Path(version): Path<u64>) -> Response {
    match &served.latest {
        Some(r) if r.version == version => served.artifact.clone().into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Serve `served` on an ephemeral port; returns the base URL.
async fn spawn_server(served: Served) -> String {
    let app = Router::new()
        .route("/latest", get(latest))
        .route("/download/{version}", get(download))
        .with_state(Arc::new(served));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("http://{addr}")
}

fn client(base: &str) -> HttpReleaseSource {
    HttpReleaseSource::new(base, Duration::from_secs(5), Duration::from_secs(10))
        .expect("client")
}

#[tokio::test]
async fn test_latest_returns_published_release() {
    let published = release(4, &"ab".repeat(32));
    let base = spawn_server(Served {
        latest: Some(published.clone()),
        artifact: Vec::new(),
        broken: false,
    })
    .await;

    let got = client(&base).latest().await.expect("latest");

    assert_eq!(got, Some(published));
}

#[tokio::test]
async fn test_latest_not_found_means_no_release() {
    let base = spawn_server(Served {
        latest: None,
        artifact: Vec::new(),
        broken: false,
    })
    .await;

    let got = client(&base).latest().await.expect("latest");

    assert_eq!(got, None);
}

#[tokio::test]
async fn test_latest_server_error_is_error() {
    let base = spawn_server(Served {
        latest: None,
        artifact: Vec::new(),
        broken: true,
    })
    .await;

    let err = client(&base).latest().await.unwrap_err();

    assert!(format!("{err:#}").contains("500"), "got {err:#}");
}

#[tokio::test]
async fn test_latest_unreachable_server_is_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let result = client(&format!("http://{addr}/")).latest().await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_download_writes_artifact_bytes() {
    let bytes: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    let base = spawn_server(Served {
        latest: Some(release(2, &"cd".repeat(32))),
        artifact: bytes.clone(),
        broken: false,
    })
    .await;
    let dir = tempfile::tempdir().expect("tempdir");
    let dest = dir.path().join("irispanel-2.tar.gz");

    let written = client(&base).download(2, &dest).await.expect("download");

    assert_eq!(written, bytes.len() as u64);
    assert_eq!(std::fs::read(&dest).expect("read"), bytes);
}

#[tokio::test]
async fn test_download_unknown_version_is_error() {
    let base = spawn_server(Served {
        latest: Some(release(2, &"cd".repeat(32))),
        artifact: b"data".to_vec(),
        broken: false,
    })
    .await;
    let dir = tempfile::tempdir().expect("tempdir");
    let dest = dir.path().join("irispanel-9.tar.gz");

    let err = client(&base).download(9, &dest).await.unwrap_err();

    assert!(format!("{err:#}").contains("404"), "got {err:#}");
}
