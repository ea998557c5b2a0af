//! API integration tests for ganache-server.
//!
//! These tests drive the router with realistic multipart and JSON requests
//! against the in-memory store and a temporary media root.

use std::io::Cursor;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use ganache_core::{CopyVariants, MediaManager, ResizeVariants};
use ganache_server::{create_router, AppState, AssetStore, UploadLimits};
use image::{ImageFormat, Rgb, RgbImage};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "----TestBoundary7MA4YWxkTrZu0gW";

/// PNG of a single colour; different colours give different SHA-256s.
fn png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let mut bytes = Vec::new();
    RgbImage::from_pixel(width, height, Rgb(color))
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

/// Helper to create a multipart upload body
fn create_upload_multipart(
    content: &[u8],
    filename: &str,
    fields: &[(&str, &str)],
) -> (String, Vec<u8>) {
    let mut body = Vec::new();

    // File field
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
            filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(b"\r\n");

    // Text fields
    for (name, value) in fields {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
        );
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }

    // End boundary
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    (format!("multipart/form-data; boundary={}", BOUNDARY), body)
}

struct TestApp {
    router: Router,
    _root: TempDir,
}

impl TestApp {
    fn new() -> Self {
        Self::with_limits(UploadLimits {
            max_bytes: ganache_core::DEFAULT_MAX_UPLOAD_BYTES,
            max_pixels: ganache_core::DEFAULT_MAX_PIXELS,
        })
    }

    fn with_limits(limits: UploadLimits) -> Self {
        let root = tempfile::tempdir().unwrap();
        let media = MediaManager::with_generator(root.path(), ResizeVariants::default());
        let state = AppState::new(AssetStore::in_memory(), media, limits);
        Self {
            router: create_router(state),
            _root: root,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec();
        (status, headers, body)
    }

    async fn get_json(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let (status, _, body) = self.send(request).await;
        (status, parse_json(&body))
    }

    async fn upload(&self, content: &[u8], filename: &str, fields: &[(&str, &str)]) -> (StatusCode, Value) {
        let (content_type, body) = create_upload_multipart(content, filename, fields);
        let request = Request::builder()
            .method("POST")
            .uri("/api/assets")
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap();
        let (status, _, body) = self.send(request).await;
        (status, parse_json(&body))
    }

    async fn patch(&self, id: i64, payload: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("PATCH")
            .uri(format!("/api/assets/{}", id))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap();
        let (status, _, body) = self.send(request).await;
        (status, parse_json(&body))
    }

    async fn delete(&self, id: i64) -> StatusCode {
        let request = Request::builder()
            .method("DELETE")
            .uri(format!("/api/assets/{}", id))
            .body(Body::empty())
            .unwrap();
        self.send(request).await.0
    }
}

fn parse_json(body: &[u8]) -> Value {
    if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(body).unwrap()
    }
}

fn ids(page: &Value) -> Vec<i64> {
    page["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_i64().unwrap())
        .collect()
}

// ============================================================================
// Health & Readiness Tests
// ============================================================================

#[tokio::test]
async fn test_healthz_returns_ok() {
    let app = TestApp::new();
    let (status, json) = app.get_json("/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_readyz_with_writable_root() {
    let app = TestApp::new();
    let (status, json) = app.get_json("/readyz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ready");
}

#[tokio::test]
async fn test_readyz_reports_unwritable_root() {
    let dir = tempfile::tempdir().unwrap();
    // A regular file where the media root directory should be
    let blocker = dir.path().join("root");
    std::fs::write(&blocker, b"not a directory").unwrap();

    let state = AppState::new(
        AssetStore::in_memory(),
        MediaManager::with_generator(&blocker, CopyVariants),
        UploadLimits {
            max_bytes: 1024,
            max_pixels: 1024,
        },
    );
    let app = create_router(state);

    let response = app
        .oneshot(Request::builder().uri("/readyz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["code"], "NOT_READY");
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = TestApp::new();
    let (status, json) = app.get_json("/api-docs/openapi.json").await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["paths"]["/api/assets"].is_object());
}

// ============================================================================
// End-to-end scenario
// ============================================================================

#[tokio::test]
async fn test_end_to_end_upload_update_search() {
    let app = TestApp::new();
    let content = png(10, 10, [10, 20, 30]);

    // Upload
    let (status, asset) = app
        .upload(
            &content,
            "harbour.png",
            &[
                ("title", "Harbour at dawn"),
                ("credit", "Staff photographer"),
                ("tags", "New  Zealand"),
                ("tags", "Boats"),
                ("tags", "boats "),
            ],
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let id = asset["id"].as_i64().unwrap();
    assert_eq!(asset["sha256"], hex::encode(Sha256::digest(&content)));
    assert_eq!(asset["bytes"], content.len());
    assert_eq!(asset["mime"], "image/png");
    assert_eq!(asset["width"], 10);
    assert_eq!(asset["height"], 10);
    assert_eq!(asset["originalFilename"], "harbour.png");
    assert_eq!(asset["tags"], json!(["boats", "new zealand"]));
    assert_eq!(asset["variants"]["thumb"], format!("/media/{}/thumb", id));
    assert!(asset["deletedAt"].is_null());

    // Get
    let (status, fetched) = app.get_json(&format!("/api/assets/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["title"], "Harbour at dawn");

    // Update title and replace tags
    let (status, updated) = app
        .patch(
            id,
            json!({ "title": "Sunset over the harbour", "tags": ["Sunset", "boats"] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["title"], "Sunset over the harbour");
    assert_eq!(updated["credit"], "Staff photographer");
    assert_eq!(updated["tags"], json!(["boats", "sunset"]));

    // Tag search
    let (status, page) = app.get_json("/api/assets?tag=Sunset&tag=boats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&page), vec![id]);
    assert_eq!(page["total"], 1);

    let (_, page) = app.get_json("/api/assets?tag=new%20zealand").await;
    assert_eq!(page["total"], 0);

    // Text search
    let (status, page) = app.get_json("/api/assets?q=sunset&sort=relevance").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&page), vec![id]);
    assert!(page["items"][0]["relevance"].is_number());

    // Tag vocabulary keeps tags that are no longer attached
    let (status, tags) = app.get_json("/api/tags").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        tags["items"],
        json!([{ "name": "boats" }, { "name": "new zealand" }, { "name": "sunset" }])
    );
}

#[tokio::test]
async fn test_duplicate_upload_returns_existing_asset() {
    let app = TestApp::new();
    let content = png(10, 10, [1, 2, 3]);

    let (status, first) = app.upload(&content, "a.png", &[("title", "First")]).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, second) = app.upload(&content, "b.png", &[("title", "Second")]).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(second["id"], first["id"]);
    assert_eq!(second["title"], "First");
}

#[tokio::test]
async fn test_reupload_after_delete_reports_deleted_owner() {
    let app = TestApp::new();
    let content = png(10, 10, [4, 5, 6]);

    let (_, asset) = app.upload(&content, "a.png", &[]).await;
    let id = asset["id"].as_i64().unwrap();
    assert_eq!(app.delete(id).await, StatusCode::NO_CONTENT);

    let (status, existing) = app.upload(&content, "a.png", &[]).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(existing["id"], id);
    assert!(existing["deletedAt"].is_string());
}

// ============================================================================
// Delete & visibility
// ============================================================================

#[tokio::test]
async fn test_soft_delete_hides_asset() {
    let app = TestApp::new();
    let (_, asset) = app.upload(&png(10, 10, [7, 7, 7]), "x.png", &[]).await;
    let id = asset["id"].as_i64().unwrap();

    assert_eq!(app.delete(id).await, StatusCode::NO_CONTENT);

    let (status, json) = app.get_json(&format!("/api/assets/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");

    // Deleting twice is an error
    assert_eq!(app.delete(id).await, StatusCode::NOT_FOUND);

    let (_, page) = app.get_json("/api/assets").await;
    assert_eq!(page["total"], 0);

    let (_, page) = app.get_json("/api/assets?includeDeleted=true").await;
    assert_eq!(ids(&page), vec![id]);

    let (status, _) = app
        .patch(id, json!({ "title": "too late" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let request = Request::builder()
        .uri(format!("/media/{}/original", id))
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.send(request).await.0, StatusCode::NOT_FOUND);
}

// ============================================================================
// Media streaming
// ============================================================================

#[tokio::test]
async fn test_media_variants_stream_with_caching_headers() {
    let app = TestApp::new();
    let content = png(10, 10, [90, 80, 70]);
    let (_, asset) = app.upload(&content, "photo.PNG", &[]).await;
    let id = asset["id"].as_i64().unwrap();
    let sha = asset["sha256"].as_str().unwrap().to_string();

    // Original bytes come back unchanged
    let request = Request::builder()
        .uri(format!("/media/{}/original", id))
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, content);
    assert_eq!(headers[header::CONTENT_TYPE], "image/png");
    assert_eq!(headers[header::CACHE_CONTROL], "public, max-age=86400");
    let etag = headers[header::ETAG].to_str().unwrap().to_string();
    assert_eq!(etag, format!("\"{}-original\"", sha));

    // Conditional request
    let request = Request::builder()
        .uri(format!("/media/{}/original", id))
        .header(header::IF_NONE_MATCH, &etag)
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = app.send(request).await;
    assert_eq!(status, StatusCode::NOT_MODIFIED);
    assert!(body.is_empty());

    // Derived variant
    let request = Request::builder()
        .uri(format!("/media/{}/thumb", id))
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "image/webp");
    assert_eq!(
        headers[header::CACHE_CONTROL],
        "public, max-age=31536000, immutable"
    );
    assert_eq!(image::guess_format(&body).unwrap(), ImageFormat::WebP);

    // Unknown variant
    let request = Request::builder()
        .uri(format!("/media/{}/poster", id))
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.send(request).await.0, StatusCode::NOT_FOUND);
}

// ============================================================================
// Upload validation
// ============================================================================

#[tokio::test]
async fn test_upload_too_large_returns_413() {
    let content = png(10, 10, [0, 0, 0]);
    let app = TestApp::with_limits(UploadLimits {
        max_bytes: content.len() as u64 - 1,
        max_pixels: 1_000,
    });

    let (status, json) = app.upload(&content, "big.png", &[]).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json["code"], "TOO_LARGE");
}

#[tokio::test]
async fn test_upload_exceeding_pixel_limit_is_invalid() {
    let app = TestApp::with_limits(UploadLimits {
        max_bytes: 1024 * 1024,
        max_pixels: 99,
    });

    let (status, json) = app.upload(&png(10, 10, [0, 0, 0]), "px.png", &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_IMAGE");
}

#[tokio::test]
async fn test_upload_non_image_is_rejected() {
    let app = TestApp::new();
    let (status, json) = app
        .upload(b"%PDF-1.7 definitely not an image", "doc.pdf", &[])
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_IMAGE");

    let (_, page) = app.get_json("/api/assets").await;
    assert_eq!(page["total"], 0);
}

#[tokio::test]
async fn test_upload_without_file_is_rejected() {
    let app = TestApp::new();
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nNo file\r\n--{b}--\r\n",
        b = BOUNDARY
    );
    let request = Request::builder()
        .method("POST")
        .uri("/api/assets")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap();

    let (status, _, body) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(parse_json(&body)["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_field_length_limits() {
    let app = TestApp::new();
    let long = "x".repeat(256);

    let (status, json) = app
        .upload(&png(10, 10, [3, 3, 3]), "t.png", &[("title", &long)])
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_INPUT");

    let (status, _) = app
        .upload(&png(10, 10, [3, 3, 4]), "t.png", &[("tags", &long)])
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let exact = "x".repeat(255);
    let (status, asset) = app
        .upload(&png(10, 10, [3, 3, 5]), "t.png", &[("credit", &exact)])
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let id = asset["id"].as_i64().unwrap();
    let (status, _) = app.patch(id, json!({ "source": long })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// Partial updates
// ============================================================================

#[tokio::test]
async fn test_patch_distinguishes_absent_and_null() {
    let app = TestApp::new();
    let (_, asset) = app
        .upload(
            &png(10, 10, [50, 50, 50]),
            "p.png",
            &[("title", "Keep me"), ("caption", "Drop me"), ("tags", "one")],
        )
        .await;
    let id = asset["id"].as_i64().unwrap();

    let (status, updated) = app
        .patch(id, json!({ "caption": null, "tags": null }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["title"], "Keep me");
    assert!(updated["caption"].is_null());
    assert_eq!(updated["tags"], json!([]));

    // No-op update leaves the timestamp alone
    let (_, again) = app.patch(id, json!({ "title": "Keep me" })).await;
    assert_eq!(again["updatedAt"], updated["updatedAt"]);
}

#[tokio::test]
async fn test_malformed_requests_use_error_contract() {
    let app = TestApp::new();
    let (_, asset) = app.upload(&png(4, 4, [60, 60, 60]), "m.png", &[]).await;
    let id = asset["id"].as_i64().unwrap();

    for payload in [json!({ "title": 5 }), json!({ "tags": "oops" })] {
        let (status, body) = app.patch(id, payload).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_INPUT");
        assert!(body["error"].is_string());
    }

    let request = Request::builder()
        .method("PATCH")
        .uri(format!("/api/assets/{}", id))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("not json"))
        .unwrap();
    let (status, headers, body) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(headers[header::CONTENT_TYPE], "application/json");
    assert_eq!(parse_json(&body)["code"], "INVALID_INPUT");

    let (status, body) = app.get_json("/api/assets/abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");

    let (status, body) = app.get_json("/media/abc/thumb").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");

    let (status, body) = app.get_json("/api/tags?pageSize=lots").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");

    // The asset is untouched
    let (_, current) = app.get_json(&format!("/api/assets/{}", id)).await;
    assert_eq!(current["updatedAt"], asset["updatedAt"]);
}

// ============================================================================
// Search & paging
// ============================================================================

#[tokio::test]
async fn test_search_pagination_and_sorting() {
    let app = TestApp::new();
    let mut created = Vec::new();
    for shade in 0..5u8 {
        let (status, asset) = app
            .upload(&png(10, 10, [shade, 100, 100]), "s.png", &[("tags", "series")])
            .await;
        assert_eq!(status, StatusCode::CREATED);
        created.push(asset["id"].as_i64().unwrap());
    }

    let (_, first) = app.get_json("/api/assets?pageSize=2&page=1").await;
    let (_, second) = app.get_json("/api/assets?pageSize=2&page=2").await;
    let (_, third) = app.get_json("/api/assets?pageSize=2&page=3").await;
    assert_eq!(first["total"], 5);
    assert_eq!(first["pageSize"], 2);

    let mut seen: Vec<i64> = [ids(&first), ids(&second), ids(&third)].concat();
    assert_eq!(seen.len(), 5);
    seen.sort_unstable();
    let mut expected = created.clone();
    expected.sort_unstable();
    assert_eq!(seen, expected);

    // Newest first by default, oldest on request
    let (_, newest) = app.get_json("/api/assets").await;
    let (_, oldest) = app.get_json("/api/assets?sort=oldest").await;
    let mut reversed = ids(&oldest);
    reversed.reverse();
    assert_eq!(ids(&newest), reversed);

    // Page size is clamped
    let (_, clamped) = app.get_json("/api/assets?pageSize=100000").await;
    assert_eq!(clamped["pageSize"], 200);

    let (status, _) = app.get_json("/api/assets?page=abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_tags_prefix_and_paging() {
    let app = TestApp::new();
    app.upload(
        &png(10, 10, [9, 9, 9]),
        "t.png",
        &[("tags", "Cricket"), ("tags", "Cycling"), ("tags", "Rugby")],
    )
    .await;

    let (status, page) = app.get_json("/api/tags?prefix=c").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["items"], json!([{ "name": "cricket" }, { "name": "cycling" }]));
    assert_eq!(page["total"], 2);

    let (_, page) = app.get_json("/api/tags?pageSize=1&page=2").await;
    assert_eq!(page["items"], json!([{ "name": "cycling" }]));
    assert_eq!(page["total"], 3);

    let (_, page) = app.get_json("/api/tags?pageSize=0").await;
    assert_eq!(page["pageSize"], 1);
}
