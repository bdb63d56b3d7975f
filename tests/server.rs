//! HTTP routes through `tower::ServiceExt::oneshot`, with stub collaborators.

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use common::test_context;
use docent::models::EmbeddingStatus;
use docent::server::router;
use docent::store::VectorIndex;

async fn send(app: axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn health_reports_readiness() {
    let tmp = tempfile::tempdir().unwrap();
    let (ctx, _) = test_context(tmp.path());

    let (status, body) = send(router(ctx.clone()), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["ready"], false);

    ctx.mark_ready();
    let (_, body) = send(router(ctx), get("/health")).await;
    assert_eq!(body["ready"], true);
}

#[tokio::test]
async fn query_requires_both_fields() {
    let tmp = tempfile::tempdir().unwrap();
    let (ctx, _) = test_context(tmp.path());
    ctx.mark_ready();

    let (status, body) = send(
        router(ctx.clone()),
        post_json("/query", json!({ "context": "a.pdf" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Query is required" }));

    let (status, body) = send(
        router(ctx.clone()),
        post_json("/query", json!({ "query": "What?" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Context file is required" }));

    let bad = Request::builder()
        .method("POST")
        .uri("/query")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(router(ctx), bad).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn query_before_ready_is_503() {
    let tmp = tempfile::tempdir().unwrap();
    let (ctx, _) = test_context(tmp.path());

    let (status, body) = send(
        router(ctx),
        post_json("/query", json!({ "query": "What?", "context": "a.pdf" })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn query_answers_with_citation() {
    let tmp = tempfile::tempdir().unwrap();
    let (ctx, _) = test_context(tmp.path());
    ctx.save_upload("notes.txt", b"The launch date is March 3rd.")
        .await
        .unwrap();
    ctx.startup().await.unwrap();

    let (status, body) = send(
        router(ctx),
        post_json(
            "/query",
            json!({ "query": "When is the launch date?", "context": "notes.txt" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let result = body["result"].as_str().unwrap();
    assert!(result.contains("March 3rd"), "{}", result);
    assert!(result.contains("(Source: notes.txt, Page: Unknown)"), "{}", result);
}

#[tokio::test]
async fn document_list_and_check() {
    let tmp = tempfile::tempdir().unwrap();
    let (ctx, index) = test_context(tmp.path());
    ctx.startup().await.unwrap();
    std::fs::write(ctx.documents_dir().join("b.txt"), "bravo").unwrap();
    std::fs::write(ctx.documents_dir().join("a.txt"), "alpha").unwrap();

    let (status, body) = send(router(ctx.clone()), get("/document-list")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "documents": ["a.txt", "b.txt"] }));

    let (status, body) = send(router(ctx.clone()), get("/check-new-documents")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "message": "Document check completed successfully." })
    );
    assert_eq!(index.chunks().len(), 2);
}

#[tokio::test]
async fn embed_validates_input() {
    let tmp = tempfile::tempdir().unwrap();
    let (ctx, _) = test_context(tmp.path());

    let (status, body) = send(router(ctx.clone()), post_json("/embed", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "File is required" }));

    let (status, _) = send(
        router(ctx.clone()),
        post_json("/embed", json!({ "documentName": "a.txt" })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    ctx.mark_ready();
    let (status, body) = send(
        router(ctx),
        post_json("/embed", json!({ "documentName": "a.txt" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "File being processed: a.txt" }));
}

fn multipart(field: &str, filename: &str, content: &str) -> Request<Body> {
    let boundary = "docent-test-boundary";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n{content}\r\n--{b}--\r\n",
        b = boundary,
    );
    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn upload_stores_the_file() {
    let tmp = tempfile::tempdir().unwrap();
    let (ctx, _) = test_context(tmp.path());

    let (status, body) = send(
        router(ctx.clone()),
        multipart("document", "memo.txt", "Budget approved."),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "message": "File uploaded successfully", "filename": "memo.txt" })
    );
    let stored = std::fs::read_to_string(ctx.documents_dir().join("memo.txt")).unwrap();
    assert_eq!(stored, "Budget approved.");
}

#[tokio::test]
async fn upload_without_document_field_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let (ctx, _) = test_context(tmp.path());

    let (status, body) = send(router(ctx), multipart("attachment", "memo.txt", "x")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "No file uploaded." }));
}

#[tokio::test]
async fn upload_when_ready_ingests_that_file() {
    let tmp = tempfile::tempdir().unwrap();
    let (ctx, index) = test_context(tmp.path());
    ctx.startup().await.unwrap();
    assert!(ctx.events().history().is_empty());

    let (status, body) = send(
        router(ctx.clone()),
        multipart("document", "memo.txt", "Budget approved for Q3."),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["filename"], "memo.txt");

    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(5);
    while !(index.contains_filename("memo.txt").await.unwrap()
        && ctx.events().history().len() >= 2)
    {
        assert!(
            tokio::time::Instant::now() < deadline,
            "upload was not ingested"
        );
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    assert_eq!(
        ctx.events().history(),
        vec![
            EmbeddingStatus::embedding("memo.txt"),
            EmbeddingStatus::embedded("memo.txt"),
        ]
    );
}

#[tokio::test]
async fn upload_keeps_the_original_name() {
    let tmp = tempfile::tempdir().unwrap();
    let (ctx, _) = test_context(tmp.path());

    let (status, body) = send(router(ctx.clone()), multipart("document", "memo.txt ", "x")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["filename"], "memo.txt ");
    assert!(ctx.documents_dir().join("memo.txt ").exists());
    assert!(!ctx.documents_dir().join("memo.txt").exists());
}
