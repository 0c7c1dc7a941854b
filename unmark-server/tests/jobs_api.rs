//! Asynchronous job endpoints, health and vendor diagnostics.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use common::*;
use serde_json::{Value, json};
use unmark_vendors::passthrough::PassthroughRemover;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn wait_for_finish(app: &axum::Router, status_url: &str) -> Value {
    for _ in 0..200 {
        let response = get(app, status_url).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        if body["status"] != "processing" {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("job at {status_url} never finished");
}

#[tokio::test]
async fn job_runs_in_background_and_serves_archive() {
    let dealer = MockServer::start().await;
    let listing = mount_listing(&dealer, &["a.webp", "b.jpg"]).await;
    mount_image(&dealer, "a.webp", b"WEBP").await;
    mount_image(&dealer, "b.jpg", b"JPEG").await;

    let (app, _) = build_test_app(&scraper_config(&dealer), Arc::new(PassthroughRemover));
    let response = post_json(&app, "/jobs", json!({ "url": listing.as_str() })).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let created = body_json(response).await;
    let job_id = created["job_id"].as_str().unwrap().to_string();
    assert_eq!(created["status_url"], format!("/status/{job_id}"));

    let status = wait_for_finish(&app, &format!("/status/{job_id}")).await;
    assert_eq!(status["status"], "done");
    assert_eq!(status["download_url"], format!("/download/{job_id}"));
    assert_eq!(status["entries"], json!(["fiat-panda_1.webp", "fiat-panda_2.jpg"]));

    let download = get(&app, &format!("/download/{job_id}.zip")).await;
    assert_eq!(download.status(), StatusCode::OK);
    assert_eq!(
        unzip(&body_bytes(download).await),
        vec![
            ("fiat-panda_1.webp".to_string(), b"WEBP".to_vec()),
            ("fiat-panda_2.jpg".to_string(), b"JPEG".to_vec()),
        ]
    );
}

#[tokio::test]
async fn failed_job_reports_error_and_has_no_download() {
    let dealer = MockServer::start().await;
    let listing = mount_listing(&dealer, &[]).await;

    let (app, _) = build_test_app(&scraper_config(&dealer), Arc::new(PassthroughRemover));
    let created = body_json(post_json(&app, "/jobs", json!({ "url": listing.as_str() })).await).await;
    let job_id = created["job_id"].as_str().unwrap().to_string();

    let status = wait_for_finish(&app, &format!("/status/{job_id}")).await;
    assert_eq!(status["status"], "error");
    assert_eq!(status["error"], "No vehicle images found on the listing page");
    assert!(status.get("download_url").is_none());

    let download = get(&app, &format!("/download/{job_id}")).await;
    assert_eq!(download.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_jobs_are_404() {
    let dealer = MockServer::start().await;
    let (app, _) = build_test_app(&scraper_config(&dealer), Arc::new(PassthroughRemover));

    let random = Uuid::new_v4();
    assert_eq!(
        get(&app, &format!("/status/{random}")).await.status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        get(&app, "/status/not-a-uuid").await.status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        get(&app, &format!("/download/{random}.zip")).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn job_with_invalid_url_is_rejected_up_front() {
    let dealer = MockServer::start().await;
    let (app, jobs) = build_test_app(&scraper_config(&dealer), Arc::new(PassthroughRemover));

    let response = post_json(&app, "/jobs", json!({ "url": "file:///etc/passwd" })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(jobs.is_empty());
}

#[tokio::test]
async fn health_reports_version() {
    let dealer = MockServer::start().await;
    let (app, _) = build_test_app(&scraper_config(&dealer), Arc::new(PassthroughRemover));

    let response = get(&app, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn vendor_test_route_is_named_after_vendor() {
    let dealer = MockServer::start().await;
    let vendor = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(VENDOR_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(b"png".to_vec()),
        )
        .expect(1)
        .mount(&vendor)
        .await;

    let (app, _) = build_test_app(&scraper_config(&dealer), unwatermark(&vendor));
    let response = get(&app, "/test_unwatermark").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["vendor"], "unwatermark");
    assert_eq!(body["ok"], true);
    assert!(body["latency_ms"].is_u64());

    assert_eq!(
        get(&app, "/test_dewatermark").await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn vendor_test_failure_is_502() {
    let dealer = MockServer::start().await;
    let vendor = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(VENDOR_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&vendor)
        .await;

    let (app, _) = build_test_app(&scraper_config(&dealer), unwatermark(&vendor));
    let response = get(&app, "/test_unwatermark").await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert_eq!(body["ok"], false);
    assert!(body["detail"].as_str().unwrap().contains("403"));
}
