use std::time::Duration;

use bytes::Bytes;
use serde_json::json;
use unmark_common::ImageFormat;
use unmark_vendors::dewatermark::DewatermarkClient;
use unmark_vendors::unwatermark::UnwatermarkClient;
use unmark_vendors::{ImageSource, VendorError, WatermarkRemover};
use url::Url;
use wiremock::matchers::{body_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ORIGINAL: &[u8] = b"original-jpeg-bytes";
const CLEANED: &[u8] = b"cleaned-jpeg-bytes";

fn jpeg_source() -> ImageSource {
    ImageSource::bytes("fiat-panda_1.jpg", ImageFormat::Jpeg, Bytes::from_static(ORIGINAL))
}

fn unwatermark(server: &MockServer) -> UnwatermarkClient {
    UnwatermarkClient::new(
        "test-key".into(),
        &format!("{}/v1/image/remove-watermark", server.uri()),
        Duration::from_secs(5),
    )
    .unwrap()
}

fn dewatermark(server: &MockServer, max_polls: u32) -> DewatermarkClient {
    DewatermarkClient::new("dw-key".into(), &format!("{}/", server.uri()))
        .unwrap()
        .with_polling(Duration::from_millis(10), max_polls)
}

#[tokio::test]
async fn unwatermark_returns_image_body_as_is() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/image/remove-watermark"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_string_contains("name=\"file\""))
        .and(body_string_contains("filename=\"fiat-panda_1.jpg\""))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/jpeg")
                .set_body_bytes(CLEANED),
        )
        .expect(1)
        .mount(&server)
        .await;

    let out = unwatermark(&server).remove(jpeg_source()).await.unwrap();
    assert_eq!(out.as_ref(), CLEANED);
}

#[tokio::test]
async fn unwatermark_follows_output_url_in_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/image/remove-watermark"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "data": { "output_url": format!("{}/results/abc.jpg", server.uri()) }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/results/abc.jpg"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/jpeg")
                .set_body_bytes(CLEANED),
        )
        .expect(1)
        .mount(&server)
        .await;

    let out = unwatermark(&server).remove(jpeg_source()).await.unwrap();
    assert_eq!(out.as_ref(), CLEANED);
}

#[tokio::test]
async fn unwatermark_error_status_never_yields_original_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/image/remove-watermark"))
        .respond_with(ResponseTemplate::new(402).set_body_json(json!({"message": "no credits"})))
        .expect(1)
        .mount(&server)
        .await;

    let err = unwatermark(&server).remove(jpeg_source()).await.unwrap_err();
    match err {
        VendorError::Http(e) => {
            assert_eq!(e.status().map(|s| s.as_u16()), Some(402));
            assert!(e.to_string().contains("no credits"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn unwatermark_rejects_html_and_urls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string("<html>login</html>"),
        )
        .mount(&server)
        .await;

    let client = unwatermark(&server);
    assert!(matches!(
        client.remove(jpeg_source()).await,
        Err(VendorError::Decode(_))
    ));
    let by_url = ImageSource::Url(Url::parse("https://cdn.example/a.jpg").unwrap());
    assert!(matches!(
        client.remove(by_url).await,
        Err(VendorError::Unsupported { .. })
    ));
    assert!(!client.supports_url());
}

#[tokio::test]
async fn unwatermark_health_check_reports_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "bad key"})))
        .mount(&server)
        .await;

    let health = unwatermark(&server).health_check().await;
    assert!(!health.ok);
    assert_eq!(health.vendor, "unwatermark");
    assert!(health.detail.contains("bad key"));
}

#[tokio::test]
async fn dewatermark_polls_until_succeeded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/tasks"))
        .and(header("x-api-key", "dw-key"))
        .and(body_string_contains("name=\"image\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"task_id": "t-42"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/tasks/t-42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "processing"})))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/tasks/t-42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "succeeded",
            "output_url": format!("{}/out/t-42.jpg", server.uri())
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/out/t-42.jpg"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/jpeg")
                .set_body_bytes(CLEANED),
        )
        .mount(&server)
        .await;

    let out = dewatermark(&server, 10).remove(jpeg_source()).await.unwrap();
    assert_eq!(out.as_ref(), CLEANED);
}

#[tokio::test]
async fn dewatermark_failed_task_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "t-9"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/tasks/t-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "failed",
            "error": "image too small"
        })))
        .mount(&server)
        .await;

    let err = dewatermark(&server, 10).remove(jpeg_source()).await.unwrap_err();
    assert!(matches!(err, VendorError::Rejected(m) if m == "image too small"));
}

#[tokio::test]
async fn dewatermark_gives_up_after_max_polls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"task_id": "slow"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/tasks/slow"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "queued"})))
        .expect(3)
        .mount(&server)
        .await;

    let err = dewatermark(&server, 3).remove(jpeg_source()).await.unwrap_err();
    match err {
        VendorError::Timeout { task_id, polls } => {
            assert_eq!(task_id, "slow");
            assert_eq!(polls, 3);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn dewatermark_submits_url_when_enabled() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/tasks"))
        .and(body_json(json!({"image_url": "https://cdn.example/800x0/a.jpg"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"task_id": "u1"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/tasks/u1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "succeeded",
            "output_url": format!("{}/out/u1.jpg", server.uri())
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/out/u1.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(CLEANED))
        .mount(&server)
        .await;

    let client = dewatermark(&server, 5).with_upload_by_url(true);
    assert!(client.supports_url());
    let source = ImageSource::Url(Url::parse("https://cdn.example/800x0/a.jpg").unwrap());
    let out = client.remove(source).await.unwrap();
    assert_eq!(out.as_ref(), CLEANED);
}
