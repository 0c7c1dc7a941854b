#![allow(dead_code)]

use std::io::{Cursor, Read};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response};
use bytes::Bytes;
use http_body_util::BodyExt;
use tower::ServiceExt;
use unmark_config::{ScraperConfig, ServerConfig};
use unmark_pipeline::{JobStore, Pipeline};
use unmark_server::{AppState, build_app_router};
use unmark_vendors::WatermarkRemover;
use unmark_vendors::unwatermark::UnwatermarkClient;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CDN_PATH: &str = "/dealer/datafiles/vehicle/images/800x0/";
pub const LISTING_PATH: &str = "/usato/fiat-panda/4242";
pub const VENDOR_PATH: &str = "/v1/image/remove-watermark";
pub const BOUNDARY: &str = "unmark-test-boundary";

pub fn scraper_config(dealer: &MockServer) -> ScraperConfig {
    ScraperConfig {
        cdn_prefix: format!("{}{CDN_PATH}", dealer.uri()),
        page_retries: 1,
        retry_backoff_ms: 5,
        ..ScraperConfig::default()
    }
}

/// Unwatermark client pointed at a mock vendor.
pub fn unwatermark(vendor: &MockServer) -> Arc<dyn WatermarkRemover> {
    Arc::new(
        UnwatermarkClient::new(
            "test-key".into(),
            &format!("{}{VENDOR_PATH}", vendor.uri()),
            Duration::from_secs(5),
        )
        .unwrap(),
    )
}

/// Same router and middleware as the binary.
pub fn build_test_app(
    scraper: &ScraperConfig,
    remover: Arc<dyn WatermarkRemover>,
) -> (Router, Arc<JobStore>) {
    let pipeline = Pipeline::from_config(scraper, remover).unwrap();
    let jobs = Arc::new(JobStore::new(Duration::from_secs(300), 16));
    let server = ServerConfig {
        request_timeout_secs: 30,
        ..ServerConfig::default()
    };
    let app = build_app_router(AppState::new(pipeline, jobs.clone()), &server);
    (app, jobs)
}

pub async fn mount_listing(dealer: &MockServer, names: &[&str]) -> Url {
    let imgs: String = names
        .iter()
        .map(|n| format!(r#"<img src="{}{CDN_PATH}{n}">"#, dealer.uri()))
        .collect();
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(format!("<html><body>{imgs}</body></html>")),
        )
        .mount(dealer)
        .await;
    Url::parse(&format!("{}{LISTING_PATH}", dealer.uri())).unwrap()
}

pub async fn mount_image(dealer: &MockServer, name: &str, body: &'static [u8]) {
    Mock::given(method("GET"))
        .and(path(format!("{CDN_PATH}{name}")))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/jpeg")
                .set_body_bytes(body),
        )
        .mount(dealer)
        .await;
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

pub async fn post_form(app: &Router, body: String) -> Response<Body> {
    send(
        app,
        Request::post("/")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap(),
    )
    .await
}

pub async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(
        app,
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

/// `multipart/form-data` body with one file part.
pub fn multipart_file(filename: &str, mime: &str, bytes: &[u8]) -> Body {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {mime}\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    Body::from(body)
}

pub async fn body_bytes(response: Response<Body>) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub fn unzip(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut zip = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
    (0..zip.len())
        .map(|i| {
            let mut file = zip.by_index(i).unwrap();
            let mut body = Vec::new();
            file.read_to_end(&mut body).unwrap();
            (file.name().to_string(), body)
        })
        .collect()
}

/// Pull the `/download/<id>` link out of the result page.
pub fn download_link(html: &str) -> String {
    let start = html.find("/download/").expect("download link in page");
    let rest = &html[start..];
    let end = rest.find('"').expect("closing quote");
    rest[..end].to_string()
}
