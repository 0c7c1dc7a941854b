//! Synchronous upload vendor: one multipart POST, cleaned image in the reply.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use unmark_common::UnmarkError;
use unmark_http::{Auth, HttpClient, MultipartField, RequestOpts};

use crate::reply::{decode_reply, resolve_output};
use crate::traits::{ImageSource, VendorError, WatermarkRemover};

pub struct UnwatermarkClient {
    http: HttpClient,
    api_key: String,
    endpoint: String,
    timeout: Duration,
}

impl UnwatermarkClient {
    pub fn new(api_key: String, endpoint: &str, timeout: Duration) -> Result<Self, UnmarkError> {
        let http = HttpClient::standalone()
            .map_err(|e| UnmarkError::Config(format!("HttpClient init failed: {e}")))?
            .with_timeout(timeout)
            .with_retries(1);
        url::Url::parse(endpoint)
            .map_err(|e| UnmarkError::Config(format!("invalid unwatermark endpoint {endpoint}: {e}")))?;
        Ok(Self {
            http,
            api_key,
            endpoint: endpoint.to_string(),
            timeout,
        })
    }
}

#[async_trait]
impl WatermarkRemover for UnwatermarkClient {
    fn name(&self) -> &str {
        "unwatermark"
    }

    async fn remove(&self, source: ImageSource) -> Result<Bytes, VendorError> {
        let (filename, format, bytes) = match source {
            ImageSource::Bytes {
                filename,
                format,
                bytes,
            } => (filename, format, bytes),
            ImageSource::Url(_) => {
                return Err(VendorError::Unsupported {
                    vendor: "unwatermark",
                    what: "image URLs",
                });
            }
        };
        tracing::debug!(%filename, size = bytes.len(), "vendor.unwatermark.upload");

        let fields = [MultipartField::file("file", filename, format.mime(), bytes)];
        let reply = self
            .http
            .post_multipart(
                &self.endpoint,
                &fields,
                RequestOpts {
                    auth: Some(Auth::Bearer(&self.api_key)),
                    ..Default::default()
                },
            )
            .await?;

        let output = decode_reply(&reply)?;
        resolve_output(&self.http, output, self.timeout).await
    }
}
