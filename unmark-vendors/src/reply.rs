//! Turning vendor replies into image bytes.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use serde_json::Value;
use unmark_http::{Fetched, HttpClient, RequestOpts};
use url::Url;

use crate::state::RemovalOutput;
use crate::traits::VendorError;

const URL_KEYS: &[&str] = &["output_url", "result_url", "output_image_url", "url"];
const BASE64_KEYS: &[&str] = &["image", "output_image", "result_image"];
const NESTED_KEYS: &[&str] = &["data", "result"];

/// Interpret a 2xx reply from a synchronous vendor endpoint.
pub(crate) fn decode_reply(reply: &Fetched) -> Result<RemovalOutput, VendorError> {
    if reply.bytes.is_empty() {
        return Err(VendorError::Decode("empty body".into()));
    }
    if reply.is_json() {
        let value: Value = reply.json()?;
        return decode_envelope(&value);
    }
    match reply.mime().as_deref() {
        None | Some("application/octet-stream") => Ok(RemovalOutput::Inline(reply.bytes.clone())),
        Some(mime) if mime.starts_with("image/") => Ok(RemovalOutput::Inline(reply.bytes.clone())),
        Some(mime) => Err(VendorError::Decode(format!("unexpected content type {mime}"))),
    }
}

/// Find the output inside a JSON envelope, one level of nesting deep.
pub(crate) fn decode_envelope(value: &Value) -> Result<RemovalOutput, VendorError> {
    if let Some(status) = value.get("status").and_then(Value::as_str) {
        if matches!(status, "failed" | "error") {
            let message = value
                .get("error")
                .or_else(|| value.get("message"))
                .and_then(Value::as_str)
                .unwrap_or(status);
            return Err(VendorError::Rejected(message.to_string()));
        }
    }
    if let Some(output) = find_output(value)? {
        return Ok(output);
    }
    for key in NESTED_KEYS {
        if let Some(inner) = value.get(*key) {
            if let Some(output) = find_output(inner)? {
                return Ok(output);
            }
        }
    }
    Err(VendorError::Decode(
        "no output URL or image in vendor reply".into(),
    ))
}

fn find_output(value: &Value) -> Result<Option<RemovalOutput>, VendorError> {
    for key in URL_KEYS {
        if let Some(raw) = value.get(*key).and_then(Value::as_str) {
            let url = Url::parse(raw)
                .map_err(|e| VendorError::Decode(format!("bad {key} {raw:?}: {e}")))?;
            return Ok(Some(RemovalOutput::Remote(url)));
        }
    }
    for key in BASE64_KEYS {
        if let Some(raw) = value.get(*key).and_then(Value::as_str) {
            return decode_base64(raw).map(|b| Some(RemovalOutput::Inline(b)));
        }
    }
    Ok(None)
}

/// Plain base64 or a `data:image/...;base64,` URI.
fn decode_base64(raw: &str) -> Result<Bytes, VendorError> {
    let payload = match raw.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => raw,
    };
    let decoded = STANDARD
        .decode(payload.trim())
        .map_err(|e| VendorError::Decode(format!("invalid base64 image: {e}")))?;
    if decoded.is_empty() {
        return Err(VendorError::Decode("empty base64 image".into()));
    }
    Ok(Bytes::from(decoded))
}

/// Materialise the output, downloading it when the vendor only sent a link.
///
/// The download carries no vendor credentials; output links are usually
/// pre-signed storage URLs on another host.
pub(crate) async fn resolve_output(
    http: &HttpClient,
    output: RemovalOutput,
    timeout: Duration,
) -> Result<Bytes, VendorError> {
    let url = match output {
        RemovalOutput::Inline(bytes) => return Ok(bytes),
        RemovalOutput::Remote(url) => url,
    };
    tracing::debug!(host = url.host_str().unwrap_or("-"), "vendor.output.fetch");
    let fetched = http
        .get_bytes(
            url.as_str(),
            RequestOpts {
                timeout: Some(timeout),
                allow_absolute: true,
                ..Default::default()
            },
        )
        .await?;
    if fetched.bytes.is_empty() {
        return Err(VendorError::Decode(format!("empty output at {url}")));
    }
    if fetched.is_json() || fetched.mime().as_deref() == Some("text/html") {
        return Err(VendorError::Decode(format!(
            "output at {url} is not an image ({})",
            fetched.mime().unwrap_or_default()
        )));
    }
    Ok(fetched.bytes)
}
