//! Names for archives and their entries.
use unmark_common::{ImageCandidate, ImageFormat};
use url::Url;

pub const FALLBACK_MODEL: &str = "vehicle";

/// Model slug taken from a listing URL: the second-to-last path segment.
///
/// ```
/// use unmark_scrape::naming::model_name;
/// use url::Url;
///
/// let url = Url::parse("https://dealer.example/auto/fiat-500-hybrid/12345/").unwrap();
/// assert_eq!(model_name(&url), "fiat-500-hybrid");
/// let bare = Url::parse("https://dealer.example/listing").unwrap();
/// assert_eq!(model_name(&bare), "vehicle");
/// ```
pub fn model_name(listing: &Url) -> String {
    let path = listing.path().trim_matches('/');
    let parts: Vec<&str> = path.split('/').collect();
    if parts.len() < 2 {
        return FALLBACK_MODEL.to_string();
    }
    let raw = parts[parts.len() - 2];
    let decoded = percent_decode(raw);
    sanitize(&decoded).unwrap_or_else(|| FALLBACK_MODEL.to_string())
}

/// `{model}_{index}.{ext}` for a listing candidate.
pub fn designated_filename(model: &str, candidate: &ImageCandidate) -> String {
    format!(
        "{}_{}.{}",
        model,
        candidate.index,
        candidate.format.extension()
    )
}

/// Stem and format for an uploaded file; unknown extensions are treated as JPEG.
///
/// ```
/// use unmark_common::ImageFormat;
/// use unmark_scrape::naming::upload_parts;
///
/// assert_eq!(upload_parts("Panda 2019.PNG"), ("Panda_2019".to_string(), ImageFormat::Png));
/// assert_eq!(upload_parts("../x"), ("x".to_string(), ImageFormat::Jpeg));
/// ```
pub fn upload_parts(filename: &str) -> (String, ImageFormat) {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);
    let (stem, format) = match base.rsplit_once('.') {
        Some((stem, ext)) => match ImageFormat::from_extension(ext) {
            Some(format) => (stem, format),
            None => (base, ImageFormat::Jpeg),
        },
        None => (base, ImageFormat::Jpeg),
    };
    let stem = sanitize(stem).unwrap_or_else(|| "upload".to_string());
    (stem, format)
}

/// Keep `[A-Za-z0-9_-]`, replace the rest with `_`; `None` when nothing useful remains.
fn sanitize(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn percent_decode(raw: &str) -> String {
    url::form_urlencoded::parse(format!("x={raw}").as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .unwrap_or_else(|| raw.to_string())
}
