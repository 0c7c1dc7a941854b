//! Candidate image extraction from listing HTML.
//!
//! Matching is a single case-insensitive regex anchored on the CDN prefix of
//! the listing-site template. HTML entities and JSON-escaped slashes are
//! decoded first so URLs embedded in attributes and inline scripts match too.
//! The URL body is lazy: the first image extension that ends a word closes
//! the match, so URLs joined by commas or `&quot;` come out separately.
use std::borrow::Cow;
use std::collections::HashSet;

use regex::Regex;
use unmark_common::{ImageCandidate, ImageFormat, UnmarkError};
use unmark_config::ScraperConfig;
use url::Url;

/// Characters that cannot appear inside a bare URL in markup or CSS.
const URL_BODY: &str = r#"[^"'\s<>()\\]+?"#;

pub struct ImageExtractor {
    pattern: Regex,
    max_images: usize,
    prefer_webp: bool,
}

impl ImageExtractor {
    /// Build an extractor for URLs beginning with `cdn_prefix`.
    ///
    /// ```
    /// use unmark_scrape::ImageExtractor;
    ///
    /// let ex = ImageExtractor::new("https://cdn.example/img/", 10, true).unwrap();
    /// let found = ex.extract(r#"<img src="https://cdn.example/img/a.JPG">"#);
    /// assert_eq!(found.len(), 1);
    /// assert_eq!(found[0].index, 1);
    /// ```
    pub fn new(cdn_prefix: &str, max_images: usize, prefer_webp: bool) -> Result<Self, regex::Error> {
        let pattern = Regex::new(&format!(
            r"(?i){}{}\.(webp|jpe?g|png)\b",
            regex::escape(cdn_prefix),
            URL_BODY
        ))?;
        Ok(Self {
            pattern,
            max_images,
            prefer_webp,
        })
    }

    pub fn from_config(cfg: &ScraperConfig) -> Result<Self, UnmarkError> {
        Self::new(&cfg.cdn_prefix, cfg.max_images, cfg.prefer_webp)
            .map_err(|e| UnmarkError::Config(format!("invalid cdn_prefix pattern: {e}")))
    }

    /// Matching URLs in first-seen order, deduplicated, WebP first (stable),
    /// truncated to `max_images`, with 1-based indexes assigned last.
    pub fn extract(&self, html: &str) -> Vec<ImageCandidate> {
        let text = normalise(html);

        let mut seen: HashSet<&str> = HashSet::new();
        let mut found: Vec<ImageCandidate> = Vec::new();
        let mut total_matches = 0usize;

        for caps in self.pattern.captures_iter(&text) {
            total_matches += 1;
            let (Some(whole), Some(ext)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if !seen.insert(whole.as_str()) {
                continue;
            }
            let Some(format) = ImageFormat::from_extension(ext.as_str()) else {
                continue;
            };
            match Url::parse(whole.as_str()) {
                Ok(url) => found.push(ImageCandidate {
                    url,
                    format,
                    index: 0,
                }),
                Err(err) => {
                    tracing::debug!(url = %whole.as_str(), error = %err, "scrape.extract.invalid_url");
                }
            }
        }

        let unique = found.len();
        if self.prefer_webp {
            // `sort_by_key` is stable: order within each class is preserved.
            found.sort_by_key(|c| c.format.sort_priority());
        }
        found.truncate(self.max_images);
        for (i, candidate) in found.iter_mut().enumerate() {
            candidate.index = i + 1;
        }

        tracing::debug!(
            total_matches,
            unique,
            kept = found.len(),
            max_images = self.max_images,
            "scrape.extract.done"
        );
        found
    }
}

fn normalise(html: &str) -> Cow<'_, str> {
    let decoded = html_escape::decode_html_entities(html);
    if decoded.contains("\\/") {
        Cow::Owned(decoded.replace("\\/", "/"))
    } else {
        decoded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = "https://cdn.dealerk.it/dealer/datafiles/vehicle/images/800x0/";

    fn extractor(max: usize, webp: bool) -> ImageExtractor {
        ImageExtractor::new(PREFIX, max, webp).unwrap()
    }

    fn urls(found: &[ImageCandidate]) -> Vec<String> {
        found.iter().map(|c| c.url.to_string()).collect()
    }

    #[test]
    fn ignores_other_hosts_and_sizes() {
        let html = format!(
            r#"<img src="{PREFIX}a.jpg"><img src="https://cdn.dealerk.it/dealer/datafiles/vehicle/images/200x0/b.jpg">
               <img src="https://elsewhere.example/c.jpg"><a href="{PREFIX}doc.pdf">"#
        );
        assert_eq!(urls(&extractor(10, true).extract(&html)), vec![format!("{PREFIX}a.jpg")]);
    }

    #[test]
    fn webp_moves_ahead_stably() {
        let html = format!(
            r#"{PREFIX}1.jpg "{PREFIX}2.webp" '{PREFIX}3.png' "{PREFIX}4.WEBP" {PREFIX}5.jpeg"#
        );
        let found = extractor(10, true).extract(&html);
        assert_eq!(
            urls(&found),
            vec![
                format!("{PREFIX}2.webp"),
                format!("{PREFIX}4.WEBP"),
                format!("{PREFIX}1.jpg"),
                format!("{PREFIX}3.png"),
                format!("{PREFIX}5.jpeg"),
            ]
        );
        assert_eq!(
            found.iter().map(|c| c.index).collect::<Vec<_>>(),
            vec![1, 2, 3, 4, 5]
        );
        assert_eq!(found[4].format, ImageFormat::Jpeg);
    }

    #[test]
    fn document_order_without_webp_preference() {
        let html = format!(r#"{PREFIX}1.jpg {PREFIX}2.webp"#);
        assert_eq!(
            urls(&extractor(10, false).extract(&html)),
            vec![format!("{PREFIX}1.jpg"), format!("{PREFIX}2.webp")]
        );
    }

    #[test]
    fn cap_applies_after_ordering() {
        let html = format!(r#"{PREFIX}1.jpg {PREFIX}2.jpg {PREFIX}3.webp"#);
        assert_eq!(
            urls(&extractor(2, true).extract(&html)),
            vec![format!("{PREFIX}3.webp"), format!("{PREFIX}1.jpg")]
        );
    }

    #[test]
    fn escaped_urls_in_scripts_match() {
        let html = r#"<script>var g={"src":"https:\/\/cdn.dealerk.it\/dealer\/datafiles\/vehicle\/images\/800x0\/x.jpg?w=1&amp;h=2"}</script>"#;
        assert_eq!(urls(&extractor(5, true).extract(html)), vec![format!("{PREFIX}x.jpg")]);
    }

    #[test]
    fn entity_escaped_gallery_yields_each_url() {
        let html = format!(
            r#"<div data-images="[&quot;{PREFIX}a.jpg&quot;,&quot;{PREFIX}b.jpg&quot;]"></div>"#
        );
        assert_eq!(
            urls(&extractor(5, true).extract(&html)),
            vec![format!("{PREFIX}a.jpg"), format!("{PREFIX}b.jpg")]
        );
    }

    #[test]
    fn numeric_entities_are_decoded() {
        let slashes = PREFIX.replace('/', "&#x2F;");
        let colon = PREFIX.replace(':', "&#58;");
        let html = format!(r#"<img src="{slashes}n.webp"><img src="{colon}m.png">"#);
        assert_eq!(
            urls(&extractor(5, false).extract(&html)),
            vec![format!("{PREFIX}n.webp"), format!("{PREFIX}m.png")]
        );
    }

    #[test]
    fn comma_joined_urls_split_at_the_extension() {
        let html = format!(r#"<img srcset="{PREFIX}c.jpg,{PREFIX}d.png 2x">"#);
        assert_eq!(
            urls(&extractor(5, false).extract(&html)),
            vec![format!("{PREFIX}c.jpg"), format!("{PREFIX}d.png")]
        );
    }

    #[test]
    fn extension_must_end_a_word() {
        let html = format!(r#""{PREFIX}a.pngx" "{PREFIX}b.png?v=2""#);
        assert_eq!(urls(&extractor(5, true).extract(&html)), vec![format!("{PREFIX}b.png")]);
    }

    #[test]
    fn empty_page_yields_nothing() {
        assert!(extractor(5, true).extract("<html></html>").is_empty());
    }
}
