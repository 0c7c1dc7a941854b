use std::collections::HashSet;
use std::io::{Cursor, Write};

use bytes::Bytes;
use unmark_common::{ProcessedImage, UnmarkError};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// A finished ZIP held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    /// Download name, e.g. `fiat-panda.zip`.
    pub filename: String,
    pub bytes: Bytes,
    /// Entry names in insertion order.
    pub entries: Vec<String>,
}

pub struct Archiver;

impl Archiver {
    /// Pack `images` into `{archive_name}.zip`, one Deflate entry per image.
    ///
    /// ```
    /// use bytes::Bytes;
    /// use unmark_common::ProcessedImage;
    /// use unmark_pipeline::Archiver;
    ///
    /// let images = vec![ProcessedImage {
    ///     filename: "panda_1.jpg".into(),
    ///     bytes: Bytes::from_static(b"jpeg"),
    /// }];
    /// let archive = Archiver::build("panda", &images).unwrap();
    /// assert_eq!(archive.filename, "panda.zip");
    /// assert_eq!(archive.entries, vec!["panda_1.jpg".to_string()]);
    /// ```
    pub fn build(archive_name: &str, images: &[ProcessedImage]) -> Result<Archive, UnmarkError> {
        if images.is_empty() {
            return Err(UnmarkError::Archive("no images to archive".into()));
        }

        let mut seen = HashSet::with_capacity(images.len());
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        for image in images {
            if !seen.insert(image.filename.as_str()) {
                return Err(UnmarkError::Archive(format!(
                    "duplicate entry name {}",
                    image.filename
                )));
            }
            zip.start_file(image.filename.as_str(), options)
                .map_err(|e| UnmarkError::Archive(format!("{}: {e}", image.filename)))?;
            zip.write_all(&image.bytes)
                .map_err(|e| UnmarkError::Archive(format!("{}: {e}", image.filename)))?;
        }

        let cursor = zip
            .finish()
            .map_err(|e| UnmarkError::Archive(e.to_string()))?;
        let bytes = Bytes::from(cursor.into_inner());
        let archive = Archive {
            filename: format!("{archive_name}.zip"),
            bytes,
            entries: images.iter().map(|i| i.filename.clone()).collect(),
        };
        tracing::debug!(
            archive = %archive.filename,
            entries = archive.entries.len(),
            size = archive.bytes.len(),
            "pipeline.archive.built"
        );
        Ok(archive)
    }
}
