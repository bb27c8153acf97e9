//! Assembles a `CatalogRecord` from a fetched object.
//!
//! Decoder failures never escape: a truncated payload yields a record with
//! the affected fields absent.

use super::{cursor::ByteCursor, dispatch::FormatFamily};
use crate::models::{
    content::RawFileContent,
    notification::ObjectLocator,
    record::{CatalogRecord, RecordStatus},
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::{debug, warn};

const META_ORIGINAL_FILENAME: &str = "original_filename";
const META_AUTHOR_NAME: &str = "author_name";
const META_UPLOAD_DATE: &str = "upload_date";
const META_EXPIRATION_DATE: &str = "expiration_date";

/// Lowercased suffix after the last `.`, or empty when there is none.
pub fn file_extension(file_name: &str) -> String {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Build the catalog record for one object.
pub fn build_record(
    locator: &ObjectLocator,
    content: &RawFileContent,
    extracted_at: DateTime<Utc>,
) -> CatalogRecord {
    let file_type = content.declared_type().to_string();
    let file_extension = file_extension(&content.file_name);
    let family = FormatFamily::classify(&file_type, &file_extension);
    let cursor = ByteCursor::new(&content.body);

    let attributes = match family.extract(&cursor) {
        Ok(attrs) => attrs,
        Err(err) => {
            warn!(
                "{} decoder gave up on {}/{}: {}",
                family.name(),
                locator.bucket,
                locator.key,
                err
            );
            Default::default()
        }
    };
    debug!(
        "classified {}/{} as {} ({} bytes)",
        locator.bucket,
        locator.key,
        family.name(),
        cursor.len()
    );

    let metadata = &content.metadata;
    CatalogRecord {
        file_id: locator.file_id().to_string(),
        s3_bucket: locator.bucket.clone(),
        s3_object_key: locator.key.clone(),
        extracted_at,
        status: RecordStatus::Active,
        file_size: content.body.len() as i64,
        file_type,
        file_extension,
        attributes,
        original_filename: metadata.get(META_ORIGINAL_FILENAME).cloned(),
        author_name: non_empty(metadata, META_AUTHOR_NAME),
        upload_date: non_empty(metadata, META_UPLOAD_DATE),
        expiration_date: non_empty(metadata, META_EXPIRATION_DATE),
        object_metadata: metadata.clone(),
    }
}

fn non_empty(metadata: &BTreeMap<String, String>, key: &str) -> Option<String> {
    metadata.get(key).filter(|v| !v.is_empty()).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{jpeg::tests::synthetic_jpeg, png::tests::synthetic_png};
    use crate::models::record::{ExtractedAttributes, ImageDimensions};
    use bytes::Bytes;

    fn content(name: &str, content_type: Option<&str>, body: &[u8]) -> RawFileContent {
        RawFileContent {
            body: Bytes::copy_from_slice(body),
            content_type: content_type.map(str::to_string),
            file_name: name.to_string(),
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn extension_rules() {
        assert_eq!(file_extension("Report.PDF"), "pdf");
        assert_eq!(file_extension("archive.tar.gz"), "gz");
        assert_eq!(file_extension("README"), "");
        assert_eq!(file_extension("trailing."), "");
    }

    #[test]
    fn unknown_type_populates_only_common_fields() {
        let locator = ObjectLocator::new("uploads", "f00d.bin");
        let body = vec![0u8; 1234];
        let record = build_record(
            &locator,
            &content("f00d.bin", Some("application/x-unknown"), &body),
            Utc::now(),
        );

        assert_eq!(record.attributes, ExtractedAttributes::default());
        assert_eq!(record.file_size, 1234);
        assert_eq!(record.file_extension, "bin");
        assert_eq!(record.file_type, "application/x-unknown");
        assert_eq!(record.status, RecordStatus::Active);
        assert_eq!(record.file_id, "f00d");
    }

    #[test]
    fn missing_content_type_defaults_to_octet_stream() {
        let locator = ObjectLocator::new("uploads", "notes.txt");
        let record = build_record(&locator, &content("notes.txt", None, b"one two"), Utc::now());
        assert_eq!(record.file_type, "application/octet-stream");
        assert_eq!(record.attributes.word_count, Some(2));
        assert_eq!(record.attributes.text_content_length, Some(7));
    }

    #[test]
    fn truncated_jpeg_leaves_dimensions_absent() {
        let locator = ObjectLocator::new("uploads", "cut.jpg");
        let mut body = synthetic_jpeg(0xC0, 100, 50);
        let sof = body.windows(2).position(|w| w == [0xFF, 0xC0]).unwrap();
        body.truncate(sof + 6);

        let record = build_record(
            &locator,
            &content("cut.jpg", Some("image/jpeg"), &body),
            Utc::now(),
        );
        assert_eq!(record.attributes.image_dimensions, None);
        assert_eq!(record.file_size, body.len() as i64);
        assert_eq!(record.file_extension, "jpg");
    }

    #[test]
    fn png_dimensions_flow_into_record() {
        let locator = ObjectLocator::new("uploads", "img/1234.png");
        let record = build_record(
            &locator,
            &content("1234.png", Some("image/png"), &synthetic_png(800, 600)),
            Utc::now(),
        );
        assert_eq!(
            record.attributes.image_dimensions,
            Some(ImageDimensions {
                width: 800,
                height: 600
            })
        );
        assert_eq!(record.s3_object_key, "img/1234.png");
        assert_eq!(record.file_id, "1234");
    }

    #[test]
    fn declared_metadata_is_passed_through() {
        let locator = ObjectLocator::new("uploads", "id.pdf");
        let mut raw = content("id.pdf", Some("application/pdf"), b"%%EOF");
        raw.metadata
            .insert("original_filename".into(), "Quarterly Report.pdf".into());
        raw.metadata.insert("author_name".into(), "".into());
        raw.metadata
            .insert("upload_date".into(), "2025-01-02T03:04:05.000Z".into());
        raw.metadata.insert("file_id".into(), "id".into());

        let record = build_record(&locator, &raw, Utc::now());
        assert_eq!(
            record.original_filename.as_deref(),
            Some("Quarterly Report.pdf")
        );
        assert_eq!(record.author_name, None);
        assert_eq!(
            record.upload_date.as_deref(),
            Some("2025-01-02T03:04:05.000Z")
        );
        assert_eq!(record.expiration_date, None);
        assert_eq!(record.object_metadata.len(), 4);
        assert_eq!(record.attributes.number_of_pages, Some(1));
    }
}
