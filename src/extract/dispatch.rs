//! Maps a declared media type and file extension to one format family and
//! runs that family's extraction.
//!
//! Classification is first-match-wins over a fixed precedence:
//! PDF, image, text, office document, archive, then unrecognized.

use super::{
    cursor::{ByteCursor, CursorResult},
    jpeg, pdf, png, text,
};
use crate::models::record::{ExtractedAttributes, ImageDimensions};

pub const OFFICE_DOCUMENT_TYPE: &str = "office_document";

const OFFICE_EXTENSIONS: [&str; 6] = ["doc", "docx", "xls", "xlsx", "ppt", "pptx"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    Rar,
    SevenZip,
    Tar,
    Gzip,
}

impl ArchiveKind {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "zip" => Some(ArchiveKind::Zip),
            "rar" => Some(ArchiveKind::Rar),
            "7z" => Some(ArchiveKind::SevenZip),
            "tar" => Some(ArchiveKind::Tar),
            "gz" => Some(ArchiveKind::Gzip),
            _ => None,
        }
    }

    /// The extension recorded as `archive_type`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveKind::Zip => "zip",
            ArchiveKind::Rar => "rar",
            ArchiveKind::SevenZip => "7z",
            ArchiveKind::Tar => "tar",
            ArchiveKind::Gzip => "gz",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatFamily {
    Pdf,
    Image,
    Text,
    OfficeDocument,
    Archive(ArchiveKind),
    Unrecognized,
}

impl FormatFamily {
    /// Classify a declared media type and a lowercased extension.
    pub fn classify(content_type: &str, extension: &str) -> Self {
        let essence = media_type_essence(content_type);

        if essence == "application/pdf" || extension == "pdf" {
            FormatFamily::Pdf
        } else if essence.starts_with("image/") {
            FormatFamily::Image
        } else if essence.starts_with("text/") || extension == "txt" {
            FormatFamily::Text
        } else if OFFICE_EXTENSIONS.contains(&extension) {
            FormatFamily::OfficeDocument
        } else if let Some(kind) = ArchiveKind::from_extension(extension) {
            FormatFamily::Archive(kind)
        } else {
            FormatFamily::Unrecognized
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FormatFamily::Pdf => "pdf",
            FormatFamily::Image => "image",
            FormatFamily::Text => "text",
            FormatFamily::OfficeDocument => "office_document",
            FormatFamily::Archive(_) => "archive",
            FormatFamily::Unrecognized => "unrecognized",
        }
    }

    /// Run this family's decoder over the payload.
    ///
    /// `Err` means the bytes looked like the format but were truncated; the
    /// caller decides what to keep.
    pub fn extract(&self, cursor: &ByteCursor<'_>) -> CursorResult<ExtractedAttributes> {
        let mut attrs = ExtractedAttributes::default();
        match self {
            FormatFamily::Pdf => {
                attrs.number_of_pages = pdf::estimate_pages(cursor);
            }
            FormatFamily::Image => {
                attrs.image_dimensions = image_dimensions(cursor)?;
            }
            FormatFamily::Text => {
                let stats = text::analyze(cursor);
                attrs.text_content_length = Some(stats.length);
                attrs.word_count = Some(stats.word_count);
            }
            FormatFamily::OfficeDocument => {
                attrs.document_type = Some(OFFICE_DOCUMENT_TYPE.to_string());
            }
            FormatFamily::Archive(kind) => {
                attrs.archive_type = Some(kind.as_str().to_string());
            }
            FormatFamily::Unrecognized => {}
        }
        Ok(attrs)
    }
}

/// PNG first, then JPEG; the first decoder that recognizes the bytes wins.
fn image_dimensions(cursor: &ByteCursor<'_>) -> CursorResult<Option<ImageDimensions>> {
    if let Some(dims) = png::dimensions(cursor)? {
        return Ok(Some(dims));
    }
    jpeg::dimensions(cursor)
}

/// `Text/Plain; charset=utf-8` -> `text/plain`
fn media_type_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
