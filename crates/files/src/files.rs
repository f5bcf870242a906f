//! Image and document payloads
//!
//! This module provides the two payload types the benchmark sends across the inference
//! boundary:
//!
//! - [`EncodedImage`]: one case image, base64-encoded with its detected media type
//! - [`ReferenceDocument`]: the raw bytes of the reference text uploaded for retrieval
//!
//! # Media Type Detection
//!
//! Case folders routinely contain images exported without extensions or with misleading
//! ones. The media type is therefore detected from the leading bytes with `infer`. If the
//! content is not recognised as an image, [`DEFAULT_IMAGE_MEDIA_TYPE`] is used, which
//! matches how the study's images were exported (JPEG).
//!
//! # Implementation Notes
//!
//! - Loading is eager per file and lazy per corpus: callers load one image at a time
//! - Both types own their bytes and implement `Debug` without dumping the payload

use crate::{FilesError, DEFAULT_IMAGE_MEDIA_TYPE, MAX_IMAGE_BYTES};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use orbit_types::NonEmptyText;
use std::fs;
use std::path::Path;

/// A case image ready to be embedded inline in a multimodal request.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// Detected (or defaulted) media type, e.g. `image/png`
    pub media_type: &'static str,

    /// Size of the raw image in bytes
    pub size_bytes: u64,

    /// Base64 (standard alphabet, padded) of the raw bytes
    base64: String,
}

impl EncodedImage {
    /// Reads and encodes an image file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the image file
    ///
    /// # Errors
    ///
    /// Returns `FilesError` if:
    /// - the path is not a regular file
    /// - the file is larger than [`MAX_IMAGE_BYTES`]
    /// - the file cannot be read (I/O)
    pub fn from_path(path: &Path) -> Result<Self, FilesError> {
        let metadata = fs::metadata(path).map_err(|e| {
            FilesError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to stat image {}: {}", path.display(), e),
            ))
        })?;

        if !metadata.is_file() {
            return Err(FilesError::NotAFile(path.display().to_string()));
        }

        if metadata.len() > MAX_IMAGE_BYTES {
            return Err(FilesError::TooLarge {
                path: path.display().to_string(),
                size_bytes: metadata.len(),
                limit: MAX_IMAGE_BYTES,
            });
        }

        let bytes = fs::read(path).map_err(|e| {
            FilesError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read image {}: {}", path.display(), e),
            ))
        })?;

        Ok(Self::from_bytes(&bytes))
    }

    /// Encodes image bytes that are already in memory.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            media_type: detect_image_media_type(bytes),
            size_bytes: bytes.len() as u64,
            base64: STANDARD.encode(bytes),
        }
    }

    /// Returns the payload as an inline `data:<media type>;base64,<payload>` URL.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.base64)
    }
}

impl std::fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedImage")
            .field("media_type", &self.media_type)
            .field("size_bytes", &self.size_bytes)
            .finish_non_exhaustive()
    }
}

/// The reference document registered with the retrieval file store.
#[derive(Clone)]
pub struct ReferenceDocument {
    /// Filename sent with the upload
    pub filename: NonEmptyText,

    /// Detected media type, if the content is recognised
    pub media_type: Option<NonEmptyText>,

    bytes: Vec<u8>,
}

impl ReferenceDocument {
    /// Reads a reference document from disk.
    ///
    /// # Errors
    ///
    /// Returns `FilesError` if the path is not a regular file or cannot be read.
    pub fn from_path(path: &Path) -> Result<Self, FilesError> {
        if !path.is_file() {
            return Err(FilesError::NotAFile(path.display().to_string()));
        }

        let bytes = fs::read(path).map_err(|e| {
            FilesError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read document {}: {}", path.display(), e),
            ))
        })?;

        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| NonEmptyText::new(n).ok())
            .ok_or_else(|| FilesError::NotAFile(path.display().to_string()))?;

        let media_type =
            infer::get(&bytes).and_then(|kind| NonEmptyText::new(kind.mime_type()).ok());

        Ok(Self {
            filename,
            media_type,
            bytes,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl std::fmt::Debug for ReferenceDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceDocument")
            .field("filename", &self.filename)
            .field("media_type", &self.media_type)
            .field("size_bytes", &self.bytes.len())
            .finish()
    }
}

fn detect_image_media_type(bytes: &[u8]) -> &'static str {
    infer::get(bytes)
        .filter(|kind| kind.matcher_type() == infer::MatcherType::Image)
        .map(|kind| kind.mime_type())
        .unwrap_or(DEFAULT_IMAGE_MEDIA_TYPE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const PNG_HEADER: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    const JPEG_HEADER: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xE0];

    #[test]
    fn test_png_media_type_detected() {
        let image = EncodedImage::from_bytes(&PNG_HEADER);
        assert_eq!(image.media_type, "image/png");
        assert_eq!(image.size_bytes, 8);
    }

    #[test]
    fn test_jpeg_media_type_detected() {
        let image = EncodedImage::from_bytes(&JPEG_HEADER);
        assert_eq!(image.media_type, "image/jpeg");
    }

    #[test]
    fn test_unknown_content_falls_back_to_default() {
        let image = EncodedImage::from_bytes(b"not an image");
        assert_eq!(image.media_type, DEFAULT_IMAGE_MEDIA_TYPE);
    }

    #[test]
    fn test_data_url_shape() {
        let image = EncodedImage::from_bytes(b"Hello, World!");
        assert_eq!(
            image.data_url(),
            "data:image/jpeg;base64,SGVsbG8sIFdvcmxkIQ=="
        );
    }

    #[test]
    fn test_from_path_reads_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("scan.png");
        fs::write(&path, PNG_HEADER).unwrap();

        let image = EncodedImage::from_path(&path).unwrap();
        assert_eq!(image.media_type, "image/png");
        assert!(image.data_url().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_from_path_missing_file() {
        let temp = TempDir::new().unwrap();
        let result = EncodedImage::from_path(&temp.path().join("missing.jpg"));
        assert!(matches!(result, Err(FilesError::Io(_))));
    }

    #[test]
    fn test_from_path_rejects_directory() {
        let temp = TempDir::new().unwrap();
        let result = EncodedImage::from_path(temp.path());
        assert!(matches!(result, Err(FilesError::NotAFile(_))));
    }

    #[test]
    fn test_debug_does_not_dump_payload() {
        let image = EncodedImage::from_bytes(b"Hello, World!");
        let rendered = format!("{image:?}");
        assert!(!rendered.contains("SGVsbG8"));
    }

    #[test]
    fn test_reference_document_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("orbit_textbook.txt");
        fs::write(&path, b"Orbital lymphoma is ...").unwrap();

        let document = ReferenceDocument::from_path(&path).unwrap();
        assert_eq!(document.filename.as_str(), "orbit_textbook.txt");
        assert_eq!(document.bytes(), b"Orbital lymphoma is ...");
    }

    #[test]
    fn test_reference_document_missing() {
        let temp = TempDir::new().unwrap();
        let result = ReferenceDocument::from_path(&temp.path().join("nope.pdf"));
        assert!(matches!(result, Err(FilesError::NotAFile(_))));
    }
}
