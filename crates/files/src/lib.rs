//! Orbit Bench file loading
//!
//! This crate turns files on disk into the byte payloads the inference boundary needs:
//!
//! - case images, encoded as inline base64 `data:` URLs for multimodal requests
//! - the reference document, read whole for upload to the retrieval file store
//!
//! ## Design Principles
//!
//! - Files are read at request time, not when the corpus is built, so a corpus of several
//!   thousand images never sits in memory at once
//! - Media types are detected from content (magic bytes), never trusted from extensions
//! - Oversized images are rejected locally instead of failing remotely
//!
//! ## Example Usage
//!
//! ```no_run
//! use orbit_bench_files::EncodedImage;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let image = EncodedImage::from_path(Path::new("Cases/19/CT/Axial/bone_window/a.jpg"))?;
//! let url = image.data_url();
//! assert!(url.starts_with("data:image/"));
//! # Ok(())
//! # }
//! ```

mod constants;
mod files;

pub use constants::{DEFAULT_IMAGE_MEDIA_TYPE, MAX_IMAGE_BYTES};
pub use files::{EncodedImage, ReferenceDocument};

/// Errors that can occur during file operations
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// Path does not point to a regular file
    #[error("Not a file: {0}")]
    NotAFile(String),

    /// Image exceeds the inline encoding limit
    #[error("Image {path} is {size_bytes} bytes, limit is {limit} bytes")]
    TooLarge {
        path: String,
        size_bytes: u64,
        limit: u64,
    },

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
