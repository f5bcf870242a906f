/// Media type used when the bytes of an image cannot be identified as an image.
pub const DEFAULT_IMAGE_MEDIA_TYPE: &str = "image/jpeg";

/// Largest single image accepted for inline encoding (20 MiB).
pub const MAX_IMAGE_BYTES: u64 = 20 * 1024 * 1024;
