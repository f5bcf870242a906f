//! Constants used throughout the Orbit Bench core crate.
//!
//! Sentinel values, defaults and file names live here so the corpus builder, the runner and
//! the binaries agree on them.

/// `clinical_info` of a case with no row in the case index.
pub const UNKNOWN_CLINICAL_INFO: &str = "Unknown";

/// `diagnosis` of a case with no row in the case index.
pub const UNKNOWN_DIAGNOSIS: &str = "Unknown";

/// Label of images stored directly in a case folder rather than in a sub-folder.
pub const ROOT_IMAGE_LABEL: &str = "root";

/// Deepest sub-folder nesting followed inside one case folder.
pub const MAX_CASE_DEPTH: usize = 16;

/// Prefix of the text block carrying the clinical presentation.
pub const PRESENTATION_PREFIX: &str = "Presentation: ";

/// Models evaluated when none are configured.
pub const DEFAULT_MODELS: &[&str] = &["o3-2025-04-16", "gpt-5-2025-08-07"];

/// Prompt variant used for the retrieval configuration when none is configured.
pub const DEFAULT_RETRIEVAL_PROMPT: &str = "simple";

/// Name given to the vector store holding the reference document.
pub const DEFAULT_VECTOR_STORE_NAME: &str = "knowledge_base";

/// Default directory for result tables.
pub const DEFAULT_RESULTS_DIR: &str = "results";

/// Suffix naming the retrieval configuration's output table.
pub const FILE_SEARCH_SUFFIX: &str = "file search";

/// Result table columns, in order.
pub const RESULT_COLUMNS: [&str; 3] = ["case_id", "diagnosis", "answers"];

/// Start of the `answers` cell of a case whose inference failed.
pub const FAILED_ANSWER_PREFIX: &str = "[inference failed";

/// Filename of the run manifest written next to the result tables.
pub const MANIFEST_FILENAME: &str = "manifest.json";

pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;
pub const DEFAULT_RETRY_BASE_MS: u64 = 2_000;
pub const DEFAULT_RETRY_MAX_MS: u64 = 60_000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_CONCURRENCY: usize = 1;
