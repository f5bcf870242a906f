//! Files and Vector Stores API wire models.

use orbit_types::NonEmptyText;
use serde::{Deserialize, Serialize};

/// Handle of a document in the remote file store.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(NonEmptyText);

impl FileId {
    pub fn new(raw: impl AsRef<str>) -> Option<Self> {
        NonEmptyText::new(raw).ok().map(Self)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle of a vector store; this is the retrieval handle attached to file-search requests.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VectorStoreId(NonEmptyText);

impl VectorStoreId {
    pub fn new(raw: impl AsRef<str>) -> Option<Self> {
        NonEmptyText::new(raw).ok().map(Self)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for VectorStoreId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ingestion state of a file attached to a vector store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionStatus {
    InProgress,
    Completed,
    Cancelled,
    Failed,
}

impl IngestionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, IngestionStatus::InProgress)
    }
}

/// `POST /files` and `POST /vector_stores` both answer with at least an `id`.
#[derive(Debug, Deserialize)]
pub(crate) struct CreatedObject {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateVectorStore<'a> {
    pub name: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttachFile<'a> {
    pub file_id: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VectorStoreFile {
    pub status: IngestionStatus,
}
