//! Blocking HTTP client for the OpenAI-compatible Responses, Files and Vector Stores APIs.
//!
//! The client is deliberately thin: it serialises the wire models, maps non-2xx statuses to
//! [`InferenceError::Status`] and leaves retries to the caller.

use crate::responses::{ResponseBody, ResponseRequest};
use crate::vector_stores::{AttachFile, CreateVectorStore, CreatedObject, VectorStoreFile};
use crate::{
    FileId, IngestionStatus, InferenceBoundary, InferenceError, InferenceResult,
    RetrievalRegistrar, VectorStoreId,
};
use orbit_bench_files::ReferenceDocument;
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Purpose tag required by the file store for documents used with file search.
const FILE_PURPOSE: &str = "assistants";

/// Connection settings for [`OpenAiClient`].
#[derive(Clone)]
pub struct ClientConfig {
    pub api_key: String,
    pub base_url: String,
    /// Upper bound on a single HTTP call, including reading the body.
    pub timeout: Duration,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Clone)]
pub struct OpenAiClient {
    http: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::InvalidInput`] if the API key is blank, or
    /// [`InferenceError::Transport`] if the HTTP client cannot be constructed.
    pub fn new(config: ClientConfig) -> InferenceResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(InferenceError::InvalidInput("API key cannot be empty".into()));
        }

        let http = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            http,
            api_key: config.api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn authorised(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.bearer_auth(&self.api_key)
    }

    fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> InferenceResult<T> {
        let response = self.authorised(builder).send()?;
        let response = check_status(response)?;
        let body = response.text()?;
        serde_json::from_str(&body).map_err(|e| InferenceError::Decode(e.to_string()))
    }
}

impl InferenceBoundary for OpenAiClient {
    fn create_response(&self, request: &ResponseRequest) -> InferenceResult<String> {
        let body: ResponseBody =
            self.send_json(self.http.post(self.url("responses")).json(request))?;

        let text = body.output_text();
        if text.is_empty() {
            return Err(InferenceError::EmptyOutput(
                body.status.unwrap_or_else(|| "unknown".into()),
            ));
        }

        tracing::debug!(
            "response {} for model {} ({} chars)",
            body.id.as_deref().unwrap_or("<no id>"),
            request.model,
            text.len()
        );
        Ok(text)
    }
}

impl RetrievalRegistrar for OpenAiClient {
    fn upload_file(&self, document: &ReferenceDocument) -> InferenceResult<FileId> {
        let mut part =
            Part::bytes(document.bytes().to_vec()).file_name(document.filename.to_string());
        if let Some(media_type) = &document.media_type {
            part = part.mime_str(media_type.as_str())?;
        }
        let form = Form::new().text("purpose", FILE_PURPOSE).part("file", part);

        let created: CreatedObject =
            self.send_json(self.http.post(self.url("files")).multipart(form))?;
        FileId::new(&created.id)
            .ok_or_else(|| InferenceError::Decode("file upload returned an empty id".into()))
    }

    fn create_vector_store(&self, name: &str) -> InferenceResult<VectorStoreId> {
        let created: CreatedObject = self.send_json(
            self.http
                .post(self.url("vector_stores"))
                .json(&CreateVectorStore { name }),
        )?;
        VectorStoreId::new(&created.id)
            .ok_or_else(|| InferenceError::Decode("vector store returned an empty id".into()))
    }

    fn attach_file(
        &self,
        store: &VectorStoreId,
        file: &FileId,
    ) -> InferenceResult<IngestionStatus> {
        let attached: VectorStoreFile = self.send_json(
            self.http
                .post(self.url(&format!("vector_stores/{}/files", store)))
                .json(&AttachFile {
                    file_id: file.as_str(),
                }),
        )?;
        Ok(attached.status)
    }

    fn ingestion_status(
        &self,
        store: &VectorStoreId,
        file: &FileId,
    ) -> InferenceResult<IngestionStatus> {
        let current: VectorStoreFile = self.send_json(
            self.http
                .get(self.url(&format!("vector_stores/{}/files/{}", store, file))),
        )?;
        Ok(current.status)
    }
}

/// Turns a non-2xx response into [`InferenceError::Status`], keeping the service's message.
fn check_status(response: Response) -> InferenceResult<Response> {
    #[derive(Deserialize)]
    struct ErrorResponse {
        error: ErrorBody,
    }

    #[derive(Deserialize)]
    struct ErrorBody {
        message: String,
    }

    let status = response.status();
    tracing::debug!("{} {}", status.as_u16(), response.url().path());

    if status.is_success() {
        return Ok(response);
    }

    let raw = response.text().unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&raw)
        .map(|body| body.error.message)
        .unwrap_or_else(|_| {
            if raw.is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string()
            } else {
                raw
            }
        });

    Err(InferenceError::Status {
        status: status.as_u16(),
        message,
    })
}
