//! Responses API wire models.
//!
//! Requests are built by the matrix runner; this module only fixes their JSON shape:
//!
//! ```json
//! {
//!   "model": "gpt-5-2025-08-07",
//!   "input": [
//!     { "role": "system", "content": "You are a specialized neuroradiology AI ..." },
//!     { "role": "user", "content": [
//!         { "type": "input_text", "text": "Presentation: 45 year old male. ..." },
//!         { "type": "input_text", "text": "CT_Axial_bone_window" },
//!         { "type": "input_image", "image_url": "data:image/jpeg;base64,..." }
//!     ] }
//!   ],
//!   "tools": [ { "type": "file_search", "vector_store_ids": ["vs_..."] } ],
//!   "tool_choice": "required"
//! }
//! ```

use serde::{Deserialize, Serialize};

/// One request to the Responses endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResponseRequest {
    pub model: String,
    pub input: Vec<InputMessage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
}

impl ResponseRequest {
    /// The content blocks of the first user message, if any.
    pub fn user_blocks(&self) -> &[ContentBlock] {
        self.input
            .iter()
            .find(|m| m.role == Role::User)
            .and_then(|m| match &m.content {
                MessageContent::Blocks(blocks) => Some(blocks.as_slice()),
                MessageContent::Text(_) => None,
            })
            .unwrap_or(&[])
    }

    /// The text of the first system message, if any.
    pub fn system_text(&self) -> Option<&str> {
        self.input
            .iter()
            .find(|m| m.role == Role::System)
            .and_then(|m| match &m.content {
                MessageContent::Text(text) => Some(text.as_str()),
                MessageContent::Blocks(_) => None,
            })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InputMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl InputMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Blocks(blocks),
        }
    }
}

/// Message content: plain text, or an ordered list of typed blocks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    InputText { text: String },
    InputImage { image_url: String },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::InputText { text: text.into() }
    }

    pub fn image(data_url: impl Into<String>) -> Self {
        ContentBlock::InputImage {
            image_url: data_url.into(),
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, ContentBlock::InputImage { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Tool {
    FileSearch { vector_store_ids: Vec<String> },
}

/// How the model may use the attached tools.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    Auto,
    Required,
}

// ============================================================================
// Response side
// ============================================================================

/// The subset of a Responses API result the benchmark reads.
#[derive(Clone, Debug, Deserialize)]
pub struct ResponseBody {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub output: Vec<OutputItem>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputItem {
    Message {
        #[serde(default)]
        content: Vec<OutputContent>,
    },
    #[serde(other)]
    Other,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputContent {
    OutputText { text: String },
    #[serde(other)]
    Other,
}

impl ResponseBody {
    /// Concatenates every `output_text` part of every message item, in order.
    ///
    /// Tool-call items (file search calls, reasoning summaries) carry no answer text and are
    /// skipped.
    pub fn output_text(&self) -> String {
        self.output
            .iter()
            .filter_map(|item| match item {
                OutputItem::Message { content } => Some(content),
                OutputItem::Other => None,
            })
            .flatten()
            .filter_map(|part| match part {
                OutputContent::OutputText { text } => Some(text.as_str()),
                OutputContent::Other => None,
            })
            .collect()
    }
}
