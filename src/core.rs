//! Provider abstraction: the one seam through which every model call flows.
//!
//! OCR, question generation and grading are chat-completions calls with
//! role-tagged messages; oral answers additionally go through a speech-to-text
//! call. Implementors only translate these requests to a concrete backend.

use crate::error::AIError;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt::Debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Resolution hint for image parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageDetail {
    Low,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageUrl {
    pub url: String,
    pub detail: ImageDetail,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self { role: Role::System, content: MessageContent::Text(text.into()) }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, content: MessageContent::Text(text.into()) }
    }

    /// User message carrying an instruction and an inline image.
    pub fn user_with_image(text: impl Into<String>, image_url: impl Into<String>, detail: ImageDetail) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Parts(vec![
                ContentPart::Text { text: text.into() },
                ContentPart::ImageUrl { image_url: ImageUrl { url: image_url.into(), detail } },
            ]),
        }
    }

    /// Concatenated text of the message, without image payloads.
    pub fn text(&self) -> String {
        match &self.content {
            MessageContent::Text(t) => t.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// A single chat-completions request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl ChatRequest {
    /// Flattened prompt text, used for transcripts and mock assertions.
    pub fn prompt_text(&self) -> String {
        self.messages.iter().map(ChatMessage::text).collect::<Vec<_>>().join("\n\n")
    }

    pub fn has_image(&self) -> bool {
        self.messages.iter().any(|m| {
            matches!(&m.content, MessageContent::Parts(parts) if parts.iter().any(|p| matches!(p, ContentPart::ImageUrl { .. })))
        })
    }
}

/// Recorded audio handed to the speech-to-text backend.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime: String,
    pub model: String,
    /// ISO-639-1 hint, e.g. "sv".
    pub language: Option<String>,
}

/// Low-level model provider.
#[async_trait]
pub trait AiProvider: Send + Sync + Debug {
    async fn chat_complete(&self, request: ChatRequest) -> Result<String, AIError>;

    async fn transcribe(&self, audio: AudioClip) -> Result<String, AIError>;

    fn clone_box(&self) -> Box<dyn AiProvider>;
}

impl Clone for Box<dyn AiProvider> {
    fn clone(&self) -> Self {
        self.as_ref().clone_box()
    }
}

#[async_trait]
impl AiProvider for Box<dyn AiProvider> {
    async fn chat_complete(&self, request: ChatRequest) -> Result<String, AIError> {
        self.as_ref().chat_complete(request).await
    }

    async fn transcribe(&self, audio: AudioClip) -> Result<String, AIError> {
        self.as_ref().transcribe(audio).await
    }

    fn clone_box(&self) -> Box<dyn AiProvider> {
        self.as_ref().clone_box()
    }
}
