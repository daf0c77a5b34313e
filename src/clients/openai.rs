use crate::config::KeyFromEnv;
use crate::core::{AiProvider, AudioClip, ChatRequest};
use crate::error::{AIError, OpenAIError};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

pub mod models;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    pub api_key: String,
    pub base_url: String,
    pub organization: Option<String>,
}

impl KeyFromEnv for OpenAIConfig {
    const KEY_NAME: &'static str = "OPENAI_API_KEY";
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            api_key: Self::find_key().unwrap_or_default(),
            base_url: std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            organization: std::env::var("OPENAI_ORG_ID").ok().filter(|v| !v.is_empty()),
        }
    }
}

impl OpenAIConfig {
    pub fn with_key(api_key: impl Into<String>) -> Self {
        Self { api_key: api_key.into(), ..Self::default() }
    }
}

#[derive(Clone, Debug)]
pub struct OpenAIClient {
    config: OpenAIConfig,
    http: reqwest::Client,
}

impl Default for OpenAIClient {
    fn default() -> Self {
        Self::new(OpenAIConfig::default())
    }
}

impl OpenAIClient {
    pub fn new(config: OpenAIConfig) -> Self {
        Self { config, http: reqwest::Client::new() }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder.bearer_auth(&self.config.api_key);
        match &self.config.organization {
            Some(org) => builder.header("OpenAI-Organization", org),
            None => builder,
        }
    }

    async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, AIError> {
        let status = resp.status();
        if status == 401 { return Err(AIError::OpenAI(OpenAIError::Authentication)); }
        if status == 429 { return Err(AIError::OpenAI(OpenAIError::RateLimit)); }
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            warn!(status = %status, body = %txt, "OpenAI returned an error status");
            if txt.contains("content_policy") || txt.contains("content_filter") {
                return Err(AIError::OpenAI(OpenAIError::ContentPolicy(txt)));
            }
            return Err(AIError::OpenAI(OpenAIError::Api(txt)));
        }
        Ok(resp)
    }
}

#[derive(Deserialize)]
struct Choices { choices: Vec<Choice> }
#[derive(Deserialize)]
struct Choice { message: Msg }
#[derive(Deserialize)]
struct Msg { content: Option<String> }
#[derive(Deserialize)]
struct Transcription { text: String }

#[async_trait]
impl AiProvider for OpenAIClient {
    #[instrument(skip(self, request), fields(model = %request.model, max_tokens = request.max_tokens))]
    async fn chat_complete(&self, request: ChatRequest) -> Result<String, AIError> {
        let req = self.http.post(self.endpoint("chat/completions")).json(&request);
        let resp = self.authorized(req)
            .send().await
            .map_err(|e| AIError::OpenAI(OpenAIError::Http(e.to_string())))?;
        let resp = Self::check_status(resp).await?;

        let parsed: Choices = resp.json().await
            .map_err(|e| AIError::OpenAI(OpenAIError::Http(e.to_string())))?;
        let content = parsed.choices.into_iter().next()
            .ok_or_else(|| AIError::OpenAI(OpenAIError::Api("No choices".into())))?
            .message.content
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(AIError::OpenAI(OpenAIError::EmptyContent));
        }
        debug!(response_len = content.len(), "chat completion received");
        Ok(content)
    }

    #[instrument(skip(self, audio), fields(model = %audio.model, bytes = audio.bytes.len(), language = ?audio.language))]
    async fn transcribe(&self, audio: AudioClip) -> Result<String, AIError> {
        let part = Part::bytes(audio.bytes)
            .file_name(audio.file_name)
            .mime_str(&audio.mime)
            .map_err(|e| AIError::OpenAI(OpenAIError::Http(e.to_string())))?;
        let mut form = Form::new().part("file", part).text("model", audio.model);
        if let Some(lang) = audio.language {
            form = form.text("language", lang);
        }

        let req = self.http.post(self.endpoint("audio/transcriptions")).multipart(form);
        let resp = self.authorized(req)
            .send().await
            .map_err(|e| AIError::OpenAI(OpenAIError::Http(e.to_string())))?;
        let resp = Self::check_status(resp).await?;

        let parsed: Transcription = resp.json().await
            .map_err(|e| AIError::OpenAI(OpenAIError::Http(e.to_string())))?;
        Ok(parsed.text)
    }

    fn clone_box(&self) -> Box<dyn AiProvider> { Box::new(self.clone()) }
}
