use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

use crate::core::{AiProvider, AudioClip, ChatRequest};
use crate::error::{AIError, OpenAIError};

/// Mock client that always returns an empty object (and an empty transcript).
#[derive(Debug, Clone, Default)]
pub struct MockVoid;

#[async_trait]
impl AiProvider for MockVoid {
    async fn chat_complete(&self, _request: ChatRequest) -> Result<String, AIError> {
        Ok("{}".to_string())
    }

    async fn transcribe(&self, _audio: AudioClip) -> Result<String, AIError> {
        Ok(String::new())
    }

    fn clone_box(&self) -> Box<dyn AiProvider> {
        Box::new(self.clone())
    }
}

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum MockResponse {
    Success(String),
    /// Provider-side failure with the given message.
    Error(String),
    RateLimit,
    /// Reply after sleeping; used to drive strategy timeouts.
    Delayed(Duration, String),
}

/// Shared script and call log behind a [`MockClient`].
#[derive(Debug, Default)]
pub struct MockHandle {
    responses: Mutex<VecDeque<MockResponse>>,
    transcripts: Mutex<VecDeque<MockResponse>>,
    calls: Mutex<Vec<ChatRequest>>,
    audio_calls: Mutex<Vec<AudioClip>>,
}

impl MockHandle {
    pub fn add_response(&self, response: MockResponse) {
        if let Ok(mut q) = self.responses.lock() {
            q.push_back(response);
        }
    }

    pub fn add_responses(&self, responses: impl IntoIterator<Item = MockResponse>) {
        if let Ok(mut q) = self.responses.lock() {
            q.extend(responses);
        }
    }

    pub fn add_transcript(&self, response: MockResponse) {
        if let Ok(mut q) = self.transcripts.lock() {
            q.push_back(response);
        }
    }

    /// Chat requests seen so far, in order.
    pub fn calls(&self) -> Vec<ChatRequest> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn audio_calls(&self) -> Vec<AudioClip> {
        self.audio_calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().map(|q| q.len()).unwrap_or(0)
    }

    fn next_response(&self) -> Option<MockResponse> {
        self.responses.lock().ok().and_then(|mut q| q.pop_front())
    }

    fn next_transcript(&self) -> Option<MockResponse> {
        self.transcripts.lock().ok().and_then(|mut q| q.pop_front())
    }
}

/// Scripted provider: replies are consumed in order; an empty script is an error.
#[derive(Debug, Clone)]
pub struct MockClient {
    handle: Arc<MockHandle>,
}

impl MockClient {
    pub fn new() -> (Self, Arc<MockHandle>) {
        let handle = Arc::new(MockHandle::default());
        (Self { handle: handle.clone() }, handle)
    }

    pub fn with_responses(responses: Vec<MockResponse>) -> (Self, Arc<MockHandle>) {
        let (client, handle) = Self::new();
        handle.add_responses(responses);
        (client, handle)
    }

    async fn play(response: Option<MockResponse>) -> Result<String, AIError> {
        match response {
            Some(MockResponse::Success(text)) => Ok(text),
            Some(MockResponse::Error(msg)) => Err(AIError::OpenAI(OpenAIError::Api(msg))),
            Some(MockResponse::RateLimit) => Err(AIError::OpenAI(OpenAIError::RateLimit)),
            Some(MockResponse::Delayed(delay, text)) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
            None => Err(AIError::Mock("no scripted response left".to_string())),
        }
    }
}

#[async_trait]
impl AiProvider for MockClient {
    async fn chat_complete(&self, request: ChatRequest) -> Result<String, AIError> {
        debug!(model = %request.model, "mock chat completion");
        if let Ok(mut calls) = self.handle.calls.lock() {
            calls.push(request);
        }
        Self::play(self.handle.next_response()).await
    }

    async fn transcribe(&self, audio: AudioClip) -> Result<String, AIError> {
        debug!(bytes = audio.bytes.len(), "mock transcription");
        if let Ok(mut calls) = self.handle.audio_calls.lock() {
            calls.push(audio);
        }
        Self::play(self.handle.next_transcript()).await
    }

    fn clone_box(&self) -> Box<dyn AiProvider> {
        Box::new(self.clone())
    }
}
