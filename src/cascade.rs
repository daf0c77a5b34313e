//! Ordered fallback strategies with per-attempt timeouts.
//!
//! A capability is a [`CascadeTask`] plus a list of [`Strategy`] values. The
//! cascade tries them one at a time, in order, and stops at the first success.
//! When every strategy fails the task may supply static content.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::core::{AiProvider, ChatRequest};
use crate::error::{AIError, QuizError};
use crate::interceptors::Interceptor;
use crate::prompts::{GradingPrompt, OcrPrompt, QuestionPrompt, Sampling};

/// What a strategy does when attempted.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Ocr(OcrPrompt),
    Questions(QuestionPrompt),
    /// Quick OCR with `ocr_model`, then question generation with the strategy model.
    OcrThenQuestions { ocr_model: String, ocr_sampling: Sampling },
    GeneralKnowledge,
    /// Local sentence heuristics; no model call.
    Heuristic,
    Grading(GradingPrompt),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Strategy {
    pub label: &'static str,
    pub model: String,
    pub step: Step,
    pub sampling: Sampling,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeState {
    Attempting(usize),
    /// The primary strategy produced the result.
    Success,
    /// Strategy `i > 0` produced the result.
    Degraded(usize),
    /// Every strategy failed; static content was returned.
    ExhaustedFallback,
}

impl CascadeState {
    fn resolved_at(index: usize) -> Self {
        if index == 0 { Self::Success } else { Self::Degraded(index) }
    }
}

impl fmt::Display for CascadeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attempting(i) => write!(f, "attempting({i})"),
            Self::Success => write!(f, "success"),
            Self::Degraded(i) => write!(f, "degraded({i})"),
            Self::ExhaustedFallback => write!(f, "exhausted"),
        }
    }
}

/// A value together with how the cascade got it.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    pub value: T,
    pub state: CascadeState,
    /// Label of the producing strategy; `None` for static content.
    pub strategy: Option<&'static str>,
    /// Number of strategies attempted.
    pub attempts: usize,
}

#[async_trait]
pub trait CascadeTask: Send + Sync {
    type Output: Send;

    fn capability(&self) -> &'static str;

    async fn attempt(&self, strategy: &Strategy, cascade: &FallbackCascade) -> Result<Self::Output, QuizError>;

    /// Static content once every strategy has failed, if the capability has any.
    fn exhausted(&self) -> Option<Self::Output>;
}

#[derive(Debug, Clone)]
pub struct FallbackCascade {
    provider: Box<dyn AiProvider>,
    interceptor: Option<Arc<dyn Interceptor>>,
}

impl FallbackCascade {
    pub fn new(provider: Box<dyn AiProvider>) -> Self {
        Self { provider, interceptor: None }
    }

    pub fn with_interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptor = Some(interceptor);
        self
    }

    pub fn provider(&self) -> &dyn AiProvider {
        self.provider.as_ref()
    }

    /// One chat call, recorded by the interceptor when present.
    pub async fn complete(&self, request: ChatRequest) -> Result<String, QuizError> {
        let prompt = self.interceptor.as_ref().map(|_| request.prompt_text());
        let response = self.provider.chat_complete(request).await?;

        if let (Some(interceptor), Some(prompt)) = (&self.interceptor, prompt) {
            if let Err(e) = interceptor.save(&prompt, &response).await {
                warn!(error = %e, "failed to save transcript");
            }
        }
        Ok(response)
    }

    /// Try `strategies` in order. Each is attempted at most once, never concurrently.
    #[instrument(skip_all, fields(capability = task.capability(), strategies = strategies.len()))]
    pub async fn run<T: CascadeTask>(
        &self,
        task: &T,
        strategies: &[Strategy],
        cancel: &CancellationToken,
    ) -> Result<Resolved<T::Output>, QuizError> {
        for (index, strategy) in strategies.iter().enumerate() {
            debug!(state = %CascadeState::Attempting(index), strategy = strategy.label, model = %strategy.model, "attempting strategy");

            let outcome: Result<T::Output, QuizError> = if cancel.is_cancelled() {
                Err(AIError::Cancelled.into())
            } else {
                tokio::select! {
                    _ = cancel.cancelled() => Err(AIError::Cancelled.into()),
                    result = tokio::time::timeout(strategy.timeout, task.attempt(strategy, self)) => {
                        result.unwrap_or_else(|_| Err(AIError::Timeout {
                            model: strategy.model.clone(),
                            secs: strategy.timeout.as_secs(),
                        }.into()))
                    }
                }
            };

            match outcome {
                Ok(value) => {
                    let state = CascadeState::resolved_at(index);
                    info!(%state, strategy = strategy.label, "strategy succeeded");
                    return Ok(Resolved { value, state, strategy: Some(strategy.label), attempts: index + 1 });
                }
                Err(e) if !e.is_recoverable() => return Err(e),
                Err(e) => {
                    warn!(strategy = strategy.label, error = %e, "strategy failed, falling back");
                }
            }
        }

        let attempts = strategies.len();
        match task.exhausted() {
            Some(value) => {
                warn!(attempts, "all strategies failed, serving static content");
                Ok(Resolved { value, state: CascadeState::ExhaustedFallback, strategy: None, attempts })
            }
            None => Err(QuizError::ExhaustedFallback { capability: task.capability().to_string(), attempts }),
        }
    }
}
