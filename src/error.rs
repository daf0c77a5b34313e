use thiserror::Error;

#[derive(Error, Debug)]
pub enum QuizError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Malformed model response: {reason}. Raw response: {raw}")]
    MalformedResponse { reason: String, raw: String },
    #[error("AI error: {0}")]
    Provider(#[from] AIError),
    #[error("All {attempts} strategies failed for {capability}")]
    ExhaustedFallback { capability: String, attempts: usize },
    #[error("Internal error: {0}")]
    Internal(String),
}

impl QuizError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn malformed(reason: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::MalformedResponse { reason: reason.into(), raw: raw.into() }
    }

    /// Errors the cascade recovers from by moving to the next strategy.
    /// Only rejected input stops a cascade: another strategy cannot fix it.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::InvalidInput(_))
    }
}

#[derive(Error, Debug)]
pub enum AIError {
    #[error("OpenAI API error: {0}")]
    OpenAI(#[from] OpenAIError),
    #[error("Model call to {model} timed out after {secs}s")]
    Timeout { model: String, secs: u64 },
    #[error("Request cancelled")]
    Cancelled,
    #[error("Mock error: {0}")]
    Mock(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OpenAIError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("API error: {0}")]
    Api(String),
    #[error("Rate limit exceeded")]
    RateLimit,
    #[error("Authentication failed")]
    Authentication,
    #[error("Request rejected by content policy: {0}")]
    ContentPolicy(String),
    #[error("Model returned empty content")]
    EmptyContent,
}
