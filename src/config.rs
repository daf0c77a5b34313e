use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::clients::openai::models::OpenAIModel;

/// Trait for types that can retrieve their configuration key from environment variables
pub trait KeyFromEnv {
    /// The environment variable name for this client's API key
    const KEY_NAME: &'static str;

    /// Find the API key by checking environment variables first, then .env file
    fn find_key() -> Option<String> {
        // First try to load .env file (silently fail if not found)
        let _ = dotenvy::dotenv();

        env::var(Self::KEY_NAME).ok().filter(|k| !k.trim().is_empty())
    }
}

/// Models used by each tier of the fallback cascades.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSet {
    /// Detailed OCR and fact-question generation.
    pub primary: OpenAIModel,
    /// Brief OCR and detailed grading.
    pub fast_vision: OpenAIModel,
    /// Cheap text-only fallbacks.
    pub secondary: OpenAIModel,
    pub transcription: OpenAIModel,
}

impl Default for ModelSet {
    fn default() -> Self {
        Self {
            primary: OpenAIModel::Gpt4o,
            fast_vision: OpenAIModel::Gpt4oMini,
            secondary: OpenAIModel::Gpt35Turbo,
            transcription: OpenAIModel::Whisper1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    pub models: ModelSet,
    /// Ceiling for a single strategy attempt.
    pub strategy_timeout: Duration,
    /// Ceiling for the transcription call.
    pub transcription_timeout: Duration,
    /// When set, every prompt/response pair is written here.
    pub transcript_dir: Option<PathBuf>,
    /// Upper bound for request bodies (images and audio arrive inline).
    pub max_body_bytes: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            models: ModelSet::default(),
            strategy_timeout: Duration::from_secs(30),
            transcription_timeout: Duration::from_secs(30),
            transcript_dir: None,
            max_body_bytes: 20 * 1024 * 1024,
        }
    }
}

impl ServiceConfig {
    /// Read overrides from the environment (and `.env`), keeping defaults for anything unset.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let default = Self::default();

        let model = |var: &str, fallback: OpenAIModel| {
            env::var(var).ok().filter(|v| !v.is_empty()).map(OpenAIModel::from_id).unwrap_or(fallback)
        };
        let secs = |var: &str, fallback: Duration| {
            env::var(var).ok().and_then(|v| v.parse::<u64>().ok()).map(Duration::from_secs).unwrap_or(fallback)
        };

        Self {
            bind_addr: env::var("QUIZ_BIND_ADDR").ok().and_then(|v| v.parse().ok()).unwrap_or(default.bind_addr),
            models: ModelSet {
                primary: model("QUIZ_PRIMARY_MODEL", default.models.primary),
                fast_vision: model("QUIZ_FAST_VISION_MODEL", default.models.fast_vision),
                secondary: model("QUIZ_SECONDARY_MODEL", default.models.secondary),
                transcription: model("QUIZ_TRANSCRIPTION_MODEL", default.models.transcription),
            },
            strategy_timeout: secs("QUIZ_STRATEGY_TIMEOUT_SECS", default.strategy_timeout),
            transcription_timeout: secs("QUIZ_TRANSCRIPTION_TIMEOUT_SECS", default.transcription_timeout),
            transcript_dir: env::var("QUIZ_TRANSCRIPT_DIR").ok().filter(|v| !v.is_empty()).map(PathBuf::from),
            max_body_bytes: env::var("QUIZ_MAX_BODY_BYTES").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_body_bytes),
        }
    }

    #[must_use]
    pub fn with_strategy_timeout(mut self, timeout: Duration) -> Self {
        self.strategy_timeout = timeout;
        self
    }
}
