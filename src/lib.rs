pub mod cascade;
pub mod clients;
pub mod config;
pub mod core;
pub mod demo;
pub mod error;
pub mod grader;
pub mod heuristics;
pub mod interceptors;
pub mod json_utils;
pub mod model;
pub mod parser;
pub mod prompts;
pub mod server;
pub mod service;
pub mod shuffle;

// Convenient re-exports
pub use cascade::{CascadeState, FallbackCascade, Resolved};
pub use config::ServiceConfig;
pub use error::{AIError, OpenAIError, QuizError};
pub use model::{AnalysisResult, Difficulty, GradingRequest, GradingResult, Question, VocabularyPair};
pub use service::QuizService;
