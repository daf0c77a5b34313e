//! Wire types shared by the pipelines and the HTTP surface. Field names are camelCase on the wire.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_LANGUAGE: &str = "svenska";

pub(crate) fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyPair {
    pub word1: String,
    pub word2: String,
    pub language1: String,
    pub language2: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: u32,
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    /// Index into `options`; meaningless when `options` is empty.
    #[serde(default)]
    pub correct_answer: usize,
    #[serde(default)]
    pub expected_answer: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default = "default_language")]
    pub question_language: String,
    #[serde(default = "default_language")]
    pub answer_language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vocabulary_pair: Option<VocabularyPair>,
}

impl Question {
    /// Multiple-choice question in Swedish with the correct option first.
    pub fn multiple_choice(
        id: u32,
        question: impl Into<String>,
        options: Vec<String>,
        correct_answer: usize,
        expected_answer: impl Into<String>,
        explanation: impl Into<String>,
    ) -> Self {
        Self {
            id,
            question: question.into(),
            options,
            correct_answer,
            expected_answer: expected_answer.into(),
            explanation: explanation.into(),
            question_language: default_language(),
            answer_language: default_language(),
            vocabulary_pair: None,
        }
    }

    pub fn correct_option(&self) -> Option<&str> {
        self.options.get(self.correct_answer).map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub enum Difficulty {
    #[serde(rename = "Lätt")]
    Easy,
    #[default]
    #[serde(rename = "Medel")]
    Medium,
    #[serde(rename = "Svår")]
    Hard,
}

impl Difficulty {
    pub fn label(self) -> &'static str {
        match self {
            Self::Easy => "Lätt",
            Self::Medium => "Medel",
            Self::Hard => "Svår",
        }
    }

    /// Lenient parse of a model-supplied label; anything unrecognised is `Medium`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "lätt" | "latt" | "easy" => Self::Easy,
            "svår" | "svar" | "hard" => Self::Hard,
            _ => Self::Medium,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub subject: String,
    pub difficulty: Difficulty,
    pub questions: Vec<Question>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub is_vocabulary: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vocabulary_languages: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vocabulary_pairs: Option<Vec<VocabularyPair>>,
}

impl AnalysisResult {
    pub const MAX_KEYWORDS: usize = 10;

    pub fn new(subject: impl Into<String>, difficulty: Difficulty, questions: Vec<Question>, keywords: Vec<String>) -> Self {
        let mut keywords = keywords;
        keywords.truncate(Self::MAX_KEYWORDS);
        Self {
            subject: subject.into(),
            difficulty,
            questions,
            keywords,
            language: default_language(),
            is_vocabulary: false,
            vocabulary_languages: None,
            vocabulary_pairs: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GradingResult {
    pub is_correct: bool,
    pub feedback: String,
    /// 0 to 100.
    pub score: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_valid_translation: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedText {
    pub text: String,
    pub word_count: usize,
    pub success: bool,
}

impl ExtractedText {
    pub fn new(text: String) -> Self {
        let word_count = text.split_whitespace().count();
        Self { text, word_count, success: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechAssessment {
    pub transcription: String,
    #[serde(flatten)]
    pub grading: GradingResult,
}

/// Everything needed to grade one answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingRequest {
    pub question: String,
    pub answer: String,
    pub expected_answer: String,
    #[serde(default = "default_language")]
    pub question_language: String,
    #[serde(default = "default_language")]
    pub answer_language: String,
    #[serde(default)]
    pub vocabulary_pair: Option<VocabularyPair>,
}
