//! HTTP surface: JSON endpoints over [`QuizService`].

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::error::QuizError;
use crate::model::{
    default_language, AnalysisResult, ExtractedText, GradingRequest, GradingResult, SpeechAssessment, VocabularyPair,
};
use crate::service::{QuizService, SpeechInput};

const IMAGE_REQUIRED: &str = "Bild krävs";
const TEXT_REQUIRED: &str = "Text krävs";
const SPEECH_INPUT_REQUIRED: &str = "Audio, fråga och förväntat svar krävs";
const GRADING_INPUT_REQUIRED: &str = "Fråga och förväntat svar krävs";

#[derive(Debug, Clone)]
pub struct AppState {
    pub service: QuizService,
    /// Cancelled on shutdown; in-flight cascades observe it through child tokens.
    pub shutdown: CancellationToken,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Processing { message: &'static str, details: String },
    Speech { details: String },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response(),
            ApiError::Processing { message, details } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": message,
                    "details": details,
                    "timestamp": Utc::now().to_rfc3339(),
                })),
            )
                .into_response(),
            ApiError::Speech { details } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Kunde inte analysera talet",
                    "details": details,
                    "transcription": "",
                    "isCorrect": false,
                    "feedback": "Teknisk fel - försök igen",
                    "score": 0,
                })),
            )
                .into_response(),
        }
    }
}

impl ApiError {
    fn from_quiz(err: QuizError, message: &'static str) -> Self {
        match err {
            QuizError::InvalidInput(msg) => {
                warn!(error = %msg, "rejected request");
                ApiError::BadRequest(msg)
            }
            other => {
                error!(error = %other, "request failed");
                ApiError::Processing { message, details: other.to_string() }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageBody {
    pub image_base64: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TextBody {
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeAnswerBody {
    pub question: Option<String>,
    #[serde(default)]
    pub answer: String,
    pub expected_answer: Option<String>,
    pub question_language: Option<String>,
    pub answer_language: Option<String>,
    pub vocabulary_pair: Option<VocabularyPair>,
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn language_or_default(value: Option<String>) -> String {
    present(value).unwrap_or_else(default_language)
}

pub fn router(service: QuizService) -> Router {
    router_with_shutdown(service, CancellationToken::new())
}

pub fn router_with_shutdown(service: QuizService, shutdown: CancellationToken) -> Router {
    let body_limit = service.config().max_body_bytes;
    Router::new()
        .route("/health", get(health))
        .route("/api/extract-text", post(extract_text))
        .route("/api/generate-questions", post(generate_questions))
        .route("/api/analyze-image", post(analyze_image))
        .route("/api/analyze-speech", post(analyze_speech))
        .route("/api/grade-answer", post(grade_answer))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(AppState { service, shutdown })
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

fn image_from(body: Result<Json<ImageBody>, JsonRejection>) -> Result<String, ApiError> {
    body.ok()
        .and_then(|Json(b)| present(b.image_base64))
        .ok_or_else(|| ApiError::BadRequest(IMAGE_REQUIRED.to_string()))
}

#[instrument(skip_all)]
async fn extract_text(
    State(state): State<AppState>,
    body: Result<Json<ImageBody>, JsonRejection>,
) -> Result<Json<ExtractedText>, ApiError> {
    let image = image_from(body)?;
    let cancel = state.shutdown.child_token();
    let extracted = state
        .service
        .extract_text(&image, &cancel)
        .await
        .map_err(|e| ApiError::from_quiz(e, "Kunde inte extrahera text från bilden"))?;
    info!(words = extracted.word_count, "extract-text done");
    Ok(Json(extracted))
}

#[instrument(skip_all)]
async fn generate_questions(
    State(state): State<AppState>,
    body: Result<Json<TextBody>, JsonRejection>,
) -> Result<Json<AnalysisResult>, ApiError> {
    let text = body
        .ok()
        .and_then(|Json(b)| present(b.text))
        .ok_or_else(|| ApiError::BadRequest(TEXT_REQUIRED.to_string()))?;
    let cancel = state.shutdown.child_token();
    let result = state
        .service
        .generate_questions(&text, &cancel)
        .await
        .map_err(|e| ApiError::from_quiz(e, "Kunde inte generera frågor"))?;
    Ok(Json(result))
}

#[instrument(skip_all)]
async fn analyze_image(
    State(state): State<AppState>,
    body: Result<Json<ImageBody>, JsonRejection>,
) -> Result<Json<AnalysisResult>, ApiError> {
    let image = image_from(body)?;
    let cancel = state.shutdown.child_token();
    let result = state
        .service
        .analyze_image(&image, &cancel)
        .await
        .map_err(|e| ApiError::from_quiz(e, "Kunde inte analysera bilden"))?;
    info!(subject = %result.subject, questions = result.questions.len(), "analyze-image done");
    Ok(Json(result))
}

#[instrument(skip_all)]
async fn grade_answer(
    State(state): State<AppState>,
    body: Result<Json<GradeAnswerBody>, JsonRejection>,
) -> Result<Json<GradingResult>, ApiError> {
    let Json(body) = body.map_err(|_| ApiError::BadRequest(GRADING_INPUT_REQUIRED.to_string()))?;
    let (Some(question), Some(expected_answer)) = (present(body.question), present(body.expected_answer)) else {
        return Err(ApiError::BadRequest(GRADING_INPUT_REQUIRED.to_string()));
    };
    let request = GradingRequest {
        question,
        answer: body.answer,
        expected_answer,
        question_language: language_or_default(body.question_language),
        answer_language: language_or_default(body.answer_language),
        vocabulary_pair: body.vocabulary_pair,
    };
    let cancel = state.shutdown.child_token();
    let graded = state
        .service
        .grade_answer(&request, &cancel)
        .await
        .map_err(|e| ApiError::from_quiz(e, "Kunde inte bedöma svaret"))?;
    Ok(Json(graded))
}

#[derive(Debug, Default)]
struct SpeechForm {
    audio: Option<SpeechInput>,
    question: Option<String>,
    expected_answer: Option<String>,
    question_language: Option<String>,
    answer_language: Option<String>,
    word1: Option<String>,
    word2: Option<String>,
    language1: Option<String>,
    language2: Option<String>,
}

impl SpeechForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let bad = |_| ApiError::BadRequest(SPEECH_INPUT_REQUIRED.to_string());
        let mut form = SpeechForm::default();

        while let Some(field) = multipart.next_field().await.map_err(bad)? {
            let name = field.name().unwrap_or("").to_string();
            if name == "audio" {
                let file_name = field.file_name().unwrap_or("audio.webm").to_string();
                let mime = field.content_type().unwrap_or("audio/webm").to_string();
                let bytes = field.bytes().await.map_err(bad)?;
                form.audio = Some(SpeechInput { bytes: bytes.to_vec(), file_name, mime });
                continue;
            }

            let value = Some(field.text().await.map_err(bad)?);
            match name.as_str() {
                "question" => form.question = value,
                "expectedAnswer" => form.expected_answer = value,
                "questionLanguage" => form.question_language = value,
                "answerLanguage" => form.answer_language = value,
                "word1" => form.word1 = value,
                "word2" => form.word2 = value,
                "language1" => form.language1 = value,
                "language2" => form.language2 = value,
                _ => {}
            }
        }
        Ok(form)
    }
}

#[instrument(skip_all)]
async fn analyze_speech(State(state): State<AppState>, multipart: Multipart) -> Result<Json<SpeechAssessment>, ApiError> {
    let form = SpeechForm::read(multipart).await?;

    let (Some(audio), Some(question), Some(expected_answer)) =
        (form.audio.filter(|a| !a.bytes.is_empty()), present(form.question), present(form.expected_answer))
    else {
        return Err(ApiError::BadRequest(SPEECH_INPUT_REQUIRED.to_string()));
    };

    let question_language = language_or_default(form.question_language);
    let answer_language = language_or_default(form.answer_language);
    let vocabulary_pair = match (present(form.word1), present(form.word2)) {
        (Some(word1), Some(word2)) => Some(VocabularyPair {
            word1,
            word2,
            language1: present(form.language1).unwrap_or_else(|| question_language.clone()),
            language2: present(form.language2).unwrap_or_else(|| answer_language.clone()),
        }),
        _ => None,
    };

    let request = GradingRequest {
        question,
        answer: String::new(),
        expected_answer,
        question_language,
        answer_language,
        vocabulary_pair,
    };
    let cancel = state.shutdown.child_token();
    match state.service.analyze_speech(audio, &request, &cancel).await {
        Ok(assessment) => {
            info!(score = assessment.grading.score, "analyze-speech done");
            Ok(Json(assessment))
        }
        Err(QuizError::InvalidInput(msg)) => Err(ApiError::BadRequest(msg)),
        Err(e) => {
            error!(error = %e, "speech analysis failed");
            Err(ApiError::Speech { details: e.to_string() })
        }
    }
}
