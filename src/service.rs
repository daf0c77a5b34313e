//! Per-capability pipelines: strategy tables, tasks and the public service API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::cascade::{CascadeTask, FallbackCascade, Resolved, Step, Strategy};
use crate::config::{ModelSet, ServiceConfig};
use crate::core::{AiProvider, AudioClip};
use crate::demo;
use crate::error::{AIError, QuizError};
use crate::grader::keyword_grade;
use crate::heuristics::{extract_keywords, heuristic_questions, whitespace_keywords};
use crate::interceptors::FileInterceptor;
use crate::model::{
    default_language, AnalysisResult, Difficulty, ExtractedText, GradingRequest, GradingResult, Question,
    SpeechAssessment, DEFAULT_LANGUAGE,
};
use crate::parser::{parse_analysis, parse_grading, parse_numbered_list, JsonMode};
use crate::prompts::{
    general_knowledge_request, grading_request, image_questions_request, normalize_image, ocr_request,
    questions_request, GradingPrompt, OcrPrompt, QuestionPrompt, Sampling,
};
use crate::shuffle::shuffle_analysis;

const NUMBERED_LIST_MIN_CHARS: usize = 10;
const HEURISTIC_MIN_CHARS: usize = 3;

fn strategy(label: &'static str, model: &str, step: Step, sampling: Sampling, timeout: Duration) -> Strategy {
    Strategy { label, model: model.to_string(), step, sampling, timeout }
}

pub fn ocr_strategies(models: &ModelSet, timeout: Duration) -> Vec<Strategy> {
    vec![
        strategy("detailed-ocr", models.primary.id(), Step::Ocr(OcrPrompt::Detailed), Sampling::new(1500, 0.0), timeout),
        strategy("brief-ocr", models.fast_vision.id(), Step::Ocr(OcrPrompt::Brief), Sampling::new(300, 0.0), timeout),
    ]
}

pub fn question_strategies(models: &ModelSet, timeout: Duration) -> Vec<Strategy> {
    vec![
        strategy("fact-questions", models.primary.id(), Step::Questions(QuestionPrompt::Facts), Sampling::new(2000, 0.4), timeout),
        strategy(
            "comprehension-questions",
            models.secondary.id(),
            Step::Questions(QuestionPrompt::Comprehension),
            Sampling::new(1000, 0.3),
            timeout,
        ),
        strategy("numbered-list", models.secondary.id(), Step::Questions(QuestionPrompt::NumberedList), Sampling::new(500, 0.2), timeout),
        strategy("heuristic", "local", Step::Heuristic, Sampling::new(0, 0.0), timeout),
    ]
}

pub fn image_strategies(models: &ModelSet, timeout: Duration) -> Vec<Strategy> {
    vec![
        strategy(
            "ocr-then-questions",
            models.secondary.id(),
            Step::OcrThenQuestions { ocr_model: models.fast_vision.id().to_string(), ocr_sampling: Sampling::new(200, 0.0) },
            Sampling::new(800, 0.3),
            timeout,
        ),
        strategy("general-knowledge", models.secondary.id(), Step::GeneralKnowledge, Sampling::new(1500, 0.3), timeout),
    ]
}

pub fn grading_strategies(models: &ModelSet, timeout: Duration) -> Vec<Strategy> {
    vec![
        strategy("detailed-grading", models.fast_vision.id(), Step::Grading(GradingPrompt::Detailed), Sampling::new(300, 0.3), timeout),
        strategy("brief-grading", models.secondary.id(), Step::Grading(GradingPrompt::Brief), Sampling::new(200, 0.3), timeout),
    ]
}

fn unsupported(step: &Step, capability: &str) -> QuizError {
    QuizError::Internal(format!("step {step:?} is not valid for {capability}"))
}

fn require_text(reply: String) -> Result<String, QuizError> {
    let text = reply.trim();
    if text.is_empty() {
        return Err(AIError::OpenAI(crate::error::OpenAIError::EmptyContent).into());
    }
    Ok(text.to_string())
}

struct OcrTask<'a> {
    image: &'a str,
}

#[async_trait]
impl CascadeTask for OcrTask<'_> {
    type Output = String;

    fn capability(&self) -> &'static str {
        "extract-text"
    }

    async fn attempt(&self, strategy: &Strategy, cascade: &FallbackCascade) -> Result<String, QuizError> {
        let Step::Ocr(variant) = &strategy.step else { return Err(unsupported(&strategy.step, self.capability())) };
        let request = ocr_request(*variant, &strategy.model, self.image, strategy.sampling)?;
        require_text(cascade.complete(request).await?)
    }

    fn exhausted(&self) -> Option<String> {
        None
    }
}

struct QuestionTask<'a> {
    text: &'a str,
}

impl QuestionTask<'_> {
    fn shape_model_result(&self, mut result: AnalysisResult) -> AnalysisResult {
        result.keywords = extract_keywords(self.text);
        result.language = default_language();
        result.is_vocabulary = false;
        result
    }

    fn from_list(&self, raw: &str) -> Result<AnalysisResult, QuizError> {
        let questions = parse_numbered_list(raw)?
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                Question::multiple_choice(
                    i as u32 + 1,
                    item.question,
                    vec![item.answer.clone(), "Annat svar".into(), "Information saknas".into(), "Inte nämnt".into()],
                    0,
                    item.answer,
                    "Svaret finns i texten.",
                )
            })
            .collect();
        Ok(AnalysisResult::new("Läsförståelse", Difficulty::Easy, questions, Vec::new()))
    }

    fn from_heuristics(&self) -> Result<AnalysisResult, QuizError> {
        if self.text.chars().count() <= HEURISTIC_MIN_CHARS {
            return Err(QuizError::malformed("text too short for heuristics", self.text));
        }
        let questions = heuristic_questions(self.text);
        if questions.is_empty() {
            return Err(QuizError::malformed("no sentences suitable for questions", self.text));
        }
        Ok(AnalysisResult::new("Textanalys", Difficulty::Easy, questions, whitespace_keywords(self.text)))
    }
}

#[async_trait]
impl CascadeTask for QuestionTask<'_> {
    type Output = AnalysisResult;

    fn capability(&self) -> &'static str {
        "generate-questions"
    }

    async fn attempt(&self, strategy: &Strategy, cascade: &FallbackCascade) -> Result<AnalysisResult, QuizError> {
        match &strategy.step {
            Step::Questions(QuestionPrompt::NumberedList) => {
                if self.text.chars().count() <= NUMBERED_LIST_MIN_CHARS {
                    return Err(QuizError::malformed("text too short for list questions", self.text));
                }
                let request = questions_request(QuestionPrompt::NumberedList, &strategy.model, self.text, strategy.sampling)?;
                self.from_list(&cascade.complete(request).await?)
            }
            Step::Questions(variant) => {
                let request = questions_request(*variant, &strategy.model, self.text, strategy.sampling)?;
                let raw = cascade.complete(request).await?;
                let result = parse_analysis(&raw, "Allmänbildning", variant.json_mode())?;
                Ok(self.shape_model_result(result))
            }
            Step::Heuristic => self.from_heuristics(),
            other => Err(unsupported(other, self.capability())),
        }
    }

    fn exhausted(&self) -> Option<AnalysisResult> {
        Some(demo::text_demo())
    }
}

struct ImageTask<'a> {
    image: &'a str,
}

#[async_trait]
impl CascadeTask for ImageTask<'_> {
    type Output = AnalysisResult;

    fn capability(&self) -> &'static str {
        "analyze-image"
    }

    async fn attempt(&self, strategy: &Strategy, cascade: &FallbackCascade) -> Result<AnalysisResult, QuizError> {
        match &strategy.step {
            Step::OcrThenQuestions { ocr_model, ocr_sampling } => {
                let ocr = ocr_request(OcrPrompt::Quick, ocr_model, self.image, *ocr_sampling)?;
                let text = require_text(cascade.complete(ocr).await?)?;
                info!(chars = text.chars().count(), "image text extracted");

                let request = image_questions_request(&strategy.model, &text, strategy.sampling)?;
                let raw = cascade.complete(request).await?;
                let mut result = parse_analysis(&raw, "Textanalys", JsonMode::Strict)?;
                result.difficulty = Difficulty::Medium;
                result.keywords = extract_keywords(&text);
                Ok(result)
            }
            Step::GeneralKnowledge => {
                let request = general_knowledge_request(&strategy.model, strategy.sampling);
                let raw = cascade.complete(request).await?;
                parse_analysis(&raw, "Allmänbildning", JsonMode::Strict)
            }
            other => Err(unsupported(other, self.capability())),
        }
    }

    fn exhausted(&self) -> Option<AnalysisResult> {
        Some(demo::image_demo())
    }
}

struct GradingTask<'a> {
    request: &'a GradingRequest,
}

#[async_trait]
impl CascadeTask for GradingTask<'_> {
    type Output = GradingResult;

    fn capability(&self) -> &'static str {
        "grade-answer"
    }

    async fn attempt(&self, strategy: &Strategy, cascade: &FallbackCascade) -> Result<GradingResult, QuizError> {
        let Step::Grading(variant) = &strategy.step else { return Err(unsupported(&strategy.step, self.capability())) };
        let request = grading_request(*variant, &strategy.model, self.request, strategy.sampling)?;
        let raw = cascade.complete(request).await?;
        parse_grading(&raw, variant.json_mode())
    }

    fn exhausted(&self) -> Option<GradingResult> {
        Some(keyword_grade(&self.request.answer, &self.request.expected_answer))
    }
}

/// Map a language name to the transcription language code; unknown names map to Swedish.
pub fn speech_language_code(language: &str) -> &'static str {
    match language.trim().to_lowercase().as_str() {
        "svenska" => "sv",
        "engelska" => "en",
        "spanska" => "es",
        "tyska" => "de",
        "franska" => "fr",
        "italienska" => "it",
        _ => "sv",
    }
}

/// The student speaks the answer language unless it is Swedish, then the question language.
pub fn speech_language<'a>(question_language: &'a str, answer_language: &'a str) -> &'a str {
    if answer_language.trim().to_lowercase() != DEFAULT_LANGUAGE {
        answer_language
    } else {
        question_language
    }
}

/// Uploaded recording.
#[derive(Debug, Clone)]
pub struct SpeechInput {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime: String,
}

/// Entry point for all capabilities. Cheap to clone; holds no mutable state.
#[derive(Debug, Clone)]
pub struct QuizService {
    cascade: FallbackCascade,
    config: Arc<ServiceConfig>,
    seed: Option<u64>,
}

impl QuizService {
    pub fn new(provider: Box<dyn AiProvider>, config: ServiceConfig) -> Self {
        for model in [&config.models.primary, &config.models.fast_vision] {
            if !model.accepts_images() {
                warn!(%model, "vision tier configured with a text-only model; OCR strategies will fail");
            }
        }
        let mut cascade = FallbackCascade::new(provider);
        if let Some(dir) = &config.transcript_dir {
            cascade = cascade.with_interceptor(Arc::new(FileInterceptor::new(dir.clone())));
        }
        Self { cascade, config: Arc::new(config), seed: None }
    }

    /// Fixed shuffle seed, for reproducible output.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    fn finish_analysis(&self, resolved: Resolved<AnalysisResult>) -> AnalysisResult {
        info!(
            state = %resolved.state,
            strategy = resolved.strategy.unwrap_or("static"),
            questions = resolved.value.questions.len(),
            "analysis resolved"
        );
        shuffle_analysis(resolved.value, &mut self.rng())
    }

    #[instrument(skip(self, image_base64, cancel), fields(image_len = image_base64.len()))]
    pub async fn extract_text(&self, image_base64: &str, cancel: &CancellationToken) -> Result<ExtractedText, QuizError> {
        let image = normalize_image(image_base64)?;
        let strategies = ocr_strategies(&self.config.models, self.config.strategy_timeout);
        let resolved = self.cascade.run(&OcrTask { image: &image }, &strategies, cancel).await?;
        info!(state = %resolved.state, chars = resolved.value.chars().count(), "text extracted");
        Ok(ExtractedText::new(resolved.value))
    }

    #[instrument(skip(self, text, cancel), fields(text_len = text.len()))]
    pub async fn generate_questions(&self, text: &str, cancel: &CancellationToken) -> Result<AnalysisResult, QuizError> {
        if text.trim().is_empty() {
            return Err(QuizError::invalid_input("Text krävs"));
        }
        let strategies = question_strategies(&self.config.models, self.config.strategy_timeout);
        let resolved = self.cascade.run(&QuestionTask { text }, &strategies, cancel).await?;
        Ok(self.finish_analysis(resolved))
    }

    #[instrument(skip(self, image_base64, cancel), fields(image_len = image_base64.len()))]
    pub async fn analyze_image(&self, image_base64: &str, cancel: &CancellationToken) -> Result<AnalysisResult, QuizError> {
        let image = normalize_image(image_base64)?;
        let strategies = image_strategies(&self.config.models, self.config.strategy_timeout);
        let resolved = self.cascade.run(&ImageTask { image: &image }, &strategies, cancel).await?;
        Ok(self.finish_analysis(resolved))
    }

    #[instrument(skip(self, request, cancel))]
    pub async fn grade_answer(&self, request: &GradingRequest, cancel: &CancellationToken) -> Result<GradingResult, QuizError> {
        if request.question.trim().is_empty() || request.expected_answer.trim().is_empty() {
            return Err(QuizError::invalid_input("Fråga och förväntat svar krävs"));
        }
        let strategies = grading_strategies(&self.config.models, self.config.strategy_timeout);
        let resolved = self.cascade.run(&GradingTask { request }, &strategies, cancel).await?;
        info!(state = %resolved.state, score = resolved.value.score, "answer graded");
        Ok(resolved.value)
    }

    /// Transcribe a spoken answer, then grade the transcript. `request.answer` is ignored.
    #[instrument(skip(self, audio, request, cancel), fields(audio_bytes = audio.bytes.len()))]
    pub async fn analyze_speech(
        &self,
        audio: SpeechInput,
        request: &GradingRequest,
        cancel: &CancellationToken,
    ) -> Result<SpeechAssessment, QuizError> {
        if audio.bytes.is_empty() || request.question.trim().is_empty() || request.expected_answer.trim().is_empty() {
            return Err(QuizError::invalid_input("Audio, fråga och förväntat svar krävs"));
        }

        let language = speech_language(&request.question_language, &request.answer_language);
        let code = speech_language_code(language);
        info!(language, code, "transcribing answer");

        let clip = AudioClip {
            bytes: audio.bytes,
            file_name: audio.file_name,
            mime: audio.mime,
            model: self.config.models.transcription.id().to_string(),
            language: Some(code.to_string()),
        };
        let timeout = self.config.transcription_timeout;
        let outcome: Result<String, AIError> = tokio::select! {
            _ = cancel.cancelled() => Err(AIError::Cancelled),
            result = tokio::time::timeout(timeout, self.cascade.provider().transcribe(clip)) => {
                result.unwrap_or_else(|_| Err(AIError::Timeout {
                    model: self.config.models.transcription.id().to_string(),
                    secs: timeout.as_secs(),
                }))
            }
        };
        let transcription = outcome.map_err(|e| {
            warn!(error = %e, "transcription failed");
            QuizError::from(e)
        })?;

        let graded = GradingRequest { answer: transcription.trim().to_string(), ..request.clone() };
        let grading = self.grade_answer(&graded, cancel).await?;
        Ok(SpeechAssessment { transcription: graded.answer, grading })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::mock::{MockClient, MockResponse};

    #[test]
    fn speech_language_prefers_non_swedish_answer() {
        assert_eq!(speech_language("svenska", "engelska"), "engelska");
        assert_eq!(speech_language("tyska", "svenska"), "tyska");
        assert_eq!(speech_language_code("Engelska"), "en");
        assert_eq!(speech_language_code("klingon"), "sv");
    }

    #[test]
    fn strategy_tables_follow_model_tiers() {
        let models = ModelSet::default();
        let t = Duration::from_secs(5);
        let q = question_strategies(&models, t);
        assert_eq!(q.iter().map(|s| s.label).collect::<Vec<_>>(), ["fact-questions", "comprehension-questions", "numbered-list", "heuristic"]);
        assert_eq!(q[0].model, "gpt-4o");
        assert_eq!(q[0].sampling, Sampling::new(2000, 0.4));
        assert_eq!(ocr_strategies(&models, t)[1].model, "gpt-4o-mini");
        assert_eq!(grading_strategies(&models, t)[1].model, "gpt-3.5-turbo");
    }

    #[tokio::test]
    async fn numbered_list_tier_builds_fixed_distractors() {
        let (client, handle) = MockClient::with_responses(vec![
            MockResponse::Error("overloaded".into()),
            MockResponse::Success("inte json".into()),
            MockResponse::Success("1. Vad består solen av? - Svar: väte och helium".into()),
        ]);
        let service = QuizService::new(Box::new(client), ServiceConfig::default()).with_seed(3);
        let result = service
            .generate_questions("Solen består av väte och helium.", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(handle.call_count(), 3);
        assert_eq!(result.subject, "Läsförståelse");
        assert_eq!(result.difficulty, Difficulty::Easy);
        let q = &result.questions[0];
        assert_eq!(q.correct_option(), Some("väte och helium"));
        assert!(q.options.contains(&"Information saknas".to_string()));
        assert_eq!(q.explanation, "Svaret finns i texten.");
    }

    #[tokio::test]
    async fn short_text_skips_list_tier_and_heuristics() {
        let (client, handle) = MockClient::with_responses(vec![MockResponse::RateLimit, MockResponse::RateLimit]);
        let service = QuizService::new(Box::new(client), ServiceConfig::default());
        let result = service.generate_questions("kort", &CancellationToken::new()).await.unwrap();
        assert_eq!(handle.call_count(), 2);
        assert_eq!(result.subject, "Allmänkunskap");
        assert_eq!(result.questions.len(), 2);
    }

    #[tokio::test]
    async fn image_pipeline_overrides_difficulty_and_keywords() {
        let (client, handle) = MockClient::with_responses(vec![
            MockResponse::Success("Fotosyntesen sker i kloroplasterna".into()),
            MockResponse::Success(
                r#"{"subject":"Biologi","difficulty":"Svår","questions":[{"id":1,"question":"Var sker fotosyntesen?","options":["Kloroplasterna","Roten","Stammen","Blomman"],"correctAnswer":0}]}"#.into(),
            ),
        ]);
        let service = QuizService::new(Box::new(client), ServiceConfig::default()).with_seed(1);
        let result = service.analyze_image("iVBORw0KGgo=", &CancellationToken::new()).await.unwrap();

        assert_eq!(result.subject, "Biologi");
        assert_eq!(result.difficulty, Difficulty::Medium);
        assert_eq!(result.keywords, vec!["Fotosyntesen", "sker", "kloroplasterna"]);
        assert_eq!(result.questions[0].correct_option(), Some("Kloroplasterna"));

        let calls = handle.calls();
        assert!(calls[0].has_image());
        assert_eq!(calls[0].model, "gpt-4o-mini");
        assert_eq!(calls[1].model, "gpt-3.5-turbo");
    }

    #[tokio::test]
    async fn grading_falls_back_to_keywords() {
        let (client, _handle) = MockClient::with_responses(vec![
            MockResponse::Success("Bra svar!".into()),
            MockResponse::Error("boom".into()),
        ]);
        let service = QuizService::new(Box::new(client), ServiceConfig::default());
        let request = GradingRequest {
            question: "Vad heter valp på engelska?".into(),
            answer: "puppy".into(),
            expected_answer: "puppy / pup".into(),
            question_language: "svenska".into(),
            answer_language: "engelska".into(),
            vocabulary_pair: None,
        };
        let graded = service.grade_answer(&request, &CancellationToken::new()).await.unwrap();
        assert!(graded.is_correct);
        assert_eq!(graded.score, 85);
    }

    #[tokio::test]
    async fn transcription_failure_is_a_provider_error() {
        let (client, handle) = MockClient::new();
        handle.add_transcript(MockResponse::Error("audio too short".into()));
        let service = QuizService::new(Box::new(client), ServiceConfig::default());
        let request = GradingRequest {
            question: "Vad heter hund på engelska?".into(),
            answer: String::new(),
            expected_answer: "dog".into(),
            question_language: "svenska".into(),
            answer_language: "engelska".into(),
            vocabulary_pair: None,
        };
        let audio = SpeechInput { bytes: vec![1, 2, 3], file_name: "svar.webm".into(), mime: "audio/webm".into() };
        let err = service.analyze_speech(audio, &request, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, QuizError::Provider(_)));
        assert_eq!(handle.audio_calls()[0].language.as_deref(), Some("en"));
        assert_eq!(handle.call_count(), 0);
    }
}
