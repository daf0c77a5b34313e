
use std::time::Duration;

use homework_quiz::clients::{MockResponse, MockVoid};
use homework_quiz::{Difficulty, QuizError, QuizService, ServiceConfig};
use test_utils::*;
use tokio_util::sync::CancellationToken;

const GRADED: &str = r#"{"isCorrect":true,"feedback":"Helt rätt!","score":95,"isValidTranslation":true}"#;

#[tokio::test]
async fn primary_success_makes_one_call() {
    let (service, handle) = mock_service(vec![MockResponse::Success(GRADED.into())]);
    let graded = service.grade_answer(&grading_request("dog", "dog"), &CancellationToken::new()).await.unwrap();

    assert_eq!(graded.score, 95);
    assert_eq!(graded.is_valid_translation, Some(true));
    assert_eq!(handle.call_count(), 1);
    assert_eq!(handle.calls()[0].model, "gpt-4o-mini");
}

#[tokio::test]
async fn failed_strategies_are_each_tried_once() {
    let mut script = failures(2);
    script.push(MockResponse::Success(sun_questions_json()));
    let (service, handle) = mock_service(script);

    // Third tier is the numbered list; a JSON reply there has no list lines, so heuristics finish.
    let result = service.generate_questions(SUN_TEXT, &CancellationToken::new()).await.unwrap();
    assert_eq!(handle.call_count(), 3);
    assert_eq!(result.subject, "Textanalys");
    assert_eq!(result.questions.len(), 8);
    assert!(result.questions.iter().all(|q| q.correct_option() == Some(q.expected_answer.as_str())));

    let models: Vec<String> = handle.calls().into_iter().map(|c| c.model).collect();
    assert_eq!(models, ["gpt-4o", "gpt-3.5-turbo", "gpt-3.5-turbo"]);
}

#[tokio::test]
async fn exhausted_questions_serve_demo_set() {
    let (service, handle) = mock_service(failures(2));
    let result = service.generate_questions("kort", &CancellationToken::new()).await.unwrap();

    assert_eq!(handle.call_count(), 2);
    assert_eq!(result.subject, "Allmänkunskap");
    assert_eq!(result.difficulty, Difficulty::Easy);
    assert_eq!(result.keywords, ["matematik", "astronomi"]);
    assert_eq!(result.questions[0].question, "Vad är 7 + 5?");
    assert_eq!(result.questions[0].correct_option(), Some("12"));
}

#[tokio::test]
async fn empty_object_replies_fall_through_to_demo_set() {
    let service = QuizService::new(Box::new(MockVoid), ServiceConfig::default());
    let result = service.generate_questions("kort", &CancellationToken::new()).await.unwrap();

    assert_eq!(result.subject, "Allmänkunskap");
    assert_eq!(result.questions.len(), 2);
}

#[tokio::test]
async fn exhausted_image_analysis_serves_ten_questions() {
    let (service, handle) = mock_service(failures(2));
    let result = service.analyze_image(PIXEL, &CancellationToken::new()).await.unwrap();

    assert_eq!(handle.call_count(), 2);
    assert_eq!(result.questions.len(), 10);
    assert_eq!(result.difficulty, Difficulty::Medium);
    assert!(result.questions.iter().all(|q| q.correct_option().is_some()));
}

#[tokio::test]
async fn exhausted_ocr_is_an_error() {
    let (service, _handle) = mock_service(vec![MockResponse::Success("   ".into()), MockResponse::RateLimit]);
    let err = service.extract_text(PIXEL, &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, QuizError::ExhaustedFallback { attempts: 2, .. }));
}

#[tokio::test]
async fn slow_strategy_times_out_and_falls_back() {
    let (service, handle) = mock_service_with(
        vec![
            MockResponse::Delayed(Duration::from_secs(5), GRADED.into()),
            MockResponse::Success(r#"Bedömning: {"isCorrect":false,"feedback":"Fel ord.","score":20}"#.into()),
        ],
        fast_config(),
    );
    let graded = service.grade_answer(&grading_request("cat", "dog"), &CancellationToken::new()).await.unwrap();

    assert_eq!(handle.call_count(), 2);
    assert!(!graded.is_correct);
    assert_eq!(graded.score, 20);
}

#[tokio::test]
async fn grading_exhaustion_uses_keyword_match() {
    let (service, handle) = mock_service(failures(2));
    let graded = service
        .grade_answer(&grading_request("it is a dog", "dog / hound"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(handle.call_count(), 2);
    assert!(graded.is_correct);
    assert_eq!(graded.score, 85);
    assert_eq!(graded.feedback, "Bra jobbat! Ditt svar är korrekt.");
}

#[tokio::test]
async fn cancelled_request_never_reaches_provider() {
    let (service, handle) = mock_service(vec![MockResponse::Success(GRADED.into())]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let graded = service.grade_answer(&grading_request("katt", "dog"), &cancel).await.unwrap();
    assert_eq!(handle.call_count(), 0);
    assert!(!graded.is_correct);
    assert_eq!(graded.feedback, "Inte helt rätt. Rätt svar är: dog. Försök igen!");
}

#[tokio::test]
async fn invalid_input_is_rejected_before_any_call() {
    let (service, handle) = mock_service(vec![]);
    let cancel = CancellationToken::new();

    assert!(matches!(service.generate_questions("  ", &cancel).await, Err(QuizError::InvalidInput(_))));
    assert!(matches!(service.extract_text("", &cancel).await, Err(QuizError::InvalidInput(_))));
    assert!(matches!(service.analyze_image("inte base64!!", &cancel).await, Err(QuizError::InvalidInput(_))));
    assert!(matches!(
        service.grade_answer(&grading_request("dog", " "), &cancel).await,
        Err(QuizError::InvalidInput(_))
    ));
    assert_eq!(handle.call_count(), 0);
}
