
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use homework_quiz::clients::MockResponse;
use homework_quiz::server::router;
use serde_json::{json, Value};
use test_utils::*;
use tower::ServiceExt;

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

const BOUNDARY: &str = "quiz-boundary";

fn multipart(fields: &[(&str, &str)], audio: Option<&[u8]>) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
        );
    }
    if let Some(bytes) = audio {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"audio\"; filename=\"svar.webm\"\r\nContent-Type: audio/webm\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/analyze-speech")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let (service, _) = mock_service(vec![]);
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(router(service), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn missing_inputs_are_bad_requests() {
    let cases = [
        ("/api/extract-text", json!({}), "Bild krävs"),
        ("/api/analyze-image", json!({ "imageBase64": "" }), "Bild krävs"),
        ("/api/generate-questions", json!({ "text": "   " }), "Text krävs"),
        ("/api/grade-answer", json!({ "question": "Vad?", "answer": "x" }), "Fråga och förväntat svar krävs"),
    ];
    for (uri, payload, message) in cases {
        let (service, handle) = mock_service(vec![]);
        let (status, body) = send(router(service), post_json(uri, payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["error"], message, "{uri}");
        assert_eq!(handle.call_count(), 0);
    }
}

#[tokio::test]
async fn unparseable_body_is_a_bad_request() {
    let (service, _) = mock_service(vec![]);
    let request = Request::builder()
        .method("POST")
        .uri("/api/generate-questions")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{ inte json"))
        .unwrap();
    let (status, body) = send(router(service), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Text krävs");
}

#[tokio::test]
async fn generate_questions_returns_camel_case_quiz() {
    let (service, _) = mock_service(vec![MockResponse::Success(sun_questions_json())]);
    let (status, body) = send(router(service), post_json("/api/generate-questions", json!({ "text": SUN_TEXT }))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["subject"], "Astronomi");
    assert_eq!(body["difficulty"], "Lätt");
    assert_eq!(body["language"], "svenska");
    assert_eq!(body["isVocabulary"], false);
    let first = &body["questions"][0];
    let correct = first["correctAnswer"].as_u64().unwrap() as usize;
    assert_eq!(first["options"][correct], "Väte och helium");
    assert_eq!(first["expectedAnswer"], "Väte och helium");
}

#[tokio::test]
async fn extract_text_counts_words() {
    let (service, _) = mock_service(vec![MockResponse::Success("Vattnet kokar vid hundra grader".into())]);
    let (status, body) = send(router(service), post_json("/api/extract-text", json!({ "imageBase64": PIXEL }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "text": "Vattnet kokar vid hundra grader", "wordCount": 5, "success": true }));
}

#[tokio::test]
async fn exhausted_ocr_returns_error_envelope() {
    let (service, _) = mock_service(failures(2));
    let (status, body) = send(router(service), post_json("/api/extract-text", json!({ "imageBase64": PIXEL }))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Kunde inte extrahera text från bilden");
    assert!(body["details"].as_str().is_some_and(|d| !d.is_empty()));
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn grade_answer_defaults_languages() {
    let (service, handle) = mock_service(vec![MockResponse::Success(r#"{"isCorrect":false,"feedback":"Fel.","score":10}"#.into())]);
    let payload = json!({ "question": "Vad heter hund på engelska?", "answer": "cat", "expectedAnswer": "dog" });
    let (status, body) = send(router(service), post_json("/api/grade-answer", payload)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "isCorrect": false, "feedback": "Fel.", "score": 10 }));
    assert!(handle.calls()[0].prompt_text().contains("Elevens svar: cat"));
}

#[tokio::test]
async fn analyze_speech_transcribes_and_grades() {
    let (service, handle) = mock_service(vec![MockResponse::Success(r#"{"isCorrect":true,"feedback":"Bra!","score":93}"#.into())]);
    handle.add_transcript(MockResponse::Success("dog".into()));

    let fields = [
        ("question", "Vad heter hund på engelska?"),
        ("expectedAnswer", "dog"),
        ("questionLanguage", "svenska"),
        ("answerLanguage", "engelska"),
        ("word1", "hund"),
        ("word2", "dog"),
    ];
    let (status, body) = send(router(service), multipart(&fields, Some(&b"RIFF-audio"[..]))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["transcription"], "dog");
    assert_eq!(body["isCorrect"], true);
    assert_eq!(body["score"], 93);

    let audio = &handle.audio_calls()[0];
    assert_eq!(audio.file_name, "svar.webm");
    assert_eq!(audio.language.as_deref(), Some("en"));
    assert!(handle.calls()[0].prompt_text().contains("hund"));
}

#[tokio::test]
async fn analyze_speech_without_audio_is_rejected() {
    let (service, _) = mock_service(vec![]);
    let fields = [("question", "Vad heter hund på engelska?"), ("expectedAnswer", "dog")];
    let (status, body) = send(router(service), multipart(&fields, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Audio, fråga och förväntat svar krävs");
}

#[tokio::test]
async fn failed_transcription_returns_speech_envelope() {
    let (service, handle) = mock_service(vec![]);
    handle.add_transcript(MockResponse::Error("unsupported format".into()));

    let fields = [("question", "Vad heter hund på engelska?"), ("expectedAnswer", "dog")];
    let (status, body) = send(router(service), multipart(&fields, Some(&b"bytes"[..]))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["transcription"], "");
    assert_eq!(body["isCorrect"], false);
    assert_eq!(body["score"], 0);
    assert_eq!(body["feedback"], "Teknisk fel - försök igen");
}
