//! Turns raw model output into validated, normalized model types.
//!
//! Every failure here is a [`QuizError::MalformedResponse`], which the cascade
//! treats as "try the next strategy".

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::QuizError;
use crate::json_utils::{find_object, strip_code_fences};
use crate::model::{default_language, AnalysisResult, Difficulty, GradingResult, Question, VocabularyPair};

/// How much slack to give a JSON reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonMode {
    /// The whole reply (after fence stripping) must be the JSON object.
    Strict,
    /// Fall back to the first acceptable object embedded in surrounding prose.
    Lenient,
}

pub const MAX_OPTIONS: usize = 4;
const MAX_RAW_IN_ERROR: usize = 200;

static RE_LIST_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\.").unwrap());
static RE_LIST_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\.\s*").unwrap());

fn malformed(reason: impl Into<String>, raw: &str) -> QuizError {
    let raw: String = raw.chars().take(MAX_RAW_IN_ERROR).collect();
    QuizError::malformed(reason, raw)
}

fn parse_object<F>(raw: &str, mode: JsonMode, accept: F) -> Result<Map<String, Value>, QuizError>
where
    F: Fn(&Value) -> bool,
{
    let cleaned = strip_code_fences(raw);
    if cleaned.is_empty() {
        return Err(malformed("empty response", raw));
    }

    let strict = serde_json::from_str::<Value>(cleaned);
    let value = match (strict, mode) {
        (Ok(v), _) if accept(&v) => v,
        (Ok(_), JsonMode::Strict) => return Err(malformed("JSON does not have the expected shape", raw)),
        (Err(e), JsonMode::Strict) => return Err(malformed(format!("invalid JSON: {e}"), raw)),
        (_, JsonMode::Lenient) => {
            debug!("strict parse rejected, scanning for embedded JSON");
            find_object(cleaned, &accept).ok_or_else(|| malformed("no acceptable JSON object found", raw))?
        }
    };

    match value {
        Value::Object(map) => Ok(map),
        _ => Err(malformed("expected a JSON object", raw)),
    }
}

fn has_questions(v: &Value) -> bool {
    v.get("questions").and_then(Value::as_array).is_some_and(|a| !a.is_empty())
}

fn has_grading_fields(v: &Value) -> bool {
    v.get("score").is_some() && v.get("isCorrect").is_some()
}

/// Text value of a field; numbers are rendered, anything else is absent.
fn text_of(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn non_empty_text(value: Option<&Value>) -> Option<String> {
    text_of(value).filter(|s| !s.is_empty())
}

fn number_of(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Accepts booleans, "true"/"false" in any case, and 0/1.
pub fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        Value::Number(n) => match n.as_f64() {
            Some(x) if x == 1.0 => Some(true),
            Some(x) if x == 0.0 => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Accepts a number or a numeric string, rounded and clamped to 0..=100.
pub fn coerce_score(value: &Value) -> Option<u8> {
    let n = number_of(Some(value))?;
    if !n.is_finite() {
        return None;
    }
    Some(n.round().clamp(0.0, 100.0) as u8)
}

/// Index of the correct entry in the raw options. Text that names an option wins
/// over reading the value as an index.
fn resolve_correct(value: Option<&Value>, options: &[Option<String>]) -> Option<usize> {
    let index = match value? {
        Value::String(s) => {
            let wanted = s.trim().to_lowercase();
            options
                .iter()
                .position(|o| o.as_deref().is_some_and(|o| o.to_lowercase() == wanted))
                .or_else(|| wanted.parse::<usize>().ok())
        }
        other => number_of(Some(other)).filter(|n| *n >= 0.0 && n.fract() == 0.0).map(|n| n as usize),
    };
    index.filter(|i| *i < options.len())
}

/// Normalize one model-supplied question. `position` is 0-based and only used when `id` is missing.
/// Returns `None` for entries without question text.
pub fn normalize_question(value: &Value, position: usize) -> Option<Question> {
    let obj = value.as_object()?;
    let question = non_empty_text(obj.get("question"))?;

    // Resolve against the raw array so dropped entries cannot shift the index.
    let raw_options: Vec<Option<String>> = obj
        .get("options")
        .and_then(Value::as_array)
        .map(|opts| opts.iter().map(|o| non_empty_text(Some(o))).collect())
        .unwrap_or_default();
    let raw_correct = resolve_correct(obj.get("correctAnswer"), &raw_options);

    let mut options = Vec::with_capacity(raw_options.len());
    let mut correct = 0;
    for (i, option) in raw_options.into_iter().enumerate() {
        let Some(text) = option else { continue };
        if raw_correct == Some(i) {
            correct = options.len();
        }
        options.push(text);
    }
    if correct >= options.len() {
        correct = 0;
    }
    if options.len() > MAX_OPTIONS {
        if correct >= MAX_OPTIONS {
            options.swap(MAX_OPTIONS - 1, correct);
            correct = MAX_OPTIONS - 1;
        }
        options.truncate(MAX_OPTIONS);
    }

    let id = number_of(obj.get("id"))
        .filter(|n| *n >= 1.0 && n.fract() == 0.0 && *n <= u32::MAX as f64)
        .map(|n| n as u32)
        .unwrap_or(position as u32 + 1);

    let expected_answer = non_empty_text(obj.get("expectedAnswer"))
        .or_else(|| options.get(correct).cloned())
        .unwrap_or_default();

    Some(Question {
        id,
        question,
        options,
        correct_answer: correct,
        expected_answer,
        explanation: text_of(obj.get("explanation")).unwrap_or_default(),
        question_language: non_empty_text(obj.get("questionLanguage")).unwrap_or_else(default_language),
        answer_language: non_empty_text(obj.get("answerLanguage")).unwrap_or_else(default_language),
        vocabulary_pair: obj.get("vocabularyPair").and_then(|v| serde_json::from_value::<VocabularyPair>(v.clone()).ok()),
    })
}

/// Parse an AnalysisResult reply. `default_subject` fills a missing or blank subject.
pub fn parse_analysis(raw: &str, default_subject: &str, mode: JsonMode) -> Result<AnalysisResult, QuizError> {
    let obj = parse_object(raw, mode, has_questions)?;

    let questions: Vec<Question> = obj
        .get("questions")
        .and_then(Value::as_array)
        .map(|qs| qs.iter().enumerate().filter_map(|(i, q)| normalize_question(q, i)).collect())
        .unwrap_or_default();
    if questions.is_empty() {
        return Err(malformed("no usable questions", raw));
    }

    let keywords: Vec<String> = obj
        .get("keywords")
        .and_then(Value::as_array)
        .map(|ks| ks.iter().filter_map(|k| non_empty_text(Some(k))).collect())
        .unwrap_or_default();

    let mut result = AnalysisResult::new(
        non_empty_text(obj.get("subject")).unwrap_or_else(|| default_subject.to_string()),
        text_of(obj.get("difficulty")).map(|d| Difficulty::from_label(&d)).unwrap_or_default(),
        questions,
        keywords,
    );
    if let Some(language) = non_empty_text(obj.get("language")) {
        result.language = language;
    }
    result.is_vocabulary = obj.get("isVocabulary").and_then(coerce_bool).unwrap_or(false);
    result.vocabulary_languages = obj
        .get("vocabularyLanguages")
        .and_then(Value::as_array)
        .map(|ls| ls.iter().filter_map(|l| non_empty_text(Some(l))).collect());
    result.vocabulary_pairs = obj
        .get("vocabularyPairs")
        .and_then(|v| serde_json::from_value::<Vec<VocabularyPair>>(v.clone()).ok());

    Ok(result)
}

/// Parse a GradingResult reply; `score` and `isCorrect` must both coerce.
pub fn parse_grading(raw: &str, mode: JsonMode) -> Result<GradingResult, QuizError> {
    let obj = parse_object(raw, mode, has_grading_fields)?;

    let is_correct = obj
        .get("isCorrect")
        .and_then(coerce_bool)
        .ok_or_else(|| malformed("isCorrect is not a boolean", raw))?;
    let score = obj
        .get("score")
        .and_then(coerce_score)
        .ok_or_else(|| malformed("score is not a number", raw))?;

    Ok(GradingResult {
        is_correct,
        feedback: text_of(obj.get("feedback")).unwrap_or_default(),
        score,
        is_valid_translation: obj.get("isValidTranslation").and_then(coerce_bool),
    })
}

/// One `N. question - Svar: answer` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedQuestion {
    pub question: String,
    pub answer: String,
}

/// Parse the numbered-list reply format. Only the first three numbered lines are considered.
pub fn parse_numbered_list(raw: &str) -> Result<Vec<ListedQuestion>, QuizError> {
    let items: Vec<ListedQuestion> = raw
        .lines()
        .map(str::trim)
        .filter(|line| RE_LIST_ITEM.is_match(line))
        .take(3)
        .filter_map(|line| {
            let (question, answer) = line.split_once(" - Svar: ")?;
            let question = RE_LIST_PREFIX.replace(question, "").trim().to_string();
            let answer = answer.trim().to_string();
            (!question.is_empty() && !answer.is_empty()).then_some(ListedQuestion { question, answer })
        })
        .collect();

    if items.is_empty() {
        return Err(malformed("no numbered question lines", raw));
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn question_defaults_are_filled() {
        let q = normalize_question(&json!({"question": "Vad består solen av?", "options": ["Väte och helium", "Järn"]}), 4).unwrap();
        assert_eq!(q.id, 5);
        assert_eq!(q.correct_answer, 0);
        assert_eq!(q.expected_answer, "Väte och helium");
        assert_eq!(q.explanation, "");
        assert_eq!(q.answer_language, "svenska");
    }

    #[test]
    fn out_of_range_correct_answer_resets_to_zero() {
        let q = normalize_question(&json!({"id": 1, "question": "Q", "options": ["a", "b"], "correctAnswer": 7}), 0).unwrap();
        assert_eq!(q.correct_answer, 0);
    }

    #[test]
    fn extra_options_are_truncated_keeping_the_correct_one() {
        let q = normalize_question(
            &json!({"question": "Q", "options": ["a", "b", "c", "d", "e", "f"], "correctAnswer": 5}),
            0,
        )
        .unwrap();
        assert_eq!(q.options.len(), 4);
        assert_eq!(q.correct_option(), Some("f"));
    }

    #[test]
    fn correct_answer_as_numeric_string_or_text() {
        let q = normalize_question(&json!({"question": "Q", "options": ["a", "b"], "correctAnswer": "1"}), 0).unwrap();
        assert_eq!(q.correct_answer, 1);
        let q = normalize_question(&json!({"question": "Q", "options": ["Oslo", "Bergen"], "correctAnswer": "bergen"}), 0).unwrap();
        assert_eq!(q.correct_answer, 1);
    }

    #[test]
    fn unusable_options_do_not_shift_the_correct_index() {
        let q = normalize_question(&json!({"question": "Norges huvudstad?", "options": ["Bergen", null, "Oslo"], "correctAnswer": 2}), 0).unwrap();
        assert_eq!(q.options, vec!["Bergen", "Oslo"]);
        assert_eq!(q.correct_option(), Some("Oslo"));

        let q = normalize_question(&json!({"question": "Q", "options": [{"x": 1}, "a", [], "b"], "correctAnswer": 3}), 0).unwrap();
        assert_eq!(q.correct_option(), Some("b"));
    }

    #[test]
    fn numeric_option_text_is_matched_before_index() {
        let q = normalize_question(&json!({"question": "Vad är 7 + 5?", "options": ["7", "12"], "correctAnswer": "12"}), 0).unwrap();
        assert_eq!(q.correct_option(), Some("12"));
        assert_eq!(q.expected_answer, "12");
    }

    #[test]
    fn entries_without_question_text_are_dropped() {
        assert!(normalize_question(&json!({"options": ["a"]}), 0).is_none());
        assert!(normalize_question(&json!("just text"), 0).is_none());
    }

    #[test]
    fn grading_coerces_strings() {
        let g = parse_grading(r#"{"isCorrect":"TRUE","feedback":"Bra!","score":"92.4"}"#, JsonMode::Strict).unwrap();
        assert!(g.is_correct);
        assert_eq!(g.score, 92);
        let g = parse_grading(r#"{"isCorrect":0,"feedback":"Nej","score":150,"isValidTranslation":true}"#, JsonMode::Strict).unwrap();
        assert!(!g.is_correct);
        assert_eq!(g.score, 100);
        assert_eq!(g.is_valid_translation, Some(true));
    }

    #[test]
    fn grading_rejects_uncoercible_fields() {
        let err = parse_grading(r#"{"isCorrect":"kanske","score":50}"#, JsonMode::Strict).unwrap_err();
        assert!(matches!(err, QuizError::MalformedResponse { .. }));
        let err = parse_grading(r#"{"isCorrect":true,"score":"många"}"#, JsonMode::Strict).unwrap_err();
        assert!(matches!(err, QuizError::MalformedResponse { .. }));
    }

    #[test]
    fn lenient_grading_finds_embedded_object() {
        let raw = "Bedömning:\n{\"isCorrect\": false, \"feedback\": \"Nästan\", \"score\": 40}\nLycka till!";
        assert!(parse_grading(raw, JsonMode::Strict).is_err());
        let g = parse_grading(raw, JsonMode::Lenient).unwrap();
        assert_eq!(g.score, 40);
    }

    #[test]
    fn numbered_list_parses_three_lines_at_most() {
        let raw = "Här är frågorna:\n1. Vad består solen av? - Svar: väte och helium\n2. Hur varm är solen? - Svar: mycket varm\n3. Utan svar\n4. Extra? - Svar: nej";
        let items = parse_numbered_list(raw).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].question, "Vad består solen av?");
        assert_eq!(items[0].answer, "väte och helium");
    }

    #[test]
    fn numbered_list_without_matches_is_malformed() {
        assert!(matches!(parse_numbered_list("Jag kan inte hjälpa till."), Err(QuizError::MalformedResponse { .. })));
    }
}
