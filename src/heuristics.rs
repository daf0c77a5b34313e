//! Model-free text analysis: keyword extraction and fact questions built from sentences.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::Question;

pub const HEURISTIC_QUESTIONS: usize = 8;
const MAX_SENTENCES: usize = 12;
const CONTEXT_CHARS: usize = 60;

static RE_KEYWORD_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[,\s.!?]+").unwrap());
static RE_SHORT_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^.{1,50}$").unwrap());
static RE_NUMBER_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\d+\.?[^\S\n]*").unwrap());
static RE_BULLET_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[-•*][^\S\n]*").unwrap());
static RE_SENTENCE_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+").unwrap());
static RE_MULTI_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+.*\w+").unwrap());
static RE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());
static RE_PROPER_NOUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[A-ZÅÄÖ][a-zåäö]+\b").unwrap());

const STOP_WORDS: &[&str] = &[
    "att", "och", "eller", "för", "med", "till", "från", "som", "när", "där", "det", "den", "dem", "denna", "detta",
    "dessa",
];

/// Words longer than three characters, split on punctuation and whitespace; at most ten.
pub fn extract_keywords(text: &str) -> Vec<String> {
    RE_KEYWORD_SPLIT
        .split(text)
        .filter(|w| w.chars().count() > 3)
        .take(10)
        .map(str::to_string)
        .collect()
}

/// Whitespace-separated words longer than three characters; at most ten.
pub fn whitespace_keywords(text: &str) -> Vec<String> {
    text.split_whitespace()
        .filter(|w| w.chars().count() > 3)
        .take(10)
        .map(str::to_string)
        .collect()
}

/// Substantial sentences, with headings and list markers removed.
pub fn candidate_sentences(text: &str) -> Vec<String> {
    let cleaned = RE_SHORT_LINE.replace_all(text, "");
    let cleaned = RE_NUMBER_PREFIX.replace_all(&cleaned, "");
    let cleaned = RE_BULLET_PREFIX.replace_all(&cleaned, "");

    RE_SENTENCE_SPLIT
        .split(cleaned.trim())
        .map(str::trim)
        .filter(|s| {
            let len = s.chars().count();
            len > 20 && len < 200
        })
        .filter(|s| RE_MULTI_WORD.is_match(s))
        .take(MAX_SENTENCES)
        .map(str::to_string)
        .collect()
}

fn blanked_context(sentence: &str, fact: &str) -> String {
    sentence.replacen(fact, "___", 1).chars().take(CONTEXT_CHARS).collect()
}

fn is_stop_word(word: &str) -> bool {
    let lower = word.to_lowercase();
    STOP_WORDS.contains(&lower.as_str())
}

fn numeric_question(id: u32, sentence: &str) -> Option<Question> {
    let number = RE_NUMBER.find(sentence)?.as_str();
    let n: i64 = number.parse().ok()?;
    let context = blanked_context(sentence, number);
    Some(Question::multiple_choice(
        id,
        format!("Vilket tal nämns i: \"{context}...\"?"),
        vec![number.to_string(), n.saturating_add(1).to_string(), n.saturating_sub(1).to_string(), n.saturating_mul(2).to_string()],
        0,
        number,
        format!("Enligt texten är talet {number}"),
    ))
}

fn proper_noun_question(id: u32, sentence: &str) -> Option<Question> {
    let name = RE_PROPER_NOUN.find(sentence)?.as_str();
    let context = blanked_context(sentence, name);
    Some(Question::multiple_choice(
        id,
        format!("Vad heter det som nämns i: \"{context}...\"?"),
        vec![name.to_string(), "Ett annat namn".into(), "Något liknande".into(), "Okänt namn".into()],
        0,
        name,
        format!("Enligt texten heter det {name}"),
    ))
}

fn concept_question(id: u32, sentence: &str) -> Option<Question> {
    let keyword = sentence
        .split_whitespace()
        .find(|w| w.chars().count() > 4 && !is_stop_word(w))?;
    let context = blanked_context(sentence, keyword);
    Some(Question::multiple_choice(
        id,
        format!("Vilket begrepp passar här: \"{context}...\"?"),
        vec![keyword.to_string(), "Ett annat begrepp".into(), "Något relaterat".into(), "Inget av ovan".into()],
        0,
        keyword,
        format!("Enligt texten är begreppet {keyword}"),
    ))
}

/// Build up to eight fact questions from `text`. Padded to eight by repeating when at least one exists.
pub fn heuristic_questions(text: &str) -> Vec<Question> {
    let mut questions: Vec<Question> = candidate_sentences(text)
        .iter()
        .take(HEURISTIC_QUESTIONS)
        .enumerate()
        .filter_map(|(i, sentence)| {
            let id = i as u32 + 1;
            numeric_question(id, sentence)
                .or_else(|| proper_noun_question(id, sentence))
                .or_else(|| concept_question(id, sentence))
        })
        .collect();

    let produced = questions.len();
    let mut next = 0;
    while produced > 0 && questions.len() < HEURISTIC_QUESTIONS {
        let source = &questions[next % produced];
        let repeat = Question {
            id: questions.len() as u32 + 1,
            question: source.question.replacen("Vilket", "Vad", 1),
            ..source.clone()
        };
        questions.push(repeat);
        next += 1;
    }
    questions
}
