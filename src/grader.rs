//! Keyword grader: the last tier of the grading cascade.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::GradingResult;

pub const CORRECT_SCORE: u8 = 85;
pub const INCORRECT_SCORE: u8 = 30;

static RE_ALTERNATIVES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[,;]|\s+eller\s+|\s+or\s+|\s*/\s*").unwrap());

/// Lower-cased, trimmed alternatives accepted for `expected`.
pub fn alternatives(expected: &str) -> Vec<String> {
    let lower = expected.to_lowercase();
    RE_ALTERNATIVES
        .split(&lower)
        .map(|alt| alt.trim().to_string())
        .filter(|alt| !alt.is_empty())
        .collect()
}

pub fn keyword_grade(answer: &str, expected: &str) -> GradingResult {
    let answer = answer.trim().to_lowercase();
    let alts = alternatives(expected);

    let is_correct = !answer.is_empty()
        && alts.iter().any(|alt| answer == *alt || answer.contains(alt.as_str()) || alt.contains(answer.as_str()));

    let feedback = if is_correct {
        "Bra jobbat! Ditt svar är korrekt.".to_string()
    } else if alts.len() > 1 {
        format!("Inte helt rätt. Rätt svar kan vara: {}. Försök igen!", alts.join(" eller "))
    } else {
        format!("Inte helt rätt. Rätt svar är: {}. Försök igen!", expected.trim())
    };

    GradingResult {
        is_correct,
        feedback,
        score: if is_correct { CORRECT_SCORE } else { INCORRECT_SCORE },
        is_valid_translation: None,
    }
}
