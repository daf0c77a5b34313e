//! Static question sets served when every strategy has failed.

use crate::model::{AnalysisResult, Difficulty, Question};

fn q(id: u32, question: &str, options: [&str; 4], correct: usize, expected: &str, explanation: &str) -> Question {
    Question::multiple_choice(
        id,
        question,
        options.iter().map(|o| o.to_string()).collect(),
        correct,
        expected,
        explanation,
    )
}

fn general_knowledge() -> Vec<Question> {
    vec![
        q(1, "Vad är 7 + 5?", ["10", "11", "12", "13"], 2, "tolv", "7 + 5 = 12"),
        q(2, "Vilken planet är närmast solen?", ["Venus", "Merkurius", "Mars", "Jorden"], 1, "Merkurius", "Merkurius ligger närmast solen"),
        q(3, "Hur många sidor har en triangel?", ["2", "3", "4", "5"], 1, "tre", "En triangel har alltid tre sidor"),
        q(4, "Vad är huvudstaden i Norge?", ["Bergen", "Trondheim", "Oslo", "Stavanger"], 2, "Oslo", "Oslo är Norges huvudstad"),
        q(5, "Vad blir 4 × 6?", ["20", "22", "24", "26"], 2, "tjugofyra", "4 × 6 = 24"),
        q(6, "Vilket år upptäcktes Amerika?", ["1490", "1491", "1492", "1493"], 2, "fjortonhundranittiotvå", "Kristofer Columbus kom till Amerika 1492"),
        q(7, "Vad kallas djur som äter både växter och kött?", ["Köttätare", "Växtätare", "Allätare", "Fiskätare"], 2, "allätare", "Allätare äter både växter och kött"),
        q(8, "Hur många månader har 31 dagar?", ["5", "6", "7", "8"], 2, "sju", "Jan, mars, maj, juli, aug, okt, dec har 31 dagar"),
        q(9, "Vad heter Sveriges huvudstad?", ["Göteborg", "Stockholm", "Malmö", "Uppsala"], 1, "Stockholm", "Stockholm är Sveriges huvudstad"),
        q(10, "Vad blir 12 ÷ 3?", ["3", "4", "5", "6"], 1, "fyra", "12 delat med 3 är 4"),
    ]
}

/// Two-question set for failed text-to-question generation.
pub fn text_demo() -> AnalysisResult {
    let questions = general_knowledge().into_iter().take(2).collect();
    AnalysisResult::new(
        "Allmänkunskap",
        Difficulty::Easy,
        questions,
        vec!["matematik".to_string(), "astronomi".to_string()],
    )
}

/// Ten-question set for failed image analysis.
pub fn image_demo() -> AnalysisResult {
    AnalysisResult::new("Allmänkunskap", Difficulty::Medium, general_knowledge(), Vec::new())
}
