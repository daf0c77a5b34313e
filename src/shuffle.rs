use rand::seq::SliceRandom;
use rand::Rng;

use crate::model::{AnalysisResult, Question};

/// Randomize option order, keeping `correct_answer` on the same option.
///
/// The correct option is tracked by its original position, so duplicate option
/// texts cannot redirect the answer. Questions without options come back unchanged.
pub fn shuffle_question<R: Rng + ?Sized>(question: &Question, rng: &mut R) -> Question {
    if question.options.is_empty() {
        return question.clone();
    }

    let mut indexed: Vec<(usize, &String)> = question.options.iter().enumerate().collect();
    indexed.shuffle(rng);

    let correct_answer = indexed
        .iter()
        .position(|(original, _)| *original == question.correct_answer)
        .unwrap_or(0);

    Question {
        options: indexed.into_iter().map(|(_, option)| option.clone()).collect(),
        correct_answer,
        ..question.clone()
    }
}

/// Shuffle the options of every question in the result.
pub fn shuffle_analysis<R: Rng + ?Sized>(result: AnalysisResult, rng: &mut R) -> AnalysisResult {
    let questions = result.questions.iter().map(|q| shuffle_question(q, rng)).collect();
    AnalysisResult { questions, ..result }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sample() -> Question {
        Question::multiple_choice(
            1,
            "Vad består solen av?",
            vec!["Väte och helium".into(), "Järn".into(), "Sten".into(), "Is".into()],
            0,
            "Väte och helium",
            "",
        )
    }

    #[test]
    fn preserves_options_and_correct_reference() {
        let original = sample();
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let shuffled = shuffle_question(&original, &mut rng);

            let mut before = original.options.clone();
            let mut after = shuffled.options.clone();
            before.sort();
            after.sort();
            assert_eq!(before, after);
            assert_eq!(shuffled.correct_option(), Some("Väte och helium"));
        }
        assert_eq!(original.options[0], "Väte och helium");
    }

    #[test]
    fn duplicate_options_follow_original_index() {
        let q = Question::multiple_choice(1, "Q", vec!["Ja".into(), "Nej".into(), "Ja".into()], 2, "Ja", "");
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let shuffled = shuffle_question(&q, &mut rng);
            assert_eq!(shuffled.correct_option(), Some("Ja"));
            assert!(shuffled.correct_answer < 3);
        }
    }

    #[test]
    fn empty_options_are_untouched() {
        let q = Question::multiple_choice(7, "Berätta om solen", vec![], 0, "", "");
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(shuffle_question(&q, &mut rng), q);
    }

    #[test]
    fn correct_position_varies_across_seeds() {
        let q = sample();
        let positions: std::collections::HashSet<usize> = (0..64)
            .map(|seed| shuffle_question(&q, &mut StdRng::seed_from_u64(seed)).correct_answer)
            .collect();
        assert!(positions.len() > 1);
    }
}
