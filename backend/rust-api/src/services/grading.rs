//! Scoring of a submission against a form's answer keys.
//!
//! Every gradable question is worth 100 points, split evenly over its keyed
//! units (items, blanks or sub-questions). The final score is the share of
//! earned points over possible points, rounded to an integer percentage.

use std::collections::{HashMap, HashSet};

use crate::models::question::{Question, QuestionKind};
use crate::models::submission::{Answer, AnswerPayload};

/// Points available on each gradable question.
pub const QUESTION_POINTS: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradeReport {
    pub total_score: f64,
    pub total_possible_score: f64,
    pub graded_questions: usize,
    /// Rounded percentage in `0..=100`.
    pub score: u32,
}

/// Case-folded, whitespace-trimmed form used for text answer comparison.
pub fn normalize_answer(value: &str) -> String {
    value.trim().to_lowercase()
}

pub fn grade(questions: &[Question], answers: &[Answer]) -> GradeReport {
    let by_id: HashMap<&str, &Question> = questions.iter().map(|q| (q.id.as_str(), q)).collect();

    let mut total_score = 0.0;
    let mut total_possible_score = 0.0;
    let mut graded_questions = 0;

    for answer in answers {
        let Some(question) = by_id.get(answer.question_id.as_str()) else {
            tracing::debug!("Ignoring answer for unknown question {}", answer.question_id);
            continue;
        };

        if let Some(earned) = score_question(question, answer) {
            total_score += earned;
            total_possible_score += QUESTION_POINTS;
            graded_questions += 1;
        }
    }

    let score = if total_possible_score > 0.0 {
        ((total_score / total_possible_score) * 100.0)
            .round()
            .clamp(0.0, 100.0) as u32
    } else {
        0
    };

    GradeReport {
        total_score,
        total_possible_score,
        graded_questions,
        score,
    }
}

/// Points earned on a single question, or `None` when the answer cannot be
/// graded: mismatched type, missing payload, or no keyed units on the question.
pub fn score_question(question: &Question, answer: &Answer) -> Option<f64> {
    match (&question.kind, &answer.payload) {
        (QuestionKind::Categorize(q), AnswerPayload::Categorize(a)) => {
            let pairings = a.categorizations.as_ref()?;
            let keys: HashMap<&str, &str> = q
                .items
                .iter()
                .filter_map(|item| Some((item.id.as_str(), item.correct_category.as_deref()?)))
                .collect();
            award(
                &keys,
                pairings
                    .iter()
                    .map(|p| (p.item_id.as_str(), p.category_id.as_str())),
                |expected, given| expected == given,
            )
        }
        (QuestionKind::Cloze(q), AnswerPayload::Cloze(a)) => {
            let responses = a.blank_answers.as_ref()?;
            let keys: HashMap<&str, &str> = q
                .blanks
                .iter()
                .filter_map(|blank| Some((blank.id.as_str(), blank.correct_answer.as_deref()?)))
                .collect();
            award(
                &keys,
                responses
                    .iter()
                    .map(|r| (r.blank_id.as_str(), r.answer.as_str())),
                text_matches,
            )
        }
        (QuestionKind::Comprehension(q), AnswerPayload::Comprehension(a)) => {
            let responses = a.sub_answers.as_ref()?;
            let keys: HashMap<&str, &str> = q
                .sub_questions
                .iter()
                .filter_map(|sub| Some((sub.id.as_str(), sub.correct_answer.as_deref()?)))
                .collect();
            award(
                &keys,
                responses
                    .iter()
                    .map(|r| (r.sub_question_id.as_str(), r.answer.as_str())),
                text_matches,
            )
        }
        _ => {
            tracing::debug!(
                "Answer type does not match question {} ({})",
                question.id,
                question.kind.type_name()
            );
            None
        }
    }
}

fn text_matches(expected: &str, given: &str) -> bool {
    normalize_answer(expected) == normalize_answer(given)
}

/// Splits `QUESTION_POINTS` over the keyed units and credits each unit at most
/// once, using the first response given for it.
fn award<'a>(
    keys: &HashMap<&str, &str>,
    responses: impl Iterator<Item = (&'a str, &'a str)>,
    is_correct: impl Fn(&str, &str) -> bool,
) -> Option<f64> {
    if keys.is_empty() {
        return None;
    }

    let unit_points = QUESTION_POINTS / keys.len() as f64;
    let mut seen = HashSet::new();
    let mut earned = 0.0;

    for (unit_id, given) in responses {
        let Some(expected) = keys.get(unit_id) else {
            continue;
        };
        if !seen.insert(unit_id) {
            continue;
        }
        if is_correct(*expected, given) {
            earned += unit_points;
        }
    }

    Some(earned)
}
