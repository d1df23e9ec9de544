use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::utils::ids::ensure_id;

lazy_static! {
    /// Blank markers accepted in cloze text: `___` (editor) and `[blank]` (viewer).
    static ref BLANK_MARKER: Regex = Regex::new(r"_{3,}|\[blank\]").unwrap();
}

/// A question embedded in a form. Common fields live here, the type-specific
/// payload is flattened in from `kind` and discriminated by `type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum QuestionKind {
    Categorize(CategorizeQuestion),
    Cloze(ClozeQuestion),
    Comprehension(ComprehensionQuestion),
}

impl QuestionKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            QuestionKind::Categorize(_) => "categorize",
            QuestionKind::Cloze(_) => "cloze",
            QuestionKind::Comprehension(_) => "comprehension",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CategorizeQuestion {
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub items: Vec<CategorizeItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Category {
    #[serde(default)]
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CategorizeItem {
    #[serde(default)]
    pub id: String,
    pub text: String,
    /// Category id this item belongs to; `None` leaves the item ungraded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_category: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClozeQuestion {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub blanks: Vec<Blank>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Blank {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
    #[serde(default)]
    pub position: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComprehensionQuestion {
    #[serde(default)]
    pub passage: String,
    #[serde(default)]
    pub sub_questions: Vec<SubQuestion>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubQuestion {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: SubQuestionKind,
    pub question: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SubQuestionKind {
    MultipleChoice,
    ShortAnswer,
    TrueFalse,
}

/// Number of blank markers in a cloze text.
pub fn count_blank_markers(text: &str) -> usize {
    BLANK_MARKER.find_iter(text).count()
}

impl Question {
    /// Gives the question and every nested element an id when the client sent none.
    pub fn assign_missing_ids(&mut self) {
        ensure_id(&mut self.id);
        match &mut self.kind {
            QuestionKind::Categorize(q) => {
                q.categories.iter_mut().for_each(|c| ensure_id(&mut c.id));
                q.items.iter_mut().for_each(|i| ensure_id(&mut i.id));
            }
            QuestionKind::Cloze(q) => q.blanks.iter_mut().for_each(|b| ensure_id(&mut b.id)),
            QuestionKind::Comprehension(q) => {
                q.sub_questions.iter_mut().for_each(|s| ensure_id(&mut s.id))
            }
        }
    }

    /// Copy of the question safe to show respondents: answer keys removed.
    pub fn without_answer_keys(&self) -> Question {
        let mut public = self.clone();
        match &mut public.kind {
            QuestionKind::Categorize(q) => {
                q.items.iter_mut().for_each(|i| i.correct_category = None)
            }
            QuestionKind::Cloze(q) => q.blanks.iter_mut().for_each(|b| b.correct_answer = None),
            QuestionKind::Comprehension(q) => q
                .sub_questions
                .iter_mut()
                .for_each(|s| s.correct_answer = None),
        }
        public
    }

    /// Structural checks that serde cannot express. Expects ids to be assigned.
    pub fn check_structure(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err(format!("Question {} must have a title", self.id));
        }

        match &self.kind {
            QuestionKind::Categorize(q) => {
                unique_ids(q.categories.iter().map(|c| c.id.as_str()), "category", &self.id)?;
                unique_ids(q.items.iter().map(|i| i.id.as_str()), "item", &self.id)?;

                let category_ids: HashSet<&str> =
                    q.categories.iter().map(|c| c.id.as_str()).collect();
                for item in &q.items {
                    if let Some(category) = &item.correct_category {
                        if !category_ids.contains(category.as_str()) {
                            return Err(format!(
                                "Item {} in question {} references unknown category {}",
                                item.id, self.id, category
                            ));
                        }
                    }
                }
            }
            QuestionKind::Cloze(q) => {
                unique_ids(q.blanks.iter().map(|b| b.id.as_str()), "blank", &self.id)?;

                let markers = count_blank_markers(&q.text);
                if markers > 0 && markers != q.blanks.len() {
                    return Err(format!(
                        "Question {} has {} blank markers but {} blanks",
                        self.id,
                        markers,
                        q.blanks.len()
                    ));
                }
            }
            QuestionKind::Comprehension(q) => {
                unique_ids(
                    q.sub_questions.iter().map(|s| s.id.as_str()),
                    "sub-question",
                    &self.id,
                )?;

                for sub in &q.sub_questions {
                    if sub.kind != SubQuestionKind::MultipleChoice {
                        continue;
                    }
                    if let Some(key) = &sub.correct_answer {
                        if !sub.options.iter().any(|option| option == key) {
                            return Err(format!(
                                "Sub-question {} answer key is not one of its options",
                                sub.id
                            ));
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

fn unique_ids<'a>(
    ids: impl Iterator<Item = &'a str>,
    what: &str,
    question_id: &str,
) -> Result<(), String> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(format!(
                "Duplicate {} id {} in question {}",
                what, id, question_id
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cloze(text: &str, answers: &[&str]) -> Question {
        Question {
            id: "q1".into(),
            title: "Fill in".into(),
            description: None,
            image: None,
            required: false,
            kind: QuestionKind::Cloze(ClozeQuestion {
                text: text.into(),
                blanks: answers
                    .iter()
                    .enumerate()
                    .map(|(i, a)| Blank {
                        id: format!("b{}", i),
                        correct_answer: Some(a.to_string()),
                        position: i as u32,
                        options: vec![],
                    })
                    .collect(),
            }),
        }
    }

    #[test]
    fn deserializes_tagged_json() {
        let question: Question = serde_json::from_value(json!({
            "id": "q1",
            "type": "comprehension",
            "title": "Read",
            "passage": "Once upon a time",
            "subQuestions": [
                { "id": "s1", "type": "true-false", "question": "Is it old?", "correctAnswer": "true" }
            ]
        }))
        .unwrap();

        match question.kind {
            QuestionKind::Comprehension(q) => {
                assert_eq!(q.sub_questions.len(), 1);
                assert_eq!(q.sub_questions[0].kind, SubQuestionKind::TrueFalse);
                assert_eq!(q.sub_questions[0].correct_answer.as_deref(), Some("true"));
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn unknown_type_is_rejected() {
        let result: Result<Question, _> =
            serde_json::from_value(json!({ "id": "q", "type": "essay", "title": "x" }));
        assert!(result.is_err());
    }

    #[test]
    fn assigns_ids_to_nested_elements() {
        let mut question: Question = serde_json::from_value(json!({
            "type": "categorize",
            "title": "Sort",
            "categories": [{ "name": "Fruit" }],
            "items": [{ "text": "Apple" }]
        }))
        .unwrap();

        question.assign_missing_ids();
        assert!(!question.id.is_empty());
        let QuestionKind::Categorize(q) = &question.kind else {
            panic!("expected categorize");
        };
        assert!(!q.categories[0].id.is_empty());
        assert!(!q.items[0].id.is_empty());
    }

    #[test]
    fn strips_answer_keys() {
        let question = cloze("The ___ sat", &["cat"]);
        let public = question.without_answer_keys();
        let value = serde_json::to_value(&public).unwrap();
        assert!(value["blanks"][0].get("correctAnswer").is_none());
        assert_eq!(value["type"], "cloze");
    }

    #[test]
    fn counts_both_marker_styles() {
        assert_eq!(count_blank_markers("a ___ b [blank] c"), 2);
        assert_eq!(count_blank_markers("no blanks"), 0);
    }

    #[test]
    fn cloze_marker_mismatch_is_rejected() {
        assert!(cloze("The ___ sat on the ___", &["cat"]).check_structure().is_err());
        assert!(cloze("The ___ sat", &["cat"]).check_structure().is_ok());
    }

    #[test]
    fn categorize_key_must_reference_a_category() {
        let question = Question {
            id: "q".into(),
            title: "Sort".into(),
            description: None,
            image: None,
            required: false,
            kind: QuestionKind::Categorize(CategorizeQuestion {
                categories: vec![Category {
                    id: "fruit".into(),
                    name: "Fruit".into(),
                }],
                items: vec![CategorizeItem {
                    id: "i1".into(),
                    text: "Carrot".into(),
                    correct_category: Some("vegetable".into()),
                }],
            }),
        };
        let err = question.check_structure().unwrap_err();
        assert!(err.contains("unknown category"));
    }

    #[test]
    fn multiple_choice_key_must_be_an_option() {
        let question = Question {
            id: "q".into(),
            title: "Read".into(),
            description: None,
            image: None,
            required: false,
            kind: QuestionKind::Comprehension(ComprehensionQuestion {
                passage: "text".into(),
                sub_questions: vec![SubQuestion {
                    id: "s1".into(),
                    kind: SubQuestionKind::MultipleChoice,
                    question: "Pick".into(),
                    options: vec!["a".into(), "b".into()],
                    correct_answer: Some("c".into()),
                }],
            }),
        };
        assert!(question.check_structure().is_err());
    }
}
