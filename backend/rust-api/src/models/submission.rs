use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

use crate::utils::time::bson_datetime;

/// One respondent's answer to one question. The payload shape is chosen by
/// `questionType` and must match the referenced question's `type` to be graded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub question_id: String,
    #[serde(flatten)]
    pub payload: AnswerPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "questionType", rename_all = "lowercase")]
pub enum AnswerPayload {
    Categorize(CategorizeAnswer),
    Cloze(ClozeAnswer),
    Comprehension(ComprehensionAnswer),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CategorizeAnswer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categorizations: Option<Vec<Categorization>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Categorization {
    pub item_id: String,
    pub category_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClozeAnswer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blank_answers: Option<Vec<BlankAnswer>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BlankAnswer {
    pub blank_id: String,
    #[serde(default)]
    pub answer: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComprehensionAnswer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_answers: Option<Vec<SubAnswer>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubAnswer {
    pub sub_question_id: String,
    #[serde(default)]
    pub answer: String,
}

/// Submission stored in MongoDB "submissions" collection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub form_id: ObjectId,
    #[serde(default)]
    pub answers: Vec<Answer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitter_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitter_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Set when the form allowed one submission per email; the partial unique
    /// index on `{formId, submitterEmail}` only covers these documents.
    #[serde(default)]
    pub single_submission: bool,
    #[serde(with = "bson_datetime")]
    pub completed_at: DateTime<Utc>,
}

/// Public submission body
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitFormRequest {
    #[serde(default)]
    pub answers: Vec<Answer>,

    #[serde(default, deserialize_with = "normalized_email")]
    #[validate(email(message = "Invalid email format"))]
    pub submitter_email: Option<String>,

    #[validate(length(max = 200, message = "Name must be at most 200 characters"))]
    pub submitter_name: Option<String>,
}

/// Trimmed and lowercased before validation; blank counts as absent.
fn normalized_email<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let email = Option::<String>::deserialize(deserializer)?;
    Ok(email
        .map(|email| email.trim().to_lowercase())
        .filter(|email| !email.is_empty()))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitFormResponse {
    pub message: String,
    pub submission_id: String,
    pub score: u32,
}

/// Submission as returned to the form owner
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResponse {
    pub id: String,
    pub form_id: String,
    pub answers: Vec<Answer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitter_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitter_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
    pub completed_at: DateTime<Utc>,
}

impl From<Submission> for SubmissionResponse {
    fn from(submission: Submission) -> Self {
        SubmissionResponse {
            id: submission.id.map(|id| id.to_hex()).unwrap_or_default(),
            form_id: submission.form_id.to_hex(),
            answers: submission.answers,
            submitter_email: submission.submitter_email,
            submitter_name: submission.submitter_name,
            score: submission.score,
            completed_at: submission.completed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn answer_payload_follows_question_type() {
        let answer: Answer = serde_json::from_value(json!({
            "questionId": "q1",
            "questionType": "cloze",
            "blankAnswers": [{ "blankId": "b1", "answer": "cat" }]
        }))
        .unwrap();

        assert_eq!(answer.question_id, "q1");
        match answer.payload {
            AnswerPayload::Cloze(cloze) => {
                let blanks = cloze.blank_answers.unwrap();
                assert_eq!(blanks[0].answer, "cat");
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn missing_payload_array_stays_none() {
        let answer: Answer = serde_json::from_value(json!({
            "questionId": "q1",
            "questionType": "categorize"
        }))
        .unwrap();

        assert_eq!(
            answer.payload,
            AnswerPayload::Categorize(CategorizeAnswer {
                categorizations: None
            })
        );
    }

    #[test]
    fn submitter_email_is_validated() {
        let request: SubmitFormRequest = serde_json::from_value(json!({
            "answers": [],
            "submitterEmail": "not-an-email"
        }))
        .unwrap();
        assert!(request.validate().is_err());

        let request: SubmitFormRequest =
            serde_json::from_value(json!({ "answers": [] })).unwrap();
        assert!(request.validate().is_ok());
    }

    #[test]
    fn submitter_email_is_normalized_before_validation() {
        let request: SubmitFormRequest = serde_json::from_value(json!({
            "answers": [],
            "submitterEmail": "  Sam@Example.COM \n"
        }))
        .unwrap();
        assert!(request.validate().is_ok());
        assert_eq!(request.submitter_email.as_deref(), Some("sam@example.com"));

        for blank in [json!("   "), json!(null)] {
            let request: SubmitFormRequest =
                serde_json::from_value(json!({ "submitterEmail": blank })).unwrap();
            assert!(request.validate().is_ok());
            assert_eq!(request.submitter_email, None);
        }
    }

    #[test]
    fn single_submission_flag_is_stored_and_defaults_off() {
        let submission = Submission {
            id: None,
            form_id: ObjectId::new(),
            answers: vec![],
            submitter_email: Some("sam@example.com".to_string()),
            submitter_name: None,
            score: Some(0),
            ip_address: None,
            user_agent: None,
            single_submission: true,
            completed_at: Utc::now(),
        };
        let doc = mongodb::bson::to_document(&submission).unwrap();
        assert!(doc.get_bool("singleSubmission").unwrap());
        assert_eq!(doc.get_str("submitterEmail").unwrap(), "sam@example.com");

        let mut legacy = doc.clone();
        legacy.remove("singleSubmission");
        let reloaded: Submission = mongodb::bson::from_document(legacy).unwrap();
        assert!(!reloaded.single_submission);
    }
}
