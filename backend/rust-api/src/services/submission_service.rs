use crate::errors::{is_duplicate_key, ApiError};
use crate::metrics::{record_submission, track_db_operation};
use crate::models::form::Form;
use crate::models::submission::{SubmitFormRequest, SubmitFormResponse, Submission};
use crate::services::form_service::FormService;
use crate::services::grading::{grade, GradeReport};
use crate::services::SUBMISSIONS;
use anyhow::{anyhow, Context};
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::Database;

/// Request metadata stored alongside a submission.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

pub struct SubmissionService {
    mongo: Database,
}

impl SubmissionService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    /// Grades and stores a respondent's answers to a published form.
    pub async fn submit(
        &self,
        public_id: &str,
        req: SubmitFormRequest,
        client: ClientInfo,
    ) -> Result<SubmitFormResponse, ApiError> {
        let form = FormService::new(self.mongo.clone())
            .get_published_form(public_id)
            .await?;
        let form_id = form.id.ok_or_else(|| anyhow!("Stored form has no id"))?;

        // Already trimmed and lowercased by deserialization.
        let submitter_email = req.submitter_email;

        self.check_settings(&form, form_id, submitter_email.as_deref())
            .await?;

        let report = grade(&form.questions, &req.answers);

        let submission = Submission {
            id: None,
            form_id,
            answers: req.answers,
            submitter_email,
            submitter_name: req
                .submitter_name
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
            score: Some(report.score),
            ip_address: client.ip_address,
            user_agent: client.user_agent,
            single_submission: !form.settings.allow_multiple_submissions,
            completed_at: Utc::now(),
        };

        let collection = self.mongo.collection::<Submission>(SUBMISSIONS);
        // A concurrent repeat that slipped past the count trips the partial unique index.
        let insert_result = track_db_operation("insert", SUBMISSIONS, async {
            collection
                .insert_one(&submission)
                .await
                .context("Failed to insert submission")
        })
        .await
        .map_err(|err| {
            let duplicate = err
                .downcast_ref::<mongodb::error::Error>()
                .is_some_and(is_duplicate_key);
            if duplicate {
                tracing::warn!(form_id = %form_id.to_hex(), "Concurrent repeat submission rejected");
                repeat_submission()
            } else {
                ApiError::Internal(err)
            }
        })?;

        let submission_id = insert_result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| anyhow!("Failed to get inserted submission ID"))?;

        record_submission(graded_score(&report));
        tracing::info!(
            form_id = %form_id.to_hex(),
            submission_id = %submission_id.to_hex(),
            score = report.score,
            graded_questions = report.graded_questions,
            "Submission recorded"
        );

        Ok(SubmitFormResponse {
            message: "Response submitted successfully".to_string(),
            submission_id: submission_id.to_hex(),
            score: report.score,
        })
    }

    /// Enforces the form's respondent settings.
    async fn check_settings(
        &self,
        form: &Form,
        form_id: ObjectId,
        submitter_email: Option<&str>,
    ) -> Result<(), ApiError> {
        if form.settings.collect_email && submitter_email.is_none() {
            return Err(ApiError::bad_request("Email is required for this form"));
        }

        // Without an email there is nothing to recognise a repeat respondent by.
        if let (false, Some(email)) = (form.settings.allow_multiple_submissions, submitter_email) {
            let previous = self
                .mongo
                .collection::<Submission>(SUBMISSIONS)
                .count_documents(doc! { "formId": form_id, "submitterEmail": email })
                .await
                .context("Failed to count previous submissions")?;

            if previous > 0 {
                tracing::warn!(form_id = %form_id.to_hex(), "Repeat submission rejected");
                return Err(repeat_submission());
            }
        }

        Ok(())
    }

    /// Submissions for a form the caller owns, newest first.
    pub async fn list_for_form(
        &self,
        owner_id: ObjectId,
        form_id: ObjectId,
    ) -> Result<Vec<Submission>, ApiError> {
        FormService::new(self.mongo.clone())
            .get_owned_form(owner_id, form_id)
            .await?;

        let submissions = self
            .mongo
            .collection::<Submission>(SUBMISSIONS)
            .find(doc! { "formId": form_id })
            .sort(doc! { "completedAt": -1 })
            .await
            .context("Failed to query submissions")?
            .try_collect::<Vec<_>>()
            .await
            .context("Failed to collect submissions")?;

        Ok(submissions)
    }

    pub async fn get_submission(
        &self,
        owner_id: ObjectId,
        form_id: ObjectId,
        submission_id: ObjectId,
    ) -> Result<Submission, ApiError> {
        FormService::new(self.mongo.clone())
            .get_owned_form(owner_id, form_id)
            .await?;

        self.mongo
            .collection::<Submission>(SUBMISSIONS)
            .find_one(doc! { "_id": submission_id, "formId": form_id })
            .await
            .context("Failed to query submission")?
            .ok_or_else(|| ApiError::not_found("Submission not found"))
    }

    pub async fn delete_submission(
        &self,
        owner_id: ObjectId,
        form_id: ObjectId,
        submission_id: ObjectId,
    ) -> Result<(), ApiError> {
        FormService::new(self.mongo.clone())
            .get_owned_form(owner_id, form_id)
            .await?;

        let deleted = self
            .mongo
            .collection::<Submission>(SUBMISSIONS)
            .delete_one(doc! { "_id": submission_id, "formId": form_id })
            .await
            .context("Failed to delete submission")?;

        if deleted.deleted_count == 0 {
            return Err(ApiError::not_found("Submission not found"));
        }

        tracing::info!(
            form_id = %form_id.to_hex(),
            submission_id = %submission_id.to_hex(),
            "Submission deleted"
        );
        Ok(())
    }
}

fn repeat_submission() -> ApiError {
    ApiError::conflict("You have already submitted a response to this form")
}

/// Score for the metrics histogram; `None` when nothing was gradable.
fn graded_score(report: &GradeReport) -> Option<u32> {
    (report.graded_questions > 0).then_some(report.score)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ungraded_submissions_stay_out_of_the_histogram() {
        let empty = grade(&[], &[]);
        assert_eq!(graded_score(&empty), None);

        let graded = GradeReport {
            total_score: 50.0,
            total_possible_score: 100.0,
            graded_questions: 1,
            score: 50,
        };
        assert_eq!(graded_score(&graded), Some(50));
    }

    #[test]
    fn repeat_submissions_are_conflicts() {
        let err = repeat_submission();
        assert_eq!(err.status(), axum::http::StatusCode::CONFLICT);
        assert!(err.to_string().contains("already submitted"));
    }
}
