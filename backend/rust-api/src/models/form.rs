use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::question::Question;
use crate::utils::time::bson_datetime;

/// Form stored in MongoDB "forms" collection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Form {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_image: Option<String>,
    /// Order is the order the builder saved, nothing re-sorts it.
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub is_published: bool,
    pub owner_id: ObjectId,
    pub public_id: String,
    #[serde(default)]
    pub settings: FormSettings,
    #[serde(with = "bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FormSettings {
    #[serde(default = "default_true")]
    pub allow_multiple_submissions: bool,
    #[serde(default = "default_true")]
    pub show_progress_bar: bool,
    #[serde(default)]
    pub collect_email: bool,
}

fn default_true() -> bool {
    true
}

impl Default for FormSettings {
    fn default() -> Self {
        Self {
            allow_multiple_submissions: true,
            show_progress_bar: true,
            collect_email: false,
        }
    }
}

/// Body for both create and full-replace update.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FormPayload {
    #[validate(length(
        min = 1,
        max = 200,
        message = "Title must be between 1 and 200 characters"
    ))]
    pub title: String,

    #[serde(default)]
    #[validate(length(max = 5000, message = "Description must be at most 5000 characters"))]
    pub description: String,

    pub header_image: Option<String>,

    #[serde(default)]
    pub questions: Vec<Question>,

    #[serde(default)]
    pub is_published: bool,

    #[serde(default)]
    pub settings: FormSettings,
}

impl FormPayload {
    /// Trims text fields, assigns missing ids and runs the structural checks.
    pub fn normalize(&mut self) -> Result<(), String> {
        self.title = self.title.trim().to_string();
        self.description = self.description.trim().to_string();
        if self.title.is_empty() {
            return Err("Title is required".to_string());
        }
        self.header_image = self
            .header_image
            .take()
            .filter(|url| !url.trim().is_empty());

        for question in &mut self.questions {
            question.assign_missing_ids();
        }

        let mut seen = std::collections::HashSet::new();
        for question in &self.questions {
            if !seen.insert(question.id.as_str()) {
                return Err(format!("Duplicate question id {}", question.id));
            }
            question.check_structure()?;
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    pub is_published: bool,
}

/// Owner view of a form (answer keys included)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormResponse {
    pub id: String,
    pub public_id: String,
    pub owner_id: String,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header_image: Option<String>,
    pub questions: Vec<Question>,
    pub is_published: bool,
    pub settings: FormSettings,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Form> for FormResponse {
    fn from(form: Form) -> Self {
        FormResponse {
            id: form.id.map(|id| id.to_hex()).unwrap_or_default(),
            public_id: form.public_id,
            owner_id: form.owner_id.to_hex(),
            title: form.title,
            description: form.description,
            header_image: form.header_image,
            questions: form.questions,
            is_published: form.is_published,
            settings: form.settings,
            created_at: form.created_at,
            updated_at: form.updated_at,
        }
    }
}

/// Respondent view of a published form (answer keys stripped)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicFormResponse {
    pub id: String,
    pub public_id: String,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header_image: Option<String>,
    pub questions: Vec<Question>,
    pub settings: FormSettings,
}

impl From<&Form> for PublicFormResponse {
    fn from(form: &Form) -> Self {
        PublicFormResponse {
            id: form.id.map(|id| id.to_hex()).unwrap_or_default(),
            public_id: form.public_id.clone(),
            title: form.title.clone(),
            description: form.description.clone(),
            header_image: form.header_image.clone(),
            questions: form
                .questions
                .iter()
                .map(Question::without_answer_keys)
                .collect(),
            settings: form.settings.clone(),
        }
    }
}
