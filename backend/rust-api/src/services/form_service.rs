use crate::errors::{is_duplicate_key, ApiError};
use crate::metrics::{record_form_operation, track_db_operation};
use crate::models::form::{Form, FormPayload};
use crate::services::{FORMS, SUBMISSIONS};
use crate::utils::{ids::generate_public_id, time::chrono_to_bson};
use anyhow::{anyhow, Context};
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, to_bson, Document};
use mongodb::options::ReturnDocument;
use mongodb::Database;

/// Public id collisions are astronomically rare; a few attempts is plenty.
const PUBLIC_ID_ATTEMPTS: usize = 3;

pub struct FormService {
    mongo: Database,
}

impl FormService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    pub async fn create_form(
        &self,
        owner_id: ObjectId,
        mut payload: FormPayload,
    ) -> Result<Form, ApiError> {
        payload.normalize().map_err(ApiError::BadRequest)?;

        let forms = self.mongo.collection::<Form>(FORMS);
        let now = Utc::now();
        let mut form = Form {
            id: None,
            title: payload.title,
            description: payload.description,
            header_image: payload.header_image,
            questions: payload.questions,
            is_published: payload.is_published,
            owner_id,
            public_id: generate_public_id(),
            settings: payload.settings,
            created_at: now,
            updated_at: now,
        };

        let mut attempt = 1;
        let insert_result = loop {
            match forms.insert_one(&form).await {
                Ok(result) => break result,
                Err(e) if is_duplicate_key(&e) && attempt < PUBLIC_ID_ATTEMPTS => {
                    tracing::warn!(public_id = %form.public_id, "Public id collision, retrying");
                    form.public_id = generate_public_id();
                    attempt += 1;
                }
                Err(e) => {
                    return Err(ApiError::Internal(
                        anyhow::Error::new(e).context("Failed to insert form"),
                    ))
                }
            }
        };

        form.id = Some(
            insert_result
                .inserted_id
                .as_object_id()
                .ok_or_else(|| anyhow!("Failed to get inserted form ID"))?,
        );

        record_form_operation("create");
        tracing::info!(
            form_id = ?form.id,
            public_id = %form.public_id,
            questions = form.questions.len(),
            "Form created"
        );

        Ok(form)
    }

    /// Forms owned by `owner_id`, newest first.
    pub async fn list_forms(&self, owner_id: ObjectId) -> Result<Vec<Form>, ApiError> {
        let forms = self.mongo.collection::<Form>(FORMS);

        let result = track_db_operation("find", FORMS, async {
            forms
                .find(doc! { "ownerId": owner_id })
                .sort(doc! { "createdAt": -1 })
                .await
                .context("Failed to query forms")?
                .try_collect::<Vec<_>>()
                .await
                .context("Failed to collect forms")
        })
        .await?;

        Ok(result)
    }

    /// A form the caller owns. Someone else's form is reported as missing.
    pub async fn get_owned_form(
        &self,
        owner_id: ObjectId,
        form_id: ObjectId,
    ) -> Result<Form, ApiError> {
        self.mongo
            .collection::<Form>(FORMS)
            .find_one(doc! { "_id": form_id, "ownerId": owner_id })
            .await
            .context("Failed to query form")?
            .ok_or_else(|| ApiError::not_found("Form not found"))
    }

    /// Replaces every editable field; `publicId`, owner and `createdAt` stay.
    pub async fn update_form(
        &self,
        owner_id: ObjectId,
        form_id: ObjectId,
        mut payload: FormPayload,
    ) -> Result<Form, ApiError> {
        payload.normalize().map_err(ApiError::BadRequest)?;

        let mut set = Document::new();
        set.insert("title", payload.title);
        set.insert("description", payload.description);
        set.insert(
            "headerImage",
            to_bson(&payload.header_image).context("Failed to encode header image")?,
        );
        set.insert(
            "questions",
            to_bson(&payload.questions).context("Failed to encode questions")?,
        );
        set.insert("isPublished", payload.is_published);
        set.insert(
            "settings",
            to_bson(&payload.settings).context("Failed to encode settings")?,
        );
        set.insert("updatedAt", chrono_to_bson(Utc::now()));

        let form = self
            .mongo
            .collection::<Form>(FORMS)
            .find_one_and_update(
                doc! { "_id": form_id, "ownerId": owner_id },
                doc! { "$set": set },
            )
            .return_document(ReturnDocument::After)
            .await
            .context("Failed to update form")?
            .ok_or_else(|| ApiError::not_found("Form not found"))?;

        record_form_operation("update");
        tracing::info!(form_id = %form_id.to_hex(), "Form updated");

        Ok(form)
    }

    pub async fn set_published(
        &self,
        owner_id: ObjectId,
        form_id: ObjectId,
        is_published: bool,
    ) -> Result<Form, ApiError> {
        let form = self
            .mongo
            .collection::<Form>(FORMS)
            .find_one_and_update(
                doc! { "_id": form_id, "ownerId": owner_id },
                doc! { "$set": {
                    "isPublished": is_published,
                    "updatedAt": chrono_to_bson(Utc::now()),
                } },
            )
            .return_document(ReturnDocument::After)
            .await
            .context("Failed to update form publication")?
            .ok_or_else(|| ApiError::not_found("Form not found"))?;

        record_form_operation(if is_published { "publish" } else { "unpublish" });
        tracing::info!(form_id = %form_id.to_hex(), is_published, "Form publication changed");

        Ok(form)
    }

    /// Deletes the form and every submission it collected.
    pub async fn delete_form(&self, owner_id: ObjectId, form_id: ObjectId) -> Result<(), ApiError> {
        let deleted = self
            .mongo
            .collection::<Form>(FORMS)
            .delete_one(doc! { "_id": form_id, "ownerId": owner_id })
            .await
            .context("Failed to delete form")?;

        if deleted.deleted_count == 0 {
            return Err(ApiError::not_found("Form not found"));
        }

        let submissions = self
            .mongo
            .collection::<Document>(SUBMISSIONS)
            .delete_many(doc! { "formId": form_id })
            .await
            .context("Failed to delete form submissions")?;

        record_form_operation("delete");
        tracing::info!(
            form_id = %form_id.to_hex(),
            submissions_deleted = submissions.deleted_count,
            "Form deleted"
        );

        Ok(())
    }

    /// Published form by its share id; unpublished forms are reported as missing.
    pub async fn get_published_form(&self, public_id: &str) -> Result<Form, ApiError> {
        self.mongo
            .collection::<Form>(FORMS)
            .find_one(doc! { "publicId": public_id, "isPublished": true })
            .await
            .context("Failed to query published form")?
            .ok_or_else(|| ApiError::not_found("Form not found or not published"))
    }
}
