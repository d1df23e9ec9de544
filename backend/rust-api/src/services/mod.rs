use std::sync::Arc;

use anyhow::{Context, Result};
use mongodb::bson::doc;
use mongodb::options::IndexOptions;
use mongodb::{Client as MongoClient, Database, IndexModel};

use crate::config::{Config, UploadBackend};
use crate::middlewares::auth::JwtService;
use image_store::{ImageStore, LocalImageStore, ObjectImageStore};
use object_storage::ObjectStorageClient;

pub mod auth_service;
pub mod form_service;
pub mod grading;
pub mod image_store;
pub mod object_storage;
pub mod submission_service;

pub const USERS: &str = "users";
pub const FORMS: &str = "forms";
pub const SUBMISSIONS: &str = "submissions";

pub struct AppState {
    pub config: Config,
    pub mongo: Database,
    pub jwt: JwtService,
    pub images: Arc<dyn ImageStore>,
}

impl AppState {
    /// Does not touch the database; the driver connects lazily on first use.
    pub async fn new(config: Config, mongo_client: MongoClient) -> Result<Self> {
        let mongo = mongo_client.database(&config.mongo_database);
        let jwt = JwtService::new(&config.jwt_secret);

        let images: Arc<dyn ImageStore> = match config.upload.backend {
            UploadBackend::Local => {
                tokio::fs::create_dir_all(&config.upload.dir)
                    .await
                    .with_context(|| format!("Failed to create {}", config.upload.dir))?;
                Arc::new(LocalImageStore::new(&config.upload))
            }
            UploadBackend::ObjectStorage => {
                let settings = config
                    .object_storage
                    .clone()
                    .context("Object storage backend selected without settings")?;
                Arc::new(ObjectImageStore::new(ObjectStorageClient::new(settings)?))
            }
        };

        tracing::info!(backend = images.backend_name(), "Image store ready");

        Ok(Self {
            config,
            mongo,
            jwt,
            images,
        })
    }

    /// Creates the indexes the services rely on (unique emails and public ids).
    pub async fn ensure_indexes(&self) -> Result<()> {
        let unique = || IndexOptions::builder().unique(true).build();

        self.mongo
            .collection::<mongodb::bson::Document>(USERS)
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "email": 1 })
                    .options(unique())
                    .build(),
            )
            .await
            .context("Failed to create users.email index")?;

        let forms = self.mongo.collection::<mongodb::bson::Document>(FORMS);
        forms
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "publicId": 1 })
                    .options(unique())
                    .build(),
            )
            .await
            .context("Failed to create forms.publicId index")?;
        forms
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "ownerId": 1, "createdAt": -1 })
                    .build(),
            )
            .await
            .context("Failed to create forms.ownerId index")?;

        let submissions = self.mongo.collection::<mongodb::bson::Document>(SUBMISSIONS);
        submissions
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "formId": 1, "completedAt": -1 })
                    .build(),
            )
            .await
            .context("Failed to create submissions.formId index")?;
        submissions
            .create_index(single_submission_index())
            .await
            .context("Failed to create submissions single-submission index")?;

        tracing::info!("MongoDB indexes ensured");
        Ok(())
    }
}

/// One submission per email, enforced only for forms that asked for it.
fn single_submission_index() -> IndexModel {
    IndexModel::builder()
        .keys(doc! { "formId": 1, "submitterEmail": 1 })
        .options(
            IndexOptions::builder()
                .name("formId_submitterEmail_single".to_string())
                .unique(true)
                .partial_filter_expression(doc! {
                    "singleSubmission": true,
                    "submitterEmail": { "$exists": true },
                })
                .build(),
        )
        .build()
}
