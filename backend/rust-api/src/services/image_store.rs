use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::config::UploadSettings;
use crate::services::object_storage::ObjectStorageClient;

/// Storage for uploaded form images (header images, question images).
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Stores the bytes under `filename` and returns the URL clients load it from.
    async fn put(&self, filename: &str, bytes: Vec<u8>, content_type: &str) -> Result<String>;

    /// Returns `false` when nothing was stored under `filename`.
    async fn delete(&self, filename: &str) -> Result<bool>;

    fn backend_name(&self) -> &'static str;
}

/// Files on local disk, served back by the router under `public_path`.
pub struct LocalImageStore {
    dir: PathBuf,
    public_path: String,
}

impl LocalImageStore {
    pub fn new(settings: &UploadSettings) -> Self {
        Self {
            dir: PathBuf::from(&settings.dir),
            public_path: settings.public_path.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    async fn put(&self, filename: &str, bytes: Vec<u8>, _content_type: &str) -> Result<String> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create upload dir {}", self.dir.display()))?;

        let path = self.dir.join(filename);
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        Ok(format!("{}/{}", self.public_path, filename))
    }

    async fn delete(&self, filename: &str) -> Result<bool> {
        let path = self.dir.join(filename);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("Failed to delete {}", path.display())),
        }
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}

pub struct ObjectImageStore {
    client: ObjectStorageClient,
}

impl ObjectImageStore {
    pub fn new(client: ObjectStorageClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ImageStore for ObjectImageStore {
    async fn put(&self, filename: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        self.client.upload_bytes(filename, bytes, content_type).await?;
        Ok(self.client.public_url(filename))
    }

    async fn delete(&self, filename: &str) -> Result<bool> {
        self.client.delete_object(filename).await
    }

    fn backend_name(&self) -> &'static str {
        "object_storage"
    }
}

/// Raster formats accepted for upload. SVG is left out: uploads are served
/// from our own origin and an SVG document can carry script.
const RASTER_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
    ("image/bmp", "bmp"),
    ("image/avif", "avif"),
];

/// Canonical extension for an accepted image MIME type.
pub fn raster_extension(content_type: &str) -> Option<&'static str> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    RASTER_TYPES
        .iter()
        .find(|(ty, _)| *ty == mime)
        .map(|(_, ext)| *ext)
}

/// `{unix millis}-{random}.{ext}`; the extension comes from the original name
/// when it names a raster format, otherwise from the MIME type.
pub fn generate_filename(original_name: Option<&str>, content_type: &str) -> String {
    let from_name = original_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| ext == "jpeg" || RASTER_TYPES.iter().any(|(_, known)| known == ext));

    let extension = from_name
        .or_else(|| raster_extension(content_type).map(str::to_string))
        .unwrap_or_else(|| "bin".to_string());

    format!(
        "{}-{}.{}",
        Utc::now().timestamp_millis(),
        Uuid::new_v4().simple(),
        extension
    )
}

/// Stored names are flat; anything that could walk out of the store is refused.
pub fn validate_filename(filename: &str) -> Result<(), String> {
    if filename.is_empty()
        || filename.contains('/')
        || filename.contains('\\')
        || filename.contains("..")
        || filename.starts_with('.')
    {
        return Err(format!("Invalid filename: {}", filename));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UploadBackend;

    fn temp_settings() -> UploadSettings {
        UploadSettings {
            backend: UploadBackend::Local,
            dir: std::env::temp_dir()
                .join(format!("formforge-images-{}", Uuid::new_v4()))
                .to_string_lossy()
                .into_owned(),
            public_path: "/uploads/".to_string(),
            max_bytes: 1024,
        }
    }

    #[test]
    fn filenames_keep_a_safe_extension() {
        let name = generate_filename(Some("Holiday.PNG"), "image/png");
        assert!(name.ends_with(".png"));
        assert!(validate_filename(&name).is_ok());

        assert!(generate_filename(None, "image/jpeg").ends_with(".jpg"));
        assert!(generate_filename(Some("noext"), "image/webp").ends_with(".webp"));
        assert!(generate_filename(Some("x.p/ng"), "image/gif").ends_with(".gif"));
        assert!(generate_filename(Some("photo.jpeg"), "image/jpeg").ends_with(".jpeg"));
    }

    #[test]
    fn only_raster_types_get_an_extension() {
        assert_eq!(raster_extension("image/png"), Some("png"));
        assert_eq!(raster_extension("IMAGE/JPEG; charset=binary"), Some("jpg"));
        assert_eq!(raster_extension("image/svg+xml"), None);
        assert_eq!(raster_extension("text/html"), None);

        // A script-capable name never survives into the stored filename.
        let name = generate_filename(Some("evil.svg"), "image/png");
        assert!(name.ends_with(".png"), "{name}");
        let name = generate_filename(Some("page.html"), "image/webp");
        assert!(name.ends_with(".webp"), "{name}");
    }

    #[test]
    fn path_tricks_are_rejected() {
        for bad in ["", "../etc/passwd", "a/b.png", "a\\b.png", ".hidden"] {
            assert!(validate_filename(bad).is_err(), "{bad} should be rejected");
        }
        assert!(validate_filename("1700000000000-abc.png").is_ok());
    }

    #[tokio::test]
    async fn local_store_writes_and_deletes() {
        let settings = temp_settings();
        let store = LocalImageStore::new(&settings);

        let url = store
            .put("a.png", vec![1, 2, 3], "image/png")
            .await
            .unwrap();
        assert_eq!(url, "/uploads/a.png");

        let on_disk = PathBuf::from(&settings.dir).join("a.png");
        assert_eq!(tokio::fs::read(&on_disk).await.unwrap(), vec![1, 2, 3]);

        assert!(store.delete("a.png").await.unwrap());
        assert!(!store.delete("a.png").await.unwrap());

        let _ = tokio::fs::remove_dir_all(&settings.dir).await;
    }
}
