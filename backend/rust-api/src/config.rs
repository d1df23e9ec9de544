use serde::Deserialize;
use std::env;

/// Where uploaded images end up.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadBackend {
    Local,
    ObjectStorage,
}

impl UploadBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadBackend::Local => "local",
            UploadBackend::ObjectStorage => "object_storage",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "local" | "disk" => Some(UploadBackend::Local),
            "object_storage" | "s3" => Some(UploadBackend::ObjectStorage),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadSettings {
    pub backend: UploadBackend,
    /// Directory used by the local backend.
    pub dir: String,
    /// URL path the local backend serves files under.
    pub public_path: String,
    pub max_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectStorageSettings {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key: String,
    pub secret_key: String,
    pub prefix: String,
    /// Base URL the uploaded objects are publicly reachable at (CDN or bucket URL).
    pub public_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub mongo_uri: String,
    pub mongo_database: String,
    pub jwt_secret: String,
    pub jwt_ttl_seconds: i64,
    pub bind_addr: String,
    pub cors_origin: Option<String>,
    pub upload: UploadSettings,
    pub object_storage: Option<ObjectStorageSettings>,
}

const DEFAULT_UPLOAD_MAX_BYTES: usize = 5 * 1024 * 1024;
const DEFAULT_JWT_TTL_SECONDS: i64 = 7 * 24 * 3600;

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Root .env first, then fall back to the crate-local one
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // config/{env}.toml, then APP__SECTION__KEY overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", app_env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let lookup = |key: &str, var: &str| -> Option<String> {
            settings
                .get_string(key)
                .ok()
                .or_else(|| env::var(var).ok())
                .filter(|value| !value.trim().is_empty())
        };

        let mongo_uri = lookup("database.mongo_uri", "MONGO_URI")
            .unwrap_or_else(|| "mongodb://localhost:27017".to_string());

        let mongo_database =
            lookup("database.mongo_database", "MONGO_DATABASE").unwrap_or_else(|| "formforge".to_string());

        let jwt_secret = match lookup("auth.jwt_secret", "JWT_SECRET") {
            Some(secret) => secret,
            None if app_env == "prod" => {
                return Err(config::ConfigError::Message(
                    "JWT_SECRET must be set in production".to_string(),
                ))
            }
            None => {
                eprintln!("WARNING: Using default JWT_SECRET (dev mode only!)");
                "dev-secret-only-for-local-testing".to_string()
            }
        };

        let jwt_ttl_seconds = parse_or(
            lookup("auth.jwt_ttl_seconds", "JWT_TTL_SECONDS"),
            "JWT_TTL_SECONDS",
            DEFAULT_JWT_TTL_SECONDS,
        )?;

        let bind_addr =
            lookup("server.bind_addr", "BIND_ADDR").unwrap_or_else(|| "0.0.0.0:4000".to_string());

        let cors_origin = lookup("server.cors_origin", "CORS_ORIGIN");

        let backend = match lookup("upload.backend", "UPLOAD_BACKEND") {
            Some(raw) => UploadBackend::parse(&raw).ok_or_else(|| {
                config::ConfigError::Message(format!("Unknown UPLOAD_BACKEND: {}", raw))
            })?,
            None => UploadBackend::Local,
        };

        let upload = UploadSettings {
            backend,
            dir: lookup("upload.dir", "UPLOAD_DIR").unwrap_or_else(|| "uploads".to_string()),
            public_path: lookup("upload.public_path", "UPLOAD_PUBLIC_PATH")
                .unwrap_or_else(|| "/uploads".to_string()),
            max_bytes: parse_or(
                lookup("upload.max_bytes", "UPLOAD_MAX_BYTES"),
                "UPLOAD_MAX_BYTES",
                DEFAULT_UPLOAD_MAX_BYTES,
            )?,
        };

        let object_storage = match lookup("object_storage.bucket", "OBJECT_STORAGE_BUCKET") {
            Some(bucket) => Some(ObjectStorageSettings {
                bucket,
                region: lookup("object_storage.region", "OBJECT_STORAGE_REGION")
                    .unwrap_or_else(|| "us-east-1".to_string()),
                endpoint: lookup("object_storage.endpoint", "OBJECT_STORAGE_ENDPOINT"),
                access_key: lookup("object_storage.access_key", "OBJECT_STORAGE_ACCESS_KEY")
                    .unwrap_or_default(),
                secret_key: lookup("object_storage.secret_key", "OBJECT_STORAGE_SECRET_KEY")
                    .unwrap_or_default(),
                prefix: lookup("object_storage.prefix", "OBJECT_STORAGE_PREFIX")
                    .unwrap_or_else(|| "form-images".to_string()),
                public_url: lookup("object_storage.public_url", "OBJECT_STORAGE_PUBLIC_URL"),
            }),
            None => None,
        };

        if upload.backend == UploadBackend::ObjectStorage && object_storage.is_none() {
            return Err(config::ConfigError::Message(
                "UPLOAD_BACKEND=object_storage requires OBJECT_STORAGE_BUCKET".to_string(),
            ));
        }

        Ok(Config {
            mongo_uri,
            mongo_database,
            jwt_secret,
            jwt_ttl_seconds,
            bind_addr,
            cors_origin,
            upload,
            object_storage,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    raw: Option<String>,
    name: &str,
    default: T,
) -> Result<T, config::ConfigError> {
    match raw {
        Some(value) => value.trim().parse::<T>().map_err(|_| {
            config::ConfigError::Message(format!("{} has an invalid value: {}", name, value))
        }),
        None => Ok(default),
    }
}
