//! Minimal S3-compatible client for form images: signed PUT and DELETE of
//! single objects (AWS Signature V4, path-style addressing).

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{Client, Method, StatusCode};
use sha2::{Digest, Sha256};
use url::Url;

use crate::config::ObjectStorageSettings;

type HmacSha256 = Hmac<Sha256>;

const AWS_URI_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

const EMPTY_PAYLOAD_SHA256: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

#[derive(Clone, Debug)]
pub struct ObjectStorageClient {
    http: Client,
    bucket: String,
    region: String,
    endpoint: Url,
    access_key: String,
    secret_key: String,
    prefix: String,
    public_base: String,
}

/// Headers that go on a signed request.
struct SignedHeaders {
    authorization: String,
    amz_date: String,
    payload_hash: String,
}

impl ObjectStorageClient {
    pub fn new(settings: ObjectStorageSettings) -> Result<Self> {
        let endpoint = settings
            .endpoint
            .unwrap_or_else(|| format!("https://s3.{}.amazonaws.com", settings.region));

        let endpoint = Url::parse(&endpoint).context("Invalid object storage endpoint URL")?;
        if endpoint.host_str().is_none() {
            bail!("Object storage endpoint must include a host");
        }

        let app_env = std::env::var("APP_ENV").unwrap_or_else(|_| "prod".to_string());
        if app_env == "prod" && endpoint.scheme() != "https" {
            bail!(
                "Object storage endpoint must use HTTPS in production mode. Got: {}",
                endpoint.scheme()
            );
        }

        if endpoint.scheme() != "https" && endpoint.scheme() != "http" {
            bail!(
                "Invalid endpoint scheme: {}. Must be http or https.",
                endpoint.scheme()
            );
        }

        let public_base = settings
            .public_url
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| {
                format!(
                    "{}/{}",
                    endpoint.as_str().trim_end_matches('/'),
                    settings.bucket
                )
            });

        Ok(Self {
            http: Client::new(),
            bucket: settings.bucket,
            region: settings.region,
            access_key: settings.access_key,
            secret_key: settings.secret_key,
            endpoint,
            prefix: sanitize_prefix(&settings.prefix),
            public_base,
        })
    }

    pub async fn upload_bytes(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        let object_key = self.full_key(key);
        let payload_hash = hex::encode(Sha256::digest(&bytes));
        let signed = self.sign(&Method::PUT, &object_key, payload_hash, Utc::now())?;

        self.http
            .put(self.object_url(&object_key))
            .header("Authorization", signed.authorization)
            .header("x-amz-date", signed.amz_date)
            .header("x-amz-content-sha256", signed.payload_hash)
            .header("content-type", content_type)
            .body(bytes)
            .send()
            .await
            .with_context(|| format!("Failed to upload object {}", object_key))?
            .error_for_status()
            .context("Object storage upload returned error status")?;

        tracing::debug!(bucket = %self.bucket, key = %object_key, "Object uploaded");
        Ok(())
    }

    /// Returns `false` when the object did not exist.
    ///
    /// Plain S3 answers 204 for missing keys too, so the existence check is a
    /// signed HEAD first.
    pub async fn delete_object(&self, key: &str) -> Result<bool> {
        let object_key = self.full_key(key);

        let head = self.signed_request(Method::HEAD, &object_key)?;
        let status = head
            .send()
            .await
            .with_context(|| format!("Failed to look up object {}", object_key))?
            .status();
        if status == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !status.is_success() {
            bail!("Object storage HEAD returned {}", status);
        }

        self.signed_request(Method::DELETE, &object_key)?
            .send()
            .await
            .with_context(|| format!("Failed to delete object {}", object_key))?
            .error_for_status()
            .context("Object storage delete returned error status")?;

        tracing::debug!(bucket = %self.bucket, key = %object_key, "Object deleted");
        Ok(true)
    }

    /// URL clients use to fetch the object.
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base, encode_key(&self.full_key(key)))
    }

    fn signed_request(&self, method: Method, object_key: &str) -> Result<reqwest::RequestBuilder> {
        let signed = self.sign(
            &method,
            object_key,
            EMPTY_PAYLOAD_SHA256.to_string(),
            Utc::now(),
        )?;
        Ok(self
            .http
            .request(method, self.object_url(object_key))
            .header("Authorization", signed.authorization)
            .header("x-amz-date", signed.amz_date)
            .header("x-amz-content-sha256", signed.payload_hash))
    }

    fn sign(
        &self,
        method: &Method,
        object_key: &str,
        payload_hash: String,
        now: DateTime<Utc>,
    ) -> Result<SignedHeaders> {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date_stamp = now.format("%Y%m%d").to_string();
        let scope = format!("{}/{}/s3/aws4_request", date_stamp, self.region);

        let host = self.host_header()?;
        let canonical_headers = format!(
            "host:{}\nx-amz-content-sha256:{}\nx-amz-date:{}\n",
            host, payload_hash, amz_date
        );
        let signed_headers = "host;x-amz-content-sha256;x-amz-date";

        let canonical_request = format!(
            "{}\n{}\n\n{}\n{}\n{}",
            method.as_str(),
            self.canonical_uri(object_key),
            canonical_headers,
            signed_headers,
            payload_hash
        );

        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            amz_date,
            scope,
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let signing_key = derive_signing_key(&self.secret_key, &date_stamp, &self.region, "s3")?;
        let signature = hex::encode(hmac_sign(&signing_key, string_to_sign.as_bytes())?);

        Ok(SignedHeaders {
            authorization: format!(
                "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
                self.access_key, scope, signed_headers, signature
            ),
            amz_date,
            payload_hash,
        })
    }

    /// Host as signed: includes a non-default port, as reqwest sends it.
    fn host_header(&self) -> Result<String> {
        let host = self
            .endpoint
            .host_str()
            .ok_or_else(|| anyhow!("Object storage endpoint missing host"))?
            .to_lowercase();
        Ok(match self.endpoint.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host,
        })
    }

    fn object_url(&self, object_key: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.set_path(&format!("{}/{}", self.bucket, encode_key(object_key)));
        url
    }

    fn full_key(&self, key: &str) -> String {
        let cleaned = key.trim_matches('/');
        if self.prefix.is_empty() {
            cleaned.to_string()
        } else {
            format!("{}/{}", self.prefix, cleaned)
        }
    }

    fn canonical_uri(&self, key: &str) -> String {
        format!("/{}/{}", self.bucket, encode_key(key))
    }
}

fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| utf8_percent_encode(segment, AWS_URI_ENCODE_SET).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

fn sanitize_prefix(prefix: &str) -> String {
    prefix
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

fn derive_signing_key(secret: &str, date: &str, region: &str, service: &str) -> Result<Vec<u8>> {
    let mut key = hmac_sign(format!("AWS4{}", secret).as_bytes(), date)?;
    key = hmac_sign(&key, region)?;
    key = hmac_sign(&key, service)?;
    hmac_sign(&key, b"aws4_request")
}

fn hmac_sign(key: &[u8], message: impl AsRef<[u8]>) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key).context("Invalid HMAC key")?;
    mac.update(message.as_ref());
    Ok(mac.finalize().into_bytes().to_vec())
}
