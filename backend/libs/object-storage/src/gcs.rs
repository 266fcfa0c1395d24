/// Google Cloud Storage object store
///
/// Talks to the GCS XML API through V4 signed URLs generated from a service
/// account key, so no extra auth SDK is needed.
use async_trait::async_trait;
use futures::TryStreamExt;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use sha2::{Digest, Sha256};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::body::ObjectBody;
use crate::config::GcsConfig;
use crate::error::{StorageError, StorageResult};
use crate::ObjectStore;

/// Characters that must be percent-encoded in the path component
const PATH_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

const SIGNED_URL_TTL: Duration = Duration::from_secs(300);

#[derive(serde::Deserialize)]
struct ServiceAccount {
    client_email: String,
    private_key: String,
}

/// Credentials and HTTP client shared by every GCS bucket handle
pub struct GcsClient {
    client_email: String,
    private_key: RsaPrivateKey,
    host: String,
    http_client: Client,
}

impl GcsClient {
    pub fn from_config(cfg: &GcsConfig) -> StorageResult<Self> {
        let raw_json = if let Some(ref inline) = cfg.service_account_json {
            inline.clone()
        } else if let Some(ref path) = cfg.service_account_json_path {
            std::fs::read_to_string(path).map_err(|e| {
                StorageError::Config(format!(
                    "Failed to read GCS service account JSON at {}: {e}",
                    path
                ))
            })?
        } else {
            return Err(StorageError::Config(
                "GCS backend selected but no service account JSON provided".into(),
            ));
        };

        Self::from_service_account_json(&raw_json, &cfg.host)
    }

    pub fn from_service_account_json(raw_json: &str, host: &str) -> StorageResult<Self> {
        let sa: ServiceAccount = serde_json::from_str(raw_json)
            .map_err(|e| StorageError::Config(format!("Invalid service account JSON: {e}")))?;

        let private_key = RsaPrivateKey::from_pkcs8_pem(&sa.private_key).map_err(|e| {
            StorageError::Config(format!("Failed to parse service account private key: {e}"))
        })?;

        // No overall timeout: bodies are streamed and may be large.
        let http_client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| StorageError::Config(format!("Failed to create HTTP client: {e}")))?;

        info!(client_email = %sa.client_email, host = %host, "GCS client initialized");

        Ok(Self {
            client_email: sa.client_email,
            private_key,
            host: host.to_string(),
            http_client,
        })
    }

    /// Generate a V4 signed URL for `method` on `bucket/object_path`
    pub fn sign_url(
        &self,
        method: &str,
        bucket: &str,
        object_path: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        let now = chrono::Utc::now();
        let datestamp = now.format("%Y%m%d").to_string();
        let timestamp = now.format("%Y%m%dT%H%M%SZ").to_string();

        let credential_scope = format!("{datestamp}/auto/storage/goog4_request");
        let credential = format!("{}/{}", self.client_email, credential_scope);

        let encoded_object = utf8_percent_encode(object_path.trim_start_matches('/'), PATH_SET);
        let canonical_uri = format!("/{}/{}", bucket, encoded_object);

        let mut query_items = [
            ("X-Goog-Algorithm", "GOOG4-RSA-SHA256".to_string()),
            ("X-Goog-Credential", urlencoding::encode(&credential).into_owned()),
            ("X-Goog-Date", timestamp.clone()),
            ("X-Goog-Expires", expires_in.as_secs().to_string()),
            ("X-Goog-SignedHeaders", "host".to_string()),
        ];
        query_items.sort_by(|a, b| a.0.cmp(b.0));
        let canonical_query = query_items
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");

        let canonical_request = format!(
            "{method}\n{canonical_uri}\n{canonical_query}\nhost:{}\n\nhost\nUNSIGNED-PAYLOAD",
            self.host
        );
        let canonical_hash = hex::encode(Sha256::digest(canonical_request.as_bytes()));
        let string_to_sign =
            format!("GOOG4-RSA-SHA256\n{timestamp}\n{credential_scope}\n{canonical_hash}");

        let signing_key = SigningKey::<Sha256>::new(self.private_key.clone());
        let signature = hex::encode(signing_key.sign(string_to_sign.as_bytes()).to_bytes());

        Ok(format!(
            "https://{}{canonical_uri}?{canonical_query}&X-Goog-Signature={signature}",
            self.host
        ))
    }
}

/// One GCS bucket
#[derive(Clone)]
pub struct GcsObjectStore {
    client: Arc<GcsClient>,
    bucket: String,
}

impl GcsObjectStore {
    pub fn new(client: Arc<GcsClient>, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    async fn put(&self, key: &str, body: ObjectBody) -> StorageResult<()> {
        let signed_url = self.client.sign_url("PUT", &self.bucket, key, SIGNED_URL_TTL)?;

        let mut request = self.client.http_client.put(&signed_url);
        if let Some(content_type) = body.content_type() {
            request = request.header(CONTENT_TYPE, content_type);
        }
        if let Some(len) = body.content_length() {
            request = request.header(CONTENT_LENGTH, len);
        }

        let response = request
            .body(reqwest::Body::wrap_stream(body.into_stream()))
            .send()
            .await
            .map_err(|e| StorageError::Backend(format!("GCS upload failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(StorageError::Backend(format!(
                "GCS upload of {}/{} failed with status {}: {}",
                self.bucket, key, status, detail
            )));
        }

        debug!(bucket = %self.bucket, key = %key, "Uploaded object to GCS");
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<ObjectBody> {
        let signed_url = self.client.sign_url("GET", &self.bucket, key, SIGNED_URL_TTL)?;

        let response = self
            .client
            .http_client
            .get(&signed_url)
            .send()
            .await
            .map_err(|e| StorageError::Backend(format!("GCS download failed: {e}")))?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => return Err(StorageError::not_found(&self.bucket, key)),
            status => {
                let detail = response.text().await.unwrap_or_default();
                return Err(StorageError::Backend(format!(
                    "GCS download of {}/{} failed with status {}: {}",
                    self.bucket, key, status, detail
                )));
            }
        }

        let content_length = response.content_length();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let chunks = response
            .bytes_stream()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e));

        let mut object = ObjectBody::from_stream(chunks);
        if let Some(len) = content_length {
            object = object.with_content_length(len);
        }
        if let Some(content_type) = content_type {
            object = object.with_content_type(content_type);
        }
        Ok(object)
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_service_account_is_config_error() {
        let result = GcsClient::from_config(&GcsConfig::default());
        assert!(matches!(result, Err(StorageError::Config(_))));
    }

    #[test]
    fn test_invalid_service_account_json() {
        let result = GcsClient::from_service_account_json("{not json", "storage.googleapis.com");
        assert!(matches!(result, Err(StorageError::Config(_))));
    }

    #[test]
    fn test_path_set_keeps_separators() {
        let encoded = utf8_percent_encode("thumbs/photo 1_100.jpg", PATH_SET).to_string();
        assert_eq!(encoded, "thumbs/photo%201_100.jpg");
    }
}
