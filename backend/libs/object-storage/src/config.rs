/// Connection settings for the supported storage backends
use serde::{Deserialize, Serialize};

/// S3-compatible backend settings (AWS S3, MinIO)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    /// Endpoint URL, e.g. `http://minio:9000`. `None` uses the AWS default resolver.
    pub endpoint: Option<String>,
    /// Region used for request signing
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Path-style addressing (`host/bucket/key`), required by MinIO
    pub path_style: bool,
}

impl S3Config {
    /// Settings for a self-hosted MinIO server.
    ///
    /// `endpoint` may be given without a scheme (`minio:9000`), in which case
    /// `secure` picks between `http` and `https`. Empty credentials fall back
    /// to the default credential chain.
    pub fn minio(endpoint: &str, access_key_id: &str, secret_access_key: &str, secure: bool) -> Self {
        let endpoint = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else if secure {
            format!("https://{}", endpoint)
        } else {
            format!("http://{}", endpoint)
        };

        Self {
            endpoint: Some(endpoint),
            region: "us-east-1".to_string(),
            access_key_id: non_empty(access_key_id),
            secret_access_key: non_empty(secret_access_key),
            path_style: true,
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Google Cloud Storage settings (service-account signed URLs)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcsConfig {
    /// Inline service account JSON
    pub service_account_json: Option<String>,
    /// Path to a service account JSON file, used when no inline JSON is given
    pub service_account_json_path: Option<String>,
    /// API host, normally `storage.googleapis.com`
    pub host: String,
}

impl Default for GcsConfig {
    fn default() -> Self {
        Self {
            service_account_json: None,
            service_account_json_path: None,
            host: "storage.googleapis.com".to_string(),
        }
    }
}
