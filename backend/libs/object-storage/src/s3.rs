/// S3-compatible object store (AWS S3, MinIO)
use async_trait::async_trait;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use futures::stream;
use std::io;
use std::sync::Arc;
use tracing::{debug, info};

use crate::body::ObjectBody;
use crate::config::S3Config;
use crate::error::{StorageError, StorageResult};
use crate::ObjectStore;

/// Build an S3 client from configuration.
///
/// Falls back to the default credential chain when no static keys are given.
pub async fn build_client(config: &S3Config) -> Client {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(config.region.clone()));

    if let (Some(access_key_id), Some(secret_access_key)) =
        (&config.access_key_id, &config.secret_access_key)
    {
        let credentials = Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            "thumbs_service_static",
        );
        loader = loader.credentials_provider(credentials);
    }

    if let Some(endpoint) = &config.endpoint {
        loader = loader.endpoint_url(endpoint);
    }

    let sdk_config = loader.load().await;
    let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
        .force_path_style(config.path_style)
        .build();

    info!(
        endpoint = config.endpoint.as_deref().unwrap_or("aws-default"),
        region = %config.region,
        path_style = config.path_style,
        "S3 client initialized"
    );

    Client::from_conf(s3_config)
}

/// One bucket on an S3-compatible server.
///
/// Several stores may share a single [`Client`].
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Arc<Client>,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: Arc<Client>, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, key: &str, body: ObjectBody) -> StorageResult<()> {
        // PutObject needs a sized body, so the payload is buffered here.
        let content_type = body.content_type().map(str::to_string);
        let data = body.collect().await?;
        let size = data.len();

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data));
        if let Some(content_type) = content_type {
            request = request.content_type(content_type);
        }

        request.send().await.map_err(|e| {
            StorageError::Backend(format!(
                "S3 upload of {}/{} failed: {}",
                self.bucket,
                key,
                DisplayErrorContext(&e)
            ))
        })?;

        debug!(bucket = %self.bucket, key = %key, size, "Uploaded object to S3");
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<ObjectBody> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let status = e.raw_response().map(|r| r.status().as_u16());
                let context = DisplayErrorContext(&e).to_string();
                if status == Some(404) || e.into_service_error().is_no_such_key() {
                    StorageError::not_found(&self.bucket, key)
                } else {
                    StorageError::Backend(format!(
                        "S3 download of {}/{} failed: {}",
                        self.bucket, key, context
                    ))
                }
            })?;

        let content_length = output.content_length().and_then(|len| u64::try_from(len).ok());
        let content_type = output.content_type().map(str::to_string);

        let chunks = stream::unfold(output.body, |mut body| async move {
            body.next()
                .await
                .map(|chunk| (chunk.map_err(|e| io::Error::new(io::ErrorKind::Other, e)), body))
        });

        let mut object = ObjectBody::from_stream(chunks);
        if let Some(len) = content_length {
            object = object.with_content_length(len);
        }
        if let Some(content_type) = content_type {
            object = object.with_content_type(content_type);
        }

        debug!(bucket = %self.bucket, key = %key, "Opened S3 object");
        Ok(object)
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}
