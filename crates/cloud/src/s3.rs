//! S3 (or S3-compatible) object store.
//!
//! Non-overwriting puts send `If-None-Match: *`; the service answers
//! `412 Precondition Failed` when the key already exists, which maps to
//! [`PutOutcome::AlreadyExists`].

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

use crate::{validate_object_path, ObjectStore, PutOutcome, StorageError};

const PRECONDITION_FAILED: u16 = 412;
/// Returned by some S3-compatible services for a conflicting conditional write.
const CONFLICT: u16 = 409;

#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
    public_base_url: Option<String>,
}

impl S3ObjectStore {
    pub fn new(client: Client, public_base_url: Option<String>) -> Self {
        Self {
            client,
            public_base_url: public_base_url.map(|u| u.trim_end_matches('/').to_string()),
        }
    }

    /// Build a client from the standard AWS environment (credentials, region).
    ///
    /// `endpoint_url` points the client at an S3-compatible service and
    /// switches to path-style addressing.
    pub async fn from_env(endpoint_url: Option<String>, public_base_url: Option<String>) -> Self {
        let shared = aws_config::defaults(BehaviorVersion::latest()).load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        Self::new(Client::from_conf(builder.build()), public_base_url)
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn name(&self) -> &str {
        "s3"
    }

    async fn put(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        overwrite: bool,
    ) -> Result<PutOutcome, StorageError> {
        validate_object_path(path)?;
        let url = self.public_url(bucket, path);

        let mut request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(path)
            .body(ByteStream::from(bytes))
            .content_type(content_type);
        if !overwrite {
            request = request.if_none_match("*");
        }

        match request.send().await {
            Ok(_) => Ok(PutOutcome::Created { url }),
            Err(err) => {
                let status = err.raw_response().map(|r| r.status().as_u16());
                if !overwrite && matches!(status, Some(PRECONDITION_FAILED | CONFLICT)) {
                    tracing::debug!(bucket, path, "Object already present, keeping existing bytes");
                    return Ok(PutOutcome::AlreadyExists { url });
                }
                Err(StorageError::Backend(format!("{}", DisplayErrorContext(&err))))
            }
        }
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        public_url(self.public_base_url.as_deref(), bucket, path)
    }
}

fn public_url(base: Option<&str>, bucket: &str, path: &str) -> String {
    match base {
        Some(base) => format!("{base}/{bucket}/{path}"),
        None => format!("https://{bucket}.s3.amazonaws.com/{path}"),
    }
}
