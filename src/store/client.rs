//! S3 API Client
//!
//! Provides signed access to a single S3 (or S3-compatible) bucket for
//! prefix listing, object download and object upload.

use chrono::Utc;
use reqwest::{Client, Method, Response, Url};
use tracing::{debug, info};

use super::errors::StoreError;
use super::signing::{self, CanonicalRequest};
use super::types::{ListBucketResult, ObjectInfo};
use super::RemoteStore;
use crate::config::{Credentials, StoreConfig};

/// S3 API client bound to one bucket
#[derive(Clone)]
pub struct S3Client {
    /// HTTP client for making requests
    http_client: Client,
    /// Signing credentials (may be incomplete)
    credentials: Credentials,
    /// Bucket name
    bucket_name: String,
    /// Signing region
    region: String,
    /// `scheme://host[:port]` requests are sent to
    origin: String,
    /// Host header value covered by the signature
    host: String,
    /// Path before the object key: empty for virtual-hosted, `/<bucket>` for path-style
    path_prefix: String,
}

impl S3Client {
    /// Create a client for the configured bucket
    ///
    /// No network call is made here, and missing credentials are not an
    /// error until the first request.
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let (origin, host, path_prefix) = match &config.endpoint {
            Some(endpoint) => {
                let url = Url::parse(endpoint).map_err(|e| {
                    StoreError::Request(format!("Invalid endpoint '{}': {}", endpoint, e))
                })?;
                let host_name = url.host_str().ok_or_else(|| {
                    StoreError::Request(format!("Endpoint '{}' has no host", endpoint))
                })?;
                let host = match url.port() {
                    Some(port) => format!("{}:{}", host_name, port),
                    None => host_name.to_string(),
                };
                let origin = format!("{}://{}", url.scheme(), host);
                (origin, host, format!("/{}", config.bucket))
            }
            None => {
                let host = format!("{}.s3.{}.amazonaws.com", config.bucket, config.region);
                (format!("https://{}", host), host, String::new())
            }
        };

        let http_client = Client::builder()
            .build()
            .map_err(|e| StoreError::Request(format!("Failed to create HTTP client: {}", e)))?;

        if config.credentials.pair().is_none() {
            debug!(bucket = %config.bucket, "S3 client created without credentials");
        }

        Ok(Self {
            http_client,
            credentials: config.credentials.clone(),
            bucket_name: config.bucket.clone(),
            region: config.region.clone(),
            origin,
            host,
            path_prefix,
        })
    }

    /// Request path for an object key
    fn object_path(&self, key: &str) -> String {
        format!("{}/{}", self.path_prefix, signing::encode_key(key))
    }

    /// Request path for bucket-level operations
    fn bucket_path(&self) -> String {
        if self.path_prefix.is_empty() {
            "/".to_string()
        } else {
            self.path_prefix.clone()
        }
    }

    /// Full URL of an object, as requests address it
    pub fn object_url(&self, key: &str) -> String {
        format!("{}{}", self.origin, self.object_path(key))
    }

    /// Sign and send a request, turning non-2xx replies into errors
    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &str,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<Response, StoreError> {
        let (access_key, secret_key) = self
            .credentials
            .pair()
            .ok_or(StoreError::MissingCredentials)?;

        let payload_sha256 = signing::sha256_hex(&body);
        let amz_date = Utc::now().format("%Y%m%dT%H%M%SZ").to_string();

        let canonical = CanonicalRequest {
            method: method.as_str(),
            uri: path,
            query,
            headers: vec![
                ("host".to_string(), self.host.clone()),
                ("x-amz-content-sha256".to_string(), payload_sha256.clone()),
                ("x-amz-date".to_string(), amz_date.clone()),
            ],
            payload_sha256: &payload_sha256,
        };
        let authorization =
            signing::authorization(access_key, secret_key, &self.region, &amz_date, &canonical);

        let url = if query.is_empty() {
            format!("{}{}", self.origin, path)
        } else {
            format!("{}{}?{}", self.origin, path, query)
        };

        let mut request = self
            .http_client
            .request(method.clone(), &url)
            .header("Authorization", authorization)
            .header("x-amz-content-sha256", &payload_sha256)
            .header("x-amz-date", &amz_date);

        if let Some(content_type) = content_type {
            request = request.header("Content-Type", content_type);
        }

        let response = request.body(body).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::from_status(status, &body));
        }

        Ok(response)
    }
}

#[async_trait::async_trait]
impl RemoteStore for S3Client {
    fn bucket_name(&self) -> &str {
        &self.bucket_name
    }

    /// List objects under a prefix, following continuation tokens
    async fn list_prefix(&self, prefix: &str) -> Result<Vec<ObjectInfo>, StoreError> {
        let path = self.bucket_path();
        let mut all_objects = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut params = vec![("list-type", "2"), ("prefix", prefix)];
            if let Some(token) = continuation.as_deref() {
                params.push(("continuation-token", token));
            }
            let query = signing::canonical_query(&params);

            debug!(prefix = prefix, continuation = ?continuation, "Listing objects from S3");

            let response = self.send(Method::GET, &path, &query, Vec::new(), None).await?;
            let body = response.text().await?;
            let page: ListBucketResult = quick_xml::de::from_str(&body)
                .map_err(|e| StoreError::Malformed(format!("ListObjectsV2: {}", e)))?;

            all_objects.extend(page.contents);

            match page.next_continuation_token {
                Some(next) if page.is_truncated => continuation = Some(next),
                _ => break,
            }
        }

        debug!(prefix = prefix, count = all_objects.len(), "Listed objects from S3");
        Ok(all_objects)
    }

    /// Download an object's content
    async fn get_object(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.object_path(key);
        debug!(key = key, "Downloading object from S3");

        let response = self.send(Method::GET, &path, "", Vec::new(), None).await?;
        let bytes = response.bytes().await?;

        info!(key = key, size = bytes.len(), "Downloaded object from S3");
        Ok(bytes.to_vec())
    }

    /// Upload an object
    async fn put_object(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError> {
        let path = self.object_path(key);
        let size = data.len();

        info!(
            key = key,
            size = size,
            content_type = content_type,
            "Uploading object to S3"
        );

        self.send(Method::PUT, &path, "", data, Some(content_type))
            .await?;

        info!(key = key, "Object uploaded to S3");
        Ok(())
    }
}
