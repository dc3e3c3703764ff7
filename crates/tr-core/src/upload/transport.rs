//! HTTP transport seam for the upload pipeline.
//!
//! [`UploadTransport`] is the only place the pipeline touches the network.
//! [`ReqwestTransport`] is the production implementation; tests substitute a
//! scripted one.

use super::retry::ErrorClass;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio_util::io::ReaderStream;

/// A single failed request.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("invalid response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("cannot read request body {path}: {source}")]
    Body {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TransportError {
    pub fn classify(&self) -> ErrorClass {
        match self {
            TransportError::Network(_) | TransportError::Status { .. } => ErrorClass::Retryable,
            TransportError::Decode { .. } | TransportError::Body { .. } => ErrorClass::Permanent,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            TransportError::Status { url, .. } | TransportError::Decode { url, .. } => Some(url),
            _ => None,
        }
    }
}

/// Payload of a PUT request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutBody {
    /// In-memory bytes; cloning is cheap.
    Bytes(Bytes),
    /// Streamed from disk. The file is reopened for every attempt.
    File { path: PathBuf, len: u64 },
}

impl PutBody {
    pub fn len(&self) -> u64 {
        match self {
            PutBody::Bytes(bytes) => bytes.len() as u64,
            PutBody::File { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A PUT to a presigned URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutRequest {
    pub content_type: String,
    pub content_encoding: Option<&'static str>,
    pub body: PutBody,
}

#[async_trait]
pub trait UploadTransport: Send + Sync {
    /// POST a JSON body with bearer auth and return the decoded JSON response.
    async fn post_json(
        &self,
        url: &str,
        bearer: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, TransportError>;

    /// PUT a payload to a presigned URL.
    async fn put(&self, url: &str, request: &PutRequest) -> Result<(), TransportError>;
}

/// Transport backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("testrelay/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

fn check_status(response: &reqwest::Response, url: &str) -> Result<(), TransportError> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(TransportError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl UploadTransport for ReqwestTransport {
    async fn post_json(
        &self,
        url: &str,
        bearer: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, TransportError> {
        let response = self
            .client
            .post(url)
            .bearer_auth(bearer)
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        check_status(&response, url)?;

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| TransportError::Decode {
                url: url.to_string(),
                message: e.to_string(),
            })
    }

    async fn put(&self, url: &str, request: &PutRequest) -> Result<(), TransportError> {
        let mut builder = self
            .client
            .put(url)
            .header(CONTENT_TYPE, request.content_type.as_str());
        if let Some(encoding) = request.content_encoding {
            builder = builder.header(CONTENT_ENCODING, encoding);
        }

        builder = match &request.body {
            PutBody::Bytes(bytes) => builder.body(bytes.clone()),
            PutBody::File { path, len } => {
                let file = tokio::fs::File::open(path)
                    .await
                    .map_err(|source| TransportError::Body {
                        path: path.clone(),
                        source,
                    })?;
                builder
                    .header(CONTENT_LENGTH, *len)
                    .body(reqwest::Body::wrap_stream(ReaderStream::new(file)))
            }
        };

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        check_status(&response, url)
    }
}
