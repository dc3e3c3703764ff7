//! Report synchronization pipeline.
//!
//! Four strictly sequential phases:
//!
//! 1. **Start**: open an upload and get the presigned report URL.
//! 2. **Presign**: exchange attachment ids for presigned URLs (skipped when
//!    there are no attachments).
//! 3. **Transfer**: PUT the report and every attachment concurrently.
//! 4. **Finish**: close the upload and get the report's web URL.
//!
//! Each request is retried independently on its [`BackoffSchedule`]. In safe
//! mode every failure becomes [`UploadOutcome::Failed`]; in strict mode
//! ([`UploadOptions::throw_on_failure`]) it is returned as `Err`.

pub mod api;
pub mod auth;
pub mod compress;
pub mod error;
pub mod retry;
pub mod transport;

pub use auth::{plan_credential, Credential, CredentialPlan, GithubActionsOidc, OidcTokenProvider};
pub use compress::{brotli_compress, is_compressible, DEFAULT_BROTLI_QUALITY};
pub use error::{Phase, UploadError};
pub use retry::{BackoffSchedule, ErrorClass, DEFAULT_BACKOFF_MS};
pub use transport::{PutBody, PutRequest, ReqwestTransport, TransportError, UploadTransport};

use crate::config::UploadConfig;
use api::{
    api_url, FinishRequest, FinishResponse, PresignRequest, PresignedAttachment, StartRequest,
    StartResponse, ATTACHMENTS_PATH, FINISH_PATH, START_PATH,
};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::task::JoinSet;
use tr_bundle::Attachment;
use tr_common::Report;
use tracing::{debug, error, info, warn};

const REPORT_CONTENT_TYPE: &str = "application/json";
const BROTLI_ENCODING: &str = "br";

/// Classified result of an upload.
#[derive(Debug)]
pub enum UploadOutcome {
    Success { report_url: String },
    Skipped { reason: String },
    Failed { error: UploadError },
}

impl UploadOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            UploadOutcome::Success { .. } => "success",
            UploadOutcome::Skipped { .. } => "skipped",
            UploadOutcome::Failed { .. } => "failed",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, UploadOutcome::Success { .. })
    }
}

/// Tunables for one uploader.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub endpoint: String,
    pub access_token: Option<String>,
    pub oidc_audience: Option<String>,
    pub backoff: BackoffSchedule,
    /// Strict mode: return failures as `Err` instead of `Ok(Failed)`.
    pub throw_on_failure: bool,
    pub brotli_quality: u32,
}

impl UploadOptions {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            access_token: None,
            oidc_audience: None,
            backoff: BackoffSchedule::default(),
            throw_on_failure: false,
            brotli_quality: DEFAULT_BROTLI_QUALITY,
        }
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_oidc_audience(mut self, audience: impl Into<String>) -> Self {
        self.oidc_audience = Some(audience.into());
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffSchedule) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn strict(mut self, throw_on_failure: bool) -> Self {
        self.throw_on_failure = throw_on_failure;
        self
    }
}

impl From<&UploadConfig> for UploadOptions {
    fn from(config: &UploadConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            access_token: config.access_token.clone(),
            oidc_audience: config.oidc_audience.clone(),
            backoff: BackoffSchedule::from_millis(&config.backoff_ms),
            throw_on_failure: config.throw_on_failure,
            brotli_quality: config.brotli_quality,
        }
    }
}

/// Drives the four-phase upload over an [`UploadTransport`].
pub struct ReportUploader {
    transport: Arc<dyn UploadTransport>,
    oidc: Option<Arc<dyn OidcTokenProvider>>,
    options: UploadOptions,
}

impl ReportUploader {
    pub fn new(transport: Arc<dyn UploadTransport>, options: UploadOptions) -> Self {
        Self {
            transport,
            oidc: None,
            options,
        }
    }

    pub fn with_oidc(mut self, provider: Arc<dyn OidcTokenProvider>) -> Self {
        self.oidc = Some(provider);
        self
    }

    pub fn options(&self) -> &UploadOptions {
        &self.options
    }

    /// Upload a report and its attachments.
    ///
    /// Returns `Err` only in strict mode; otherwise every failure is folded
    /// into [`UploadOutcome::Failed`].
    pub async fn upload(
        &self,
        report: &Report,
        attachments: &[Attachment],
    ) -> Result<UploadOutcome, UploadError> {
        let outcome = match self.run(report, attachments).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(
                    status = err.status(),
                    url = err.url(),
                    error = %err,
                    "Report upload failed"
                );
                if self.options.throw_on_failure {
                    return Err(err);
                }
                return Ok(UploadOutcome::Failed { error: err });
            }
        };

        match &outcome {
            UploadOutcome::Success { report_url } => info!(url = %report_url, "Report uploaded"),
            UploadOutcome::Skipped { reason } => warn!(reason = %reason, "Report upload skipped"),
            UploadOutcome::Failed { .. } => {}
        }
        Ok(outcome)
    }

    async fn run(
        &self,
        report: &Report,
        attachments: &[Attachment],
    ) -> Result<UploadOutcome, UploadError> {
        let credential = match self.credential().await? {
            Some(credential) => credential,
            None => {
                let reason = match self.plan() {
                    CredentialPlan::Skip { reason } => reason,
                    _ => "no credentials available",
                };
                return Ok(UploadOutcome::Skipped {
                    reason: reason.to_string(),
                });
            }
        };
        let bearer = credential.bearer();

        let start: StartResponse = self
            .post(
                Phase::Start,
                START_PATH,
                bearer,
                &serde_json::to_value(StartRequest {
                    category: &report.category,
                    commit_id: &report.commit_id,
                })?,
            )
            .await?;
        debug!(web_url = ?start.web_url, "Upload started");

        let unique = unique_attachments(attachments);
        let presigned = if unique.is_empty() {
            HashMap::new()
        } else {
            self.presign(bearer, &start.upload_token, &unique).await?
        };

        self.transfer(report, &start.presigned_report_url, &unique, &presigned)
            .await?;

        let finish: FinishResponse = self
            .post(
                Phase::Finish,
                FINISH_PATH,
                bearer,
                &serde_json::to_value(FinishRequest {
                    upload_token: &start.upload_token,
                })?,
            )
            .await?;

        Ok(UploadOutcome::Success {
            report_url: finish.web_url,
        })
    }

    fn plan(&self) -> CredentialPlan<'_> {
        plan_credential(
            self.options.access_token.as_deref(),
            self.options.oidc_audience.as_deref(),
            self.oidc.is_some(),
        )
    }

    async fn credential(&self) -> Result<Option<Credential>, UploadError> {
        match (self.plan(), &self.oidc) {
            (CredentialPlan::Token(token), _) => Ok(Some(Credential::AccessToken(token.to_string()))),
            (CredentialPlan::Oidc { audience }, Some(provider)) => {
                let token = provider
                    .id_token(audience)
                    .await
                    .map_err(|source| UploadError::Oidc {
                        provider: provider.name().to_string(),
                        source,
                    })?;
                Ok(Some(Credential::Oidc {
                    provider: provider.name().to_string(),
                    token,
                }))
            }
            _ => Ok(None),
        }
    }

    async fn post<T: DeserializeOwned>(
        &self,
        phase: Phase,
        path: &str,
        bearer: &str,
        body: &serde_json::Value,
    ) -> Result<T, UploadError> {
        let url = api_url(&self.options.endpoint, path);
        let label = phase.to_string();
        let value = self
            .options
            .backoff
            .retry(&label, || self.transport.post_json(&url, bearer, body))
            .await
            .map_err(|source| UploadError::Request { phase, source })?;

        serde_json::from_value(value).map_err(|e| UploadError::MalformedResponse {
            phase,
            message: e.to_string(),
        })
    }

    async fn presign(
        &self,
        bearer: &str,
        upload_token: &str,
        attachments: &[&Attachment],
    ) -> Result<HashMap<String, String>, UploadError> {
        let request = PresignRequest {
            upload_token,
            attachment_ids: attachments.iter().map(|a| a.id().as_str()).collect(),
        };
        let entries: Vec<PresignedAttachment> = self
            .post(
                Phase::Presign,
                ATTACHMENTS_PATH,
                bearer,
                &serde_json::to_value(request)?,
            )
            .await?;

        let mut urls = HashMap::with_capacity(entries.len());
        for entry in entries {
            if let Some(url) = entry.presigned_url {
                urls.insert(entry.attachment_id, url);
            }
        }
        for attachment in attachments {
            if !urls.contains_key(attachment.id().as_str()) {
                return Err(UploadError::MissingPresignedUrl {
                    id: attachment.id().to_string(),
                });
            }
        }
        Ok(urls)
    }

    async fn transfer(
        &self,
        report: &Report,
        report_url: &str,
        attachments: &[&Attachment],
        presigned: &HashMap<String, String>,
    ) -> Result<(), UploadError> {
        let mut tasks = JoinSet::new();

        let report_body = prepare_report(report, self.options.brotli_quality)?;
        self.spawn_put(&mut tasks, Phase::ReportUpload, report_url.to_string(), report_body);

        for attachment in attachments {
            let url = presigned
                .get(attachment.id().as_str())
                .cloned()
                .ok_or_else(|| UploadError::MissingPresignedUrl {
                    id: attachment.id().to_string(),
                })?;
            let request = prepare_attachment(attachment, self.options.brotli_quality)?;
            self.spawn_put(&mut tasks, Phase::AttachmentUpload, url, request);
        }

        debug!(transfers = tasks.len(), "Transfers started");
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(err)) => return Err(err),
                Err(join) => return Err(UploadError::TaskAborted(join.to_string())),
            }
        }
        Ok(())
    }

    fn spawn_put(
        &self,
        tasks: &mut JoinSet<Result<(), UploadError>>,
        phase: Phase,
        url: String,
        request: PutRequest,
    ) {
        let transport = Arc::clone(&self.transport);
        let backoff = self.options.backoff.clone();
        tasks.spawn(async move {
            backoff
                .retry(&phase.to_string(), || transport.put(&url, &request))
                .await
                .map_err(|source| UploadError::Request { phase, source })
        });
    }
}

/// One entry per distinct attachment id, first occurrence wins.
fn unique_attachments(attachments: &[Attachment]) -> Vec<&Attachment> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut unique = Vec::with_capacity(attachments.len());
    for attachment in attachments {
        if seen.insert(attachment.id().as_str()) {
            unique.push(attachment);
        }
    }
    unique
}

fn prepare_report(report: &Report, quality: u32) -> Result<PutRequest, UploadError> {
    let json = serde_json::to_vec(report)?;
    let compressed = brotli_compress(&json, quality).map_err(UploadError::Compression)?;
    debug!(raw = json.len(), compressed = compressed.len(), "Report body prepared");
    Ok(PutRequest {
        content_type: REPORT_CONTENT_TYPE.to_string(),
        content_encoding: Some(BROTLI_ENCODING),
        body: PutBody::Bytes(Bytes::from(compressed)),
    })
}

/// Textual payloads are compressed in memory, other files stream from disk
/// and other buffers are sent as they are.
fn prepare_attachment(attachment: &Attachment, quality: u32) -> Result<PutRequest, UploadError> {
    let content_type = attachment.content_type().to_string();
    let read_err = |source| UploadError::Attachment {
        id: attachment.id().to_string(),
        source,
    };

    if is_compressible(&content_type) {
        let raw = attachment.read_all().map_err(read_err)?;
        let compressed = brotli_compress(&raw, quality).map_err(UploadError::Compression)?;
        return Ok(PutRequest {
            content_type,
            content_encoding: Some(BROTLI_ENCODING),
            body: PutBody::Bytes(Bytes::from(compressed)),
        });
    }

    let body = match attachment {
        Attachment::File { path, .. } => PutBody::File {
            path: path.clone(),
            len: attachment.len().map_err(read_err)?,
        },
        Attachment::Buffer { body, .. } => PutBody::Bytes(Bytes::copy_from_slice(body)),
    };
    Ok(PutRequest {
        content_type,
        content_encoding: None,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_attachments_first_wins() {
        let a = Attachment::from_buffer(b"x".to_vec(), "text/plain");
        let b = Attachment::from_buffer(b"x".to_vec(), "application/octet-stream");
        let c = Attachment::from_buffer(b"y".to_vec(), "image/png");
        let all = [a, b, c];
        let unique = unique_attachments(&all);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].content_type(), "text/plain");
    }

    #[test]
    fn test_binary_buffer_sent_raw() {
        let png = Attachment::from_buffer(vec![0x89, b'P', b'N', b'G'], "image/png");
        let request = prepare_attachment(&png, 5).unwrap();
        assert_eq!(request.content_encoding, None);
        assert_eq!(request.body, PutBody::Bytes(Bytes::from_static(&[0x89, b'P', b'N', b'G'])));
    }

    #[test]
    fn test_text_buffer_compressed() {
        let log = Attachment::from_buffer("line\n".repeat(100).into_bytes(), "text/plain");
        let request = prepare_attachment(&log, 5).unwrap();
        assert_eq!(request.content_encoding, Some("br"));
        assert!(request.body.len() < 500);
    }

    #[test]
    fn test_binary_file_streamed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, &[0u8; 1024]).unwrap();
        let video = Attachment::from_path(file.path(), "video/webm").unwrap();

        let request = prepare_attachment(&video, 5).unwrap();
        assert_eq!(
            request.body,
            PutBody::File {
                path: file.path().to_path_buf(),
                len: 1024
            }
        );
    }

    #[test]
    fn test_text_file_read_and_compressed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, "stdout line\n".repeat(200).as_bytes()).unwrap();
        let log = Attachment::from_path(file.path(), "text/plain").unwrap();

        let request = prepare_attachment(&log, 5).unwrap();
        assert_eq!(request.content_encoding, Some("br"));
        assert_eq!(request.content_type, "text/plain");
        match request.body {
            PutBody::Bytes(bytes) => assert!(!bytes.is_empty() && bytes.len() < 2400),
            other => panic!("text file should be buffered, got {other:?}"),
        }
    }

    #[test]
    fn test_report_always_compressed() {
        let request = prepare_report(&Report::new("pytest", "abc"), 5).unwrap();
        assert_eq!(request.content_type, "application/json");
        assert_eq!(request.content_encoding, Some("br"));
    }

    #[test]
    fn test_options_from_config() {
        let config = UploadConfig {
            access_token: Some("tok".into()),
            backoff_ms: vec![1, 2],
            throw_on_failure: true,
            ..UploadConfig::default()
        };
        let options = UploadOptions::from(&config);
        assert_eq!(options.backoff.attempts(), 3);
        assert!(options.throw_on_failure);
        assert_eq!(options.access_token.as_deref(), Some("tok"));
    }
}
