//! Upload pipeline errors.

use super::transport::TransportError;
use thiserror::Error;
use tr_bundle::BundleError;

/// Pipeline phase, for error context and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Start,
    Presign,
    ReportUpload,
    AttachmentUpload,
    Finish,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Start => write!(f, "start"),
            Phase::Presign => write!(f, "presign"),
            Phase::ReportUpload => write!(f, "report upload"),
            Phase::AttachmentUpload => write!(f, "attachment upload"),
            Phase::Finish => write!(f, "finish"),
        }
    }
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("{phase} request failed: {source}")]
    Request {
        phase: Phase,
        #[source]
        source: TransportError,
    },

    /// The server acknowledged an attachment id but gave no URL for it.
    #[error("no presigned URL returned for attachment {id}")]
    MissingPresignedUrl { id: String },

    #[error("malformed {phase} response: {message}")]
    MalformedResponse { phase: Phase, message: String },

    #[error("cannot read attachment {id}: {source}")]
    Attachment {
        id: String,
        #[source]
        source: BundleError,
    },

    #[error("compression failed: {0}")]
    Compression(#[source] std::io::Error),

    #[error("cannot serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("OIDC token request via {provider} failed: {source}")]
    Oidc {
        provider: String,
        #[source]
        source: TransportError,
    },

    #[error("transfer task aborted: {0}")]
    TaskAborted(String),
}

impl UploadError {
    /// HTTP status of the failing request, when there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            UploadError::Request { source, .. } | UploadError::Oidc { source, .. } => {
                source.status()
            }
            _ => None,
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            UploadError::Request { source, .. } | UploadError::Oidc { source, .. } => source.url(),
            _ => None,
        }
    }

    /// Whether the failure points at a server/client contract bug rather
    /// than a transient condition.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            UploadError::MissingPresignedUrl { .. } | UploadError::MalformedResponse { .. }
        )
    }
}

impl From<UploadError> for tr_common::Error {
    fn from(err: UploadError) -> Self {
        if err.is_protocol_violation() {
            return tr_common::Error::ProtocolViolation(err.to_string());
        }
        match (err.status(), err.url()) {
            (Some(status), Some(url)) => tr_common::Error::UploadStatus {
                status,
                url: url.to_string(),
            },
            _ => tr_common::Error::UploadFailed(err.to_string()),
        }
    }
}
