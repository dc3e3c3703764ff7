//! Identifier types.
//!
//! Attachments are content-addressed: an [`AttachmentId`] is the lowercase hex
//! SHA-1 of the attachment bytes, so two attachments with equal content share
//! one id and are stored and uploaded once.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Length of a hex-encoded SHA-1 digest.
pub const ATTACHMENT_ID_LEN: usize = 40;

/// Content-addressed attachment identifier.
///
/// Deserialization goes through [`AttachmentId::parse`], so an id read from
/// `report.json` is always 40 lowercase hex characters and safe to use as a
/// file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AttachmentId(String);

/// A string that is not a 40-character hex SHA-1.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid attachment id '{0}': expected 40 hex characters")]
pub struct InvalidAttachmentId(pub String);

impl AttachmentId {
    /// Build an id from a raw SHA-1 digest.
    pub fn from_digest(digest: &[u8; 20]) -> Self {
        AttachmentId(hex::encode(digest))
    }

    /// Parse and validate an id string.
    ///
    /// Accepts exactly 40 hex characters; uppercase input is normalized to
    /// lowercase so ids compare equal regardless of how they were written.
    pub fn parse(s: &str) -> Option<Self> {
        if s.len() != ATTACHMENT_ID_LEN || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        Some(AttachmentId(s.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AttachmentId {
    type Error = InvalidAttachmentId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        AttachmentId::parse(&value).ok_or(InvalidAttachmentId(value))
    }
}

impl From<AttachmentId> for String {
    fn from(id: AttachmentId) -> Self {
        id.0
    }
}

impl fmt::Display for AttachmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for AttachmentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifier for one CLI invocation, used to correlate log lines.
///
/// Format: `run-XXXXXXXXXXXX` (12 hex chars of a v4 UUID).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        let uuid = uuid::Uuid::new_v4().simple().to_string();
        RunId(format!("run-{}", &uuid[..12]))
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_id_parse() {
        let id = AttachmentId::parse("DA39A3EE5E6B4B0D3255BFEF95601890AFD80709").unwrap();
        assert_eq!(id.as_str(), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
        assert!(AttachmentId::parse("da39a3").is_none());
        assert!(AttachmentId::parse("zz39a3ee5e6b4b0d3255bfef95601890afd80709").is_none());
    }

    #[test]
    fn test_attachment_id_from_digest() {
        let id = AttachmentId::from_digest(&[0xab; 20]);
        assert_eq!(id.as_str().len(), ATTACHMENT_ID_LEN);
        assert!(id.as_str().starts_with("abab"));
    }

    #[test]
    fn test_attachment_id_serializes_as_string() {
        let id = AttachmentId::from_digest(&[0; 20]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", "0".repeat(40)));
    }

    #[test]
    fn test_attachment_id_deserialize_validates() {
        let id: AttachmentId =
            serde_json::from_str("\"DA39A3EE5E6B4B0D3255BFEF95601890AFD80709\"").unwrap();
        assert_eq!(id.as_str(), "da39a3ee5e6b4b0d3255bfef95601890afd80709");

        for bad in ["\"../secret.txt\"", "\"da39a3\"", "\"\""] {
            let err = serde_json::from_str::<AttachmentId>(bad).unwrap_err();
            assert!(err.to_string().contains("invalid attachment id"), "{bad}: {err}");
        }
    }

    #[test]
    fn test_run_id_format() {
        let id = RunId::new();
        assert!(id.0.starts_with("run-"));
        assert_eq!(id.0.len(), 16);
    }
}
