//! Content-addressed attachment payloads.
//!
//! An attachment is either backed by a file on disk or by an in-memory
//! buffer. Both carry the SHA-1 of their bytes as [`AttachmentId`], so equal
//! content resolves to the same id no matter where it came from.

use crate::Result;
use sha1::{Digest, Sha1};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tr_common::{AttachmentId, AttachmentRef};

const HASH_CHUNK_BYTES: usize = 64 * 1024;

/// Attachment payload ready to be stored or uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attachment {
    /// Bytes live in a file and are streamed on demand.
    File {
        id: AttachmentId,
        content_type: String,
        path: PathBuf,
    },
    /// Bytes are held in memory.
    Buffer {
        id: AttachmentId,
        content_type: String,
        body: Vec<u8>,
    },
}

impl Attachment {
    /// Hash a file and build a file-backed attachment.
    ///
    /// The file is read in chunks, never fully buffered.
    pub fn from_path(path: impl Into<PathBuf>, content_type: impl Into<String>) -> Result<Self> {
        let path = path.into();
        let id = hash_file(&path)?;
        Ok(Attachment::File {
            id,
            content_type: content_type.into(),
            path,
        })
    }

    /// File-backed attachment whose id is already known (e.g. named by id on disk).
    pub fn from_known_file(
        id: AttachmentId,
        path: impl Into<PathBuf>,
        content_type: impl Into<String>,
    ) -> Self {
        Attachment::File {
            id,
            content_type: content_type.into(),
            path: path.into(),
        }
    }

    /// Hash a buffer and build a buffer-backed attachment.
    pub fn from_buffer(body: impl Into<Vec<u8>>, content_type: impl Into<String>) -> Self {
        let body = body.into();
        let id = hash_bytes(&body);
        Attachment::Buffer {
            id,
            content_type: content_type.into(),
            body,
        }
    }

    pub fn id(&self) -> &AttachmentId {
        match self {
            Attachment::File { id, .. } | Attachment::Buffer { id, .. } => id,
        }
    }

    pub fn content_type(&self) -> &str {
        match self {
            Attachment::File { content_type, .. } | Attachment::Buffer { content_type, .. } => {
                content_type
            }
        }
    }

    /// Size of the payload in bytes.
    pub fn len(&self) -> Result<u64> {
        match self {
            Attachment::File { path, .. } => Ok(std::fs::metadata(path)?.len()),
            Attachment::Buffer { body, .. } => Ok(body.len() as u64),
        }
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Read the full payload into memory.
    pub fn read_all(&self) -> Result<Vec<u8>> {
        match self {
            Attachment::File { path, .. } => Ok(std::fs::read(path)?),
            Attachment::Buffer { body, .. } => Ok(body.clone()),
        }
    }

    /// Reference to embed in a run attempt.
    pub fn to_ref(&self, name: impl Into<String>) -> AttachmentRef {
        AttachmentRef {
            name: name.into(),
            content_type: self.content_type().to_string(),
            id: self.id().clone(),
        }
    }
}

/// SHA-1 id of an in-memory payload.
pub fn hash_bytes(bytes: &[u8]) -> AttachmentId {
    let digest: [u8; 20] = Sha1::digest(bytes).into();
    AttachmentId::from_digest(&digest)
}

/// SHA-1 id of a file, read in fixed-size chunks.
pub fn hash_file(path: &Path) -> Result<AttachmentId> {
    let file = File::open(path)?;
    hash_reader(BufReader::new(file))
}

/// SHA-1 id of any reader.
pub fn hash_reader<R: Read>(mut reader: R) -> Result<AttachmentId> {
    let mut hasher = Sha1::new();
    let mut buf = vec![0u8; HASH_CHUNK_BYTES];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    let digest: [u8; 20] = hasher.finalize().into();
    Ok(AttachmentId::from_digest(&digest))
}
