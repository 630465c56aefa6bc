//! Vote evidence storage
//!
//! Photos are written through an [`EvidenceStore`] before the confirmation
//! row is committed. The service ships a local filesystem store rooted at
//! `<root_folder>/evidence`; keys are flat file names.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::debug;
use uuid::Uuid;
use votrack_common::{Error, Result};

/// Accepted photo content types and the file extension stored for each
pub const ACCEPTED_CONTENT_TYPES: [(&str, &str); 3] = [
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/webp", "webp"),
];

/// File extension for an accepted content type
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    let normalized = content_type.trim().to_ascii_lowercase();
    ACCEPTED_CONTENT_TYPES
        .iter()
        .find(|(ct, _)| *ct == normalized)
        .map(|(_, ext)| *ext)
}

/// Object storage for evidence photos
#[async_trait]
pub trait EvidenceStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()>;

    /// Missing keys are reported as [`Error::NotFound`]
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Deleting a missing key is not an error
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Evidence kept as files in a single directory
#[derive(Debug, Clone)]
pub struct LocalEvidenceStore {
    dir: PathBuf,
}

impl LocalEvidenceStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        if !valid {
            return Err(Error::InvalidInput(format!("Invalid evidence key: {}", key)));
        }
        Ok(self.dir.join(key))
    }
}

#[async_trait]
impl EvidenceStore for LocalEvidenceStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        // Write to a temporary name first so readers never see a partial file
        let tmp = path.with_extension("part");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!("Stored evidence {} ({} bytes)", key, bytes.len());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(Error::NotFound(format!("Evidence {}", key)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Metadata of a photo that has been written to the store
#[derive(Debug, Clone)]
pub struct StoredEvidence {
    pub key: String,
    pub content_type: String,
    pub sha256: String,
    pub size_bytes: i64,
}

/// Write a confirmation photo for `persona_id` and describe it
pub async fn store_photo(
    store: &dyn EvidenceStore,
    persona_id: Uuid,
    content_type: &str,
    bytes: Vec<u8>,
) -> Result<StoredEvidence> {
    let ext = extension_for(content_type).ok_or_else(|| {
        Error::InvalidInput(format!("Unsupported content type: {}", content_type))
    })?;
    if bytes.is_empty() {
        return Err(Error::InvalidInput("photo is empty".to_string()));
    }

    let key = format!("{}_{}.{}", persona_id, Uuid::new_v4(), ext);
    let sha256 = format!("{:x}", Sha256::digest(&bytes));
    let size_bytes = bytes.len() as i64;

    store.put(&key, bytes).await?;

    Ok(StoredEvidence {
        key,
        content_type: content_type.trim().to_ascii_lowercase(),
        sha256,
        size_bytes,
    })
}
