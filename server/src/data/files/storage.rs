//! Attachment storage backend trait

use async_trait::async_trait;

use super::error::FileStorageError;

/// Content-addressed blob store for task attachments
///
/// Blobs are scoped per project and keyed by the SHA-256 of their bytes.
/// Storing an already present hash is a no-op.
#[async_trait]
pub trait FileStorage: Send + Sync {
    async fn store(&self, project_id: &str, hash: &str, data: &[u8])
    -> Result<(), FileStorageError>;

    /// Read a blob; a missing blob is `FileStorageError::NotFound`
    async fn get(&self, project_id: &str, hash: &str) -> Result<Vec<u8>, FileStorageError>;

    /// Remove a blob. Missing blobs are not an error.
    async fn delete(&self, project_id: &str, hash: &str) -> Result<(), FileStorageError>;

    /// Remove every blob of a project, returning how many were removed
    async fn delete_project(&self, project_id: &str) -> Result<u64, FileStorageError>;

    /// Every stored blob as `(project_id, hash)`
    async fn list(&self) -> Result<Vec<(String, String)>, FileStorageError>;
}
