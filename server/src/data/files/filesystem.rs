//! Local filesystem blob store
//!
//! Layout: `{base}/{project_id}/{hash[0:2]}/{hash[2:4]}/{hash}`. Writes go to a
//! sibling `.tmp` file first and are renamed into place, so a reader never
//! sees a partially written blob.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::error::FileStorageError;
use super::storage::FileStorage;
use crate::utils::crypto::is_sha256_hex;

#[derive(Debug, Clone)]
pub struct FilesystemStorage {
    base_path: PathBuf,
}

impl FilesystemStorage {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn blob_path(&self, project_id: &str, hash: &str) -> Result<PathBuf, FileStorageError> {
        if !is_sha256_hex(hash) {
            return Err(FileStorageError::InvalidHash(hash.to_string()));
        }
        Ok(self
            .project_path(project_id)
            .join(&hash[0..2])
            .join(&hash[2..4])
            .join(hash))
    }

    fn project_path(&self, project_id: &str) -> PathBuf {
        self.base_path.join(project_id)
    }

    /// Remove empty shard directories up to (not including) the project dir
    async fn prune_empty_shards(&self, project_id: &str, blob: &Path) {
        let stop = self.project_path(project_id);
        let mut current = blob.parent();
        while let Some(dir) = current {
            if dir == stop || !dir.starts_with(&stop) {
                break;
            }
            if fs::remove_dir(dir).await.is_err() {
                break;
            }
            current = dir.parent();
        }
    }
}

async fn count_blobs(path: &Path) -> u64 {
    let Ok(mut entries) = fs::read_dir(path).await else {
        return 0;
    };

    let mut count = 0;
    while let Ok(Some(entry)) = entries.next_entry().await {
        match entry.file_type().await {
            Ok(ft) if ft.is_file() => count += 1,
            Ok(ft) if ft.is_dir() => count += Box::pin(count_blobs(&entry.path())).await,
            _ => {}
        }
    }
    count
}

/// Hashes of the blobs below one project directory; staging files are skipped
async fn collect_hashes(path: &Path, out: &mut Vec<String>) -> Result<(), FileStorageError> {
    let mut entries = fs::read_dir(path).await?;
    while let Some(entry) = entries.next_entry().await? {
        let file_type = entry.file_type().await?;
        if file_type.is_dir() {
            Box::pin(collect_hashes(&entry.path(), out)).await?;
        } else if let Some(name) = entry.file_name().to_str()
            && is_sha256_hex(name)
        {
            out.push(name.to_string());
        }
    }
    Ok(())
}

#[async_trait]
impl FileStorage for FilesystemStorage {
    async fn store(
        &self,
        project_id: &str,
        hash: &str,
        data: &[u8],
    ) -> Result<(), FileStorageError> {
        let path = self.blob_path(project_id, hash)?;
        if fs::try_exists(&path).await? {
            tracing::trace!(project_id, hash, "Blob already stored");
            return Ok(());
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let staging = path.with_extension(format!("{}.tmp", cuid2::create_id()));
        fs::write(&staging, data).await?;
        if let Err(e) = fs::rename(&staging, &path).await {
            let _ = fs::remove_file(&staging).await;
            return Err(e.into());
        }

        tracing::debug!(project_id, hash, size = data.len(), "Blob stored");
        Ok(())
    }

    async fn get(&self, project_id: &str, hash: &str) -> Result<Vec<u8>, FileStorageError> {
        let path = self.blob_path(project_id, hash)?;
        fs::read(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FileStorageError::NotFound {
                project_id: project_id.to_string(),
                hash: hash.to_string(),
            },
            _ => FileStorageError::Io(e),
        })
    }

    async fn delete(&self, project_id: &str, hash: &str) -> Result<(), FileStorageError> {
        let path = self.blob_path(project_id, hash)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(project_id, hash, "Blob deleted");
                self.prune_empty_shards(project_id, &path).await;
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_project(&self, project_id: &str) -> Result<u64, FileStorageError> {
        let dir = self.project_path(project_id);
        if !fs::try_exists(&dir).await? {
            return Ok(0);
        }

        let count = count_blobs(&dir).await;
        fs::remove_dir_all(&dir).await?;
        tracing::debug!(project_id, deleted = count, "Project blobs deleted");
        Ok(count)
    }

    async fn list(&self) -> Result<Vec<(String, String)>, FileStorageError> {
        let mut blobs = Vec::new();
        if !fs::try_exists(&self.base_path).await? {
            return Ok(blobs);
        }

        let mut projects = fs::read_dir(&self.base_path).await?;
        while let Some(entry) = projects.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let Some(project_id) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let mut hashes = Vec::new();
            collect_hashes(&entry.path(), &mut hashes).await?;
            blobs.extend(hashes.into_iter().map(|hash| (project_id.clone(), hash)));
        }
        Ok(blobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::crypto::sha256_bytes_hex;
    use tempfile::TempDir;

    fn storage() -> (TempDir, FilesystemStorage) {
        let dir = TempDir::new().unwrap();
        let storage = FilesystemStorage::new(dir.path().to_path_buf());
        (dir, storage)
    }

    #[tokio::test]
    async fn test_store_get_delete() {
        let (_dir, storage) = storage();
        let hash = sha256_bytes_hex(b"report");

        storage.store("p1", &hash, b"report").await.unwrap();
        // Second store of the same content is a no-op
        storage.store("p1", &hash, b"report").await.unwrap();
        assert_eq!(storage.get("p1", &hash).await.unwrap(), b"report");

        storage.delete("p1", &hash).await.unwrap();
        assert!(matches!(
            storage.get("p1", &hash).await,
            Err(FileStorageError::NotFound { .. })
        ));
        // Deleting again is fine
        storage.delete("p1", &hash).await.unwrap();
    }

    #[tokio::test]
    async fn test_sharded_layout_and_pruning() {
        let (dir, storage) = storage();
        let hash = sha256_bytes_hex(b"abc");

        storage.store("p1", &hash, b"abc").await.unwrap();
        let shard = dir.path().join("p1").join(&hash[0..2]);
        assert!(shard.join(&hash[2..4]).join(&hash).is_file());

        storage.delete("p1", &hash).await.unwrap();
        assert!(!shard.exists());
        assert!(dir.path().join("p1").exists());
    }

    #[tokio::test]
    async fn test_rejects_bad_hash() {
        let (_dir, storage) = storage();
        let result = storage.store("p1", "../../etc/passwd", b"x").await;
        assert!(matches!(result, Err(FileStorageError::InvalidHash(_))));
    }

    #[tokio::test]
    async fn test_delete_project_counts_blobs() {
        let (_dir, storage) = storage();
        for body in [b"one".as_slice(), b"two", b"three"] {
            let hash = sha256_bytes_hex(body);
            storage.store("p1", &hash, body).await.unwrap();
        }
        let other = sha256_bytes_hex(b"other");
        storage.store("p2", &other, b"other").await.unwrap();

        assert_eq!(storage.delete_project("p1").await.unwrap(), 3);
        assert_eq!(storage.delete_project("p1").await.unwrap(), 0);
        assert_eq!(storage.get("p2", &other).await.unwrap(), b"other");
    }

    #[tokio::test]
    async fn test_list_blobs() {
        let (dir, storage) = storage();
        assert!(storage.list().await.unwrap().is_empty());

        let a = sha256_bytes_hex(b"a");
        let b = sha256_bytes_hex(b"b");
        storage.store("p1", &a, b"a").await.unwrap();
        storage.store("p2", &b, b"b").await.unwrap();
        // Leftover staging file from an interrupted write
        let shard = dir.path().join("p2").join(&b[0..2]).join(&b[2..4]);
        std::fs::write(shard.join(format!("{b}.x.tmp")), b"partial").unwrap();

        let mut blobs = storage.list().await.unwrap();
        blobs.sort();
        assert_eq!(blobs, vec![("p1".to_string(), a), ("p2".to_string(), b)]);
    }
}
