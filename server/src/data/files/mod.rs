//! Task attachment storage
//!
//! - `storage` - `FileStorage` trait for blob backends
//! - `filesystem` - sharded local filesystem backend
//! - `error` - storage and service errors
//!
//! Attachment metadata lives in the `task_files` table; bytes are stored
//! once per `(project, sha256)`:
//! ```text
//! {data_dir}/files/
//! └── {project_id}/
//!     └── {hash[0:2]}/
//!         └── {hash[2:4]}/
//!             └── {hash}
//! ```
//!
//! Storing a blob and inserting its row, or counting references and deleting
//! the blob, happen under a per-hash lock so the two sequences never
//! interleave for the same content.

pub mod error;
pub mod filesystem;
pub mod storage;

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use crate::core::constants::FILE_MAX_SIZE_BYTES;
use crate::core::storage::{AppStorage, DataSubdir};
use crate::data::TransactionalService;
use crate::data::types::{NewTaskFile, TaskFileRow};
use crate::utils::crypto::sha256_bytes_hex;
use crate::utils::mime::{is_allowed_upload, resolve_upload_mime};

pub use error::{FileServiceError, FileStorageError};
pub use filesystem::FilesystemStorage;
pub use storage::FileStorage;

/// An upload as received from the multipart body
#[derive(Debug)]
pub struct Upload<'a> {
    pub file_name: &'a str,
    pub declared_type: Option<&'a str>,
    pub data: &'a [u8],
}

const BLOB_LOCK_STRIPES: usize = 64;

/// Coordinates attachment metadata and blob storage
pub struct FileService {
    storage: Arc<dyn FileStorage>,
    database: Arc<TransactionalService>,
    blob_locks: Vec<Mutex<()>>,
}

impl FileService {
    pub fn new(app_storage: &AppStorage, database: Arc<TransactionalService>) -> Self {
        let storage = FilesystemStorage::new(app_storage.subdir(DataSubdir::Files));
        Self::with_storage(Arc::new(storage), database)
    }

    pub fn with_storage(storage: Arc<dyn FileStorage>, database: Arc<TransactionalService>) -> Self {
        Self {
            storage,
            database,
            blob_locks: (0..BLOB_LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    async fn lock_blob(&self, hash: &str) -> MutexGuard<'_, ()> {
        let stripe = hash
            .get(..2)
            .and_then(|prefix| usize::from_str_radix(prefix, 16).ok())
            .unwrap_or(0);
        self.blob_locks[stripe % BLOB_LOCK_STRIPES].lock().await
    }

    /// Delete a blob no row references. Caller holds the blob lock.
    async fn release_unreferenced(&self, project_id: &str, hash: &str) -> Result<bool, FileServiceError> {
        if self
            .database
            .repository()
            .count_hash_refs(project_id, hash)
            .await?
            > 0
        {
            return Ok(false);
        }
        self.storage.delete(project_id, hash).await?;
        Ok(true)
    }

    /// Validate, store and record an attachment.
    ///
    /// The size cap is checked before hashing; the MIME type is resolved from
    /// the bytes first and must be on the upload allow-list.
    pub async fn upload(
        &self,
        project_id: &str,
        task_id: &str,
        uploader_id: &str,
        upload: Upload<'_>,
    ) -> Result<TaskFileRow, FileServiceError> {
        if upload.data.is_empty() {
            return Err(FileServiceError::Empty);
        }
        if upload.data.len() > FILE_MAX_SIZE_BYTES {
            return Err(FileServiceError::TooLarge {
                size: upload.data.len(),
                max: FILE_MAX_SIZE_BYTES,
            });
        }

        let mime = resolve_upload_mime(upload.data, upload.declared_type, upload.file_name);
        if !is_allowed_upload(&mime) {
            return Err(FileServiceError::UnsupportedType { mime });
        }

        let hash = sha256_bytes_hex(upload.data);
        let _guard = self.lock_blob(&hash).await;
        self.storage.store(project_id, &hash, upload.data).await?;

        let new = NewTaskFile {
            original_name: upload.file_name.to_string(),
            content_hash: hash,
            mime_type: mime,
            size_bytes: upload.data.len() as i64,
        };
        let row = match self
            .database
            .repository()
            .create_file(project_id, task_id, uploader_id, &new)
            .await
        {
            Ok(row) => row,
            Err(e) => {
                if let Err(cleanup) = self.release_unreferenced(project_id, &new.content_hash).await {
                    tracing::warn!(
                        project_id,
                        hash = %new.content_hash,
                        error = %cleanup,
                        "Failed to release blob of a rejected upload"
                    );
                }
                return Err(e.into());
            }
        };

        tracing::debug!(
            project_id,
            task_id,
            file_id = %row.id,
            size = row.size_bytes,
            mime = %row.mime_type,
            "Attachment stored"
        );
        Ok(row)
    }

    /// Metadata and bytes of one attachment
    pub async fn download(
        &self,
        task_id: &str,
        file_id: &str,
    ) -> Result<(TaskFileRow, Vec<u8>), FileServiceError> {
        let row = self
            .database
            .repository()
            .get_file(task_id, file_id)
            .await?
            .ok_or(FileServiceError::NotFound)?;

        let data = self
            .storage
            .get(&row.project_id, &row.content_hash)
            .await
            .map_err(|e| match e {
                FileStorageError::NotFound { .. } => {
                    tracing::warn!(file_id, hash = %row.content_hash, "Attachment blob missing");
                    FileServiceError::NotFound
                }
                e => FileServiceError::Storage(e),
            })?;

        Ok((row, data))
    }

    /// Delete an attachment row, releasing the blob once nothing references it.
    ///
    /// A blob that fails to delete is left behind with a warning; the row is
    /// already gone so the request still succeeds.
    pub async fn delete(
        &self,
        task_id: &str,
        file_id: &str,
    ) -> Result<TaskFileRow, FileServiceError> {
        let repo = self.database.repository();
        let row = repo
            .delete_file(task_id, file_id)
            .await?
            .ok_or(FileServiceError::NotFound)?;

        let _guard = self.lock_blob(&row.content_hash).await;
        if let Err(e) = self.release_unreferenced(&row.project_id, &row.content_hash).await {
            tracing::warn!(
                project_id = %row.project_id,
                hash = %row.content_hash,
                error = %e,
                "Failed to release attachment blob"
            );
        }

        Ok(row)
    }

    /// Remove every blob of a deleted project
    pub async fn delete_project(&self, project_id: &str) -> Result<u64, FileServiceError> {
        Ok(self.storage.delete_project(project_id).await?)
    }

    /// Delete stored blobs that no attachment row references, such as those
    /// left by a crash between the write and the insert. Returns the count.
    pub async fn collect_orphans(&self) -> Result<u64, FileServiceError> {
        let mut removed = 0;
        for (project_id, hash) in self.storage.list().await? {
            let _guard = self.lock_blob(&hash).await;
            match self.release_unreferenced(&project_id, &hash).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(%project_id, %hash, error = %e, "Failed to collect orphan blob");
                }
            }
        }
        if removed > 0 {
            tracing::debug!(removed, "Orphan blobs collected");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::repositories::test_support::{
        seed_project, seed_task, seed_user, setup_test_pool,
    };
    use tempfile::TempDir;

    const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];

    struct Fixture {
        _dir: TempDir,
        service: FileService,
        project_id: String,
        task_id: String,
        user_id: String,
    }

    async fn fixture() -> Fixture {
        let pool = setup_test_pool().await;
        let user = seed_user(&pool, "owner@example.com").await;
        let project = seed_project(&pool, &user.id, 0).await;
        let task = seed_task(&pool, &project.id, &user.id).await;

        let dir = TempDir::new().unwrap();
        let storage = Arc::new(FilesystemStorage::new(dir.path().to_path_buf()));
        let database = Arc::new(TransactionalService::from_pool(pool));

        Fixture {
            _dir: dir,
            service: FileService::with_storage(storage, database),
            project_id: project.id,
            task_id: task.id,
            user_id: user.id,
        }
    }

    fn upload<'a>(name: &'a str, declared: Option<&'a str>, data: &'a [u8]) -> Upload<'a> {
        Upload {
            file_name: name,
            declared_type: declared,
            data,
        }
    }

    #[tokio::test]
    async fn test_upload_round_trip() {
        let f = fixture().await;

        let row = f
            .service
            .upload(&f.project_id, &f.task_id, &f.user_id, upload("chart.png", None, PNG))
            .await
            .unwrap();
        assert_eq!(row.mime_type, "image/png");
        assert_eq!(row.size_bytes, PNG.len() as i64);

        let (meta, data) = f.service.download(&f.task_id, &row.id).await.unwrap();
        assert_eq!(meta.original_name, "chart.png");
        assert_eq!(data, PNG);
    }

    #[tokio::test]
    async fn test_rejects_oversized() {
        let f = fixture().await;
        let big = vec![b'a'; FILE_MAX_SIZE_BYTES + 1];

        let err = f
            .service
            .upload(&f.project_id, &f.task_id, &f.user_id, upload("big.txt", None, &big))
            .await
            .unwrap_err();
        assert!(matches!(err, FileServiceError::TooLarge { .. }));
    }

    #[tokio::test]
    async fn test_accepts_exactly_max_size() {
        let f = fixture().await;
        let data = vec![b'a'; FILE_MAX_SIZE_BYTES];

        let row = f
            .service
            .upload(&f.project_id, &f.task_id, &f.user_id, upload("notes.txt", None, &data))
            .await
            .unwrap();
        assert_eq!(row.mime_type, "text/plain");
    }

    #[tokio::test]
    async fn test_rejects_disallowed_type() {
        let f = fixture().await;

        // Executable bytes under an innocent name
        let err = f
            .service
            .upload(
                &f.project_id,
                &f.task_id,
                &f.user_id,
                upload("invoice.pdf", Some("application/pdf"), b"MZ\x90\x00binary"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FileServiceError::UnsupportedType { .. }));

        let err = f
            .service
            .upload(&f.project_id, &f.task_id, &f.user_id, upload("x.html", None, b"<html>"))
            .await
            .unwrap_err();
        assert!(matches!(err, FileServiceError::UnsupportedType { ref mime } if mime == "text/html"));
    }

    #[tokio::test]
    async fn test_shared_blob_released_with_last_reference() {
        let f = fixture().await;
        let first = f
            .service
            .upload(&f.project_id, &f.task_id, &f.user_id, upload("a.png", None, PNG))
            .await
            .unwrap();
        let second = f
            .service
            .upload(&f.project_id, &f.task_id, &f.user_id, upload("b.png", None, PNG))
            .await
            .unwrap();
        assert_eq!(first.content_hash, second.content_hash);

        f.service.delete(&f.task_id, &first.id).await.unwrap();
        let (_, data) = f.service.download(&f.task_id, &second.id).await.unwrap();
        assert_eq!(data, PNG);

        f.service.delete(&f.task_id, &second.id).await.unwrap();
        assert!(matches!(
            f.service.storage.get(&f.project_id, &second.content_hash).await,
            Err(FileStorageError::NotFound { .. })
        ));
        assert!(matches!(
            f.service.delete(&f.task_id, &second.id).await,
            Err(FileServiceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_failed_insert_releases_blob() {
        let f = fixture().await;

        let result = f
            .service
            .upload(&f.project_id, "no-such-task", &f.user_id, upload("a.png", None, PNG))
            .await;
        assert!(matches!(result, Err(FileServiceError::Database(_))));
        assert!(matches!(
            f.service.storage.get(&f.project_id, &sha256_bytes_hex(PNG)).await,
            Err(FileStorageError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_failed_insert_keeps_shared_blob() {
        let f = fixture().await;
        let kept = f
            .service
            .upload(&f.project_id, &f.task_id, &f.user_id, upload("a.png", None, PNG))
            .await
            .unwrap();

        assert!(
            f.service
                .upload(&f.project_id, "no-such-task", &f.user_id, upload("b.png", None, PNG))
                .await
                .is_err()
        );
        let (_, data) = f.service.download(&f.task_id, &kept.id).await.unwrap();
        assert_eq!(data, PNG);
    }

    #[tokio::test]
    async fn test_collect_orphans() {
        let f = fixture().await;
        let row = f
            .service
            .upload(&f.project_id, &f.task_id, &f.user_id, upload("a.png", None, PNG))
            .await
            .unwrap();

        // Written without a row, as after a crash mid-upload
        let stray = sha256_bytes_hex(b"stray");
        f.service.storage.store(&f.project_id, &stray, b"stray").await.unwrap();
        f.service.storage.store("deleted-project", &stray, b"stray").await.unwrap();

        assert_eq!(f.service.collect_orphans().await.unwrap(), 2);
        assert_eq!(f.service.collect_orphans().await.unwrap(), 0);

        let (_, data) = f.service.download(&f.task_id, &row.id).await.unwrap();
        assert_eq!(data, PNG);
        assert_eq!(f.service.storage.list().await.unwrap().len(), 1);
    }
}
