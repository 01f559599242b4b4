//! Attachment storage errors

use thiserror::Error;

use crate::data::error::DataError;

/// Errors from the blob backend
#[derive(Error, Debug)]
pub enum FileStorageError {
    #[error("Blob not found: {project_id}/{hash}")]
    NotFound { project_id: String, hash: String },

    #[error("Invalid content hash: {0}")]
    InvalidHash(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from `FileService`
#[derive(Error, Debug)]
pub enum FileServiceError {
    #[error("File not found")]
    NotFound,

    #[error("File is empty")]
    Empty,

    #[error("File too large: {size} bytes (max: {max})")]
    TooLarge { size: usize, max: usize },

    #[error("File type {mime} is not allowed")]
    UnsupportedType { mime: String },

    #[error("Storage error: {0}")]
    Storage(#[from] FileStorageError),

    #[error("Database error: {0}")]
    Database(#[from] DataError),
}
