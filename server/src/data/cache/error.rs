//! Cache error types

use thiserror::Error;

/// Failures converting values to and from their MessagePack form
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to encode cache value: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("Failed to decode cache value: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}
