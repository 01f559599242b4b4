//! Signing secret management
//!
//! The JWT signing key comes from `PROJECTHUB_JWT_SECRET` when set. Otherwise
//! a random 256-bit key is generated once and persisted hex-encoded under
//! `{data_dir}/secrets/`, readable only by the owner on Unix.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use super::constants::{ENV_JWT_SECRET, JWT_SECRET_MIN_LEN, SECRET_KEY_JWT_SIGNING};
use super::storage::{AppStorage, DataSubdir};
use crate::utils::crypto;

/// Where the signing key was loaded from
#[derive(Clone, PartialEq, Eq)]
pub enum SecretSource {
    Env,
    File(PathBuf),
}

impl fmt::Debug for SecretSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Env => write!(f, "env({})", ENV_JWT_SECRET),
            Self::File(path) => write!(f, "file({})", path.display()),
        }
    }
}

/// Resolved signing secret
pub struct SecretManager {
    source: SecretSource,
    signing_key: Vec<u8>,
}

impl fmt::Debug for SecretManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretManager")
            .field("source", &self.source)
            .field("signing_key", &"[REDACTED]")
            .finish()
    }
}

impl SecretManager {
    pub async fn init(storage: &AppStorage) -> Result<Self> {
        let env_value = std::env::var(ENV_JWT_SECRET).ok();
        let key_path = storage.subdir_path(DataSubdir::Secrets, SECRET_KEY_JWT_SIGNING);
        let manager = Self::resolve(env_value, &key_path).await?;
        tracing::debug!(source = ?manager.source, "JWT signing key loaded");
        Ok(manager)
    }

    async fn resolve(env_value: Option<String>, key_path: &Path) -> Result<Self> {
        if let Some(value) = env_value.filter(|v| !v.trim().is_empty()) {
            if value.len() < JWT_SECRET_MIN_LEN {
                bail!(
                    "{} must be at least {} characters",
                    ENV_JWT_SECRET,
                    JWT_SECRET_MIN_LEN
                );
            }
            return Ok(Self {
                source: SecretSource::Env,
                signing_key: value.into_bytes(),
            });
        }

        let signing_key = load_or_create_key(key_path).await?;
        Ok(Self {
            source: SecretSource::File(key_path.to_path_buf()),
            signing_key,
        })
    }

    pub fn source(&self) -> &SecretSource {
        &self.source
    }

    pub fn jwt_signing_key(&self) -> &[u8] {
        &self.signing_key
    }
}

async fn load_or_create_key(path: &Path) -> Result<Vec<u8>> {
    match tokio::fs::read_to_string(path).await {
        Ok(key_hex) => {
            if let Ok(key) = crypto::decode_hex(&key_hex)
                && key.len() == 32
            {
                return Ok(key);
            }
            tracing::warn!(path = %path.display(), "Stored JWT signing key has invalid format, regenerating");
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", path.display()));
        }
    }

    let key = crypto::generate_signing_key();
    write_key_file(path, &crypto::encode_hex(&key)).await?;
    tracing::debug!(path = %path.display(), "Created new JWT signing key");
    Ok(key)
}

async fn write_key_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .context("Failed to create secrets directory")?;
    }

    tokio::fs::write(path, contents)
        .await
        .context("Failed to write secret key file")?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .await
            .context("Failed to restrict secret key file permissions")?;
    }

    Ok(())
}
