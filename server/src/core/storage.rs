//! Data directory layout
//!
//! ```text
//! {data_dir}/
//!   sqlite/   project store (projecthub.db + WAL)
//!   files/    content-addressed task attachments, sharded per project
//!   secrets/  generated JWT signing key
//! ```
//!
//! `PROJECTHUB_DATA_DIR` overrides the platform default
//! (`$XDG_DATA_HOME/projecthub`, `~/Library/Application Support/ProjectHub`,
//! `%APPDATA%\ProjectHub`).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;

use super::constants::{APP_DOT_FOLDER, APP_NAME, ENV_DATA_DIR};
use crate::utils::file::expand_path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSubdir {
    Sqlite,
    Files,
    Secrets,
}

impl DataSubdir {
    const ALL: [DataSubdir; 3] = [DataSubdir::Sqlite, DataSubdir::Files, DataSubdir::Secrets];

    pub const fn name(self) -> &'static str {
        match self {
            DataSubdir::Sqlite => "sqlite",
            DataSubdir::Files => "files",
            DataSubdir::Secrets => "secrets",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppStorage {
    data_dir: PathBuf,
}

impl AppStorage {
    /// Resolve the data directory and create its layout
    pub async fn init() -> Result<Self> {
        let data_dir = Self::resolve_data_dir();
        for subdir in DataSubdir::ALL {
            let path = data_dir.join(subdir.name());
            tokio::fs::create_dir_all(&path)
                .await
                .with_context(|| format!("Failed to create {}", path.display()))?;
        }

        // canonicalize needs the directory to exist
        let data_dir = data_dir.canonicalize().unwrap_or(data_dir);
        tracing::debug!(data_dir = %data_dir.display(), "Data directory ready");
        Ok(Self { data_dir })
    }

    pub fn resolve_data_dir() -> PathBuf {
        if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
            return expand_path(&dir);
        }
        match ProjectDirs::from("", "", APP_NAME) {
            Some(dirs) => dirs.data_dir().to_path_buf(),
            None => std::env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("."))
                .join(APP_DOT_FOLDER),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn subdir(&self, subdir: DataSubdir) -> PathBuf {
        self.data_dir.join(subdir.name())
    }

    pub fn subdir_path(&self, subdir: DataSubdir, filename: &str) -> PathBuf {
        self.subdir(subdir).join(filename)
    }

    #[cfg(test)]
    pub fn init_for_test(data_dir: PathBuf) -> Self {
        for subdir in DataSubdir::ALL {
            std::fs::create_dir_all(data_dir.join(subdir.name())).unwrap();
        }
        Self { data_dir }
    }
}
