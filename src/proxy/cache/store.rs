use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs as async_fs;
use tokio::io::AsyncWriteExt;
use tracing::trace;

use crate::proxy::session_error::CacheIo;

use super::CacheKey;

/// Directory below the cache root that holds in-flight writes.
const TEMP_DIR_NAME: &str = ".cacheproxy-tmp";
const TEMP_FILE_PREFIX: &str = "tmp_";

/// Filesystem layout of the cache: entries at `<root>/<key>`, in-flight writes in a
/// dot-directory that no cache key can name.
#[derive(Debug, Clone)]
pub(super) struct DiskLayout {
    root: PathBuf,
}

impl DiskLayout {
    pub(super) fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub(super) fn root(&self) -> &Path {
        &self.root
    }

    pub(super) fn entry_path(&self, key: &CacheKey) -> PathBuf {
        key.path_under(&self.root)
    }

    pub(super) fn temp_dir(&self) -> PathBuf {
        self.root.join(TEMP_DIR_NAME)
    }

    pub(super) fn new_temp_path(&self) -> PathBuf {
        self.temp_dir()
            .join(format!("{TEMP_FILE_PREFIX}{}", uuid::Uuid::new_v4()))
    }

    pub(super) fn is_temp_file(name: &str) -> bool {
        name.starts_with(TEMP_FILE_PREFIX)
    }

    /// Writes `body` to a temp file, then renames it over the entry path so readers see either
    /// the previous bytes or the new ones.
    pub(super) async fn replace_entry(&self, key: &CacheKey, body: &[u8]) -> Result<PathBuf> {
        let final_path = self.entry_path(key);
        if let Some(parent) = final_path.parent() {
            async_fs::create_dir_all(parent)
                .await
                .map_err(|err| CacheIo::new("create_dir", parent, err))?;
        }

        let temp_dir = self.temp_dir();
        async_fs::create_dir_all(&temp_dir)
            .await
            .map_err(|err| CacheIo::new("create_dir", &temp_dir, err))?;
        let temp_path = self.new_temp_path();

        if let Err(err) = write_file(&temp_path, body).await {
            let _ = async_fs::remove_file(&temp_path).await;
            return Err(err);
        }
        if let Err(err) = async_fs::rename(&temp_path, &final_path).await {
            let _ = async_fs::remove_file(&temp_path).await;
            return Err(CacheIo::new("rename", &final_path, err).into());
        }
        trace!(path = %final_path.display(), bytes = body.len(), "cache entry replaced");
        Ok(final_path)
    }

    pub(super) async fn read_entry(&self, key: &CacheKey) -> Result<Vec<u8>, CacheIo> {
        let path = self.entry_path(key);
        async_fs::read(&path)
            .await
            .map_err(|err| CacheIo::new("read", path, err))
    }

    /// Removes temp files left behind by writes that never reached the rename.
    pub(super) async fn remove_temp_files(&self) -> Result<usize> {
        let temp_dir = self.temp_dir();
        let mut entries = match async_fs::read_dir(&temp_dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(0),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to read cache temp dir {}", temp_dir.display())
                });
            }
        };

        let mut removed = 0usize;
        while let Some(entry) = entries.next_entry().await? {
            let is_temp = entry
                .file_name()
                .to_str()
                .map(Self::is_temp_file)
                .unwrap_or(false);
            if is_temp && async_fs::remove_file(entry.path()).await.is_ok() {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

async fn write_file(path: &Path, body: &[u8]) -> Result<()> {
    let mut options = async_fs::OpenOptions::new();
    options.create(true).truncate(true).write(true);
    let mut file = options
        .open(path)
        .await
        .map_err(|err| CacheIo::new("create", path, err))?;
    file.write_all(body)
        .await
        .map_err(|err| CacheIo::new("write", path, err))?;
    file.flush()
        .await
        .map_err(|err| CacheIo::new("flush", path, err))?;
    Ok(())
}
