use anyhow::{Context, Result};
use tokio::fs as async_fs;
use tracing::{info, warn};

use super::store::DiskLayout;

/// Makes sure the cache root exists and clears temp files from interrupted writes.
pub(super) async fn prepare_cache_root(layout: &DiskLayout) -> Result<()> {
    let root = layout.root();
    async_fs::create_dir_all(root)
        .await
        .with_context(|| format!("failed to create cache root {}", root.display()))?;

    match layout.remove_temp_files().await {
        Ok(0) => {}
        Ok(removed) => info!(removed, "removed stale cache temp files"),
        Err(err) => warn!(error = %err, "failed to clean cache temp files"),
    }
    Ok(())
}
