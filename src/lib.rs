pub mod cli;
pub mod logging;
pub mod proxy;
pub mod settings;
pub mod util;

use std::sync::Arc;

use anyhow::Result;

use crate::{
    proxy::{cache::CacheStore, http::OriginClient},
    settings::Settings,
};

/// Builds the shared context from `settings` and serves until the listener fails.
pub async fn run(settings: Settings) -> Result<()> {
    settings.validate()?;
    let settings = Arc::new(settings);
    let cache = Arc::new(
        CacheStore::open(settings.cache_dir.clone(), settings.cache_placeholders).await?,
    );
    let origin = OriginClient::from_settings(&settings);
    let app = proxy::AppContext::new(settings, cache, origin);
    proxy::run(app).await
}
