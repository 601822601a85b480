pub mod cache;
pub mod http;
pub mod listener;
pub mod request;
mod resolver;
pub mod session_error;
pub mod target;
pub mod upstream;

use anyhow::Result;
use std::sync::Arc;

use crate::settings::Settings;
use cache::CacheStore;
use http::OriginClient;

/// Shared, read-only state handed to every session.
#[derive(Clone)]
pub struct AppContext {
    pub settings: Arc<Settings>,
    pub cache: Arc<CacheStore>,
    pub origin: OriginClient,
}

impl AppContext {
    pub fn new(settings: Arc<Settings>, cache: Arc<CacheStore>, origin: OriginClient) -> Self {
        Self {
            settings,
            cache,
            origin,
        }
    }
}

pub async fn run(app: AppContext) -> Result<()> {
    listener::start_listener(app).await
}
