#![allow(dead_code)]

pub mod logging;
pub mod origin;
pub mod proxy_client;

use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::{Result, anyhow};
use tempfile::TempDir;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use cacheproxy::{
    proxy::{
        self, AppContext,
        cache::CacheStore,
        http::OriginClient,
    },
    settings::Settings,
};

pub use logging::LogCapture;
pub use origin::MockOrigin;
pub use proxy_client::ProxyClient;

pub const READ_TIMEOUT: StdDuration = StdDuration::from_secs(10);

pub fn default_test_settings(cache_dir: &Path, origin_port: u16) -> Settings {
    let mut settings = Settings::with_listen("127.0.0.1", 0);
    settings.cache_dir = cache_dir.to_path_buf();
    settings.origin_port = origin_port;
    settings.client_timeout = 5;
    settings.upstream_connect_timeout = 2;
    settings.upstream_timeout = 5;
    settings
}

/// A proxy bound to an ephemeral port, backed by a temporary cache directory.
pub struct ProxyHarness {
    _cache: TempDir,
    pub cache_dir: PathBuf,
    pub addr: SocketAddr,
    pub settings: Arc<Settings>,
    handle: JoinHandle<()>,
}

impl ProxyHarness {
    pub async fn start(origin_port: u16) -> Result<Self> {
        ProxyHarnessBuilder::new(origin_port).start().await
    }

    pub fn builder(origin_port: u16) -> ProxyHarnessBuilder {
        ProxyHarnessBuilder::new(origin_port)
    }

    pub async fn client(&self) -> Result<ProxyClient> {
        ProxyClient::connect(self.addr).await
    }

    /// Sends `request` on a fresh connection and returns everything the proxy wrote before
    /// closing it.
    pub async fn exchange(&self, request: impl AsRef<[u8]>) -> Result<Vec<u8>> {
        let mut client = self.client().await?;
        client.send(request).await?;
        client.read_to_close().await
    }

    pub fn entry(&self, relative: &str) -> PathBuf {
        self.cache_dir.join(relative)
    }

    pub fn seed(&self, relative: &str, bytes: &[u8]) -> Result<()> {
        let path = self.entry(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, bytes)?;
        Ok(())
    }

    pub async fn shutdown(self) {
        self.handle.abort();
        let _ = self.handle.await;
    }
}

pub struct ProxyHarnessBuilder {
    origin_port: u16,
    placeholders: bool,
}

impl ProxyHarnessBuilder {
    pub fn new(origin_port: u16) -> Self {
        Self {
            origin_port,
            placeholders: true,
        }
    }

    pub fn placeholders(mut self, enabled: bool) -> Self {
        self.placeholders = enabled;
        self
    }

    pub async fn start(self) -> Result<ProxyHarness> {
        let cache = TempDir::new()?;
        let cache_dir = cache.path().to_path_buf();
        let mut settings = default_test_settings(&cache_dir, self.origin_port);
        settings.cache_placeholders = self.placeholders;
        settings.validate()?;

        let listener = proxy::listener::bind_listener(&settings).await?;
        let addr = listener.local_addr()?;
        let settings = Arc::new(settings);
        let store = Arc::new(CacheStore::open(cache_dir.clone(), self.placeholders).await?);
        let origin = OriginClient::from_settings(&settings);
        let app = AppContext::new(settings.clone(), store, origin);

        let handle = tokio::spawn(async move {
            if let Err(err) = proxy::listener::serve_listener(listener, app).await {
                eprintln!("proxy listener exited: {err:#}");
            }
        });

        Ok(ProxyHarness {
            _cache: cache,
            cache_dir,
            addr,
            settings,
            handle,
        })
    }
}

/// Port with nothing listening on it.
pub fn closed_port() -> Result<u16> {
    let listener = std::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

pub async fn read_to_close<S>(stream: &mut S) -> Result<Vec<u8>>
where
    S: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    timeout(READ_TIMEOUT, stream.read_to_end(&mut buf))
        .await
        .map_err(|_| anyhow!("timed out waiting for the proxy to close the connection"))??;
    Ok(buf)
}
