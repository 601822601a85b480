use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, ensure};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::cli::{Cli, LogFormat};

const ENV_PREFIX: &str = "CACHEPROXY";

fn default_listen_backlog() -> u32 {
    5
}

fn default_log_format() -> LogFormat {
    LogFormat::Text
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_cache_placeholders() -> bool {
    true
}

fn default_origin_port() -> u16 {
    80
}

fn default_client_timeout() -> u64 {
    30
}

fn default_upstream_connect_timeout() -> u64 {
    5
}

fn default_upstream_timeout() -> u64 {
    60
}

fn default_max_request_size() -> usize {
    1_000_000
}

fn default_max_origin_connections() -> usize {
    64
}

/// How the status line of an origin response is matched against cacheable codes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusMatch {
    /// `200`/`301`/`302` anywhere in the status line.
    #[default]
    Substring,
    /// The parsed status code must equal 200 or 301.
    Exact,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub listen_host: String,
    pub listen_port: u16,
    #[serde(default = "default_listen_backlog")]
    pub listen_backlog: u32,
    #[serde(default = "default_log_format")]
    pub log: LogFormat,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default = "default_cache_placeholders")]
    pub cache_placeholders: bool,
    #[serde(default)]
    pub status_match: StatusMatch,
    #[serde(default = "default_origin_port")]
    pub origin_port: u16,
    #[serde(default = "default_client_timeout")]
    pub client_timeout: u64,
    #[serde(default = "default_upstream_connect_timeout")]
    pub upstream_connect_timeout: u64,
    #[serde(default = "default_upstream_timeout")]
    pub upstream_timeout: u64,
    #[serde(default = "default_max_request_size")]
    pub max_request_size: usize,
    #[serde(default = "default_max_origin_connections")]
    pub max_origin_connections: usize,
}

impl Settings {
    /// Layers defaults, the optional config file, `CACHEPROXY__*` environment variables and the
    /// positional listen address, in that order.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = cli.config_path() {
            builder = builder.add_source(File::from(path.to_path_buf()).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        builder = builder
            .set_override("listen_host", cli.hostname.clone())
            .map_err(to_anyhow)?
            .set_override("listen_port", i64::from(cli.port))
            .map_err(to_anyhow)?;
        if let Some(format) = cli.log {
            let value = match format {
                LogFormat::Json => "json",
                LogFormat::Text => "text",
            };
            builder = builder.set_override("log", value).map_err(to_anyhow)?;
        }

        let cfg = builder.build().map_err(to_anyhow)?;
        let settings: Settings = cfg.try_deserialize().map_err(to_anyhow)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Settings with every tunable at its default, listening on `host:port`.
    pub fn with_listen(host: impl Into<String>, port: u16) -> Self {
        Self {
            listen_host: host.into(),
            listen_port: port,
            listen_backlog: default_listen_backlog(),
            log: default_log_format(),
            cache_dir: default_cache_dir(),
            cache_placeholders: default_cache_placeholders(),
            status_match: StatusMatch::default(),
            origin_port: default_origin_port(),
            client_timeout: default_client_timeout(),
            upstream_connect_timeout: default_upstream_connect_timeout(),
            upstream_timeout: default_upstream_timeout(),
            max_request_size: default_max_request_size(),
            max_origin_connections: default_max_origin_connections(),
        }
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_secs(self.client_timeout)
    }

    pub fn upstream_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_connect_timeout)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.listen_host.trim().is_empty(),
            "listen_host must not be empty"
        );
        ensure!(
            self.listen_backlog > 0,
            "listen_backlog must be at least 1 (got {})",
            self.listen_backlog
        );
        ensure!(
            self.origin_port > 0,
            "origin_port must be greater than 0 (got {})",
            self.origin_port
        );
        ensure!(
            self.client_timeout > 0,
            "client_timeout must be greater than 0 seconds (got {})",
            self.client_timeout
        );
        ensure!(
            self.upstream_connect_timeout > 0,
            "upstream_connect_timeout must be greater than 0 seconds (got {})",
            self.upstream_connect_timeout
        );
        ensure!(
            self.upstream_timeout > 0,
            "upstream_timeout must be greater than 0 seconds (got {})",
            self.upstream_timeout
        );
        ensure!(
            self.max_request_size > 0,
            "max_request_size must be greater than 0 (got {})",
            self.max_request_size
        );
        ensure!(
            self.max_origin_connections > 0,
            "max_origin_connections must be at least 1 (got {})",
            self.max_origin_connections
        );
        Ok(())
    }
}

fn to_anyhow(err: ConfigError) -> anyhow::Error {
    anyhow::anyhow!(err)
}

impl Cli {
    pub fn config_path(&self) -> Option<&Path> {
        self.config.as_deref()
    }
}
