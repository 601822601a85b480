use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Parser)]
#[command(name = "cacheproxy", about = "Forwarding HTTP proxy with an on-disk response cache")]
pub struct Cli {
    /// Address or hostname the proxy listens on.
    pub hostname: String,

    /// Port the proxy listens on.
    pub port: u16,

    /// Optional TOML file with additional settings.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log output format; overrides the configuration file.
    #[arg(long, value_enum)]
    pub log: Option<LogFormat>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Text,
}
