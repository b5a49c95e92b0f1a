use anyhow::{Context, Result};
use clap::Args;
use reqwest::Url;
use std::path::PathBuf;

use crate::auth::FileTokenStore;

/// Global options shared by every subcommand
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Base URL of the JakBu API
    #[arg(long, env = "JAKBU_BASE_URL", default_value = "https://jakbu-api.dsmhs.kr")]
    pub base_url: String,

    /// Path to the credentials file
    #[arg(long, env = "JAKBU_CREDENTIALS_FILE")]
    pub credentials_file: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    /// HTTP connect timeout in seconds
    #[arg(long, env = "HTTP_CONNECT_TIMEOUT", default_value = "10")]
    pub connect_timeout: u64,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "30")]
    pub request_timeout: u64,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub base_url: Url,
    pub credentials_file: PathBuf,
    pub log_level: String,
    pub connect_timeout: u64,
    pub request_timeout: u64,
}

impl Config {
    /// Build configuration with priority: CLI > ENV > defaults.
    /// The `.env` file, if any, is loaded by the binary before clap parses.
    pub fn load(args: GlobalArgs) -> Result<Self> {
        let base_url = Url::parse(&args.base_url)
            .with_context(|| format!("JAKBU_BASE_URL is not a valid URL: {}", args.base_url))?;

        let credentials_file = args
            .credentials_file
            .map(|s| expand_tilde(&s))
            .unwrap_or_else(FileTokenStore::default_path);

        Ok(Config {
            base_url,
            credentials_file,
            log_level: args.log_level,
            connect_timeout: args.connect_timeout,
            request_timeout: args.request_timeout,
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        match self.base_url.scheme() {
            "http" | "https" => {}
            other => anyhow::bail!("JAKBU_BASE_URL must be http(s), got scheme: {}", other),
        }

        if self.request_timeout == 0 {
            anyhow::bail!("HTTP_REQUEST_TIMEOUT must be greater than zero");
        }

        Ok(())
    }
}

/// Expand tilde (~) in file paths to user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(&path[2..]);
        }
    }
    PathBuf::from(path)
}
