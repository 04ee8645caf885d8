use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use crate::error::{AppError, Result};

pub const DEFAULT_API_BASE: &str = "https://api.github.com";

#[derive(Clone, Debug)]
pub struct Config {
    pub server_addr: SocketAddr,
    pub settings_path: PathBuf,
    pub gist_api_base: String,
    /// Per-call timeout for gist API requests. `None` leaves it to the client default.
    pub http_timeout: Option<Duration>,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load environment variables from .env file if it exists
        dotenv::dotenv().ok();

        Self::from_vars(|key| env::var(key).ok())
    }

    /// Builds the config from a variable lookup, applying defaults for missing keys.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = var("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = var("PORT").unwrap_or_else(|| "3000".to_string());
        let port = port.parse::<u16>().map_err(|e| AppError::ConfigError(format!("Invalid port: {}", e)))?;
        let ip = IpAddr::from_str(&host).map_err(|e| AppError::ConfigError(format!("Invalid host address: {}", e)))?;

        let settings_path = var("SETTINGS_PATH").unwrap_or_else(|| "weread_settings.json".to_string());
        let gist_api_base = var("GIST_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let timeout_secs = var("HTTP_TIMEOUT_SECS").unwrap_or_else(|| "10".to_string());
        let timeout_secs = timeout_secs
            .parse::<u64>()
            .map_err(|e| AppError::ConfigError(format!("Invalid HTTP_TIMEOUT_SECS: {}", e)))?;

        Ok(Config {
            server_addr: SocketAddr::new(ip, port),
            settings_path: PathBuf::from(settings_path),
            gist_api_base: gist_api_base.trim_end_matches('/').to_string(),
            http_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
        })
    }
}
