use anyhow::{anyhow, Context};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Service settings read from `ORBITWATCH_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bind_addr: String,
    pub port: u16,
    /// Engine TOML; built-in defaults when unset
    pub engine_config_path: Option<PathBuf>,
    pub catalog_path: PathBuf,
    pub json_logs: bool,
    /// Upper bound on `/snapshot/history` entries
    pub history_limit: usize,
    /// Requests running longer are answered with 408
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("ORBITWATCH_PORT") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("ORBITWATCH_PORT is not a port number: {raw}"))?,
            None => 8080,
        };
        let history_limit = match lookup("ORBITWATCH_HISTORY_LIMIT") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("ORBITWATCH_HISTORY_LIMIT is not a count: {raw}"))?,
            None => 100,
        };
        let request_timeout = match lookup("ORBITWATCH_REQUEST_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse()
                .map(Duration::from_secs)
                .with_context(|| format!("ORBITWATCH_REQUEST_TIMEOUT_SECS is not a number of seconds: {raw}"))?,
            None => Duration::from_secs(10),
        };
        let catalog_path = lookup("ORBITWATCH_CATALOG")
            .map(PathBuf::from)
            .ok_or_else(|| anyhow!("ORBITWATCH_CATALOG must point at the catalog JSON file"))?;

        Ok(Config {
            bind_addr: lookup("ORBITWATCH_BIND").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            engine_config_path: lookup("ORBITWATCH_CONFIG").map(PathBuf::from),
            catalog_path,
            json_logs: lookup("ORBITWATCH_LOG_FORMAT")
                .map(|f| f.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
            history_limit,
            request_timeout,
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}
