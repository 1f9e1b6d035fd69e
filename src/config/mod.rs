use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub chain: ChainConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Host directory where the guest filesystem is mounted
    pub root: PathBuf,
    /// Guest-side bridge directory (absolute guest path)
    pub bridge_dir: String,
    pub poll_interval_ms: u64,
    /// Largest encoded slice handed to a single channel write
    pub chunk_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Backoff before each retry; its length is the retry budget
    pub retry_delays_secs: Vec<u64>,
    pub request_timeout_secs: u64,
    /// Upper bound for a job-supplied `timeout`
    pub max_job_timeout_secs: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Widest block span requested by `logs`
    pub max_log_range: u64,
    pub rpc_timeout_secs: u64,
    pub receipt_poll_interval_ms: u64,
    pub receipt_timeout_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/var/lib/sandbox/rootfs"),
            bridge_dir: "/tmp/bridge".to_string(),
            poll_interval_ms: 100,
            chunk_size: 65536,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            retry_delays_secs: vec![2, 4, 8, 16, 32],
            request_timeout_secs: 300,
            max_job_timeout_secs: 600,
            user_agent: format!("sandbox-bridge/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            max_log_range: 9999,
            rpc_timeout_secs: 30,
            receipt_poll_interval_ms: 1000,
            receipt_timeout_secs: 120,
        }
    }
}

impl BridgeConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl HttpConfig {
    pub fn retry_delays(&self) -> Vec<Duration> {
        self.retry_delays_secs.iter().map(|s| Duration::from_secs(*s)).collect()
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, else the default location if it exists,
    /// else built-in defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => match default_config_path() {
                Some(path) if path.exists() => Self::load(path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.bridge.poll_interval_ms == 0 {
            anyhow::bail!("bridge.poll_interval_ms must be greater than zero");
        }
        if self.bridge.chunk_size < 4 {
            anyhow::bail!("bridge.chunk_size must be at least 4 bytes");
        }
        if !self.bridge.bridge_dir.starts_with('/') {
            anyhow::bail!("bridge.bridge_dir must be an absolute guest path");
        }
        Ok(())
    }
}

/// `~/.config/sandbox-bridge/config.toml` on Linux
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("sandbox-bridge").join("config.toml"))
}
