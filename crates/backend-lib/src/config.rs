// ============================
// watchparty-backend/src/config.rs
// ============================
//! Configuration management.
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Externally reachable base URL, used to build stream URLs
    pub public_url: String,
    /// Log level used when `RUST_LOG` is not set
    pub log_level: String,
    /// `text` or `json`
    pub log_format: String,
    /// Allowed CORS origins; empty allows any origin
    pub cors_origins: Vec<String>,
    /// Capacity of each connection's outbound queue
    pub outbound_queue: usize,
    pub auth: AuthSettings,
    pub stream: StreamSettings,
    pub retention: RetentionSettings,
}

/// Credential hashing cost
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// scrypt log2(N)
    pub scrypt_log_n: u8,
}

/// Transcode and readiness polling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    /// Root of per-party HLS output, served under `/streams`
    pub streams_dir: PathBuf,
    pub ffmpeg_path: String,
    /// Target HLS segment length in seconds
    pub segment_secs: u32,
    pub poll_interval_ms: u64,
    pub ready_timeout_secs: u64,
}

/// Party reclamation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionSettings {
    /// A party with no live connection for this long is reclaimed; 0 keeps parties forever
    pub party_idle_grace_secs: u64,
    pub reap_interval_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 5002)),
            public_url: "http://localhost:5002".to_string(),
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            cors_origins: Vec::new(),
            outbound_queue: 64,
            auth: AuthSettings::default(),
            stream: StreamSettings::default(),
            retention: RetentionSettings::default(),
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self { scrypt_log_n: 15 }
    }
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            streams_dir: PathBuf::from("streams"),
            ffmpeg_path: "ffmpeg".to_string(),
            segment_secs: 10,
            poll_interval_ms: 1000,
            ready_timeout_secs: 30,
        }
    }
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self {
            party_idle_grace_secs: 60 * 60, // 1 hour
            reap_interval_secs: 60,
        }
    }
}

impl StreamSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }
}

impl RetentionSettings {
    /// `None` when reaping is disabled
    pub fn idle_grace(&self) -> Option<Duration> {
        (self.party_idle_grace_secs > 0).then(|| Duration::from_secs(self.party_idle_grace_secs))
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs)
    }
}

impl Settings {
    /// Load settings from `config.toml` and `WATCHPARTY_*` environment variables
    pub fn load() -> Result<Self> {
        Self::load_from("config.toml")
    }

    /// Load settings from a specific TOML file, then the environment
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let settings: Settings = Self::figment(path.as_ref()).extract()?;
        settings.validate()?;
        Ok(settings)
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("WATCHPARTY_").split("__"))
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            bail!("unknown log level: {}", self.log_level);
        }
        if !matches!(self.log_format.as_str(), "text" | "json") {
            bail!("log_format must be `text` or `json`, got {}", self.log_format);
        }
        if !(1..=20).contains(&self.auth.scrypt_log_n) {
            bail!("auth.scrypt_log_n must be between 1 and 20");
        }
        if self.outbound_queue == 0 {
            bail!("outbound_queue must be positive");
        }
        if self.stream.poll_interval_ms == 0 || self.stream.ready_timeout_secs == 0 {
            bail!("stream poll interval and ready timeout must be positive");
        }
        if self.stream.segment_secs == 0 {
            bail!("stream.segment_secs must be positive");
        }
        if self.retention.reap_interval_secs == 0 {
            bail!("retention.reap_interval_secs must be positive");
        }
        Ok(())
    }
}
