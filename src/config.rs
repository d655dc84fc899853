use std::path::Path;
use std::{env, fs, io};

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub port: u16,
    pub max_body_size: usize,
    /// Enables the `x-test-now-ms` header for deterministic expiry testing.
    pub test_mode: bool,
    pub retention: Retention,
    pub redis: Redis,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Retention {
    /// Store-level expiry applied to pastes without a TTL of their own.
    pub default_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Redis {
    pub url: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            base_url: "http://localhost:3000".to_string(),
            port: 3000,
            max_body_size: 1024 * 1024,
            test_mode: false,
            retention: Retention::default(),
            redis: Redis::default(),
        }
    }
}

impl Default for Retention {
    fn default() -> Self {
        Retention {
            default_secs: 30 * 24 * 60 * 60,
        }
    }
}

impl Default for Redis {
    fn default() -> Self {
        Redis {
            url: "redis://127.0.0.1:6379".to_string(),
        }
    }
}

impl Config {
    /// Read the config file if it exists, then apply environment overrides
    /// for the deployment-level knobs.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let mut config = match fs::read_to_string(path) {
            Ok(raw) => toml::from_str(&raw).context("failed to parse config")?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => Config::default(),
            Err(err) => return Err(err).context("failed to read config"),
        };

        if let Ok(url) = env::var("PASTEKV_REDIS_URL") {
            config.redis.url = url;
        }
        if let Ok(base_url) = env::var("PASTEKV_BASE_URL") {
            config.base_url = base_url;
        }
        if let Ok(port) = env::var("PASTEKV_PORT") {
            config.port = port.parse().context("invalid PASTEKV_PORT")?;
        }
        if let Ok(flag) = env::var("PASTEKV_TEST_MODE") {
            config.test_mode = flag == "1" || flag == "true";
        }

        Ok(config)
    }
}
