//! Server configuration from environment variables.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{var}={value:?} is not a valid {expected}")]
    Invalid {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Concurrent pipeline runs. Zero in the environment means auto.
    pub workers: usize,
    /// How long a finished job stays queryable.
    pub job_ttl: Duration,
    /// Delay between log checks while streaming progress.
    pub stream_poll: Duration,
    pub eviction_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            workers: auto_workers(),
            job_ttl: Duration::from_secs(3600),
            stream_poll: Duration::from_millis(200),
            eviction_interval: Duration::from_secs(60),
        }
    }
}

/// `clamp(cpus * 4, 8, 64)`.
pub fn auto_workers() -> usize {
    let cpus = std::thread::available_parallelism().map_or(2, |n| n.get());
    (cpus * 4).clamp(8, 64)
}

impl ServerConfig {
    /// Read `HOST`, `PORT`, `THREAD_POOL_WORKERS`, `JOB_TTL_SECS`,
    /// `STREAM_POLL_MS` and `EVICTION_INTERVAL_SECS`. Unset variables keep
    /// their defaults; malformed ones are an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        if let Some(host) = lookup("HOST").filter(|h| !h.trim().is_empty()) {
            cfg.host = host.trim().to_string();
        }
        if let Some(port) = parse(&lookup, "PORT")? {
            cfg.port = port;
        }
        if let Some(workers) = parse::<usize>(&lookup, "THREAD_POOL_WORKERS")? {
            cfg.workers = if workers == 0 { auto_workers() } else { workers };
        }
        if let Some(secs) = parse(&lookup, "JOB_TTL_SECS")? {
            cfg.job_ttl = Duration::from_secs(secs);
        }
        if let Some(ms) = parse(&lookup, "STREAM_POLL_MS")? {
            cfg.stream_poll = Duration::from_millis(ms);
        }
        if let Some(secs) = parse::<u64>(&lookup, "EVICTION_INTERVAL_SECS")? {
            cfg.eviction_interval = Duration::from_secs(secs.max(1));
        }
        Ok(cfg)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    let value = raw.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value.parse().map(Some).map_err(|_| ConfigError::Invalid {
        var,
        value: raw.clone(),
        expected: std::any::type_name::<T>(),
    })
}
