//! Server configuration
//!
//! Defines the configurable parameters of the server: where it listens,
//! how many jobs run in parallel and the limits applied to each script.

use anyhow::Context;
use lunar_lua::LuaEngineConfig;
use std::str::FromStr;

use crate::execution::pool::available_parallelism;

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP API binds to (e.g., "0.0.0.0:8080")
    pub bind_addr: String,

    /// Max jobs executing at the same time
    pub worker_threads: usize,

    /// Memory allowance per execution, in bytes
    pub memory_limit: Option<usize>,

    /// VM instructions between two cancellation checks
    pub hook_interval: u32,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            worker_threads: available_parallelism(),
            memory_limit: None,
            hook_interval: LuaEngineConfig::default().hook_interval,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - LUNAR_BIND_ADDR (optional, default: 0.0.0.0:8080)
    /// - LUNAR_WORKER_THREADS (optional, default: hardware concurrency)
    /// - LUNAR_MEMORY_LIMIT (optional, bytes, default: unlimited)
    /// - LUNAR_HOOK_INTERVAL (optional, default: 1000)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::new();

        let bind_addr = lookup("LUNAR_BIND_ADDR").unwrap_or(defaults.bind_addr);

        let worker_threads =
            parse_var(&lookup, "LUNAR_WORKER_THREADS")?.unwrap_or(defaults.worker_threads);

        let memory_limit = parse_var(&lookup, "LUNAR_MEMORY_LIMIT")?;

        let hook_interval =
            parse_var(&lookup, "LUNAR_HOOK_INTERVAL")?.unwrap_or(defaults.hook_interval);

        Ok(Self {
            bind_addr,
            worker_threads,
            memory_limit,
            hook_interval,
        })
    }

    /// Engine settings derived from this configuration
    pub fn engine_config(&self) -> LuaEngineConfig {
        LuaEngineConfig {
            memory_limit: self.memory_limit,
            hook_interval: self.hook_interval,
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bind_addr.is_empty() {
            anyhow::bail!("bind_addr cannot be empty");
        }

        if self.worker_threads == 0 {
            anyhow::bail!("worker_threads must be greater than 0");
        }

        if self.hook_interval == 0 {
            anyhow::bail!("hook_interval must be greater than 0");
        }

        if self.memory_limit == Some(0) {
            anyhow::bail!("memory_limit must be greater than 0");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("Invalid value for {}: {:?}", key, raw))
        })
        .transpose()
}
