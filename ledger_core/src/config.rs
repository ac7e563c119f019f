//! Harness and transport configuration.

use crate::amount::AmountMode;
use crate::backoff::BackoffPolicy;

use rust_decimal::Decimal;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown environment: {0} (expected one of: local, docker)")]
    UnknownEnvironment(String),
    
    #[error("Invalid base URL {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    
    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

/// Named deployments of the ledger service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Service running on the developer machine
    #[default]
    Local,
    
    /// Service published by Docker on the host, seen from inside a container
    Docker,
}

impl Environment {
    /// Returns the preset name.
    pub fn name(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Docker => "docker",
        }
    }
    
    /// Returns the base URL the preset points at.
    pub fn base_url(&self) -> &'static str {
        match self {
            Environment::Local => "http://localhost:18084",
            Environment::Docker => "http://host.docker.internal:18084",
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Environment {
    type Err = ConfigError;
    
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" | "localhost" => Ok(Environment::Local),
            "docker" => Ok(Environment::Docker),
            _ => Err(ConfigError::UnknownEnvironment(s.to_string())),
        }
    }
}

/// Parameters of one harness run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HarnessConfig {
    /// Concurrent workers
    pub workers: usize,
    
    /// Wallets to provision
    pub wallets: usize,
    
    /// Starting balance of every wallet
    pub initial_balance: Decimal,
    
    /// Transfers per worker
    pub iterations: u64,
    
    /// Fixed or random transfer amounts
    pub amount_mode: AmountMode,
    
    /// Retry policy for legs and balance reads
    pub backoff: BackoffPolicy,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            wallets: 100,
            initial_balance: Decimal::new(10000, 1),
            iterations: 1000,
            amount_mode: AmountMode::Fixed,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl HarnessConfig {
    /// Total transfers the run will attempt.
    pub fn total_iterations(&self) -> u64 {
        self.workers as u64 * self.iterations
    }
}

/// Settings of the pooled HTTP transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    /// Service root, without trailing slash
    pub base_url: String,
    
    /// Whole-request timeout
    pub request_timeout: Duration,
    
    /// TCP connect timeout
    pub connect_timeout: Duration,
    
    /// Idle pooled connections kept per host
    pub pool_max_idle_per_host: usize,
}

impl HttpConfig {
    /// Creates a config for `base_url` with default timeouts.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            pool_max_idle_per_host: 10,
        }
    }
    
    /// Resolves the base URL: an explicit override wins over the preset.
    pub fn resolve(environment: Environment, base_url_override: Option<&str>) -> Self {
        match base_url_override {
            Some(url) if !url.trim().is_empty() => Self::new(url.trim()),
            _ => Self::new(environment.base_url()),
        }
    }
    
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
    
    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_max_idle_per_host = size;
        self
    }
}
