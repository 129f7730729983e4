use std::{fs, str::FromStr};

use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use tenantd_ipam::cidr::is_canonical;

use super::error::{ConfigError, Error};

pub const DEFAULT_HTTP_PORT: u32 = 8080;
pub const DEFAULT_REQUEUE_INTERVAL: u64 = 30 * 60;
pub const DEFAULT_NETWORK_POOL: &str = "10.100.0.0/16";
pub const DEFAULT_PREFIX_LEN: u8 = 24;

#[derive(Debug, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub http_port: u32,
    pub requeue_interval: u64,
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct NetworkConfig {
    // Pool every tenant network is allocated from.
    pub pool: String,
    // Size of one tenant network.
    pub prefix_len: u8,
}

impl Config {
    pub fn load(file: &str) -> Result<Self, Error> {
        let contents = fs::read_to_string(file).map_err(Error::StdIo)?;
        serde_yaml::from_str(&contents).map_err(|e| {
            tracing::error!(file, error = %e, "failed to parse config");
            Error::Config(ConfigError::FailedToLoad)
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: DEFAULT_HTTP_PORT,
            requeue_interval: DEFAULT_REQUEUE_INTERVAL,
            network: NetworkConfig::default(),
        }
    }
}

impl NetworkConfig {
    /// Returns the pool and the prefix length of tenant networks.
    pub fn validate(&self) -> Result<(IpNet, u8), Error> {
        let pool = IpNet::from_str(&self.pool)
            .map_err(|_| ConfigError::InvalidPool(self.pool.clone()))?;
        if !is_canonical(&pool) {
            return Err(ConfigError::InvalidPool(self.pool.clone()).into());
        }
        if self.prefix_len < pool.prefix_len() || self.prefix_len > pool.max_prefix_len() {
            return Err(ConfigError::InvalidPrefixLength(self.prefix_len).into());
        }
        Ok((pool, self.prefix_len))
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            pool: DEFAULT_NETWORK_POOL.to_string(),
            prefix_len: DEFAULT_PREFIX_LEN,
        }
    }
}
