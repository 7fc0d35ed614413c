// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

use std::env;
use std::time::Duration;

use anyhow::{anyhow, Result};

/// Configuration for the job lifecycle client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub api_key: String,
    /// Bound on every gateway request; a timed-out submission is treated as
    /// indeterminate, never as failed.
    pub request_timeout: Duration,
    /// How long a cached job snapshot is served before a refetch.
    pub cache_staleness: Duration,
    pub submit_retry_attempts: usize,
    pub submit_retry_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080".to_string(),
            api_key: String::new(),
            request_timeout: Duration::from_secs(10),
            cache_staleness: Duration::from_secs(5),
            submit_retry_attempts: 3,
            submit_retry_delay: Duration::from_millis(1000),
        }
    }
}

impl ClientConfig {
    /// Load from `ACP_API_KEY` (required) and `ACP_API_URL` (optional).
    pub fn from_env() -> Result<Self> {
        let api_key =
            env::var("ACP_API_KEY").map_err(|_| anyhow!("ACP_API_KEY environment variable not set"))?;
        if api_key.trim().is_empty() {
            return Err(anyhow!("ACP_API_KEY is empty"));
        }

        let mut config = Self {
            api_key,
            ..Default::default()
        };
        if let Ok(url) = env::var("ACP_API_URL") {
            config.api_base_url = url;
        }
        Ok(config)
    }
}
