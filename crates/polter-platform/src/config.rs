use std::time::Duration;

use anyhow::{Context, Result};
use rust_decimal::Decimal;

const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub database_url: String,
    pub redis_url: String,
    pub http_addr: String,
    pub provider_timeout: Duration,
    pub default_rate_per_task: Decimal,
}

impl ServiceConfig {
    pub fn from_env(default_http_addr: &str) -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is required")?;
        let redis_url = std::env::var("REDIS_URL").context("REDIS_URL is required")?;
        let http_addr =
            std::env::var("HTTP_ADDR").unwrap_or_else(|_| default_http_addr.to_string());

        let provider_timeout = match std::env::var("PROVIDER_TIMEOUT_SECS") {
            Ok(value) => Duration::from_secs(
                value
                    .trim()
                    .parse()
                    .context("PROVIDER_TIMEOUT_SECS must be a whole number of seconds")?,
            ),
            Err(_) => Duration::from_secs(DEFAULT_PROVIDER_TIMEOUT_SECS),
        };

        let default_rate_per_task = match std::env::var("DEFAULT_RATE_PER_TASK") {
            Ok(value) => value
                .trim()
                .parse()
                .context("DEFAULT_RATE_PER_TASK must be a decimal amount")?,
            Err(_) => Decimal::TEN,
        };

        Ok(Self {
            database_url,
            redis_url,
            http_addr,
            provider_timeout,
            default_rate_per_task,
        })
    }
}
