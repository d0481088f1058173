// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::defaults;
use anyhow::{bail, Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Operator configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Namespace to watch, all namespaces when unset
    pub watch_namespace: Option<String>,
    /// Number of concurrent reconcile workers
    pub worker_count: usize,
    /// Poll interval while children have not reached a terminal state
    pub requeue_interval: Duration,
    /// First retry delay after a failed reconcile
    pub backoff_base: Duration,
    /// Cap for the per-key retry delay
    pub backoff_max: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            watch_namespace: None,
            worker_count: defaults::WORKER_COUNT,
            requeue_interval: Duration::from_secs(defaults::REQUEUE_INTERVAL_SECS),
            backoff_base: Duration::from_millis(defaults::BACKOFF_BASE_MS),
            backoff_max: Duration::from_secs(defaults::BACKOFF_MAX_SECS),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let watch_namespace = lookup("WATCH_NAMESPACE").filter(|ns| !ns.is_empty());

        let worker_count = parse_or(&lookup, "WORKER_COUNT", defaults::WORKER_COUNT)?;
        if worker_count == 0 {
            bail!("WORKER_COUNT must be greater than zero");
        }

        let requeue_interval = Duration::from_secs(parse_or(
            &lookup,
            "REQUEUE_INTERVAL_SECS",
            defaults::REQUEUE_INTERVAL_SECS,
        )?);
        let backoff_base =
            Duration::from_millis(parse_or(&lookup, "BACKOFF_BASE_MS", defaults::BACKOFF_BASE_MS)?);
        let backoff_max =
            Duration::from_secs(parse_or(&lookup, "BACKOFF_MAX_SECS", defaults::BACKOFF_MAX_SECS)?);
        if backoff_max < backoff_base {
            bail!("BACKOFF_MAX_SECS must not be lower than BACKOFF_BASE_MS");
        }

        Ok(Config {
            watch_namespace,
            worker_count,
            requeue_interval,
            backoff_base,
            backoff_max,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {:?}", key, value)),
        None => Ok(default),
    }
}
