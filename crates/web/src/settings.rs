use anyhow::Context;
use packforge_core::DEFAULT_MAX_WORKERS;
use packforge_data::default_assets_dir;
use packforge_providers::DEFAULT_TIMEOUT_SECS;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_ADDR: &str = "0.0.0.0:7878";

#[derive(Debug, Clone, PartialEq)]
pub struct WebSettings {
    pub addr: String,
    pub assets_dir: PathBuf,
    pub timeout: Duration,
    pub workers: usize,
}

impl WebSettings {
    /// Reads `PACKFORGE_ADDR`, `PACKFORGE_ASSETS`, `PACKFORGE_TIMEOUT_SECS` and
    /// `PACKFORGE_WORKERS`.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let addr = lookup("PACKFORGE_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let assets_dir = lookup("PACKFORGE_ASSETS")
            .map(PathBuf::from)
            .unwrap_or_else(default_assets_dir);
        let timeout_secs: u64 = parse_var(&lookup, "PACKFORGE_TIMEOUT_SECS")?.unwrap_or(DEFAULT_TIMEOUT_SECS);
        let workers: usize = parse_var(&lookup, "PACKFORGE_WORKERS")?.unwrap_or(DEFAULT_MAX_WORKERS);
        Ok(Self {
            addr,
            assets_dir,
            timeout: Duration::from_secs(timeout_secs),
            workers: workers.max(1),
        })
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|raw| raw.trim().parse::<T>().with_context(|| format!("parse {key}={raw}")))
        .transpose()
}
