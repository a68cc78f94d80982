//! JSON configuration with per-site defaults
//!
//! Loading is two-pass: every site starts as a copy of the `Default`
//! object, then its own keys overlay the copy. Duration strings are
//! validated after the merge so a default can be overridden per site.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Connection settings for one FTP site
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SiteConfig {
    /// Unique site name, also the key for replace-inserts and `gc`
    pub name: String,
    /// `host:port` of the FTP server
    pub address: String,
    pub username: String,
    pub password: String,
    /// Directory where the crawl starts; `/` when empty
    pub root: String,
    /// Upgrade the control channel with `AUTH TLS` before login
    #[serde(rename = "TLS")]
    pub tls: bool,
    /// Accept self-signed certificates
    pub insecure_skip_verify: bool,
    /// Exclude this site from `update`
    pub skip: bool,
    /// Dial deadline, e.g. `"1m"`; empty disables it
    pub connect_timeout: String,
    /// Per-response read deadline; empty disables it
    pub read_timeout: String,
    /// Entry names dropped from every listing
    pub ignore: Vec<String>,
    /// Drop symlinked entries from every listing
    pub ignore_symlinks: bool,
    /// Optional HTTP CONNECT proxy URL
    pub proxy: String,
}

impl SiteConfig {
    /// Parsed [`Self::connect_timeout`]
    pub fn connect_timeout(&self) -> Result<Duration> {
        parse_duration(&self.connect_timeout)
    }

    /// Parsed [`Self::read_timeout`]
    pub fn read_timeout(&self) -> Result<Duration> {
        parse_duration(&self.read_timeout)
    }
}

fn parse_duration(s: &str) -> Result<Duration> {
    if s.is_empty() {
        return Ok(Duration::ZERO);
    }
    humantime::parse_duration(s).map_err(|e| Error::Config(format!("invalid duration {s:?}: {e}")))
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Config {
    /// Path of the SQLite index file
    pub database: String,
    /// Maximum number of concurrent site crawls
    pub concurrency: usize,
    /// Defaults applied to every site before its own keys
    #[serde(default)]
    pub default: SiteConfig,
    #[serde(default)]
    pub sites: Vec<SiteConfig>,
}

// Shallow key-wise overlay of `over` onto `base`
fn merge(base: &mut Value, over: &Value) {
    match (base.as_object_mut(), over.as_object()) {
        (Some(base), Some(over)) => {
            for (key, value) in over {
                base.insert(key.clone(), value.clone());
            }
        }
        _ => *base = over.clone(),
    }
}

impl Config {
    /// Parse and validate a configuration document.
    pub fn parse(data: &str) -> Result<Config> {
        let mut root: Value = serde_json::from_str(data)?;
        let defaults = root.get("Default").cloned().unwrap_or_else(|| {
            Value::Object(serde_json::Map::new())
        });
        if let Some(sites) = root.get_mut("Sites").and_then(Value::as_array_mut) {
            for site in sites {
                let mut merged = defaults.clone();
                merge(&mut merged, site);
                *site = merged;
            }
        }
        let config: Config = serde_json::from_value(root)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse the configuration at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config> {
        let data = std::fs::read_to_string(&path).map_err(|e| {
            Error::Config(format!("{}: {e}", path.as_ref().display()))
        })?;
        Self::parse(&data)
    }

    /// Pretty-printed JSON form, as emitted by the `test` command.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn validate(&self) -> Result<()> {
        if self.database.is_empty() {
            return Err(Error::Config("Database must be set".to_string()));
        }
        if self.concurrency < 1 {
            return Err(Error::Config("Concurrency must be at least 1".to_string()));
        }
        for site in &self.sites {
            site.connect_timeout()?;
            site.read_timeout()?;
            if site.skip {
                continue;
            }
            if site.name.is_empty() {
                return Err(Error::Config("site without a Name".to_string()));
            }
            if site.address.is_empty() {
                return Err(Error::Config(format!("site {}: Address must be set", site.name)));
            }
        }
        Ok(())
    }
}
