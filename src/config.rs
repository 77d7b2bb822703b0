//! Runtime configuration
//!
//! Values are layered, lowest first: built-in defaults, the TOML file at
//! ~/.config/bluez-battery-push/config.toml, command-line flags, then
//! environment variables. The result is validated once and never changes.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_DEVICE: &str = "00:00:00:00:00:00";
pub const DEFAULT_ENDPOINT: &str = "http://localhost:9091/";
pub const DEFAULT_JOB: &str = "battery";
pub const DEFAULT_INTERVAL: u64 = 30;
pub const DEFAULT_ADAPTER: &str = "hci0";

/// Upper bound for a single bus call or push
const MAX_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// One partial source of settings (file, flags or environment)
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Layer {
    pub device: Option<String>,
    pub endpoint: Option<String>,
    pub job: Option<String>,
    pub interval: Option<u64>,
    pub adapter: Option<String>,
    pub tls_verify: Option<bool>,
}

impl Layer {
    /// Read the variables `DEVICE`, `ENDPOINT`/`PEP`, `JOB`/`PJ`, `INTERVAL`,
    /// `ADAPTER` and `TLS_VERIFY` through `lookup`
    pub fn from_env(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |keys: &[&str]| {
            keys.iter()
                .find_map(|k| lookup(k).filter(|v| !v.trim().is_empty()))
        };

        let interval = get(&["INTERVAL"])
            .map(|v| {
                v.trim()
                    .parse::<u64>()
                    .map_err(|_| Error::config(format!("INTERVAL must be a positive integer, got '{}'", v)))
            })
            .transpose()?;

        let tls_verify = get(&["TLS_VERIFY"])
            .map(|v| parse_bool(&v).ok_or_else(|| Error::config(format!("TLS_VERIFY must be a boolean, got '{}'", v))))
            .transpose()?;

        Ok(Self {
            device: get(&["DEVICE"]),
            endpoint: get(&["ENDPOINT", "PEP"]),
            job: get(&["JOB", "PJ"]),
            interval,
            adapter: get(&["ADAPTER"]),
            tls_verify,
        })
    }

    /// Values set here win over `self`
    fn overlay(self, other: Layer) -> Layer {
        Layer {
            device: other.device.or(self.device),
            endpoint: other.endpoint.or(self.endpoint),
            job: other.job.or(self.job),
            interval: other.interval.or(self.interval),
            adapter: other.adapter.or(self.adapter),
            tls_verify: other.tls_verify.or(self.tls_verify),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Target address, canonical uppercase form
    pub device: String,
    pub endpoint: String,
    pub job: String,
    pub interval: Duration,
    pub adapter: String,
    /// Off by default so self-signed internal gateways work out of the box
    pub tls_verify: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: DEFAULT_DEVICE.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            job: DEFAULT_JOB.to_string(),
            interval: Duration::from_secs(DEFAULT_INTERVAL),
            adapter: DEFAULT_ADAPTER.to_string(),
            tls_verify: false,
        }
    }
}

impl Config {
    /// Default config file path
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("bluez-battery-push").join("config.toml"))
    }

    /// Load the file layer.
    ///
    /// An explicit path must exist. The default path is optional.
    pub fn load_file(explicit: Option<&Path>) -> Result<Layer> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => match Self::path() {
                Some(p) if p.exists() => p,
                Some(p) => {
                    tracing::debug!("No config file at {:?}, using defaults", p);
                    return Ok(Layer::default());
                }
                None => {
                    tracing::debug!("Could not determine config directory, using defaults");
                    return Ok(Layer::default());
                }
            },
        };

        let contents = fs::read_to_string(&path)
            .map_err(|e| Error::config(format!("Failed to read {:?}: {}", path, e)))?;
        let layer = toml::from_str(&contents)
            .map_err(|e| Error::config(format!("Failed to parse {:?}: {}", path, e)))?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(layer)
    }

    /// Merge the layers over the defaults and validate
    pub fn resolve(file: Layer, flags: Layer, env: Layer) -> Result<Self> {
        let merged = file.overlay(flags).overlay(env);
        let defaults = Self::default();

        let device = canonical_address(merged.device.as_deref().unwrap_or(&defaults.device))?;

        let endpoint = merged.endpoint.unwrap_or(defaults.endpoint);
        validate_endpoint(&endpoint)?;

        let job = merged.job.unwrap_or(defaults.job);
        if job.trim().is_empty() {
            return Err(Error::config("job must not be empty"));
        }

        let interval = match merged.interval {
            Some(0) => return Err(Error::config("interval must be a positive number of seconds")),
            Some(secs) => Duration::from_secs(secs),
            None => defaults.interval,
        };

        let adapter = merged.adapter.unwrap_or(defaults.adapter);
        if adapter.is_empty() || adapter.contains('/') {
            return Err(Error::config(format!("invalid adapter name '{}'", adapter)));
        }

        Ok(Self {
            device,
            endpoint,
            job,
            interval,
            adapter,
            tls_verify: merged.tls_verify.unwrap_or(defaults.tls_verify),
        })
    }

    /// Bound for one bus call or push, always shorter than the interval
    pub fn call_timeout(&self) -> Duration {
        self.interval
            .checked_mul(3)
            .map_or(MAX_CALL_TIMEOUT, |d| d / 4)
            .min(MAX_CALL_TIMEOUT)
    }
}

/// Six colon-separated hex octets, uppercased
pub fn canonical_address(address: &str) -> Result<String> {
    let address = address.trim();
    let octets: Vec<&str> = address.split(':').collect();
    let valid = octets.len() == 6
        && octets
            .iter()
            .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()));

    if !valid {
        return Err(Error::config(format!(
            "invalid device address '{}', expected six colon-separated hex octets",
            address
        )));
    }
    Ok(address.to_ascii_uppercase())
}

fn validate_endpoint(endpoint: &str) -> Result<()> {
    let url = crate::metrics::normalize_endpoint(endpoint);
    let parsed = reqwest::Url::parse(&url)
        .map_err(|e| Error::config(format!("invalid endpoint '{}': {}", endpoint, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::config(format!(
            "unsupported endpoint scheme '{}' in '{}'",
            other, endpoint
        ))),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
