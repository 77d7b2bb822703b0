//! Gauge shaping and the Pushgateway client

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use std::fmt::Write as _;
use std::time::Duration;

use crate::bluez::Device;
use crate::error::{Error, Result};

pub const BATTERY_LEVEL: &str = "battery_level";
pub const CONNECTED: &str = "connected";

/// Prometheus text exposition format
const TEXT_FORMAT: &str = "text/plain; version=0.0.4; charset=utf-8";

// === Shaping ===

#[derive(Debug, Clone, PartialEq)]
pub struct Gauge {
    pub name: &'static str,
    pub help: &'static str,
    pub value: f64,
}

/// The gauges of one tick, grouped under the device address
#[derive(Debug, Clone, PartialEq)]
pub struct Gauges {
    pub address: String,
    pub samples: [Gauge; 2],
}

impl Gauges {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.samples.iter().find(|g| g.name == name).map(|g| g.value)
    }

    /// Render the samples in the text exposition format
    pub fn encode(&self) -> String {
        let mut out = String::new();
        for g in &self.samples {
            let _ = writeln!(out, "# HELP {} {}", g.name, g.help);
            let _ = writeln!(out, "# TYPE {} gauge", g.name);
            let _ = writeln!(out, "{} {}", g.name, g.value);
        }
        out
    }
}

/// Turn a snapshot into the `battery_level` and `connected` gauges.
///
/// `address` is the configured one, not whatever the snapshot carries, so the
/// grouping stays put across reads that came back without an address.
pub fn shape(device: &Device, address: &str) -> Gauges {
    Gauges {
        address: address.to_string(),
        samples: [
            Gauge {
                name: BATTERY_LEVEL,
                help: "Battery level",
                value: f64::from(device.percentage),
            },
            Gauge {
                name: CONNECTED,
                help: "Device level",
                value: if device.connected { 1.0 } else { 0.0 },
            },
        ],
    }
}

// === Gateway ===

#[async_trait]
pub trait Gateway {
    /// Replace the gauges of this job/address group
    async fn push(&self, gauges: &Gauges) -> Result<()>;
}

#[async_trait]
impl<T: Gateway + Sync + ?Sized> Gateway for &T {
    async fn push(&self, gauges: &Gauges) -> Result<()> {
        (**self).push(gauges).await
    }
}

pub struct PushGateway {
    client: reqwest::Client,
    endpoint: String,
    job: String,
    timeout: Duration,
}

impl PushGateway {
    pub fn new(endpoint: &str, job: &str, tls_verify: bool, timeout: Duration) -> Result<Self> {
        if !tls_verify {
            tracing::debug!("TLS certificate verification disabled for {}", endpoint);
        }

        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(!tls_verify)
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: normalize_endpoint(endpoint),
            job: job.to_string(),
            timeout,
        })
    }

    /// `{endpoint}/metrics/job/{job}/address/{address}`
    pub fn url(&self, address: &str) -> String {
        format!(
            "{}/metrics/{}/{}",
            self.endpoint,
            grouping_segment("job", &self.job),
            grouping_segment("address", address)
        )
    }
}

#[async_trait]
impl Gateway for PushGateway {
    async fn push(&self, gauges: &Gauges) -> Result<()> {
        let response = self
            .client
            .put(self.url(&gauges.address))
            .header(CONTENT_TYPE, TEXT_FORMAT)
            .body(gauges.encode())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(self.timeout)
                } else {
                    Error::Http(e)
                }
            })?;

        let status = response.status();
        if status == StatusCode::OK || status == StatusCode::ACCEPTED {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(Error::GatewayStatus {
            status: status.as_u16(),
            body: body.trim().to_string(),
        })
    }
}

/// Drop trailing slashes and default to plain http when no scheme is given
pub fn normalize_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim().trim_end_matches('/');
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}

/// One `name/value` pair of the grouping key path.
///
/// Values that cannot live in a single path segment (empty, or containing a
/// slash) use the `@base64` form.
fn grouping_segment(name: &str, value: &str) -> String {
    if value.is_empty() {
        format!("{}@base64/=", name)
    } else if value.contains('/') {
        format!("{}@base64/{}", name, URL_SAFE_NO_PAD.encode(value))
    } else {
        format!("{}/{}", name, urlencoding::encode(value))
    }
}
