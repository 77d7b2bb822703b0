//! The sampling loop: read the device, shape gauges, push, repeat

use std::time::Duration;

use crate::bluez::{Controller, Device, DeviceHandle, DeviceReader, Directory};
use crate::error::{Error, Result};
use crate::metrics::{self, Gateway, Gauges};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Lost,
    Present,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Connected,
    Disconnected,
}

/// Logs "Connected"/"Disconnected" once per link state change
#[derive(Debug)]
pub struct EdgeLogger {
    state: LinkState,
}

impl Default for EdgeLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl EdgeLogger {
    /// Starts out `Lost`, so the first connected observation logs
    pub fn new() -> Self {
        Self {
            state: LinkState::Lost,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn observe(&mut self, connected: bool) -> Option<Edge> {
        match (self.state, connected) {
            (LinkState::Lost, true) => {
                self.state = LinkState::Present;
                tracing::info!("Connected");
                Some(Edge::Connected)
            }
            (LinkState::Present, false) => {
                self.state = LinkState::Lost;
                tracing::info!("Disconnected");
                Some(Edge::Disconnected)
            }
            _ => None,
        }
    }
}

/// What happened during one tick
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub gauges: Gauges,
    pub edge: Option<Edge>,
    pub read_ok: bool,
    pub pushed: bool,
}

pub struct Sampler<C, G> {
    controller: C,
    gateway: G,
    handle: DeviceHandle,
    address: String,
    interval: Duration,
    edges: EdgeLogger,
}

impl<C, G> Sampler<C, G>
where
    C: Controller + Sync,
    G: Gateway + Sync,
{
    /// Resolve `address` to a handle. Fails if no known device carries it.
    pub async fn start(controller: C, gateway: G, address: &str, interval: Duration) -> Result<Self> {
        let handle = Directory::new(&controller)
            .resolve(address)
            .await?
            .ok_or_else(|| Error::DeviceNotFound(address.to_string()))?;

        tracing::debug!("Resolved {} to {}", address, handle);

        Ok(Self {
            controller,
            gateway,
            handle,
            address: address.to_string(),
            interval,
            edges: EdgeLogger::new(),
        })
    }

    pub fn handle(&self) -> &DeviceHandle {
        &self.handle
    }

    pub fn link_state(&self) -> LinkState {
        self.edges.state()
    }

    pub async fn tick(&mut self) -> TickReport {
        let reader = DeviceReader::new(&self.controller);
        let (device, read_ok) = match reader.read(&self.handle).await {
            Ok(d) => (d, true),
            Err(e) => {
                tracing::info!("Failed to read {}: {}", self.handle, e);
                (Device::unreachable(), false)
            }
        };

        // Battery is unobservable while disconnected; report 0 rather than
        // leaving the gauge at its last value
        let observed = if device.connected {
            device
        } else {
            Device {
                percentage: 0,
                ..device
            }
        };

        let edge = self.edges.observe(observed.connected);
        let gauges = metrics::shape(&observed, &self.address);

        let pushed = match self.gateway.push(&gauges).await {
            Ok(()) => true,
            Err(e) => {
                tracing::info!("Push failed: {}", e);
                false
            }
        };

        TickReport {
            gauges,
            edge,
            read_ok,
            pushed,
        }
    }

    /// Sample forever, one tick per interval
    pub async fn run(mut self) {
        loop {
            let report = self.tick().await;
            tracing::debug!(
                "battery_level={:?} connected={:?} read_ok={} pushed={} edge={:?} link={:?}",
                report.gauges.get(metrics::BATTERY_LEVEL),
                report.gauges.get(metrics::CONNECTED),
                report.read_ok,
                report.pushed,
                report.edge,
                self.link_state()
            );
            tokio::time::sleep(self.interval).await;
        }
    }
}
