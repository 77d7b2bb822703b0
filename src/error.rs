//! Error type shared by the bus, gateway and configuration layers

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("D-Bus error: {0}")]
    Bus(#[from] zbus::Error),

    #[error("Failed to parse introspection data: {0}")]
    Introspect(#[from] zbus_xml::Error),

    #[error("No device found '{0}'")]
    DeviceNotFound(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Pushgateway returned status {status}: {body}")]
    GatewayStatus { status: u16, body: String },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
