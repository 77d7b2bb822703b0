//! Snapshot of a single device's state

use super::{Controller, DeviceHandle, PropValue, PropertyMap, BATTERY_INTERFACE, DEVICE_INTERFACE};
use crate::error::Result;

/// Battery percentage reported when the level cannot be observed
pub const UNKNOWN_PERCENTAGE: i32 = -1;

/// Device state at one point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub name: String,
    pub address: String,
    pub connected: bool,
    pub paired: bool,
    /// `0..=100`, or [`UNKNOWN_PERCENTAGE`]
    pub percentage: i32,
}

impl Device {
    /// Stand-in for a device that could not be read
    pub fn unreachable() -> Self {
        Self {
            name: String::new(),
            address: String::new(),
            connected: false,
            paired: false,
            percentage: 0,
        }
    }

    pub fn has_battery(&self) -> bool {
        self.percentage != UNKNOWN_PERCENTAGE
    }
}

pub struct DeviceReader<'a, C: Controller> {
    controller: &'a C,
}

impl<'a, C: Controller + Sync> DeviceReader<'a, C> {
    pub fn new(controller: &'a C) -> Self {
        Self { controller }
    }

    pub async fn read(&self, handle: &DeviceHandle) -> Result<Device> {
        let info = self
            .controller
            .read_properties(handle, DEVICE_INTERFACE)
            .await?;

        let connected = flag(&info, "Connected");
        let paired = flag(&info, "Paired");

        // Battery1 is only exported for paired devices
        let percentage = if paired {
            let battery = self
                .controller
                .read_properties(handle, BATTERY_INTERFACE)
                .await?;
            battery_percentage(&battery)
        } else {
            UNKNOWN_PERCENTAGE
        };

        Ok(Device {
            name: text(&info, "Name"),
            address: text(&info, "Address"),
            connected,
            paired,
            percentage,
        })
    }
}

fn flag(props: &PropertyMap, key: &str) -> bool {
    props.get(key).and_then(PropValue::as_bool).unwrap_or(false)
}

fn text(props: &PropertyMap, key: &str) -> String {
    props
        .get(key)
        .and_then(PropValue::as_str)
        .map(str::to_string)
        .unwrap_or_default()
}

fn battery_percentage(props: &PropertyMap) -> i32 {
    match props.get("Percentage").and_then(PropValue::as_int) {
        Some(p) => p.clamp(0, 100) as i32,
        None => UNKNOWN_PERCENTAGE,
    }
}
