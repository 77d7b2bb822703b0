//! BlueZ access - controller capability, device directory and device reader
//!
//! Everything above this module talks to the Bluetooth stack through the
//! [`Controller`] trait. [`dbus::BluezController`] is the real implementation
//! over the system bus; tests plug in an in-memory one.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;

use crate::error::Result;

pub mod dbus;
pub mod directory;
pub mod reader;

pub use directory::Directory;
pub use reader::{Device, DeviceReader};

pub const BLUEZ_SERVICE: &str = "org.bluez";
pub const DEVICE_INTERFACE: &str = "org.bluez.Device1";
pub const BATTERY_INTERFACE: &str = "org.bluez.Battery1";

/// Object path of the controller an adapter name maps to (`hci0` -> `/org/bluez/hci0`)
pub fn controller_root(adapter: &str) -> String {
    format!("/org/bluez/{}", adapter)
}

// === Handles ===

/// Object path of a device known to the controller.
///
/// Only valid while the stack keeps the device enumerated; reads through a
/// stale handle fail.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceHandle(String);

impl DeviceHandle {
    /// Join a child node name onto a parent path
    pub fn child_of(root: &str, name: &str) -> Self {
        Self(format!("{}/{}", root.trim_end_matches('/'), name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// === Property bag ===

/// A property value as returned by the bus, reduced to the shapes we consume
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    /// Any other bus type (arrays, dicts, paths...)
    Other,
}

impl PropValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

pub type PropertyMap = HashMap<String, PropValue>;

// === Capability ===

/// Read-only access to the local Bluetooth controller
#[async_trait]
pub trait Controller {
    /// Path of the controller root the devices hang off
    fn root(&self) -> &str;

    /// Raw introspection XML of the controller root
    async fn introspect_root(&self) -> Result<String>;

    /// All properties of `interface` on `handle`.
    ///
    /// An interface the object does not implement yields an empty map, not an
    /// error. Errors are reserved for transport failures.
    async fn read_properties(&self, handle: &DeviceHandle, interface: &str)
        -> Result<PropertyMap>;
}

#[async_trait]
impl<T: Controller + Sync + ?Sized> Controller for &T {
    fn root(&self) -> &str {
        (**self).root()
    }

    async fn introspect_root(&self) -> Result<String> {
        (**self).introspect_root().await
    }

    async fn read_properties(
        &self,
        handle: &DeviceHandle,
        interface: &str,
    ) -> Result<PropertyMap> {
        (**self).read_properties(handle, interface).await
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controller_root() {
        assert_eq!(controller_root("hci0"), "/org/bluez/hci0");
        assert_eq!(controller_root("hci1"), "/org/bluez/hci1");
    }

    #[test]
    fn test_child_handle() {
        let h = DeviceHandle::child_of("/org/bluez/hci0", "dev_AA_BB_CC_DD_EE_FF");
        assert_eq!(h.as_str(), "/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF");

        let h = DeviceHandle::child_of("/org/bluez/hci0/", "dev_00");
        assert_eq!(h.to_string(), "/org/bluez/hci0/dev_00");
    }

    #[test]
    fn test_prop_value_projection() {
        assert_eq!(PropValue::Bool(true).as_bool(), Some(true));
        assert_eq!(PropValue::Int(3).as_bool(), None);
        assert_eq!(PropValue::Int(42).as_int(), Some(42));
        assert_eq!(PropValue::Str("x".into()).as_str(), Some("x"));
        assert_eq!(PropValue::Null.as_str(), None);
    }
}
