//! Controller access over the D-Bus system bus

use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use zbus::{
    proxy::Proxy,
    zvariant::{OwnedValue, Value},
    Connection,
};

use super::{controller_root, Controller, DeviceHandle, PropValue, PropertyMap, BLUEZ_SERVICE};
use crate::error::{Error, Result};

/// Error names BlueZ answers with when an object lacks the requested interface
const MISSING_INTERFACE_ERRORS: &[&str] = &[
    "org.freedesktop.DBus.Error.InvalidArgs",
    "org.freedesktop.DBus.Error.UnknownInterface",
    "org.freedesktop.DBus.Error.UnknownProperty",
];

pub struct BluezController {
    conn: Connection,
    root: String,
    timeout: Duration,
}

impl BluezController {
    /// Connect to the system bus and address the controller of `adapter`
    pub async fn connect(adapter: &str, timeout: Duration) -> Result<Self> {
        let conn = Connection::system().await?;
        tracing::debug!("Connected to system bus as {:?}", conn.unique_name());
        Ok(Self {
            conn,
            root: controller_root(adapter),
            timeout,
        })
    }
}

/// Run bus work (proxy setup included) under `timeout`
async fn bounded<T>(timeout: Duration, fut: impl Future<Output = zbus::Result<T>>) -> Result<T> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(res) => Ok(res?),
        Err(_) => Err(Error::Timeout(timeout)),
    }
}

#[async_trait]
impl Controller for BluezController {
    fn root(&self) -> &str {
        &self.root
    }

    async fn introspect_root(&self) -> Result<String> {
        bounded(self.timeout, async {
            let proxy = Proxy::new(
                &self.conn,
                BLUEZ_SERVICE,
                self.root.as_str(),
                "org.freedesktop.DBus.Introspectable",
            )
            .await?;
            let xml: String = proxy.call("Introspect", &()).await?;
            Ok::<_, zbus::Error>(xml)
        })
        .await
    }

    async fn read_properties(
        &self,
        handle: &DeviceHandle,
        interface: &str,
    ) -> Result<PropertyMap> {
        let reply = bounded(self.timeout, async {
            let proxy = Proxy::new(
                &self.conn,
                BLUEZ_SERVICE,
                handle.as_str(),
                "org.freedesktop.DBus.Properties",
            )
            .await?;
            let props: HashMap<String, OwnedValue> = proxy.call("GetAll", &(interface,)).await?;
            Ok::<_, zbus::Error>(props)
        })
        .await;

        match reply {
            Ok(props) => Ok(props
                .iter()
                .map(|(name, value)| (name.clone(), to_prop_value(value)))
                .collect()),
            Err(Error::Bus(zbus::Error::MethodError(name, _, _)))
                if is_missing_interface(name.as_str()) =>
            {
                tracing::trace!("{} has no {} interface", handle, interface);
                Ok(PropertyMap::new())
            }
            Err(e) => Err(e),
        }
    }
}

fn is_missing_interface(error_name: &str) -> bool {
    MISSING_INTERFACE_ERRORS.contains(&error_name)
}

fn to_prop_value(value: &Value<'_>) -> PropValue {
    match value {
        Value::Bool(b) => PropValue::Bool(*b),
        Value::U8(n) => PropValue::Int((*n).into()),
        Value::I16(n) => PropValue::Int((*n).into()),
        Value::U16(n) => PropValue::Int((*n).into()),
        Value::I32(n) => PropValue::Int((*n).into()),
        Value::U32(n) => PropValue::Int((*n).into()),
        Value::I64(n) => PropValue::Int(*n),
        Value::U64(n) => PropValue::Int(i64::try_from(*n).unwrap_or(i64::MAX)),
        Value::Str(s) => PropValue::Str(s.to_string()),
        Value::Value(inner) => to_prop_value(inner),
        _ => PropValue::Other,
    }
}
