//! Device enumeration under the controller root

use zbus_xml::Node;

use super::{Controller, DeviceHandle, DeviceReader};
use crate::error::Result;

pub struct Directory<'a, C: Controller> {
    controller: &'a C,
}

impl<'a, C: Controller + Sync> Directory<'a, C> {
    pub fn new(controller: &'a C) -> Self {
        Self { controller }
    }

    /// Every device handle currently known to the controller, in bus order
    pub async fn list_devices(&self) -> Result<Vec<DeviceHandle>> {
        let xml = self.controller.introspect_root().await?;
        parse_children(self.controller.root(), &xml)
    }

    /// First device whose address matches `address`, ignoring case
    pub async fn resolve(&self, address: &str) -> Result<Option<DeviceHandle>> {
        let reader = DeviceReader::new(self.controller);

        for handle in self.list_devices().await? {
            match reader.read(&handle).await {
                Ok(device) if device.address.eq_ignore_ascii_case(address) => {
                    return Ok(Some(handle));
                }
                Ok(device) => {
                    tracing::debug!("Skipping {} ({})", handle, device.address);
                }
                Err(e) => {
                    tracing::debug!("Could not read {} while resolving: {}", handle, e);
                }
            }
        }

        Ok(None)
    }
}

/// Child node handles listed in an introspection document
fn parse_children(root: &str, xml: &str) -> Result<Vec<DeviceHandle>> {
    let node = Node::from_reader(xml.as_bytes())?;

    Ok(node
        .nodes()
        .iter()
        .filter_map(|child| child.name())
        .map(|name| DeviceHandle::child_of(root, name))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bluez::fake::{FakeController, ROOT};

    const HCI0: &str = r#"<!DOCTYPE node PUBLIC "-//freedesktop//DTD D-BUS Object Introspection 1.0//EN"
"http://www.freedesktop.org/standards/dbus/1.0/introspect.dtd">
<node>
  <interface name="org.freedesktop.DBus.Introspectable">
    <method name="Introspect">
      <arg name="xml" type="s" direction="out"/>
    </method>
  </interface>
  <interface name="org.bluez.Adapter1">
    <property name="Address" type="s" access="read"/>
  </interface>
  <node name="dev_AA_BB_CC_DD_EE_FF"/>
  <node name="dev_11_22_33_44_55_66"/>
</node>"#;

    #[test]
    fn test_parse_children() {
        let handles = parse_children(ROOT, HCI0).unwrap();
        assert_eq!(
            handles,
            vec![
                DeviceHandle::child_of(ROOT, "dev_AA_BB_CC_DD_EE_FF"),
                DeviceHandle::child_of(ROOT, "dev_11_22_33_44_55_66"),
            ]
        );
    }

    #[test]
    fn test_parse_no_children() {
        let handles = parse_children(ROOT, "<node></node>").unwrap();
        assert!(handles.is_empty());
    }

    #[test]
    fn test_parse_malformed() {
        assert!(parse_children(ROOT, "<node><node name=").is_err());
    }

    #[tokio::test]
    async fn test_list_devices() {
        let mut fake = FakeController::new();
        let a = fake.add_device("dev_AA_BB_CC_DD_EE_FF", "AA:BB:CC:DD:EE:FF", true, true, Some(77));
        let b = fake.add_device("dev_11_22_33_44_55_66", "11:22:33:44:55:66", false, true, None);

        let mut handles = Directory::new(&fake).list_devices().await.unwrap();
        handles.sort_by(|x, y| x.as_str().cmp(y.as_str()));
        assert_eq!(handles, vec![b, a]);
    }

    #[tokio::test]
    async fn test_resolve_case_insensitive() {
        let mut fake = FakeController::new();
        fake.add_device("dev_11_22_33_44_55_66", "11:22:33:44:55:66", false, true, None);
        let target = fake.add_device("dev_AA_BB_CC_DD_EE_FF", "AA:BB:CC:DD:EE:FF", true, true, Some(77));

        let dir = Directory::new(&fake);
        assert_eq!(dir.resolve("aa:bb:cc:dd:ee:ff").await.unwrap(), Some(target.clone()));
        assert_eq!(dir.resolve("AA:BB:CC:DD:EE:FF").await.unwrap(), Some(target));
    }

    #[tokio::test]
    async fn test_resolve_not_found() {
        let mut fake = FakeController::new();
        fake.add_device("dev_11_22_33_44_55_66", "11:22:33:44:55:66", true, true, Some(5));

        let dir = Directory::new(&fake);
        assert_eq!(dir.resolve("AA:BB:CC:DD:EE:FF").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_resolve_empty_controller() {
        let mut fake = FakeController::new();
        fake.introspection = "<node/>".into();

        let dir = Directory::new(&fake);
        assert_eq!(dir.resolve("AA:BB:CC:DD:EE:FF").await.unwrap(), None);
    }
}
