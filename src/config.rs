//! Global configuration records.
//!
//! This module carries the small amount of global state the graph builder
//! and route deriver need beyond the per-agent configuration records served
//! by the provider: the per-role global configuration used to synthesize the
//! device-under-test instance, the per-network address family selection, and
//! the network-configuration introspection format from which the
//! address-to-device map is extracted.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RouteGraphError;
use crate::topology::NodeRole;

/// Address family selection for user-equipment data interfaces.
///
/// `Dual` yields one interface per family. When a network name has no
/// explicit entry the selection defaults to `V4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpFamily {
    #[default]
    V4,
    V6,
    Dual,
}

impl IpFamily {
    pub fn selects_v4(&self) -> bool {
        matches!(self, IpFamily::V4 | IpFamily::Dual)
    }

    pub fn selects_v6(&self) -> bool {
        matches!(self, IpFamily::V6 | IpFamily::Dual)
    }
}

/// Global (agent-independent) configuration.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Per-role global configuration records, in the same heterogeneous
    /// shape the provider serves per agent. Used to derive the
    /// device-under-test instance of each role.
    #[serde(default)]
    pub roles: HashMap<NodeRole, Value>,
    /// Address family selection per network name.
    #[serde(default)]
    pub ip_families: HashMap<String, IpFamily>,
}

impl GlobalConfig {
    /// Address family configured for a network name, defaulting to IPv4.
    pub fn ip_family(&self, network_name: &str) -> IpFamily {
        self.ip_families
            .get(network_name)
            .copied()
            .unwrap_or_default()
    }

    /// Global configuration record for a role, if any.
    pub fn role_config(&self, role: NodeRole) -> Option<&Value> {
        self.roles.get(&role)
    }
}

/// Load a global configuration from a YAML file.
pub fn load_global_config<P: AsRef<Path>>(path: P) -> Result<GlobalConfig, RouteGraphError> {
    let contents = std::fs::read_to_string(path)?;
    let config = serde_yaml::from_str(&contents)?;
    Ok(config)
}

/// Kinds of network configuration blobs attached to a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkConfigKind {
    Vlan,
    Ip,
    Route,
    Dpdk,
}

/// Raw network configuration as reported by network introspection:
/// device name -> config kind -> configuration entries.
pub type NetworkConfig = HashMap<String, HashMap<NetworkConfigKind, Vec<Value>>>;

#[derive(Debug, Deserialize)]
struct AddressEntry {
    addr: String,
}

/// Extract a map from IP address to the device the address is bound to.
///
/// Only `Ip` entries contribute; other configuration kinds are skipped.
pub fn addr_device_map(config: &NetworkConfig) -> Result<HashMap<String, String>, RouteGraphError> {
    let mut addr_devices = HashMap::new();
    for (device, entries) in config {
        for (kind, blobs) in entries {
            if *kind != NetworkConfigKind::Ip {
                continue;
            }
            for blob in blobs {
                let entry: AddressEntry = serde_json::from_value(blob.clone()).map_err(|e| {
                    RouteGraphError::NetworkBlob {
                        device: device.clone(),
                        source: e,
                    }
                })?;
                addr_devices.insert(entry.addr, device.clone());
            }
        }
    }
    Ok(addr_devices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_ip_family_defaults_to_v4() {
        let config = GlobalConfig::default();
        assert_eq!(config.ip_family("internet"), IpFamily::V4);
    }

    #[test]
    fn test_ip_family_selection() {
        assert!(IpFamily::V4.selects_v4());
        assert!(!IpFamily::V4.selects_v6());
        assert!(IpFamily::Dual.selects_v4());
        assert!(IpFamily::Dual.selects_v6());
        assert!(IpFamily::V6.selects_v6());
    }

    #[test]
    fn test_load_global_config_yaml() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "roles:\n  \
               access-node:\n    \
                 ranges:\n      \
                   - id: ran-1\n        \
                     isDut: true\n\
             ip_families:\n  \
               internet: dual\n"
        )
        .unwrap();

        let config = load_global_config(file.path()).unwrap();
        assert_eq!(config.ip_family("internet"), IpFamily::Dual);
        assert_eq!(config.ip_family("other"), IpFamily::V4);
        assert!(config.role_config(NodeRole::AccessNode).is_some());
        assert!(config.role_config(NodeRole::UserEquipment).is_none());
    }

    #[test]
    fn test_addr_device_map_reads_ip_entries_only() {
        let mut config: NetworkConfig = HashMap::new();
        let mut eth0 = HashMap::new();
        eth0.insert(
            NetworkConfigKind::Ip,
            vec![json!({"addr": "10.0.0.1", "prefix": 24})],
        );
        eth0.insert(NetworkConfigKind::Route, vec![json!({"dst": "0.0.0.0"})]);
        config.insert("eth0".to_string(), eth0);

        let map = addr_device_map(&config).unwrap();
        assert_eq!(map.get("10.0.0.1"), Some(&"eth0".to_string()));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_addr_device_map_rejects_bad_blob() {
        let mut config: NetworkConfig = HashMap::new();
        let mut eth0 = HashMap::new();
        eth0.insert(NetworkConfigKind::Ip, vec![json!({"address": "10.0.0.1"})]);
        config.insert("eth0".to_string(), eth0);

        let err = addr_device_map(&config).unwrap_err();
        assert!(matches!(err, RouteGraphError::NetworkBlob { .. }));
    }
}
