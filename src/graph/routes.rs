//! Route derivation from the connectivity graph.
//!
//! Walks the edges of a finished graph and turns them into route records
//! for the external route-configuration API, deduplicating against a
//! caller-owned registry so that routes derived for different agents can
//! still be deduplicated network-wide.

use std::collections::HashMap;
use std::net::IpAddr;

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

use super::{needs_route, AgentNodeInterface, ConnectivityGraph};
use crate::error::RouteGraphError;

/// Scope of a derived route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteScope {
    #[default]
    Universe,
    Link,
    Host,
}

/// One route to be handed to the external route-configuration API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRecord {
    /// Egress device on the requesting agent.
    pub dev: String,
    /// Destination network address.
    pub dst: IpAddr,
    /// Destination network prefix length.
    pub dst_prefix: u8,
    /// Next-hop gateway, if one is configured.
    pub gateway: Option<String>,
    pub scope: RouteScope,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RouteKey {
    agent_id: String,
    dev: String,
    dst: IpAddr,
    dst_prefix: u8,
}

/// Caller-owned route deduplication registry.
///
/// Its lifetime matches one derivation pass; callers that aggregate routes
/// for several agents thread one registry across the `get_routes` calls so
/// the dedup applies network-wide. The first route registered for a key
/// wins; later conflicting gateways are dropped with a warning.
#[derive(Debug, Default)]
pub struct RouteRegistry {
    seen: HashMap<RouteKey, Option<String>>,
}

impl RouteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Derive the routes needed by the interfaces an agent exposes for a role
/// and interface kind.
///
/// The egress device is resolved through the address-to-device map when the
/// local interface address is bound to a known device, falling back to
/// `default_dev` otherwise. An unknown group is not an error: the agent
/// simply has no interfaces that need routing.
pub fn get_routes(
    graph: &ConnectivityGraph,
    group: &AgentNodeInterface,
    default_dev: &str,
    addr_devices: &HashMap<String, String>,
    registry: &mut RouteRegistry,
) -> Result<Vec<RouteRecord>, RouteGraphError> {
    let mut routes = Vec::new();

    let Some(intf_ids) = graph.group(group) else {
        return Ok(routes);
    };

    for intf_id in intf_ids {
        let Some(peer_ids) = graph.neighbors(intf_id) else {
            continue;
        };
        let Some(intf) = graph.interface(intf_id) else {
            continue;
        };

        for peer_id in peer_ids {
            let Some(peer) = graph.interface(peer_id) else {
                continue;
            };

            // The graph may have been built by an unrelated pass; re-check
            // the edge before emitting a route for it.
            if !needs_route(intf, peer)? {
                continue;
            }

            let dev = addr_devices
                .get(&intf.ip_addr)
                .cloned()
                .unwrap_or_else(|| default_dev.to_string());

            let (dst, dst_prefix) = match peer.network()? {
                IpNetwork::V4(net) => (IpAddr::V4(net.network()), net.prefix()),
                IpNetwork::V6(net) => (IpAddr::V6(net.network()), net.prefix()),
            };
            let gateway = intf.usable_gateway().map(str::to_string);

            let key = RouteKey {
                agent_id: group.agent_id.clone(),
                dev: dev.clone(),
                dst,
                dst_prefix,
            };
            match registry.seen.get(&key) {
                Some(existing) if *existing == gateway => continue,
                Some(existing) => {
                    log::warn!(
                        "route conflict for {}/{} on device {}: keeping gateway {:?}, dropping {:?}",
                        dst,
                        dst_prefix,
                        dev,
                        existing,
                        gateway
                    );
                    continue;
                }
                None => {
                    registry.seen.insert(key, gateway.clone());
                }
            }

            routes.push(RouteRecord {
                dev,
                dst,
                dst_prefix,
                gateway,
                scope: RouteScope::default(),
            });
        }
    }

    log::debug!(
        "connectivity graph: constructed {} routes for {}",
        routes.len(),
        group
    );
    Ok(routes)
}
