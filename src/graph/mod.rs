//! Connectivity graph between node interfaces.
//!
//! The graph is a directed adjacency relation over node interfaces: an edge
//! from A to B means "A needs an explicit route to reach B's network". The
//! graph is rebuilt per topology-computation pass and only materializes
//! interfaces that participate in at least one needed route.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::net::IpAddr;

use ipnetwork::IpNetwork;

use crate::error::RouteGraphError;
use crate::topology::NodeRole;

pub mod routes;

/// Gateway sentinel meaning "no gateway configured" (IPv4 form).
pub const UNSET_GATEWAY_V4: &str = "0.0.0.0";
/// Gateway sentinel meaning "no gateway configured" (IPv6 form).
pub const UNSET_GATEWAY_V6: &str = "::";

/// Uniquely identifies a node interface in the connectivity graph.
///
/// Two interfaces with an equal id are the same network endpoint; the graph
/// never stores duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeInterfaceId(String);

impl fmt::Display for NodeInterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One network interface exposed by a role range on an agent.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeInterface {
    pub agent_id: String,
    pub role: NodeRole,
    pub range_id: String,
    /// Interface kind, lower-cased.
    pub interface_kind: String,
    pub ip_addr: String,
    pub ip_prefix: u8,
    pub gateway: Option<String>,
    pub is_dut: bool,
}

impl NodeInterface {
    /// Composite identity: agent / role / range / interface kind.
    pub fn id(&self) -> NodeInterfaceId {
        NodeInterfaceId(format!(
            "{}/{}/{}/{}",
            self.agent_id, self.role, self.range_id, self.interface_kind
        ))
    }

    /// The gateway address, if one is configured and is not the unset
    /// sentinel.
    pub fn usable_gateway(&self) -> Option<&str> {
        match self.gateway.as_deref() {
            None | Some(UNSET_GATEWAY_V4) | Some(UNSET_GATEWAY_V6) => None,
            Some(gw) => Some(gw),
        }
    }

    /// Parse the interface address and prefix into a network.
    pub fn network(&self) -> Result<IpNetwork, RouteGraphError> {
        let addr: IpAddr = self.ip_addr.parse().map_err(|e| self.address_error(e))?;
        IpNetwork::new(addr, self.ip_prefix).map_err(|e| self.address_error(e))
    }

    fn address_error(&self, reason: impl fmt::Display) -> RouteGraphError {
        RouteGraphError::AddressParse {
            addr: self.ip_addr.clone(),
            prefix: self.ip_prefix,
            context: self.id().to_string(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for NodeInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let gateway = self.gateway.as_deref().unwrap_or(UNSET_GATEWAY_V4);
        write!(
            f,
            "Agent={},Role={},Range={},Interface={},IP={},IPPrefix={},GW={},DUT={}",
            self.agent_id,
            self.role,
            self.range_id,
            self.interface_kind,
            self.ip_addr,
            self.ip_prefix,
            gateway,
            self.is_dut
        )
    }
}

/// Index key grouping the interfaces an agent exposes for a role and
/// interface kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AgentNodeInterface {
    pub agent_id: String,
    pub role: NodeRole,
    pub interface_kind: String,
}

impl fmt::Display for AgentNodeInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.agent_id, self.role, self.interface_kind)
    }
}

/// Check if a route needs to be added between two node interfaces.
///
/// A route is needed only when all of the following hold:
/// - the source is not the device under test (no routes are injected into
///   the real system being tested);
/// - the source has a usable gateway to route through;
/// - the two interfaces are hosted on different agents;
/// - the destination address is not already on-link in the source's subnet.
///
/// The predicate is directional: it is evaluated independently per
/// direction, and (A -> B) does not imply (B -> A).
pub fn needs_route(src: &NodeInterface, dst: &NodeInterface) -> Result<bool, RouteGraphError> {
    if src.is_dut {
        return Ok(false);
    }
    if src.usable_gateway().is_none() {
        return Ok(false);
    }
    if src.agent_id == dst.agent_id {
        return Ok(false);
    }
    let src_net = src.network()?;
    let dst_net = dst.network()?;
    Ok(!src_net.contains(dst_net.ip()))
}

/// Directed graph keeping the connection information between node
/// interfaces. Knowing the entire topology connectivity allows the route
/// deriver to build route records for the external route-configuration API.
#[derive(Debug, Default)]
pub struct ConnectivityGraph {
    node_interfaces: HashMap<NodeInterfaceId, NodeInterface>,
    agent_node_interfaces: HashMap<AgentNodeInterface, HashSet<NodeInterfaceId>>,
    connected: HashMap<NodeInterfaceId, HashSet<NodeInterfaceId>>,
}

impl ConnectivityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all interfaces, indexes and edges.
    pub fn clear(&mut self) {
        self.node_interfaces.clear();
        self.agent_node_interfaces.clear();
        self.connected.clear();
    }

    /// Insert an interface if absent (first write wins) and update the
    /// agent/role/kind index.
    pub fn add_interface(&mut self, id: NodeInterfaceId, intf: NodeInterface) {
        let group = AgentNodeInterface {
            agent_id: intf.agent_id.clone(),
            role: intf.role,
            interface_kind: intf.interface_kind.clone(),
        };
        self.node_interfaces.entry(id.clone()).or_insert(intf);
        self.agent_node_interfaces.entry(group).or_default().insert(id);
    }

    /// Insert a directed edge; idempotent.
    pub fn add_edge(&mut self, src: NodeInterfaceId, dst: NodeInterfaceId) {
        self.connected.entry(src).or_default().insert(dst);
    }

    pub fn has_edge(&self, src: &NodeInterfaceId, dst: &NodeInterfaceId) -> bool {
        self.connected
            .get(src)
            .map(|peers| peers.contains(dst))
            .unwrap_or(false)
    }

    /// Total number of directed edges.
    pub fn edge_count(&self) -> usize {
        self.connected.values().map(HashSet::len).sum()
    }

    /// Number of materialized interfaces.
    pub fn interface_count(&self) -> usize {
        self.node_interfaces.len()
    }

    pub fn interface(&self, id: &NodeInterfaceId) -> Option<&NodeInterface> {
        self.node_interfaces.get(id)
    }

    /// Interface ids an agent exposes for a role and interface kind.
    pub fn group(&self, key: &AgentNodeInterface) -> Option<&HashSet<NodeInterfaceId>> {
        self.agent_node_interfaces.get(key)
    }

    /// Interfaces the given interface needs a route towards.
    pub fn neighbors(&self, id: &NodeInterfaceId) -> Option<&HashSet<NodeInterfaceId>> {
        self.connected.get(id)
    }

    /// All directed edges, for diagnostics and rebuild comparison.
    pub fn edges(&self) -> Vec<(NodeInterfaceId, NodeInterfaceId)> {
        let mut edges: Vec<_> = self
            .connected
            .iter()
            .flat_map(|(src, peers)| peers.iter().map(move |dst| (src.clone(), dst.clone())))
            .collect();
        edges.sort();
        edges
    }

    /// Evaluate route-necessity in both directions and record the pair.
    ///
    /// If neither direction needs a route, nothing is inserted: an interface
    /// appears in the graph if and only if it participates in at least one
    /// needed route.
    pub fn connect(
        &mut self,
        src: NodeInterface,
        dst: NodeInterface,
    ) -> Result<(), RouteGraphError> {
        let src_to_dst = needs_route(&src, &dst)?;
        let dst_to_src = needs_route(&dst, &src)?;
        if !src_to_dst && !dst_to_src {
            return Ok(());
        }

        let src_id = src.id();
        let dst_id = dst.id();

        if src_to_dst && !self.has_edge(&src_id, &dst_id) {
            log::debug!("connectivity graph: connection [{}] -> [{}]", src, dst);
        }
        if dst_to_src && !self.has_edge(&dst_id, &src_id) {
            log::debug!("connectivity graph: connection [{}] -> [{}]", dst, src);
        }

        self.add_interface(src_id.clone(), src);
        self.add_interface(dst_id.clone(), dst);

        if src_to_dst {
            self.add_edge(src_id.clone(), dst_id.clone());
        }
        if dst_to_src {
            self.add_edge(dst_id, src_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn intf(
        agent: &str,
        role: NodeRole,
        range: &str,
        ip: &str,
        prefix: u8,
        gateway: Option<&str>,
    ) -> NodeInterface {
        NodeInterface {
            agent_id: agent.to_string(),
            role,
            range_id: range.to_string(),
            interface_kind: "control".to_string(),
            ip_addr: ip.to_string(),
            ip_prefix: prefix,
            gateway: gateway.map(str::to_string),
            is_dut: false,
        }
    }

    #[test]
    fn test_needs_route_false_on_same_agent() {
        let a = intf("agent-1", NodeRole::AccessNode, "r1", "10.0.0.1", 24, Some("10.0.0.254"));
        let b = intf("agent-1", NodeRole::MobilityFunction, "r2", "10.0.1.1", 24, None);
        assert!(!needs_route(&a, &b).unwrap());
    }

    #[test]
    fn test_needs_route_false_for_dut_source() {
        let mut a = intf("agent-1", NodeRole::AccessNode, "r1", "10.0.0.1", 24, Some("10.0.0.254"));
        a.is_dut = true;
        let b = intf("agent-2", NodeRole::MobilityFunction, "r2", "10.0.1.1", 24, None);
        assert!(!needs_route(&a, &b).unwrap());
        // The reverse direction is still subject to the normal rules
        let mut b = b;
        b.gateway = Some("10.0.1.254".to_string());
        assert!(needs_route(&b, &a).unwrap());
    }

    #[test]
    fn test_needs_route_false_without_usable_gateway() {
        let b = intf("agent-2", NodeRole::MobilityFunction, "r2", "10.0.1.1", 24, None);
        let a = intf("agent-1", NodeRole::AccessNode, "r1", "10.0.0.1", 24, None);
        assert!(!needs_route(&a, &b).unwrap());
        let a = intf("agent-1", NodeRole::AccessNode, "r1", "10.0.0.1", 24, Some(UNSET_GATEWAY_V4));
        assert!(!needs_route(&a, &b).unwrap());
        let a = intf("agent-1", NodeRole::AccessNode, "r1", "fd00::1", 64, Some(UNSET_GATEWAY_V6));
        assert!(!needs_route(&a, &b).unwrap());
    }

    #[test]
    fn test_needs_route_subnet_containment() {
        let a = intf("agent-1", NodeRole::AccessNode, "r1", "10.0.0.1", 24, Some("10.0.0.254"));
        let same = intf("agent-2", NodeRole::MobilityFunction, "r2", "10.0.0.200", 24, None);
        assert!(!needs_route(&a, &same).unwrap());
        let other = intf("agent-2", NodeRole::MobilityFunction, "r2", "10.0.1.5", 24, None);
        assert!(needs_route(&a, &other).unwrap());
    }

    #[test]
    fn test_needs_route_invalid_address_is_an_error() {
        let a = intf("agent-1", NodeRole::AccessNode, "r1", "not-an-ip", 24, Some("10.0.0.254"));
        let b = intf("agent-2", NodeRole::MobilityFunction, "r2", "10.0.1.1", 24, None);
        let err = needs_route(&a, &b).unwrap_err();
        assert!(matches!(err, RouteGraphError::AddressParse { .. }));
        // Bad prefix on the destination side fails too
        let a = intf("agent-1", NodeRole::AccessNode, "r1", "10.0.0.1", 24, Some("10.0.0.254"));
        let b = intf("agent-2", NodeRole::MobilityFunction, "r2", "10.0.1.1", 33, None);
        assert!(needs_route(&a, &b).is_err());
    }

    #[test]
    fn test_connect_skips_pairs_without_routes() {
        let mut graph = ConnectivityGraph::new();
        // Same agent: neither direction needs a route, nothing materializes
        let a = intf("agent-1", NodeRole::AccessNode, "r1", "10.0.0.1", 24, Some("10.0.0.254"));
        let b = intf("agent-1", NodeRole::MobilityFunction, "r2", "10.0.1.1", 24, Some("10.0.1.254"));
        graph.connect(a, b).unwrap();
        assert_eq!(graph.interface_count(), 0);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_connect_inserts_both_interfaces_and_needed_edges() {
        let mut graph = ConnectivityGraph::new();
        let a = intf("agent-1", NodeRole::AccessNode, "r1", "10.0.0.1", 24, Some("10.0.0.254"));
        // No gateway on b: only a -> b is needed
        let b = intf("agent-2", NodeRole::MobilityFunction, "r2", "10.0.1.1", 24, None);
        graph.connect(a.clone(), b.clone()).unwrap();

        assert_eq!(graph.interface_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        assert!(graph.has_edge(&a.id(), &b.id()));
        assert!(!graph.has_edge(&b.id(), &a.id()));
    }

    #[test]
    fn test_connect_is_idempotent() {
        let mut graph = ConnectivityGraph::new();
        let a = intf("agent-1", NodeRole::AccessNode, "r1", "10.0.0.1", 24, Some("10.0.0.254"));
        let b = intf("agent-2", NodeRole::MobilityFunction, "r2", "10.0.1.1", 24, Some("10.0.1.254"));
        graph.connect(a.clone(), b.clone()).unwrap();
        let edges = graph.edges();
        graph.connect(a, b).unwrap();
        assert_eq!(graph.edges(), edges);
        assert_eq!(graph.interface_count(), 2);
    }

    #[test]
    fn test_first_interface_write_wins() {
        let mut graph = ConnectivityGraph::new();
        let a = intf("agent-1", NodeRole::AccessNode, "r1", "10.0.0.1", 24, Some("10.0.0.254"));
        let mut again = a.clone();
        again.gateway = Some("10.0.0.253".to_string());
        graph.add_interface(a.id(), a.clone());
        graph.add_interface(again.id(), again);
        assert_eq!(
            graph.interface(&a.id()).unwrap().gateway.as_deref(),
            Some("10.0.0.254")
        );
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut graph = ConnectivityGraph::new();
        let a = intf("agent-1", NodeRole::AccessNode, "r1", "10.0.0.1", 24, Some("10.0.0.254"));
        let b = intf("agent-2", NodeRole::MobilityFunction, "r2", "10.0.1.1", 24, None);
        graph.connect(a, b).unwrap();
        graph.clear();
        assert_eq!(graph.interface_count(), 0);
        assert_eq!(graph.edge_count(), 0);
    }
}
