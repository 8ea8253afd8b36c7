//! Topology rules: node roles and the per-role connection spec table.
//!
//! The spec table is static, declarative data. For every role it lists the
//! peer roles the role may connect to, the interface kinds involved on each
//! side, the attribute paths used to read addressing fields out of the
//! role-specific configuration records, and the connection strategy that
//! decides which candidate peer ranges actually get connected.

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod builder;

/// Logical network function types that can be instantiated across agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeRole {
    AccessNode,
    MobilityFunction,
    GatewayFunction,
    UserEquipment,
    DataNetwork,
}

impl NodeRole {
    /// All roles, in build order.
    pub const ALL: [NodeRole; 5] = [
        NodeRole::AccessNode,
        NodeRole::MobilityFunction,
        NodeRole::GatewayFunction,
        NodeRole::UserEquipment,
        NodeRole::DataNetwork,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeRole::AccessNode => "access-node",
            NodeRole::MobilityFunction => "mobility-function",
            NodeRole::GatewayFunction => "gateway-function",
            NodeRole::UserEquipment => "user-equipment",
            NodeRole::DataNetwork => "data-network",
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How to read one side's interface out of a range record.
#[derive(Debug, Clone)]
pub struct InterfaceSpec {
    /// Interface kind exposed by the range (e.g. `control`).
    pub kind: &'static str,
    /// Attribute path of the interface IP address.
    pub ip_path: &'static str,
    /// Attribute path of the IP prefix length.
    pub prefix_path: &'static str,
    /// Attribute path of the gateway address.
    pub gateway_path: &'static str,
}

/// Spec data for the explicit-route-table strategy.
///
/// The source role's ranges carry a list of (user range id, gateway range id)
/// tuples; both ids are resolved against the candidate ranges of the peer
/// role and the gateway role.
#[derive(Debug, Clone)]
pub struct RouteTableSpec {
    /// Attribute path of the route table list on the source range.
    pub table_path: &'static str,
    /// Attribute path of the user range id within a table entry.
    pub user_range_id_path: &'static str,
    /// Attribute path of the gateway range id within a table entry.
    pub gateway_range_id_path: &'static str,
    /// Attribute path of the network name on the source range, used to look
    /// up the address family selection.
    pub network_name_path: &'static str,
    /// Role whose ranges supply the gateway side of each connection.
    pub gateway_role: NodeRole,
    pub gateway: InterfaceSpec,
    pub user_v4: InterfaceSpec,
    pub user_v6: InterfaceSpec,
}

/// Strategy deciding which candidate peer ranges a source range connects to.
#[derive(Debug, Clone)]
pub enum ConnectionStrategy {
    /// The source range carries a field holding a single peer range id or a
    /// list of them; a candidate is connected only if its id is referenced.
    Direct {
        peer_id_path: &'static str,
        local: InterfaceSpec,
        peer: InterfaceSpec,
    },
    /// Every enabled range of the peer role is connected; the peering is
    /// implied by topology membership, not by an explicit reference.
    Indirect {
        local: InterfaceSpec,
        peer: InterfaceSpec,
    },
    /// Explicit route table on the source range (data-network to
    /// user-equipment case).
    RouteTable(RouteTableSpec),
}

/// One peering rule: a peer role plus the strategy used to connect to it.
#[derive(Debug, Clone)]
pub struct ConnectionSpec {
    pub peer_role: NodeRole,
    pub strategy: ConnectionStrategy,
}

const CONTROL: InterfaceSpec = InterfaceSpec {
    kind: "control",
    ip_path: "interfaces.control.localAddress",
    prefix_path: "interfaces.control.prefix",
    gateway_path: "interfaces.control.gateway",
};

const DATA: InterfaceSpec = InterfaceSpec {
    kind: "data",
    ip_path: "interfaces.data.localAddress",
    prefix_path: "interfaces.data.prefix",
    gateway_path: "interfaces.data.gateway",
};

const EGRESS: InterfaceSpec = InterfaceSpec {
    kind: "egress",
    ip_path: "interfaces.egress.localAddress",
    prefix_path: "interfaces.egress.prefix",
    gateway_path: "interfaces.egress.gateway",
};

const USER_DATA_V4: InterfaceSpec = InterfaceSpec {
    kind: "data",
    ip_path: "interfaces.data.ipv4.address",
    prefix_path: "interfaces.data.ipv4.prefix",
    gateway_path: "interfaces.data.ipv4.gateway",
};

const USER_DATA_V6: InterfaceSpec = InterfaceSpec {
    kind: "data6",
    ip_path: "interfaces.data.ipv6.address",
    prefix_path: "interfaces.data.ipv6.prefix",
    gateway_path: "interfaces.data.ipv6.gateway",
};

/// Peering rules for a role. Roles with an empty list never originate
/// connections (they may still appear as peers of other roles).
pub fn connection_specs(role: NodeRole) -> Vec<ConnectionSpec> {
    match role {
        NodeRole::AccessNode => vec![
            ConnectionSpec {
                peer_role: NodeRole::MobilityFunction,
                strategy: ConnectionStrategy::Direct {
                    peer_id_path: "mobilityFunctionId",
                    local: CONTROL,
                    peer: CONTROL,
                },
            },
            ConnectionSpec {
                peer_role: NodeRole::GatewayFunction,
                strategy: ConnectionStrategy::Indirect {
                    local: DATA,
                    peer: DATA,
                },
            },
        ],
        NodeRole::MobilityFunction => vec![ConnectionSpec {
            peer_role: NodeRole::GatewayFunction,
            strategy: ConnectionStrategy::Indirect {
                local: CONTROL,
                peer: CONTROL,
            },
        }],
        NodeRole::GatewayFunction => vec![ConnectionSpec {
            peer_role: NodeRole::DataNetwork,
            strategy: ConnectionStrategy::Direct {
                peer_id_path: "dataNetworkIds",
                local: EGRESS,
                peer: EGRESS,
            },
        }],
        NodeRole::DataNetwork => vec![ConnectionSpec {
            peer_role: NodeRole::UserEquipment,
            strategy: ConnectionStrategy::RouteTable(RouteTableSpec {
                table_path: "routes",
                user_range_id_path: "userRangeId",
                gateway_range_id_path: "gatewayRangeId",
                network_name_path: "networkName",
                gateway_role: NodeRole::GatewayFunction,
                gateway: EGRESS,
                user_v4: USER_DATA_V4,
                user_v6: USER_DATA_V6,
            }),
        }],
        NodeRole::UserEquipment => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_role_has_a_spec_entry() {
        // Roles without outgoing peerings return an empty list, not a panic
        for role in NodeRole::ALL {
            let _ = connection_specs(role);
        }
    }

    #[test]
    fn test_data_network_uses_route_table_strategy() {
        let specs = connection_specs(NodeRole::DataNetwork);
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].peer_role, NodeRole::UserEquipment);
        match &specs[0].strategy {
            ConnectionStrategy::RouteTable(rt) => {
                assert_eq!(rt.gateway_role, NodeRole::GatewayFunction);
            }
            other => panic!("unexpected strategy: {other:?}"),
        }
    }

    #[test]
    fn test_role_serde_names() {
        let yaml = serde_yaml::to_string(&NodeRole::AccessNode).unwrap();
        assert_eq!(yaml.trim(), "access-node");
        let role: NodeRole = serde_yaml::from_str("user-equipment").unwrap();
        assert_eq!(role, NodeRole::UserEquipment);
    }
}
