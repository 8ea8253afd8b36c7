//! Connectivity graph construction from per-role configuration.
//!
//! The builder walks every role in the spec table, resolves its instances
//! (distributed instances served by the configuration provider plus the
//! synthesized device-under-test instance), resolves peer instances per
//! declared peering, and applies the matching connection strategy to grow
//! the graph. A malformed configuration record aborts the whole build; a
//! missing peer or disabled range is silently skipped.

use std::collections::HashMap;

use serde_json::Value;

use super::{
    connection_specs, ConnectionStrategy, InterfaceSpec, NodeRole, RouteTableSpec,
};
use crate::attr;
use crate::config::{GlobalConfig, IpFamily};
use crate::error::RouteGraphError;
use crate::graph::{ConnectivityGraph, NodeInterface};

/// Reserved agent id of the synthesized device-under-test instance.
pub const DUT_AGENT_ID: &str = "dut";

/// One role instance deployed on an agent, carrying its role-specific
/// configuration record.
#[derive(Debug, Clone)]
pub struct NodeInstance {
    pub agent_id: String,
    pub role: NodeRole,
    pub config: Value,
}

impl NodeInstance {
    fn context(&self) -> String {
        format!("{}@{}", self.role, self.agent_id)
    }
}

/// Distributed configuration provider: serves role instances per agent and
/// resolves cross-agent peers. Implementations must be side-effect free;
/// disabled instances are filtered by the builder, not the provider.
pub trait ConfigProvider {
    fn instances(&self, role: NodeRole) -> Vec<NodeInstance>;

    fn peer_instance(
        &self,
        agent_id: &str,
        role: NodeRole,
        peer_role: NodeRole,
    ) -> Option<NodeInstance>;
}

/// Builds the connectivity graph from the current configuration state.
pub struct GraphBuilder<'a, P: ConfigProvider> {
    provider: &'a P,
    global: &'a GlobalConfig,
    graph: ConnectivityGraph,
}

impl<'a, P: ConfigProvider> GraphBuilder<'a, P> {
    pub fn new(provider: &'a P, global: &'a GlobalConfig) -> Self {
        GraphBuilder {
            provider,
            global,
            graph: ConnectivityGraph::new(),
        }
    }

    /// Clear any previous state and traverse the topology.
    pub fn build(&mut self) -> Result<(), RouteGraphError> {
        self.graph.clear();
        for role in NodeRole::ALL {
            self.build_role(role)?;
        }
        log::info!(
            "connectivity graph: built {} interfaces, {} edges",
            self.graph.interface_count(),
            self.graph.edge_count()
        );
        Ok(())
    }

    pub fn graph(&self) -> &ConnectivityGraph {
        &self.graph
    }

    pub fn into_graph(self) -> ConnectivityGraph {
        self.graph
    }

    /// Synthesize the device-under-test instance of a role from global
    /// configuration: present only when the role has at least one enabled
    /// range and every enabled range is marked device-under-test.
    fn dut_instance(&self, role: NodeRole) -> Result<Option<NodeInstance>, RouteGraphError> {
        let Some(config) = self.global.role_config(role) else {
            return Ok(None);
        };
        let instance = NodeInstance {
            agent_id: DUT_AGENT_ID.to_string(),
            role,
            config: config.clone(),
        };
        let ranges = enabled_ranges(&instance)?;
        if ranges.is_empty() {
            return Ok(None);
        }
        for range in &ranges {
            if !range_is_dut(range, &instance.context())? {
                return Ok(None);
            }
        }
        Ok(Some(instance))
    }

    /// All instances of a role: distributed plus device-under-test.
    fn role_instances(&self, role: NodeRole) -> Result<Vec<NodeInstance>, RouteGraphError> {
        let mut instances = self.provider.instances(role);
        if let Some(dut) = self.dut_instance(role)? {
            instances.push(dut);
        }
        Ok(instances)
    }

    /// Resolve the peer instances a source instance may connect to.
    ///
    /// A distributed source peers with the specific instance deployed
    /// alongside it, falling back to the device-under-test instance of the
    /// peer role; a device-under-test source peers with every instance of
    /// the peer role.
    fn peer_instances(
        &self,
        source: &NodeInstance,
        dut_hosted: bool,
        peer_role: NodeRole,
    ) -> Result<Vec<NodeInstance>, RouteGraphError> {
        if dut_hosted {
            return self.role_instances(peer_role);
        }
        match self
            .provider
            .peer_instance(&source.agent_id, source.role, peer_role)
        {
            Some(peer) => Ok(vec![peer]),
            None => Ok(self.dut_instance(peer_role)?.into_iter().collect()),
        }
    }

    fn build_role(&mut self, role: NodeRole) -> Result<(), RouteGraphError> {
        let specs = connection_specs(role);
        if specs.is_empty() {
            return Ok(());
        }

        for instance in self.role_instances(role)? {
            if !instance_enabled(&instance)? {
                continue;
            }
            let ranges = enabled_ranges(&instance)?;
            if ranges.is_empty() {
                continue;
            }

            let mut dut_hosted = true;
            for range in &ranges {
                if !range_is_dut(range, &instance.context())? {
                    dut_hosted = false;
                    break;
                }
            }

            for spec in &specs {
                let peers = self.peer_instances(&instance, dut_hosted, spec.peer_role)?;
                match &spec.strategy {
                    ConnectionStrategy::Direct {
                        peer_id_path,
                        local,
                        peer,
                    } => self.connect_matching(
                        &instance,
                        &ranges,
                        &peers,
                        Some(peer_id_path),
                        local,
                        peer,
                    )?,
                    ConnectionStrategy::Indirect { local, peer } => {
                        self.connect_matching(&instance, &ranges, &peers, None, local, peer)?
                    }
                    ConnectionStrategy::RouteTable(rt) => {
                        let gateways = self.peer_instances(&instance, dut_hosted, rt.gateway_role)?;
                        self.connect_route_table(&instance, &ranges, rt, &peers, &gateways)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Direct and indirect strategies: pair every source range with every
    /// candidate peer range, filtered by the peer id reference when one is
    /// declared.
    fn connect_matching(
        &mut self,
        source: &NodeInstance,
        src_ranges: &[Value],
        peers: &[NodeInstance],
        peer_id_path: Option<&str>,
        local_spec: &InterfaceSpec,
        peer_spec: &InterfaceSpec,
    ) -> Result<(), RouteGraphError> {
        for src_range in src_ranges {
            let referenced = match peer_id_path {
                Some(path) => {
                    match attr::get_id_list(src_range, path, &source.context())? {
                        Some(ids) => Some(ids),
                        // No reference on this range: nothing to connect
                        None => continue,
                    }
                }
                None => None,
            };

            let Some(src_intf) =
                make_interface(&source.agent_id, source.role, src_range, local_spec)?
            else {
                continue;
            };

            for peer_inst in peers {
                if !instance_enabled(peer_inst)? {
                    continue;
                }
                for peer_range in enabled_ranges(peer_inst)? {
                    if let Some(ids) = &referenced {
                        let peer_id =
                            attr::require_str(&peer_range, "id", &peer_inst.context())?;
                        if !ids.contains(&peer_id) {
                            continue;
                        }
                    }
                    let Some(peer_intf) = make_interface(
                        &peer_inst.agent_id,
                        peer_inst.role,
                        &peer_range,
                        peer_spec,
                    )?
                    else {
                        continue;
                    };
                    self.graph.connect(src_intf.clone(), peer_intf)?;
                }
            }
        }
        Ok(())
    }

    /// Explicit-route-table strategy: each source range carries a list of
    /// (user range id, gateway range id) tuples resolved against the
    /// candidate ranges of the user and gateway roles. Address family
    /// selection is per network name, defaulting to IPv4.
    fn connect_route_table(
        &mut self,
        source: &NodeInstance,
        src_ranges: &[Value],
        rt: &RouteTableSpec,
        users: &[NodeInstance],
        gateways: &[NodeInstance],
    ) -> Result<(), RouteGraphError> {
        let mut candidates: HashMap<String, (String, NodeRole, Value)> = HashMap::new();
        for inst in users.iter().chain(gateways.iter()) {
            if !instance_enabled(inst)? {
                continue;
            }
            for range in enabled_ranges(inst)? {
                let id = attr::require_str(&range, "id", &inst.context())?;
                candidates
                    .entry(id)
                    .or_insert((inst.agent_id.clone(), inst.role, range));
            }
        }

        for src_range in src_ranges {
            let ctx = source.context();
            let Some(entries) = attr::get_list(src_range, rt.table_path, &ctx)? else {
                continue;
            };
            let family = match attr::get_str(src_range, rt.network_name_path, &ctx)? {
                Some(name) => self.global.ip_family(&name),
                None => IpFamily::default(),
            };

            for entry in entries {
                let user_id = attr::require_str(entry, rt.user_range_id_path, &ctx)?;
                let gateway_id = attr::require_str(entry, rt.gateway_range_id_path, &ctx)?;
                let (Some(user), Some(gateway)) =
                    (candidates.get(&user_id), candidates.get(&gateway_id))
                else {
                    // A tuple naming an unknown range is not an error
                    continue;
                };

                let Some(gateway_intf) =
                    make_interface(&gateway.0, gateway.1, &gateway.2, &rt.gateway)?
                else {
                    continue;
                };

                let mut user_specs = Vec::new();
                if family.selects_v4() {
                    user_specs.push(&rt.user_v4);
                }
                if family.selects_v6() {
                    user_specs.push(&rt.user_v6);
                }
                for user_spec in user_specs {
                    let Some(user_intf) =
                        make_interface(&user.0, user.1, &user.2, user_spec)?
                    else {
                        continue;
                    };
                    self.graph.connect(user_intf, gateway_intf.clone())?;
                }
            }
        }
        Ok(())
    }
}

fn instance_enabled(instance: &NodeInstance) -> Result<bool, RouteGraphError> {
    Ok(attr::get_bool(&instance.config, "enabled", &instance.context())?.unwrap_or(true))
}

fn range_enabled(range: &Value, context: &str) -> Result<bool, RouteGraphError> {
    Ok(attr::get_bool(range, "enabled", context)?.unwrap_or(true))
}

fn range_is_dut(range: &Value, context: &str) -> Result<bool, RouteGraphError> {
    Ok(attr::get_bool(range, "isDut", context)?.unwrap_or(false))
}

/// The enabled ranges of an instance. An instance without a `ranges` list
/// has no ranges.
fn enabled_ranges(instance: &NodeInstance) -> Result<Vec<Value>, RouteGraphError> {
    let context = instance.context();
    let Some(ranges) = attr::get_list(&instance.config, "ranges", &context)? else {
        return Ok(Vec::new());
    };
    let mut enabled = Vec::new();
    for range in ranges {
        if range_enabled(range, &context)? {
            enabled.push(range.clone());
        }
    }
    Ok(enabled)
}

/// Construct the node interface a range exposes for an interface spec.
///
/// Returns `Ok(None)` when the range does not configure the interface at
/// all; a partially configured interface or an address that does not form a
/// valid network is a hard error for the producing instance.
fn make_interface(
    agent_id: &str,
    role: NodeRole,
    range: &Value,
    spec: &InterfaceSpec,
) -> Result<Option<NodeInterface>, RouteGraphError> {
    let range_id = attr::require_str(range, "id", &format!("{role}@{agent_id}"))?;
    let context = format!("{role}/{agent_id}/{range_id}");

    let Some(ip_addr) = attr::get_str(range, spec.ip_path, &context)? else {
        return Ok(None);
    };
    let ip_prefix = attr::require_prefix(range, spec.prefix_path, &context)?;
    let gateway = attr::get_str(range, spec.gateway_path, &context)?;
    let is_dut = attr::get_bool(range, "isDut", &context)?.unwrap_or(false);

    let intf = NodeInterface {
        agent_id: agent_id.to_string(),
        role,
        range_id,
        interface_kind: spec.kind.to_lowercase(),
        ip_addr,
        ip_prefix,
        gateway,
        is_dut,
    };
    intf.network()?;
    Ok(Some(intf))
}
