//! # Routegraph - Connectivity graph and route derivation for emulated networks
//!
//! This library derives the IP routes an emulated multi-agent network
//! topology needs. Given which logical nodes (of a fixed set of node roles)
//! are deployed on which test agents, and which roles are allowed to peer
//! with which others, it builds a connectivity graph of node network
//! interfaces, decides edge by edge whether an explicit route is required,
//! and emits a deduplicated set of route records for an external
//! route-configuration API.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - `attr`: attribute access over heterogeneous per-role configuration
//!   records
//! - `config`: global configuration, address family selection and the
//!   address-to-device map
//! - `graph`: the connectivity graph, interface identity and the
//!   route-necessity predicate
//! - `graph::routes`: route records, deduplication and route derivation
//! - `topology`: node roles and the static connection spec table
//! - `topology::builder`: graph construction from provider-served
//!   configuration state
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//! use routegraph::config::GlobalConfig;
//! use routegraph::graph::routes::{get_routes, RouteRegistry};
//! use routegraph::graph::AgentNodeInterface;
//! use routegraph::topology::builder::{ConfigProvider, GraphBuilder};
//! use routegraph::topology::NodeRole;
//!
//! fn derive<P: ConfigProvider>(provider: &P) -> Result<(), routegraph::error::RouteGraphError> {
//!     let global = GlobalConfig::default();
//!     let mut builder = GraphBuilder::new(provider, &global);
//!     builder.build()?;
//!
//!     let mut registry = RouteRegistry::new();
//!     let routes = get_routes(
//!         builder.graph(),
//!         &AgentNodeInterface {
//!             agent_id: "agent-1".to_string(),
//!             role: NodeRole::AccessNode,
//!             interface_kind: "control".to_string(),
//!         },
//!         "eth0",
//!         &HashMap::new(),
//!         &mut registry,
//!     )?;
//!     // Hand `routes` to the route-configuration API
//!     let _ = routes;
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Public functions return `Result<T, RouteGraphError>`. Malformed
//! configuration (wrong field shapes, invalid addresses) aborts the current
//! build; missing peers and disabled ranges are skipped; route conflicts are
//! logged and resolved in favor of the first registered route.

pub mod attr;
pub mod config;
pub mod error;
pub mod graph;
pub mod topology;
