//! Crate-wide error types.
//!
//! The builder and route deriver surface every failure with enough context
//! (agent, role, range, field path) to identify the offending configuration
//! record.

use thiserror::Error;

/// Errors produced while building the connectivity graph or deriving routes.
#[derive(Debug, Error)]
pub enum RouteGraphError {
    /// An interface carries an IP address/prefix pair that does not form a
    /// valid network address.
    #[error("invalid address {addr}/{prefix} on {context}: {reason}")]
    AddressParse {
        addr: String,
        prefix: u8,
        context: String,
        reason: String,
    },

    /// A required configuration field is missing.
    #[error("missing configuration field `{path}` on {context}")]
    FieldAbsent { path: String, context: String },

    /// A configuration field has an unsupported shape, e.g. a peer id
    /// reference that is neither a string nor a list of strings.
    #[error("invalid configuration field `{path}` on {context}: expected {expected}, found {found}")]
    FieldType {
        path: String,
        context: String,
        expected: &'static str,
        found: String,
    },

    /// A network configuration blob could not be decoded.
    #[error("invalid network configuration entry for device {device}: {source}")]
    NetworkBlob {
        device: String,
        #[source]
        source: serde_json::Error,
    },

    /// A global configuration file could not be read.
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// A global configuration file could not be parsed.
    #[error("failed to parse configuration file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
