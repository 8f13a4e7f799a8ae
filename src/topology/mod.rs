//! Network topology module.
//!
//! This module contains the declarative topology model (nodes, links, hubs,
//! custom attachments) and the endpoint notation used to wire them.

pub mod types;
pub mod endpoint;

// Re-export key types for easier access
pub use types::{Bind, CustomAttachment, Hub, Link, ManagementNetwork, Node, Topology};
pub use endpoint::{is_valid_interface_name, Endpoint, EndpointParseError};
