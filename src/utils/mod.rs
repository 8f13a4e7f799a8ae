//! Shared utilities: subnet handling and topology validation.

pub mod ip_utils;
pub mod validation;

pub use ip_utils::{Ipv4Subnet, SubnetError};
pub use validation::{resolve_bind_path, validate_topology, ValidationError};
