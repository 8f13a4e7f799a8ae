//! IP address allocation and management module.
//!
//! This module hands out management addresses: statically declared ones are
//! registered, the remaining nodes get deterministic addresses from the
//! management subnet.

pub mod registry;
pub mod allocator;

// Re-export commonly used types
pub use registry::{AddressSource, ManagementIpRegistry};
pub use allocator::{assign_management_addresses, AllocationError, ManagementAssignment};
