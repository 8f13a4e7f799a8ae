//! Management address registry.
//!
//! Tracks which management addresses are taken and by which node, so that
//! dynamic allocation never hands out an address already declared in the
//! topology.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use crate::utils::ip_utils::Ipv4Subnet;

/// How a node obtained its management address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressSource {
    /// Declared in the topology document
    Static,
    /// Assigned from the management subnet
    Allocated,
}

/// Registry of management addresses within one subnet
#[derive(Debug)]
pub struct ManagementIpRegistry {
    subnet: Ipv4Subnet,
    /// IP -> node id
    assigned: BTreeMap<Ipv4Addr, String>,
}

impl ManagementIpRegistry {
    pub fn new(subnet: Ipv4Subnet) -> Self {
        Self {
            subnet,
            assigned: BTreeMap::new(),
        }
    }

    pub fn subnet(&self) -> Ipv4Subnet {
        self.subnet
    }

    /// Register a statically declared address
    pub fn register(&mut self, ip: Ipv4Addr, node_id: &str) -> Result<(), String> {
        if !self.subnet.is_usable_host(ip) {
            return Err(format!("{} is not a usable host address in {}", ip, self.subnet));
        }
        match self.assigned.get(&ip) {
            Some(existing) if existing != node_id => {
                Err(format!("IP {} already assigned to node {}", ip, existing))
            }
            // Same node registering twice is fine
            Some(_) => Ok(()),
            None => {
                self.assigned.insert(ip, node_id.to_string());
                Ok(())
            }
        }
    }

    /// Assign the lowest free host address to `node_id`
    pub fn assign_next(&mut self, node_id: &str) -> Option<Ipv4Addr> {
        let ip = self.subnet.hosts().find(|ip| !self.assigned.contains_key(ip))?;
        self.assigned.insert(ip, node_id.to_string());
        Some(ip)
    }

    pub fn is_ip_assigned(&self, ip: Ipv4Addr) -> bool {
        self.assigned.contains_key(&ip)
    }

    /// Get the node id that owns a given IP
    pub fn get_node_for_ip(&self, ip: Ipv4Addr) -> Option<&str> {
        self.assigned.get(&ip).map(String::as_str)
    }

    pub fn assigned_count(&self) -> usize {
        self.assigned.len()
    }
}
