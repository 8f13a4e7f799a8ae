//! Management address allocation.
//!
//! Static addresses from the topology are registered first; every node
//! without one then receives the lowest free host address of the management
//! subnet, in document order. The result depends only on the topology, so
//! repeated runs allocate identically.

use std::net::Ipv4Addr;
use thiserror::Error;

use super::registry::{AddressSource, ManagementIpRegistry};
use crate::topology::Topology;
use crate::utils::ip_utils::Ipv4Subnet;

#[derive(Debug, Error)]
pub enum AllocationError {
    #[error("management subnet {subnet} has no free address left for node '{node}'")]
    Exhausted { subnet: Ipv4Subnet, node: String },

    #[error("cannot register management address of node '{node}': {reason}")]
    Conflict { node: String, reason: String },
}

/// Management address of one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagementAssignment {
    pub node: String,
    pub address: Ipv4Addr,
    pub source: AddressSource,
}

/// Assign a management address to every node, in node order
pub fn assign_management_addresses(topology: &Topology) -> Result<Vec<ManagementAssignment>, AllocationError> {
    let mut registry = ManagementIpRegistry::new(topology.management.subnet);

    for node in &topology.nodes {
        if let Some(ip) = node.mgmt_ip {
            registry.register(ip, &node.id).map_err(|reason| AllocationError::Conflict {
                node: node.id.clone(),
                reason,
            })?;
        }
    }

    let mut assignments = Vec::with_capacity(topology.nodes.len());
    for node in &topology.nodes {
        let assignment = match node.mgmt_ip {
            Some(address) => ManagementAssignment {
                node: node.id.clone(),
                address,
                source: AddressSource::Static,
            },
            None => {
                let address = registry.assign_next(&node.id).ok_or_else(|| AllocationError::Exhausted {
                    subnet: registry.subnet(),
                    node: node.id.clone(),
                })?;
                log::info!("Allocated management address {} to node {}", address, node.id);
                ManagementAssignment {
                    node: node.id.clone(),
                    address,
                    source: AddressSource::Allocated,
                }
            }
        };
        assignments.push(assignment);
    }

    log::debug!("Management registry holds {} address(es)", registry.assigned_count());
    Ok(assignments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{ManagementNetwork, Node};
    use std::collections::BTreeMap;

    fn topology(subnet: &str, nodes: &[(&str, Option<[u8; 4]>)]) -> Topology {
        Topology {
            name: "alloc".to_string(),
            management: ManagementNetwork {
                bridge: "br-mgmt".to_string(),
                subnet: subnet.parse().unwrap(),
            },
            nodes: nodes
                .iter()
                .map(|(id, ip)| Node {
                    id: id.to_string(),
                    platform: None,
                    image: "8201-x64-25.1.2.qcow2".to_string(),
                    mgmt_ip: ip.map(Ipv4Addr::from),
                    binds: Vec::new(),
                    config: None,
                })
                .collect(),
            links: Vec::new(),
            hubs: BTreeMap::new(),
            custom: BTreeMap::new(),
        }
    }

    #[test]
    fn test_static_addresses_are_kept_and_skipped() {
        let topo = topology(
            "10.10.0.0/24",
            &[("r1", None), ("r2", Some([10, 10, 0, 1])), ("r3", None)],
        );
        let assignments = assign_management_addresses(&topo).unwrap();

        assert_eq!(assignments.len(), 3);
        assert_eq!(assignments[0].node, "r1");
        assert_eq!(assignments[0].address, Ipv4Addr::new(10, 10, 0, 2));
        assert_eq!(assignments[0].source, AddressSource::Allocated);
        assert_eq!(assignments[1].address, Ipv4Addr::new(10, 10, 0, 1));
        assert_eq!(assignments[1].source, AddressSource::Static);
        assert_eq!(assignments[2].address, Ipv4Addr::new(10, 10, 0, 3));
    }

    #[test]
    fn test_allocation_is_deterministic() {
        let topo = topology("10.10.0.0/24", &[("a", None), ("b", None), ("c", Some([10, 10, 0, 2]))]);
        let first = assign_management_addresses(&topo).unwrap();
        let second = assign_management_addresses(&topo).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_exhausted_subnet() {
        let topo = topology("10.10.0.0/30", &[("a", None), ("b", None), ("c", None)]);
        match assign_management_addresses(&topo) {
            Err(AllocationError::Exhausted { node, .. }) => assert_eq!(node, "c"),
            other => panic!("expected exhaustion, got {:?}", other),
        }
    }
}
