//! Topology validation.
//!
//! Checks a loaded topology for referential integrity and address
//! consistency before anything is written:
//! - node ids are unique and non-empty
//! - every link, hub and custom endpoint names a declared node and a
//!   well-formed interface, and no interface is wired twice
//! - management addresses lie inside the management subnet and are unique
//! - every bind host path exists
//! - topology, hub, custom and bridge names are safe to write into the
//!   manifest and `bridges.sh`
//!
//! Validation is fail-slow: all problems are collected so an operator can
//! fix several per run.

use std::collections::{BTreeSet, HashMap};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::topology::{Endpoint, Topology};
use crate::utils::ip_utils::Ipv4Subnet;

/// Minimum number of endpoints on a hub segment
pub const MIN_HUB_ENDPOINTS: usize = 2;
/// Minimum number of ports on a custom attachment
pub const MIN_CUSTOM_PORTS: usize = 1;

/// Linux IFNAMSIZ minus the terminating NUL
pub const MAX_BRIDGE_NAME_LEN: usize = 15;

// Node ids name files in the output directory; topology, hub and custom
// names end up in the manifest and in bridges.sh
static SAFE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$").expect("name pattern is valid"));

// Link directives are named link<N>
static LINK_DIRECTIVE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^link[0-9]+$").expect("link name pattern is valid"));

/// A semantic problem in a topology, tagged with the field path it refers to
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{path}: unknown node '{node}'")]
    UnknownNodeReference { path: String, node: String },

    #[error("{path}: node id '{id}' may only contain letters, digits, '_', '-' and '.' and must start with a letter or digit")]
    MalformedNodeId { path: String, id: String },

    #[error("{path}: name '{}' may only contain letters, digits, '_', '-' and '.' and must start with a letter or digit", .name.escape_debug())]
    MalformedName { path: String, name: String },

    #[error("{path}: hub name '{name}' collides with the generated link directive names (link<N>)")]
    ReservedName { path: String, name: String },

    #[error("{path}: bridge name '{}' must be at most {} characters of letters, digits, '_', '-' and '.'", .name.escape_debug(), MAX_BRIDGE_NAME_LEN)]
    MalformedBridgeName { path: String, name: String },

    #[error("{path}: duplicate node id '{id}' (first declared at {first})")]
    DuplicateNodeId { path: String, id: String, first: String },

    #[error("{path}: malformed interface name '{interface}'")]
    MalformedInterfaceName { path: String, interface: String },

    #[error("{path}: address {address} is not a usable host address in management subnet {subnet}")]
    AddressOutOfSubnet { path: String, address: Ipv4Addr, subnet: Ipv4Subnet },

    #[error("{path}: address {address} is already used by node '{owner}'")]
    DuplicateAddress { path: String, address: Ipv4Addr, owner: String },

    #[error("{path}: bind source '{}' does not exist", file.display())]
    DanglingConfigBindingPath { path: String, file: PathBuf },

    #[error("{path}: {found} endpoint(s) given, at least {required} required")]
    HubTooSmall { path: String, found: usize, required: usize },

    #[error("{path}: endpoint '{endpoint}' is already wired at {first}")]
    EndpointReused { path: String, endpoint: String, first: String },

    #[error("{path}: must not be empty")]
    EmptyField { path: String },
}

impl ValidationError {
    /// Field path the error refers to
    pub fn path(&self) -> &str {
        match self {
            Self::UnknownNodeReference { path, .. }
            | Self::MalformedNodeId { path, .. }
            | Self::MalformedName { path, .. }
            | Self::ReservedName { path, .. }
            | Self::MalformedBridgeName { path, .. }
            | Self::DuplicateNodeId { path, .. }
            | Self::MalformedInterfaceName { path, .. }
            | Self::AddressOutOfSubnet { path, .. }
            | Self::DuplicateAddress { path, .. }
            | Self::DanglingConfigBindingPath { path, .. }
            | Self::HubTooSmall { path, .. }
            | Self::EndpointReused { path, .. }
            | Self::EmptyField { path } => path,
        }
    }
}

/// Resolve a bind host path against the topology file's directory
pub fn resolve_bind_path(base_dir: &Path, host: &Path) -> PathBuf {
    if host.is_absolute() {
        host.to_path_buf()
    } else {
        base_dir.join(host)
    }
}

/// Validate a topology, collecting every problem found
///
/// # Arguments
/// * `topology` - The loaded topology
/// * `base_dir` - Directory relative bind paths are resolved against
///
/// # Returns
/// * `Ok(())` if the topology is consistent
/// * `Err(errors)` with all problems, in document order
pub fn validate_topology(topology: &Topology, base_dir: &Path) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if topology.name.trim().is_empty() {
        errors.push(ValidationError::EmptyField { path: "name".to_string() });
    } else {
        check_name(&topology.name, "name".to_string(), &mut errors);
    }
    check_bridge_name(&topology.management.bridge, "management.bridge".to_string(), &mut errors);

    let node_ids = validate_nodes(topology, &mut errors);
    validate_management_addresses(topology, &mut errors);
    validate_bind_paths(topology, base_dir, &mut errors);
    validate_connections(topology, &node_ids, &mut errors);

    log::info!(
        "Validated topology '{}': {} nodes, {} links, {} hubs, {} custom attachments, {} problem(s)",
        topology.name,
        topology.nodes.len(),
        topology.links.len(),
        topology.hubs.len(),
        topology.custom.len(),
        errors.len()
    );

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Check node ids and images; returns the set of declared ids
fn validate_nodes(topology: &Topology, errors: &mut Vec<ValidationError>) -> BTreeSet<String> {
    let mut first_seen: HashMap<&str, usize> = HashMap::new();

    for (i, node) in topology.nodes.iter().enumerate() {
        if node.id.trim().is_empty() {
            errors.push(ValidationError::EmptyField { path: format!("nodes[{}].id", i) });
        } else if !SAFE_NAME.is_match(&node.id) {
            errors.push(ValidationError::MalformedNodeId {
                path: format!("nodes[{}].id", i),
                id: node.id.clone(),
            });
        } else if let Some(first) = first_seen.get(node.id.as_str()) {
            errors.push(ValidationError::DuplicateNodeId {
                path: format!("nodes[{}].id", i),
                id: node.id.clone(),
                first: format!("nodes[{}]", first),
            });
        } else {
            first_seen.insert(&node.id, i);
        }

        if node.image.trim().is_empty() {
            errors.push(ValidationError::EmptyField { path: format!("nodes[{}].image", i) });
        }
    }

    first_seen.keys().map(|id| id.to_string()).collect()
}

/// Check that static management addresses are usable and unique
fn validate_management_addresses(topology: &Topology, errors: &mut Vec<ValidationError>) {
    let subnet = topology.management.subnet;
    let mut owners: HashMap<Ipv4Addr, &str> = HashMap::new();
    let mut with_ip = 0;

    for (i, node) in topology.nodes.iter().enumerate() {
        let Some(address) = node.mgmt_ip else {
            continue;
        };
        with_ip += 1;
        let path = format!("nodes[{}].mgmt_ip", i);

        if !subnet.is_usable_host(address) {
            errors.push(ValidationError::AddressOutOfSubnet { path, address, subnet });
            continue;
        }

        match owners.get(&address) {
            Some(owner) => errors.push(ValidationError::DuplicateAddress {
                path,
                address,
                owner: owner.to_string(),
            }),
            None => {
                owners.insert(address, &node.id);
            }
        }
    }

    let without_ip = topology.nodes.len() - with_ip;
    if with_ip > 0 && without_ip > 0 {
        log::info!(
            "{} node(s) declare a management address, {} will be allocated from {}",
            with_ip, without_ip, subnet
        );
    }
}

/// Check that every bind source file exists
fn validate_bind_paths(topology: &Topology, base_dir: &Path, errors: &mut Vec<ValidationError>) {
    for (i, node) in topology.nodes.iter().enumerate() {
        for (j, bind) in node.binds.iter().enumerate() {
            let resolved = resolve_bind_path(base_dir, &bind.host);
            if !resolved.is_file() {
                errors.push(ValidationError::DanglingConfigBindingPath {
                    path: format!("nodes[{}].binds[{}].host", i, j),
                    file: resolved,
                });
            }
        }
    }
}

/// Check every endpoint of every link, hub and custom attachment
fn validate_connections(topology: &Topology, node_ids: &BTreeSet<String>, errors: &mut Vec<ValidationError>) {
    // endpoint -> path where it was first wired
    let mut wired: HashMap<&Endpoint, String> = HashMap::new();

    for (i, link) in topology.links.iter().enumerate() {
        for (side, endpoint) in link.endpoints().into_iter().enumerate() {
            let path = check_endpoint(endpoint, format!("links[{}][{}]", i, side), node_ids, errors);
            note_wiring(&mut wired, endpoint, path, errors);
        }
    }

    for (name, hub) in &topology.hubs {
        let path = format!("hubs.{}", name);
        if LINK_DIRECTIVE_NAME.is_match(name) {
            errors.push(ValidationError::ReservedName { path, name: name.clone() });
        } else {
            check_name(name, path, errors);
        }
        if hub.endpoints.len() < MIN_HUB_ENDPOINTS {
            errors.push(ValidationError::HubTooSmall {
                path: format!("hubs.{}", name),
                found: hub.endpoints.len(),
                required: MIN_HUB_ENDPOINTS,
            });
        }
        for (k, endpoint) in hub.endpoints.iter().enumerate() {
            let path = check_endpoint(endpoint, format!("hubs.{}[{}]", name, k), node_ids, errors);
            note_wiring(&mut wired, endpoint, path, errors);
        }
    }

    for (name, custom) in &topology.custom {
        check_name(name, format!("custom.{}", name), errors);
        check_bridge_name(&custom.linux_bridge, format!("custom.{}.linux_bridge", name), errors);
        if custom.ports.len() < MIN_CUSTOM_PORTS {
            errors.push(ValidationError::HubTooSmall {
                path: format!("custom.{}.ports", name),
                found: custom.ports.len(),
                required: MIN_CUSTOM_PORTS,
            });
        }
        for (k, endpoint) in custom.ports.iter().enumerate() {
            let path = check_endpoint(endpoint, format!("custom.{}.ports[{}]", name, k), node_ids, errors);
            note_wiring(&mut wired, endpoint, path, errors);
        }
    }
}

fn check_name(name: &str, path: String, errors: &mut Vec<ValidationError>) {
    if !SAFE_NAME.is_match(name) {
        errors.push(ValidationError::MalformedName { path, name: name.to_string() });
    }
}

/// Bridge names must be creatable with `ip link add`
fn check_bridge_name(name: &str, path: String, errors: &mut Vec<ValidationError>) {
    if name.trim().is_empty() {
        errors.push(ValidationError::EmptyField { path });
    } else if name.len() > MAX_BRIDGE_NAME_LEN || !SAFE_NAME.is_match(name) {
        errors.push(ValidationError::MalformedBridgeName { path, name: name.to_string() });
    }
}

/// Check that an endpoint names a declared node and a well-formed interface
fn check_endpoint(
    endpoint: &Endpoint,
    path: String,
    node_ids: &BTreeSet<String>,
    errors: &mut Vec<ValidationError>,
) -> String {
    if !node_ids.contains(&endpoint.node) {
        errors.push(ValidationError::UnknownNodeReference {
            path: path.clone(),
            node: endpoint.node.clone(),
        });
    }
    if !endpoint.has_valid_interface() {
        errors.push(ValidationError::MalformedInterfaceName {
            path: path.clone(),
            interface: endpoint.interface.clone(),
        });
    }
    path
}

fn note_wiring<'a>(
    wired: &mut HashMap<&'a Endpoint, String>,
    endpoint: &'a Endpoint,
    path: String,
    errors: &mut Vec<ValidationError>,
) {
    match wired.get(endpoint) {
        Some(first) => errors.push(ValidationError::EndpointReused {
            path,
            endpoint: endpoint.to_string(),
            first: first.clone(),
        }),
        None => {
            wired.insert(endpoint, path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{Bind, CustomAttachment, Hub, Link, ManagementNetwork, Node};
    use std::collections::BTreeMap;

    fn node(id: &str, mgmt_ip: Option<[u8; 4]>) -> Node {
        Node {
            id: id.to_string(),
            platform: Some("8201-32FH".to_string()),
            image: "8201-x64-25.1.2.qcow2".to_string(),
            mgmt_ip: mgmt_ip.map(Ipv4Addr::from),
            binds: Vec::new(),
            config: None,
        }
    }

    fn ep(s: &str) -> Endpoint {
        s.parse().unwrap()
    }

    fn topology(nodes: Vec<Node>, links: Vec<Link>) -> Topology {
        Topology {
            name: "lab".to_string(),
            management: ManagementNetwork {
                bridge: "br-mgmt".to_string(),
                subnet: "10.10.0.0/24".parse().unwrap(),
            },
            nodes,
            links,
            hubs: BTreeMap::new(),
            custom: BTreeMap::new(),
        }
    }

    fn validate(topology: &Topology) -> Vec<ValidationError> {
        match validate_topology(topology, Path::new(".")) {
            Ok(()) => Vec::new(),
            Err(errors) => errors,
        }
    }

    #[test]
    fn test_two_node_topology_is_valid() {
        let topo = topology(
            vec![node("a", None), node("b", None)],
            vec![Link::new(ep("a:eth0"), ep("b:eth0"))],
        );
        assert!(validate_topology(&topo, Path::new(".")).is_ok());
    }

    #[test]
    fn test_unknown_node_reference() {
        let topo = topology(
            vec![node("a", None), node("b", None)],
            vec![Link::new(ep("a:eth0"), ep("c:eth0"))],
        );
        let errors = validate(&topo);
        assert_eq!(
            errors,
            vec![ValidationError::UnknownNodeReference {
                path: "links[0][1]".to_string(),
                node: "c".to_string(),
            }]
        );
    }

    #[test]
    fn test_duplicate_node_id() {
        let topo = topology(vec![node("a", None), node("a", None)], Vec::new());
        let errors = validate(&topo);
        assert_eq!(errors.len(), 1);
        match &errors[0] {
            ValidationError::DuplicateNodeId { path, id, first } => {
                assert_eq!(path, "nodes[1].id");
                assert_eq!(id, "a");
                assert_eq!(first, "nodes[0]");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_node_ids_must_be_file_safe() {
        let topo = topology(vec![node("../escape", None), node("r1.lab-2_x", None)], Vec::new());
        let errors = validate(&topo);
        assert_eq!(
            errors,
            vec![ValidationError::MalformedNodeId {
                path: "nodes[0].id".to_string(),
                id: "../escape".to_string(),
            }]
        );
    }

    #[test]
    fn test_address_checks() {
        let topo = topology(
            vec![
                node("a", Some([10, 10, 0, 11])),
                node("b", Some([10, 10, 0, 11])),
                node("c", Some([10, 20, 0, 11])),
                node("d", Some([10, 10, 0, 255])),
            ],
            Vec::new(),
        );
        let errors = validate(&topo);
        assert_eq!(errors.len(), 3);
        assert!(matches!(
            &errors[0],
            ValidationError::DuplicateAddress { owner, .. } if owner == "a"
        ));
        assert!(matches!(&errors[1], ValidationError::AddressOutOfSubnet { path, .. } if path == "nodes[2].mgmt_ip"));
        assert!(matches!(&errors[2], ValidationError::AddressOutOfSubnet { path, .. } if path == "nodes[3].mgmt_ip"));
    }

    #[test]
    fn test_errors_are_collected_not_short_circuited() {
        let mut topo = topology(
            vec![node("a", Some([10, 10, 0, 5])), node("a", Some([10, 10, 0, 5]))],
            vec![Link::new(ep("a:eth0"), ep("zz:bad name"))],
        );
        topo.nodes[0].binds.push(Bind {
            host: PathBuf::from("definitely/missing/startup.cfg"),
            guest: "/startup.cfg".to_string(),
        });

        let errors = validate(&topo);
        assert!(errors.iter().any(|e| matches!(e, ValidationError::DuplicateNodeId { .. })));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::DuplicateAddress { .. })));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::DanglingConfigBindingPath { .. })));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::UnknownNodeReference { node, .. } if node == "zz")));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::MalformedInterfaceName { interface, .. } if interface == "bad name")));
    }

    #[test]
    fn test_hub_and_custom_checks() {
        let mut topo = topology(vec![node("a", None), node("b", None)], Vec::new());
        topo.hubs.insert("lonely".to_string(), Hub { endpoints: vec![ep("a:eth1")] });
        topo.hubs.insert("lan".to_string(), Hub { endpoints: vec![ep("a:eth2"), ep("b:eth2")] });
        topo.custom.insert(
            "ext".to_string(),
            CustomAttachment { linux_bridge: String::new(), ports: vec![ep("b:eth2")] },
        );

        let errors = validate(&topo);
        assert_eq!(errors.len(), 3, "{:?}", errors);
        assert!(errors.contains(&ValidationError::HubTooSmall {
            path: "hubs.lonely".to_string(),
            found: 1,
            required: MIN_HUB_ENDPOINTS,
        }));
        assert!(errors.contains(&ValidationError::EmptyField { path: "custom.ext.linux_bridge".to_string() }));
        assert!(errors.contains(&ValidationError::EndpointReused {
            path: "custom.ext.ports[0]".to_string(),
            endpoint: "b:eth2".to_string(),
            first: "hubs.lan[1]".to_string(),
        }));
    }

    #[test]
    fn test_self_loop_is_reused_endpoint() {
        let topo = topology(vec![node("a", None)], vec![Link::new(ep("a:eth0"), ep("a:eth0"))]);
        let errors = validate(&topo);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path(), "links[0][1]");
    }

    #[test]
    fn test_names_must_be_shell_safe() {
        let mut topo = topology(vec![node("a", None), node("b", None)], Vec::new());
        topo.name = "lab\nreboot".to_string();
        topo.hubs.insert("lan 1".to_string(), Hub { endpoints: vec![ep("a:eth1"), ep("b:eth1")] });
        topo.custom.insert(
            "ext\ntouch /tmp/owned #".to_string(),
            CustomAttachment { linux_bridge: "br-ext".to_string(), ports: vec![ep("a:eth9")] },
        );

        let errors = validate(&topo);
        assert_eq!(errors.len(), 3, "{:?}", errors);
        assert_eq!(errors[0].path(), "name");
        assert_eq!(errors[1].path(), "hubs.lan 1");
        assert!(matches!(
            &errors[2],
            ValidationError::MalformedName { name, .. } if name == "ext\ntouch /tmp/owned #"
        ));
    }

    #[test]
    fn test_hub_cannot_shadow_link_directive() {
        let mut topo = topology(
            vec![node("a", None), node("b", None)],
            vec![Link::new(ep("a:eth0"), ep("b:eth0"))],
        );
        topo.hubs.insert("link0".to_string(), Hub { endpoints: vec![ep("a:eth1"), ep("b:eth1")] });
        topo.hubs.insert("linked".to_string(), Hub { endpoints: vec![ep("a:eth2"), ep("b:eth2")] });

        let errors = validate(&topo);
        assert_eq!(
            errors,
            vec![ValidationError::ReservedName {
                path: "hubs.link0".to_string(),
                name: "link0".to_string(),
            }]
        );
    }

    #[test]
    fn test_bridge_name_limits() {
        let mut topo = topology(vec![node("a", None)], Vec::new());
        topo.management.bridge = "br-management-01".to_string();
        topo.custom.insert(
            "ext".to_string(),
            CustomAttachment { linux_bridge: "br-ext-uplink-1".to_string(), ports: vec![ep("a:eth9")] },
        );
        topo.custom.insert(
            "wan".to_string(),
            CustomAttachment { linux_bridge: "br wan".to_string(), ports: vec![ep("a:eth8")] },
        );

        let errors = validate(&topo);
        assert_eq!(errors.len(), 2, "{:?}", errors);
        assert_eq!(errors[0].path(), "management.bridge");
        assert!(matches!(&errors[0], ValidationError::MalformedBridgeName { .. }));
        // "br-ext-uplink-1" is exactly 15 characters
        assert_eq!(errors[1].path(), "custom.wan.linux_bridge");
    }

    #[test]
    fn test_bind_paths_resolve_against_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("r1.cfg"), "hostname r1\n").unwrap();

        let mut topo = topology(vec![node("r1", None)], Vec::new());
        topo.nodes[0].binds.push(Bind { host: PathBuf::from("r1.cfg"), guest: "/startup.cfg".to_string() });

        assert!(validate_topology(&topo, dir.path()).is_ok());
        assert!(validate_topology(&topo, Path::new("/nonexistent-base")).is_err());
    }
}
