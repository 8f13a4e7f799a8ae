//! Emulator-facing type definitions.
//!
//! This module contains the structures written into the output directory:
//! the topology manifest the emulator consumes, its connectivity directives
//! and bridge steps, and the node registry.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Version of the output layout; bump when the manifest shape changes
pub const FORMAT_VERSION: u32 = 1;

/// Manifest file name inside the output directory
pub const MANIFEST_FILE: &str = "vxr_topology.yaml";
/// Node registry file name inside the output directory
pub const REGISTRY_FILE: &str = "nodes.json";
/// Bridge creation script inside the output directory
pub const BRIDGE_SCRIPT_FILE: &str = "bridges.sh";
/// Directory holding one configuration file per node
pub const CONFIG_DIR: &str = "configs";

// ============================================================================
// Manifest Types
// ============================================================================

/// Root of the manifest consumed by the emulator.
///
/// Serialized to `vxr_topology.yaml`. Maps are ordered so output is stable.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EmulatorManifest {
    pub format_version: u32,
    pub name: String,
    pub management: ManifestManagement,
    /// Map of node id to device definition
    pub devices: BTreeMap<String, ManifestDevice>,
    /// One directive per link or hub, links first in document order
    pub connections: Vec<ConnectivityDirective>,
    /// One step per custom attachment
    pub bridges: Vec<BridgeStep>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ManifestManagement {
    pub bridge: String,
    pub subnet: String,
}

/// A device the emulator should boot
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ManifestDevice {
    pub platform: String,
    pub image: String,
    pub mgmt_ip: String,
    /// True when the address came from the allocator rather than the document
    pub mgmt_ip_allocated: bool,
    /// Startup configuration, relative to the output directory
    pub config_file: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub binds: Vec<ManifestBind>,
}

/// A host file mounted into the device
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ManifestBind {
    /// Absolute host path
    pub host: String,
    pub guest: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DirectiveKind {
    Link,
    Hub,
}

/// Endpoints that share one segment
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ConnectivityDirective {
    pub name: String,
    pub kind: DirectiveKind,
    /// Endpoints in `node:interface` notation
    pub endpoints: Vec<String>,
}

/// Host bridge to create for a custom attachment
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BridgeStep {
    /// Name of the custom attachment
    pub name: String,
    pub linux_bridge: String,
    pub ports: Vec<String>,
}

// ============================================================================
// Registry Types
// ============================================================================

/// Information about one node, for tooling that needs to reach it.
///
/// Written to `nodes.json` next to the manifest.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NodeInfo {
    pub id: String,
    pub platform: String,
    pub mgmt_ip: String,
    pub config_file: String,
}

/// Registry of all nodes, in document order
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NodeRegistry {
    pub topology: String,
    pub nodes: Vec<NodeInfo>,
}
