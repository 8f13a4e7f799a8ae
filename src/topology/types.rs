//! Topology type definitions.
//!
//! The declarative data model of a lab: nodes, point-to-point links, hubs
//! (shared segments) and custom attachments to host bridges. These types
//! map one-to-one onto the YAML document; serializing a `Topology` and
//! loading it again yields an equal value.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::path::PathBuf;

use super::endpoint::Endpoint;
use crate::utils::ip_utils::Ipv4Subnet;

/// A complete lab topology
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Topology {
    pub name: String,
    pub management: ManagementNetwork,
    pub nodes: Vec<Node>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub hubs: BTreeMap<String, Hub>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom: BTreeMap<String, CustomAttachment>,
}

impl Topology {
    /// Look up a node by id
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id == id)
    }

    /// Number of connectivity directives the topology produces (links + hubs)
    pub fn connection_count(&self) -> usize {
        self.links.len() + self.hubs.len()
    }
}

/// Management network shared by every node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManagementNetwork {
    /// Host bridge the management interfaces attach to
    pub bridge: String,
    pub subnet: Ipv4Subnet,
}

/// An emulated device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Node {
    pub id: String,
    /// Platform tag (e.g. `8201-32FH`); inferred from `image` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    /// Image reference, never checked for existence
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mgmt_ip: Option<Ipv4Addr>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub binds: Vec<Bind>,
    /// Inline startup configuration, passed through verbatim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<String>,
}

impl Node {
    pub fn has_inline_config(&self) -> bool {
        self.config.is_some()
    }
}

/// A host file mounted into the device at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Bind {
    /// Host path, relative paths resolve against the topology file's directory
    pub host: PathBuf,
    /// Path inside the emulated device
    pub guest: String,
}

/// Point-to-point link, written as a two-element list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "[Endpoint; 2]", into = "[Endpoint; 2]")]
pub struct Link {
    pub a: Endpoint,
    pub b: Endpoint,
}

impl Link {
    pub fn new(a: Endpoint, b: Endpoint) -> Self {
        Self { a, b }
    }

    pub fn endpoints(&self) -> [&Endpoint; 2] {
        [&self.a, &self.b]
    }
}

impl From<[Endpoint; 2]> for Link {
    fn from([a, b]: [Endpoint; 2]) -> Self {
        Self { a, b }
    }
}

impl From<Link> for [Endpoint; 2] {
    fn from(link: Link) -> Self {
        [link.a, link.b]
    }
}

/// Shared segment joining two or more endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hub {
    pub endpoints: Vec<Endpoint>,
}

/// Node interfaces attached to a host-level bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CustomAttachment {
    pub linux_bridge: String,
    pub ports: Vec<Endpoint>,
}
