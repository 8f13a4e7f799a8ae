//! Connection endpoints.
//!
//! An endpoint is written `node:interface`, e.g. `r1:Hu0/0/0/0`. Parsing only
//! splits the two halves; whether the interface half follows the naming
//! convention is checked by the validator so all naming problems surface
//! together.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

/// Longest interface name accepted
pub const MAX_INTERFACE_NAME_LEN: usize = 64;

// eth0, Hu0/0/0/0, FourHundredGigE0/0/0/1, MgmtEth0/RP0/CPU0/0, Bundle-Ether10.100
static INTERFACE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z-]*[0-9]+(/[A-Za-z]*[0-9]+)*(\.[0-9]+)?$")
        .expect("interface name pattern is valid")
});

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EndpointParseError {
    #[error("endpoint '{0}' must be written node:interface")]
    MissingSeparator(String),

    #[error("endpoint '{0}' has more than one ':' separator")]
    TooManySeparators(String),

    #[error("endpoint '{0}' has an empty node name")]
    EmptyNode(String),

    #[error("endpoint '{0}' has an empty interface name")]
    EmptyInterface(String),
}

/// One side of a connection
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Endpoint {
    pub node: String,
    pub interface: String,
}

impl Endpoint {
    pub fn new(node: impl Into<String>, interface: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            interface: interface.into(),
        }
    }

    /// Check the interface half against the naming convention
    pub fn has_valid_interface(&self) -> bool {
        is_valid_interface_name(&self.interface)
    }
}

/// Check an interface name against the naming convention
pub fn is_valid_interface_name(name: &str) -> bool {
    name.len() <= MAX_INTERFACE_NAME_LEN && INTERFACE_NAME.is_match(name)
}

impl FromStr for Endpoint {
    type Err = EndpointParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (node, interface) = s
            .split_once(':')
            .ok_or_else(|| EndpointParseError::MissingSeparator(s.to_string()))?;
        if interface.contains(':') {
            return Err(EndpointParseError::TooManySeparators(s.to_string()));
        }
        if node.is_empty() {
            return Err(EndpointParseError::EmptyNode(s.to_string()));
        }
        if interface.is_empty() {
            return Err(EndpointParseError::EmptyInterface(s.to_string()));
        }
        Ok(Self::new(node, interface))
    }
}

impl TryFrom<String> for Endpoint {
    type Error = EndpointParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Endpoint> for String {
    fn from(endpoint: Endpoint) -> Self {
        endpoint.to_string()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node, self.interface)
    }
}
