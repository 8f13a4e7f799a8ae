//! IPv4 subnet value type and address helpers.
//!
//! The management network of a topology is declared in CIDR notation
//! (`10.10.0.0/24`). `Ipv4Subnet` parses and validates that notation and
//! answers the membership questions the validator and the allocator need.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced while parsing a subnet in CIDR notation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubnetError {
    #[error("missing prefix length in '{0}' (expected a.b.c.d/len)")]
    MissingPrefix(String),

    #[error("invalid IPv4 address '{0}'")]
    InvalidAddress(String),

    #[error("invalid prefix length '{0}' (must be 0-32)")]
    InvalidPrefixLength(String),

    #[error("'{0}' has host bits set (did you mean {1}?)")]
    HostBitsSet(String, String),
}

/// An IPv4 network in CIDR notation.
///
/// Invariant: host bits of `network` are zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ipv4Subnet {
    network: Ipv4Addr,
    prefix_len: u8,
}

impl Ipv4Subnet {
    pub fn new(network: Ipv4Addr, prefix_len: u8) -> Result<Self, SubnetError> {
        if prefix_len > 32 {
            return Err(SubnetError::InvalidPrefixLength(prefix_len.to_string()));
        }
        let mask = prefix_mask(prefix_len);
        let raw = u32::from(network);
        if raw & !mask != 0 {
            let masked = Ipv4Addr::from(raw & mask);
            return Err(SubnetError::HostBitsSet(
                format!("{}/{}", network, prefix_len),
                format!("{}/{}", masked, prefix_len),
            ));
        }
        Ok(Self { network, prefix_len })
    }

    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    pub fn broadcast(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.network) | !prefix_mask(self.prefix_len))
    }

    /// True if `addr` falls inside this network (network and broadcast included)
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        let mask = prefix_mask(self.prefix_len);
        u32::from(addr) & mask == u32::from(self.network)
    }

    /// True if `addr` can be given to a node: inside the network and not the
    /// network or broadcast address. /31 and /32 networks have no usable hosts.
    pub fn is_usable_host(&self, addr: Ipv4Addr) -> bool {
        self.contains(addr) && self.prefix_len < 31 && addr != self.network && addr != self.broadcast()
    }

    /// Usable host addresses in ascending order
    pub fn hosts(&self) -> impl Iterator<Item = Ipv4Addr> {
        let (first, last) = if self.prefix_len >= 31 {
            // Empty range
            (1u32, 0u32)
        } else {
            (u32::from(self.network) + 1, u32::from(self.broadcast()) - 1)
        };
        (first..=last).map(Ipv4Addr::from)
    }
}

fn prefix_mask(prefix_len: u8) -> u32 {
    if prefix_len == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix_len))
    }
}

impl FromStr for Ipv4Subnet {
    type Err = SubnetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (addr_str, prefix_str) = s
            .split_once('/')
            .ok_or_else(|| SubnetError::MissingPrefix(s.to_string()))?;
        let network = addr_str
            .parse::<Ipv4Addr>()
            .map_err(|_| SubnetError::InvalidAddress(addr_str.to_string()))?;
        let prefix_len = prefix_str
            .parse::<u8>()
            .map_err(|_| SubnetError::InvalidPrefixLength(prefix_str.to_string()))?;
        Self::new(network, prefix_len)
    }
}

impl TryFrom<String> for Ipv4Subnet {
    type Error = SubnetError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Ipv4Subnet> for String {
    fn from(subnet: Ipv4Subnet) -> Self {
        subnet.to_string()
    }
}

impl fmt::Display for Ipv4Subnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_len)
    }
}
