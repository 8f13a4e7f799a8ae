use crate::topology::Topology;
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while reading or writing a topology document
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read topology file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed document; the message starts with the offending field path
    #[error("malformed topology document: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to serialize topology: {0}")]
    Serialize(#[source] serde_yaml::Error),

    #[error("failed to write topology file '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ParseError {
    /// Line and column of a malformed document error, when known
    pub fn location(&self) -> Option<(usize, usize)> {
        match self {
            Self::Yaml(err) => err.location().map(|loc| (loc.line(), loc.column())),
            _ => None,
        }
    }
}

/// Parse a topology from YAML text
pub fn parse_topology_str(content: &str) -> Result<Topology, ParseError> {
    let topology: Topology = serde_yaml::from_str(content)?;
    Ok(topology)
}

/// Load and parse a topology from a YAML file
pub fn load_topology(path: &Path) -> Result<Topology, ParseError> {
    info!("Loading topology from: {:?}", path);

    let content = fs::read_to_string(path).map_err(|source| ParseError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let topology = parse_topology_str(&content)?;

    info!(
        "Loaded topology '{}' with {} nodes, {} links, {} hubs and {} custom attachments",
        topology.name,
        topology.nodes.len(),
        topology.links.len(),
        topology.hubs.len(),
        topology.custom.len()
    );

    Ok(topology)
}

/// Directory relative bind paths in a topology file resolve against
pub fn topology_base_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Serialize a topology back to its declarative YAML form
pub fn to_yaml(topology: &Topology) -> Result<String, ParseError> {
    serde_yaml::to_string(topology).map_err(ParseError::Serialize)
}

/// Load a topology and rewrite it in canonical form
pub fn normalize_topology(source: &Path, destination: &Path) -> Result<Topology, ParseError> {
    info!("Normalizing topology {:?} into {:?}", source, destination);

    let topology = load_topology(source)?;
    let yaml = to_yaml(&topology)?;
    fs::write(destination, yaml).map_err(|source| ParseError::Write {
        path: destination.to_path_buf(),
        source,
    })?;

    Ok(topology)
}
