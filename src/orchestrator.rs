//! Materialization orchestrator.
//!
//! This module coordinates the flow from a validated topology to the
//! emulator's output directory: platform resolution, management address
//! allocation, per-node configuration, connectivity directives and bridge
//! steps. The topology is validated, everything is rendered in memory
//! (`MaterializePlan`), then written to a staging directory that replaces the
//! output directory by rename. A failed run leaves the previous output
//! untouched, and only a directory this tool wrote before is ever replaced.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::emulator::{
    build_bridge_steps, build_connectivity_directives, render_bridge_script, EmulatorManifest,
    ManifestBind, ManifestDevice, ManifestManagement, NodeInfo, NodeRegistry, BRIDGE_SCRIPT_FILE,
    CONFIG_DIR, FORMAT_VERSION, MANIFEST_FILE, REGISTRY_FILE,
};
use crate::ip::{assign_management_addresses, AddressSource, AllocationError};
use crate::platform::resolve_platform;
use crate::topology::{Node, Topology};
use crate::utils::validation::{resolve_bind_path, validate_topology, ValidationError};

#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error("failed to serialize {what}: {message}")]
    Serialize { what: &'static str, message: String },

    #[error("refusing to use '{}' as output directory", .0.display())]
    UnsafeOutputDir(PathBuf),

    #[error("'{}' exists and does not hold a previous vxrtopo output; refusing to replace it", .0.display())]
    OutputNotOwned(PathBuf),

    #[error("topology failed validation with {} error(s)", .0.len())]
    Invalid(Vec<ValidationError>),
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> MaterializeError + '_ {
    move |source| MaterializeError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Everything that will be written, rendered in memory
#[derive(Debug, Clone)]
pub struct MaterializePlan {
    pub manifest: EmulatorManifest,
    pub registry: NodeRegistry,
    /// Config file path relative to the output directory -> contents
    pub configs: BTreeMap<String, Vec<u8>>,
    pub bridge_script: String,
}

/// Summary of a completed materialization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializeSummary {
    pub output_dir: PathBuf,
    pub config_files: usize,
    pub connections: usize,
    pub bridge_steps: usize,
}

fn config_file_name(node_id: &str) -> String {
    format!("{}/{}.cfg", CONFIG_DIR, node_id)
}

/// Startup configuration of a node: inline text, else the first bind's
/// contents, else empty
fn node_config_contents(node: &Node, base_dir: &Path) -> Result<Vec<u8>, MaterializeError> {
    if let Some(config) = &node.config {
        if !node.binds.is_empty() {
            log::debug!("Node {} has inline config and binds; inline config takes precedence", node.id);
        }
        return Ok(config.as_bytes().to_vec());
    }

    match node.binds.first() {
        Some(bind) => {
            let path = resolve_bind_path(base_dir, &bind.host);
            fs::read(&path).map_err(io_error(&path))
        }
        None => {
            log::debug!("Node {} has no startup configuration, writing an empty file", node.id);
            Ok(Vec::new())
        }
    }
}

fn manifest_binds(node: &Node, base_dir: &Path) -> Result<Vec<ManifestBind>, MaterializeError> {
    node.binds
        .iter()
        .map(|bind| {
            let path = resolve_bind_path(base_dir, &bind.host);
            let absolute = fs::canonicalize(&path).map_err(io_error(&path))?;
            Ok(ManifestBind {
                host: absolute.to_string_lossy().into_owned(),
                guest: bind.guest.clone(),
            })
        })
        .collect()
}

/// Render a validated topology into an in-memory plan
///
/// # Arguments
/// * `topology` - A topology that passed validation
/// * `base_dir` - Directory relative bind paths resolve against
pub fn plan_materialization(topology: &Topology, base_dir: &Path) -> Result<MaterializePlan, MaterializeError> {
    let assignments = assign_management_addresses(topology)?;

    let mut devices = BTreeMap::new();
    let mut registry_nodes = Vec::with_capacity(topology.nodes.len());
    let mut configs = BTreeMap::new();

    for (node, assignment) in topology.nodes.iter().zip(&assignments) {
        let platform = resolve_platform(node);
        let config_file = config_file_name(&node.id);

        configs.insert(config_file.clone(), node_config_contents(node, base_dir)?);

        devices.insert(
            node.id.clone(),
            ManifestDevice {
                platform: platform.clone(),
                image: node.image.clone(),
                mgmt_ip: assignment.address.to_string(),
                mgmt_ip_allocated: assignment.source == AddressSource::Allocated,
                config_file: config_file.clone(),
                binds: manifest_binds(node, base_dir)?,
            },
        );

        registry_nodes.push(NodeInfo {
            id: node.id.clone(),
            platform,
            mgmt_ip: assignment.address.to_string(),
            config_file,
        });
    }

    let connections = build_connectivity_directives(topology);
    let bridges = build_bridge_steps(topology);
    let bridge_script = render_bridge_script(&topology.name, &bridges);

    let manifest = EmulatorManifest {
        format_version: FORMAT_VERSION,
        name: topology.name.clone(),
        management: ManifestManagement {
            bridge: topology.management.bridge.clone(),
            subnet: topology.management.subnet.to_string(),
        },
        devices,
        connections,
        bridges,
    };

    let registry = NodeRegistry {
        topology: topology.name.clone(),
        nodes: registry_nodes,
    };

    Ok(MaterializePlan {
        manifest,
        registry,
        configs,
        bridge_script,
    })
}

/// Sibling of `output_dir` with the given role, e.g. `out/.lab.staging`
fn sibling_dir(output_dir: &Path, role: &str) -> Result<PathBuf, MaterializeError> {
    let name = match output_dir.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => return Err(MaterializeError::UnsafeOutputDir(output_dir.to_path_buf())),
    };
    let parent = match output_dir.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok(parent.join(format!(".{}.{}", name, role)))
}

/// Staging directory used while writing `output_dir`
pub fn staging_dir_for(output_dir: &Path) -> Result<PathBuf, MaterializeError> {
    sibling_dir(output_dir, "staging")
}

/// Where the previous output is parked while the new one is swapped in
fn backup_dir_for(output_dir: &Path) -> Result<PathBuf, MaterializeError> {
    sibling_dir(output_dir, "previous")
}

/// Whether `output_dir` may be replaced: absent, empty, or holding a
/// manifest or registry written by an earlier run
fn check_output_ownership(output_dir: &Path) -> Result<(), MaterializeError> {
    let metadata = match fs::symlink_metadata(output_dir) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(io_error(output_dir)(e)),
    };
    if !metadata.is_dir() {
        return Err(MaterializeError::OutputNotOwned(output_dir.to_path_buf()));
    }

    let mut entries = fs::read_dir(output_dir).map_err(io_error(output_dir))?;
    let is_empty = entries.next().is_none();
    if is_empty || output_dir.join(MANIFEST_FILE).is_file() || output_dir.join(REGISTRY_FILE).is_file() {
        Ok(())
    } else {
        Err(MaterializeError::OutputNotOwned(output_dir.to_path_buf()))
    }
}

/// Remove a scratch directory, logging instead of failing
fn discard_dir(path: &Path) {
    if let Err(e) = fs::remove_dir_all(path) {
        log::warn!("Failed to remove {:?}: {}", path, e);
    }
}

fn write_file(path: &Path, contents: &[u8]) -> Result<(), MaterializeError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    fs::write(path, contents).map_err(io_error(path))
}

fn write_staged(plan: &MaterializePlan, staging: &Path) -> Result<(), MaterializeError> {
    fs::create_dir_all(staging).map_err(io_error(staging))?;

    let manifest_yaml = serde_yaml::to_string(&plan.manifest).map_err(|e| MaterializeError::Serialize {
        what: "manifest",
        message: e.to_string(),
    })?;
    write_file(&staging.join(MANIFEST_FILE), manifest_yaml.as_bytes())?;

    let mut registry_json =
        serde_json::to_string_pretty(&plan.registry).map_err(|e| MaterializeError::Serialize {
            what: "node registry",
            message: e.to_string(),
        })?;
    registry_json.push('\n');
    write_file(&staging.join(REGISTRY_FILE), registry_json.as_bytes())?;

    // Config directory exists even for an empty topology
    let config_dir = staging.join(CONFIG_DIR);
    fs::create_dir_all(&config_dir).map_err(io_error(&config_dir))?;
    for (relative, contents) in &plan.configs {
        write_file(&staging.join(relative), contents)?;
    }

    let script_path = staging.join(BRIDGE_SCRIPT_FILE);
    write_file(&script_path, plan.bridge_script.as_bytes())?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&script_path, fs::Permissions::from_mode(0o755)).map_err(io_error(&script_path))?;
    }

    Ok(())
}

/// Write a plan into `output_dir`, all or nothing
///
/// The plan is written to a sibling staging directory. The previous
/// `output_dir`, if any, is moved aside, the staging directory is renamed
/// into place and the old output is then dropped. On failure the staging
/// directory is removed and the previous output is restored.
pub fn write_plan(plan: &MaterializePlan, output_dir: &Path) -> Result<(), MaterializeError> {
    let staging = staging_dir_for(output_dir)?;
    let backup = backup_dir_for(output_dir)?;
    check_output_ownership(output_dir)?;

    for stale in [&staging, &backup] {
        if stale.exists() {
            log::warn!("Removing stale directory {:?}", stale);
            fs::remove_dir_all(stale).map_err(io_error(stale))?;
        }
    }

    if let Err(e) = write_staged(plan, &staging) {
        discard_dir(&staging);
        return Err(e);
    }

    let had_previous = output_dir.exists();
    if had_previous {
        log::info!("Replacing previous output in {:?}", output_dir);
        if let Err(e) = fs::rename(output_dir, &backup) {
            discard_dir(&staging);
            return Err(io_error(output_dir)(e));
        }
    }

    if let Err(e) = fs::rename(&staging, output_dir) {
        discard_dir(&staging);
        if had_previous {
            if let Err(restore) = fs::rename(&backup, output_dir) {
                log::warn!("Failed to restore previous output from {:?}: {}", backup, restore);
            }
        }
        return Err(io_error(output_dir)(e));
    }

    if had_previous {
        discard_dir(&backup);
    }
    Ok(())
}

/// Validate, render and write a topology into `output_dir`
///
/// Nothing is written when validation fails.
pub fn materialize(
    topology: &Topology,
    base_dir: &Path,
    output_dir: &Path,
) -> Result<MaterializeSummary, MaterializeError> {
    log::info!("Materializing topology '{}' into {:?}", topology.name, output_dir);

    validate_topology(topology, base_dir).map_err(MaterializeError::Invalid)?;
    let plan = plan_materialization(topology, base_dir)?;
    write_plan(&plan, output_dir)?;

    let summary = MaterializeSummary {
        output_dir: output_dir.to_path_buf(),
        config_files: plan.configs.len(),
        connections: plan.manifest.connections.len(),
        bridge_steps: plan.manifest.bridges.len(),
    };

    log::info!(
        "Wrote {} config file(s), {} connectivity directive(s), {} bridge step(s)",
        summary.config_files, summary.connections, summary.bridge_steps
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_loader::parse_topology_str;

    const TWO_NODES: &str = r#"
name: pair
management:
  bridge: br-mgmt
  subnet: 10.10.0.0/24
nodes:
  - id: a
    image: 8201-x64-25.1.2.qcow2
    config: |
      hostname a
  - id: b
    image: 8101-32FH-x64-25.1.2.qcow2
    mgmt_ip: 10.10.0.1
links:
  - - a:eth0
    - b:eth0
"#;

    #[test]
    fn test_plan_two_nodes() {
        let topology = parse_topology_str(TWO_NODES).unwrap();
        let plan = plan_materialization(&topology, Path::new(".")).unwrap();

        assert_eq!(plan.configs.len(), 2);
        assert_eq!(plan.configs["configs/a.cfg"], b"hostname a\n".to_vec());
        assert!(plan.configs["configs/b.cfg"].is_empty());
        assert_eq!(plan.manifest.connections.len(), 1);
        assert!(plan.manifest.bridges.is_empty());

        let a = &plan.manifest.devices["a"];
        assert_eq!(a.platform, "8201-32FH");
        assert_eq!(a.mgmt_ip, "10.10.0.2");
        assert!(a.mgmt_ip_allocated);

        let b = &plan.manifest.devices["b"];
        assert_eq!(b.platform, "8101-32FH");
        assert_eq!(b.mgmt_ip, "10.10.0.1");
        assert!(!b.mgmt_ip_allocated);

        let ids: Vec<&str> = plan.registry.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_first_bind_supplies_config() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.cfg"), "hostname b\n").unwrap();
        fs::write(dir.path().join("extra.cfg"), "extra\n").unwrap();

        let mut topology = parse_topology_str(TWO_NODES).unwrap();
        topology.nodes[1].binds = vec![
            crate::topology::Bind { host: PathBuf::from("b.cfg"), guest: "/startup.cfg".to_string() },
            crate::topology::Bind { host: PathBuf::from("extra.cfg"), guest: "/extra.cfg".to_string() },
        ];

        let plan = plan_materialization(&topology, dir.path()).unwrap();
        assert_eq!(plan.configs["configs/b.cfg"], b"hostname b\n".to_vec());

        let binds = &plan.manifest.devices["b"].binds;
        assert_eq!(binds.len(), 2);
        assert!(Path::new(&binds[0].host).is_absolute());
        assert_eq!(binds[1].guest, "/extra.cfg");
    }

    #[test]
    fn test_staging_dir() {
        assert_eq!(
            staging_dir_for(Path::new("out/lab")).unwrap(),
            PathBuf::from("out/.lab.staging")
        );
        assert_eq!(staging_dir_for(Path::new("lab")).unwrap(), PathBuf::from("./.lab.staging"));
        assert!(matches!(staging_dir_for(Path::new("/")), Err(MaterializeError::UnsafeOutputDir(_))));
        assert!(matches!(staging_dir_for(Path::new("..")), Err(MaterializeError::UnsafeOutputDir(_))));
    }

    #[test]
    fn test_foreign_directory_is_not_replaced() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("lab.yaml"), TWO_NODES).unwrap();
        fs::write(dir.path().join("notes.txt"), "keep me").unwrap();
        let topology = parse_topology_str(TWO_NODES).unwrap();

        let result = materialize(&topology, dir.path(), dir.path());
        assert!(matches!(result, Err(MaterializeError::OutputNotOwned(_))));
        assert_eq!(fs::read_to_string(dir.path().join("notes.txt")).unwrap(), "keep me");
        assert!(dir.path().join("lab.yaml").is_file());
        assert!(!dir.path().join(MANIFEST_FILE).exists());
    }

    #[test]
    fn test_plain_file_is_not_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out");
        fs::write(&output, "not a directory").unwrap();
        let topology = parse_topology_str(TWO_NODES).unwrap();

        assert!(matches!(
            materialize(&topology, dir.path(), &output),
            Err(MaterializeError::OutputNotOwned(_))
        ));
        assert_eq!(fs::read_to_string(&output).unwrap(), "not a directory");
    }

    #[test]
    fn test_empty_directory_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out");
        fs::create_dir(&output).unwrap();
        let topology = parse_topology_str(TWO_NODES).unwrap();

        materialize(&topology, dir.path(), &output).unwrap();
        assert!(output.join(MANIFEST_FILE).is_file());
    }

    #[test]
    fn test_invalid_topology_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out");
        let mut topology = parse_topology_str(TWO_NODES).unwrap();
        topology.nodes[0].id = "../escape".to_string();

        match materialize(&topology, dir.path(), &output) {
            Err(MaterializeError::Invalid(errors)) => {
                assert!(errors.iter().any(|e| matches!(e, ValidationError::MalformedNodeId { .. })));
            }
            other => panic!("expected validation failure, got {:?}", other),
        }
        assert!(!output.exists());
        assert!(!dir.path().join("escape.cfg").exists());
    }

    #[test]
    fn test_rerun_leaves_no_scratch_directories() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out");
        let topology = parse_topology_str(TWO_NODES).unwrap();

        // Leftovers from an interrupted run
        fs::create_dir_all(dir.path().join(".out.staging")).unwrap();
        fs::create_dir_all(dir.path().join(".out.previous")).unwrap();

        materialize(&topology, dir.path(), &output).unwrap();
        materialize(&topology, dir.path(), &output).unwrap();

        assert!(output.join(MANIFEST_FILE).is_file());
        assert!(!dir.path().join(".out.staging").exists());
        assert!(!dir.path().join(".out.previous").exists());
    }

    #[test]
    fn test_materialize_writes_layout() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out");
        let topology = parse_topology_str(TWO_NODES).unwrap();

        let summary = materialize(&topology, dir.path(), &output).unwrap();
        assert_eq!(summary.config_files, 2);
        assert_eq!(summary.connections, 1);
        assert_eq!(summary.bridge_steps, 0);

        assert!(output.join(MANIFEST_FILE).is_file());
        assert!(output.join(REGISTRY_FILE).is_file());
        assert!(output.join(BRIDGE_SCRIPT_FILE).is_file());
        assert!(output.join("configs/a.cfg").is_file());
        assert!(output.join("configs/b.cfg").is_file());
        assert!(!dir.path().join(".out.staging").exists());
    }
}
