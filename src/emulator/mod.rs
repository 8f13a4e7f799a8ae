//! # Emulator Output Module
//!
//! Describes everything written for the external emulator. The layout is a
//! versioned contract (`FORMAT_VERSION`):
//!
//! ```text
//! <output>/
//!   vxr_topology.yaml   manifest: devices, connections, bridge steps
//!   configs/<id>.cfg    startup configuration, one per node
//!   bridges.sh          host bridge creation, one step per custom attachment
//!   nodes.json          node registry (id, platform, management address)
//! ```
//!
//! ## Example Manifest
//!
//! ```yaml
//! format_version: 1
//! name: isis-sr-lab
//! management:
//!   bridge: br-mgmt
//!   subnet: 10.10.0.0/24
//! devices:
//!   r1:
//!     platform: 8201-32FH
//!     image: images/8201-x64-25.1.2.qcow2
//!     mgmt_ip: 10.10.0.11
//!     mgmt_ip_allocated: false
//!     config_file: configs/r1.cfg
//! connections:
//! - name: link0
//!   kind: link
//!   endpoints:
//!   - r1:Hu0/0/0/0
//!   - r2:Hu0/0/0/0
//! bridges: []
//! ```

pub mod types;
pub mod render;

// Re-export commonly used types for convenience
pub use types::{
    BridgeStep,
    ConnectivityDirective,
    DirectiveKind,
    EmulatorManifest,
    ManifestBind,
    ManifestDevice,
    ManifestManagement,
    NodeInfo,
    NodeRegistry,
    BRIDGE_SCRIPT_FILE,
    CONFIG_DIR,
    FORMAT_VERSION,
    MANIFEST_FILE,
    REGISTRY_FILE,
};
pub use render::{build_connectivity_directives, build_bridge_steps, render_bridge_script};
