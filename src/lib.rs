//! # vxrtopo - Topology loader and materializer for virtual router labs
//!
//! This library turns a declarative lab topology (routers, links, shared
//! segments, host bridge attachments and per-device startup configuration)
//! into the directory layout a virtual router emulator consumes.
//!
//! ## Overview
//!
//! A run is a single synchronous batch: load, validate, materialize.
//!
//! - **Load**: parse the YAML document into a `Topology`, reporting the field
//!   path of anything malformed
//! - **Validate**: check node references, interface names, management
//!   addresses and bind files, collecting every problem instead of stopping
//!   at the first
//! - **Materialize**: write one config file per node, one connectivity
//!   directive per link or hub and one bridge step per custom attachment,
//!   atomically and deterministically
//!
//! ## Architecture
//!
//! - `topology`: Topology data model and endpoint notation
//! - `config_loader`: Topology file loading, serialization and normalization
//! - `utils`: Subnet handling and validation
//! - `platform`: Platform inference from image names
//! - `ip`: Management address registry and allocation
//! - `emulator`: Output manifest types and rendering
//! - `orchestrator`: Materialization into the output directory
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use vxrtopo::{config_loader, orchestrator, utils::validation};
//!
//! let path = Path::new("lab.yaml");
//! let topology = config_loader::load_topology(path)?;
//! let base_dir = config_loader::topology_base_dir(path);
//!
//! if let Err(errors) = validation::validate_topology(&topology, &base_dir) {
//!     for error in &errors {
//!         eprintln!("{}", error);
//!     }
//!     std::process::exit(1);
//! }
//!
//! orchestrator::materialize(&topology, &base_dir, Path::new("vxr_output"))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Topology Format
//!
//! ```yaml
//! name: isis-sr-lab
//! management:
//!   bridge: br-mgmt
//!   subnet: 10.10.0.0/24
//! nodes:
//!   - id: r1
//!     image: images/8201-x64-25.1.2.qcow2
//!     mgmt_ip: 10.10.0.11
//!     config: |
//!       hostname r1
//!   - id: r2
//!     platform: 8101-32H
//!     image: images/8101-x64-25.1.2.qcow2
//!     binds:
//!       - host: configs/r2.cfg
//!         guest: /startup.cfg
//! links:
//!   - ["r1:Hu0/0/0/0", "r2:Hu0/0/0/0"]
//! hubs:
//!   lan1: ["r1:Gi0/0/0/1", "r2:Gi0/0/0/1"]
//! custom:
//!   ext1:
//!     linux_bridge: br-ext
//!     ports: ["r1:Gi0/0/0/9"]
//! ```
//!
//! ## Error Handling
//!
//! Each stage has its own error type: `ParseError`, `ValidationError`
//! (returned as a list) and `MaterializeError`. The binary reports them
//! through `color_eyre` and exits non-zero.

pub mod config_loader;
pub mod emulator;
pub mod ip;
pub mod orchestrator;
pub mod platform;
pub mod topology;
pub mod utils;

pub use config_loader::{load_topology, parse_topology_str, ParseError};
pub use orchestrator::{materialize, MaterializeError, MaterializeSummary};
pub use topology::Topology;
pub use utils::validation::{validate_topology, ValidationError};
