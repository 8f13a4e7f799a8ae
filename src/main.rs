use clap::Parser;
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use env_logger::Env;
use log::{error, info};
use std::path::PathBuf;

use vxrtopo::{config_loader, orchestrator, utils::validation};

/// Topology loader and materializer for virtual router lab emulation
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the topology YAML file
    #[arg(short, long)]
    topology: PathBuf,

    /// Output directory for the emulator configuration
    #[arg(short, long, default_value = "vxr_output")]
    output: PathBuf,

    /// Load and validate only, write nothing
    #[arg(long, conflicts_with = "normalize")]
    check: bool,

    /// Rewrite the topology in canonical form and exit
    #[arg(long)]
    normalize: bool,

    /// Output path for the normalized topology
    #[arg(long, requires = "normalize")]
    normalize_output: Option<PathBuf>,
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    let args = Args::parse();

    // Initialize logging with default filter level of "info"
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    info!("Starting vxrtopo");
    info!("Topology file: {:?}", args.topology);

    if args.normalize {
        let output_path = args.normalize_output.unwrap_or_else(|| {
            let mut path = args.topology.clone();
            path.set_extension("normalized.yaml");
            path
        });

        config_loader::normalize_topology(&args.topology, &output_path)
            .wrap_err("Failed to normalize topology")?;
        info!("Topology normalized successfully to: {:?}", output_path);
        return Ok(());
    }

    let topology = config_loader::load_topology(&args.topology)
        .wrap_err_with(|| format!("Failed to load topology '{}'", args.topology.display()))?;
    let base_dir = config_loader::topology_base_dir(&args.topology);

    if let Err(errors) = validation::validate_topology(&topology, &base_dir) {
        for e in &errors {
            error!("{}", e);
        }
        return Err(eyre!(
            "Topology '{}' failed validation with {} error(s)",
            topology.name,
            errors.len()
        ));
    }
    info!("Topology '{}' is valid", topology.name);

    if args.check {
        return Ok(());
    }

    info!("Output directory: {:?}", args.output);
    let summary = orchestrator::materialize(&topology, &base_dir, &args.output)
        .wrap_err_with(|| format!("Failed to materialize into '{}'", args.output.display()))?;

    info!(
        "Generated emulator configuration in {:?} ({} nodes, {} connections, {} bridges)",
        summary.output_dir, summary.config_files, summary.connections, summary.bridge_steps
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let args = Args::parse_from(["vxrtopo", "--topology", "lab.yaml"]);

        assert_eq!(args.topology, PathBuf::from("lab.yaml"));
        assert_eq!(args.output, PathBuf::from("vxr_output"));
        assert!(!args.check);
        assert!(!args.normalize);
    }

    #[test]
    fn test_normalize_args() {
        let args = Args::parse_from([
            "vxrtopo",
            "-t", "lab.yaml",
            "--normalize",
            "--normalize-output", "lab.canonical.yaml",
        ]);

        assert!(args.normalize);
        assert_eq!(args.normalize_output, Some(PathBuf::from("lab.canonical.yaml")));
    }

    #[test]
    fn test_normalize_output_requires_normalize() {
        let result = Args::try_parse_from(["vxrtopo", "-t", "lab.yaml", "--normalize-output", "x.yaml"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_check_conflicts_with_normalize() {
        let result = Args::try_parse_from(["vxrtopo", "-t", "lab.yaml", "--check", "--normalize"]);
        assert!(result.is_err());
    }
}
