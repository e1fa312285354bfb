use clap::Parser;
use color_eyre::Result;
use env_logger::Env;
use log::info;
use std::path::PathBuf;

use sdnlab::config::controller_from_env;
use sdnlab::{config_loader, orchestrator, topology};

/// Five-switch OpenFlow lab for a remote SDN controller (address from ONOS_IP)
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a YAML run settings file
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Run every system command through sudo
    #[arg(long)]
    sudo: bool,

    /// Print the commands that would build and tear down the lab, then exit
    #[arg(long)]
    dry_run: bool,

    /// Write the declared topology to a YAML (or .json) file, then exit
    #[arg(long, conflicts_with = "dry_run")]
    export: Option<PathBuf>,
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    let args = Args::parse();

    // Initialize logging with default filter level of "info"
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let settings = config_loader::resolve_settings(args.settings.as_deref(), args.sudo)?;

    if let Some(path) = &args.export {
        let topology = topology::sdn_lab(&controller_from_env())?;
        return orchestrator::export_topology(&topology, path);
    }

    if args.dry_run {
        let (start, stop) = orchestrator::dry_run(&controller_from_env())?;
        println!("# start");
        for line in start {
            println!("{}", line);
        }
        println!("# stop");
        for line in stop {
            println!("{}", line);
        }
        return Ok(());
    }

    info!("Starting SDN lab (settings: {:?})", settings);
    orchestrator::build_and_run(&settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let args = Args::parse_from(["sdnlab"]);
        assert!(args.settings.is_none());
        assert!(!args.sudo);
        assert!(!args.dry_run);
        assert!(args.export.is_none());
    }

    #[test]
    fn test_cli_flags() {
        let args = Args::parse_from(["sdnlab", "--settings", "lab.yaml", "--sudo", "--dry-run"]);
        assert_eq!(args.settings, Some(PathBuf::from("lab.yaml")));
        assert!(args.sudo);
        assert!(args.dry_run);
    }

    #[test]
    fn test_export_conflicts_with_dry_run() {
        assert!(Args::try_parse_from(["sdnlab", "--dry-run", "--export", "lab.yaml"]).is_err());
    }
}
