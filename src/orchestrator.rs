//! Scenario orchestrator.
//!
//! Runs the lab end to end: resolve the controller, declare the topology,
//! start the emulated network, wait for controller sessions, probe
//! reachability, hand over to the interactive shell and tear down.

use std::io::{self, BufRead, Write};
use std::path::Path;

use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::info;

use crate::config::{controller_from_env, RunSettings};
use crate::emulation::{CommandRunner, Network, RecordingRunner, SystemRunner};
use crate::probe;
use crate::shell;
use crate::topology::{sdn_lab, ControllerRef, Topology};

/// Build the lab and run it until the interactive session exits
///
/// The controller address comes from `ONOS_IP` (default `127.0.0.1`), the
/// port is always 6653. Blocks without timeout while the controller is
/// unreachable.
pub fn build_and_run(settings: &RunSettings) -> Result<()> {
    let controller = controller_from_env();
    let runner = SystemRunner::new(settings.use_sudo);

    let stdin = io::stdin();
    let stdout = io::stdout();
    run_scenario(&runner, &controller, settings, stdin.lock(), stdout.lock())
}

/// The full scenario against any runner and terminal
pub fn run_scenario<R: BufRead, W: Write>(
    runner: &dyn CommandRunner,
    controller: &ControllerRef,
    settings: &RunSettings,
    input: R,
    mut output: W,
) -> Result<()> {
    info!("*** Creating network with controller at {}", controller.ip);
    let topology = sdn_lab(controller).wrap_err("Failed to declare lab topology")?;

    let mut net = Network::new(topology, runner);

    info!("*** Starting network");
    net.start().wrap_err("Failed to start network")?;

    info!("*** Network topology created successfully!");
    print_summary(net.topology());

    info!("*** Waiting for switches to connect to the controller...");
    net.wait_connected(settings.connect_poll)
        .wrap_err("Failed while waiting for controller sessions")?;

    info!("*** Running pingall to discover hosts...");
    let report = probe::ping_all(&net);
    write!(output, "{}", report.render())?;

    print_usage(controller);

    shell::run_shell(&net, settings, input, &mut output).wrap_err("Interactive session failed")?;

    info!("*** Stopping network");
    net.stop();
    Ok(())
}

/// Command lines that starting and stopping the lab would issue
pub fn dry_run(controller: &ControllerRef) -> Result<(Vec<String>, Vec<String>)> {
    let recorder = RecordingRunner::new();
    let topology = sdn_lab(controller).wrap_err("Failed to declare lab topology")?;

    let mut net = Network::new(topology, &recorder);
    net.start().wrap_err("Failed to plan network start")?;
    let start = recorder.commands();

    recorder.clear();
    net.stop();
    let stop = recorder.commands();

    Ok((start, stop))
}

/// Write the declared topology as YAML, or JSON for a `.json` path
pub fn export_topology(topology: &Topology, path: &Path) -> Result<()> {
    let content = if path.extension().is_some_and(|ext| ext == "json") {
        serde_json::to_string_pretty(topology).wrap_err("Failed to serialize topology")?
    } else {
        serde_yaml::to_string(topology).wrap_err("Failed to serialize topology")?
    };

    std::fs::write(path, content)
        .wrap_err_with(|| format!("Failed to write topology to '{}'", path.display()))?;
    info!("Topology written to {:?}", path);
    Ok(())
}

fn print_summary(topology: &Topology) {
    let bandwidths: Vec<u32> = topology.links().iter().map(|l| l.params.bandwidth_mbit).collect();
    let uniform = bandwidths.windows(2).all(|w| w[0] == w[1]);

    info!("*** Topology summary:");
    info!("    - {} switches", topology.switches().count());
    info!("    - {} hosts", topology.hosts().count());
    info!("    - {} links with redundant paths for testing", topology.links().len());
    if let (true, Some(bw)) = (uniform, bandwidths.first()) {
        info!("    - All links: {} Mbps bandwidth", bw);
    }
}

fn print_usage(controller: &ControllerRef) {
    info!("*** Network is ready!");
    info!("*** You can now:");
    info!("    1. Test connectivity: pingall");
    info!("    2. Generate traffic: iperf h1 h2");
    info!("    3. Create congestion: h1 iperf -c 10.0.0.2 -b 85M -t 60");
    info!("    4. Monitor links in the controller GUI: http://{}:8181/onos/ui", controller.ip);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::resolve_controller;
    use tempfile::tempdir;

    #[test]
    fn test_dry_run_plans_start_and_stop() {
        let (start, stop) = dry_run(&resolve_controller(None)).unwrap();

        assert_eq!(start.iter().filter(|c| c.starts_with("ip netns add")).count(), 5);
        assert_eq!(start.iter().filter(|c| c.contains(" add-br ")).count(), 5);
        assert_eq!(start.iter().filter(|c| c.contains("type veth")).count(), 12);
        assert_eq!(
            start.iter().filter(|c| c.ends_with("tcp:127.0.0.1:6653")).count(),
            5
        );

        // 7 trunk veths, 5 bridges, 5 namespaces
        assert_eq!(stop.len(), 17);
    }

    #[test]
    fn test_export_yaml_and_json() {
        let dir = tempdir().unwrap();
        let topology = sdn_lab(&resolve_controller(None)).unwrap();

        let yaml_path = dir.path().join("lab.yaml");
        export_topology(&topology, &yaml_path).unwrap();
        let yaml = std::fs::read_to_string(&yaml_path).unwrap();
        assert!(yaml.contains("protocol: OpenFlow13"));
        assert!(yaml.contains("delay: 10ms"));

        let json_path = dir.path().join("lab.json");
        export_topology(&topology, &json_path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(json["nodes"].as_array().unwrap().len(), 10);
        assert_eq!(json["links"].as_array().unwrap().len(), 12);
        assert_eq!(json["controller"]["port"], 6653);
    }
}
