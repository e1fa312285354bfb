//! Network lifecycle: `Built -> Started -> Connected -> Stopped`.

use std::thread;
use std::time::Duration;

use log::{debug, info, warn};

use super::command::{CommandOutput, CommandRunner};
use super::host::HostNamespace;
use super::link::{create_link, delete_link, LinkEnd};
use super::switch::OvsBridge;
use super::EmulationError;
use crate::topology::{Endpoint, NodeKind, Topology};

/// Lifecycle state of the emulated network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkState {
    /// Declared, nothing created yet
    Built,
    /// Devices exist; switches may not have a controller session yet
    Started,
    /// Every switch holds a controller session
    Connected,
    /// All emulated resources released
    Stopped,
}

/// A running (or runnable) emulated network
///
/// Dropping a started network stops it.
pub struct Network<'r> {
    topology: Topology,
    runner: &'r dyn CommandRunner,
    hosts: Vec<HostNamespace>,
    bridges: Vec<OvsBridge>,
    /// Root-namespace ends of switch-to-switch veth pairs
    trunk_ifaces: Vec<String>,
    state: NetworkState,
}

impl<'r> Network<'r> {
    pub fn new(topology: Topology, runner: &'r dyn CommandRunner) -> Self {
        Self {
            topology,
            runner,
            hosts: Vec::new(),
            bridges: Vec::new(),
            trunk_ifaces: Vec::new(),
            state: NetworkState::Built,
        }
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn runner(&self) -> &dyn CommandRunner {
        self.runner
    }

    pub fn state(&self) -> NetworkState {
        self.state
    }

    /// Create hosts, switches and links, then attach the controller
    pub fn start(&mut self) -> Result<(), EmulationError> {
        if self.state != NetworkState::Built {
            return Err(EmulationError::AlreadyStarted);
        }
        // From here on, whatever got created is torn down by stop()
        self.state = NetworkState::Started;

        info!("*** Creating hosts");
        for node in self.topology.hosts() {
            self.hosts.push(HostNamespace::create(self.runner, &node.name)?);
        }

        info!("*** Creating switches");
        for node in self.topology.switches() {
            if let NodeKind::Switch { protocol, dpid } = &node.kind {
                self.bridges
                    .push(OvsBridge::create(self.runner, &node.name, *protocol, dpid)?);
            }
        }

        info!("*** Creating links");
        for link in self.topology.links() {
            if self.topology.is_switch_link(link) {
                self.trunk_ifaces.push(link.a.interface());
            }
            let a = self.link_end(&link.a)?;
            let b = self.link_end(&link.b)?;
            create_link(
                self.runner,
                (&link.a.interface(), a),
                (&link.b.interface(), b),
                link.params,
            )?;
        }

        match self.topology.controller() {
            Some(controller) => {
                info!("*** Connecting switches to controller {} at {}", controller.name, controller.target());
                for bridge in &self.bridges {
                    bridge.set_controller(self.runner, controller)?;
                }
            }
            None => warn!("No controller registered; switches will not forward traffic"),
        }

        info!(
            "*** Network started: {} switches, {} hosts, {} links",
            self.bridges.len(),
            self.hosts.len(),
            self.topology.links().len()
        );
        Ok(())
    }

    /// Block until every switch reports a controller session
    ///
    /// There is no timeout: with an unreachable controller this polls
    /// forever and the operator has to interrupt the process.
    pub fn wait_connected(&mut self, poll: Duration) -> Result<(), EmulationError> {
        match self.state {
            NetworkState::Started => {}
            NetworkState::Connected => return Ok(()),
            NetworkState::Built | NetworkState::Stopped => return Err(EmulationError::NotRunning),
        }
        if self.topology.controller().is_none() {
            return Err(EmulationError::NoController);
        }

        info!("*** Waiting for switches to connect");
        let mut pending: Vec<&OvsBridge> = self.bridges.iter().collect();
        let mut polls: u64 = 0;
        loop {
            let mut still_pending = Vec::new();
            for bridge in pending {
                if bridge.is_connected(self.runner)? {
                    info!("{} connected", bridge.name);
                } else {
                    still_pending.push(bridge);
                }
            }
            if still_pending.is_empty() {
                break;
            }
            pending = still_pending;
            polls += 1;
            if polls % 20 == 0 {
                let names: Vec<&str> = pending.iter().map(|b| b.name.as_str()).collect();
                info!("Still waiting for {}", names.join(" "));
            }
            thread::sleep(poll);
        }

        self.state = NetworkState::Connected;
        Ok(())
    }

    /// Namespace of a running host
    pub fn host(&self, name: &str) -> Result<&HostNamespace, EmulationError> {
        if !self.is_running() {
            return Err(EmulationError::NotRunning);
        }
        self.hosts
            .iter()
            .find(|h| h.name == name)
            .ok_or_else(|| EmulationError::UnknownHost(name.to_string()))
    }

    /// Run a command inside a host's namespace
    pub fn host_exec(&self, host: &str, cmd: &str, args: &[&str]) -> Result<CommandOutput, EmulationError> {
        self.host(host)?.exec(self.runner, cmd, args)
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, NetworkState::Started | NetworkState::Connected)
    }

    /// Release all emulated resources
    ///
    /// Best-effort: failures are logged and the remaining teardown continues.
    /// Calling it again is a no-op.
    pub fn stop(&mut self) {
        if !self.is_running() {
            return;
        }

        info!("*** Stopping {} links", self.trunk_ifaces.len() + self.hosts.len());
        for iface in self.trunk_ifaces.drain(..) {
            if let Err(e) = delete_link(self.runner, &iface) {
                warn!("Failed to delete link {}: {}", iface, e);
            }
        }

        info!("*** Stopping {} switches", self.bridges.len());
        for bridge in self.bridges.drain(..) {
            if let Err(e) = bridge.delete(self.runner) {
                warn!("Failed to delete switch {}: {}", bridge.name, e);
            }
        }

        info!("*** Stopping {} hosts", self.hosts.len());
        for host in self.hosts.drain(..) {
            if let Err(e) = host.delete(self.runner) {
                warn!("Failed to delete host {}: {}", host.name, e);
            }
        }

        self.state = NetworkState::Stopped;
        info!("*** Done");
    }

    fn link_end(&self, endpoint: &Endpoint) -> Result<LinkEnd<'_>, EmulationError> {
        if let Some(bridge) = self.bridges.iter().find(|b| b.name == endpoint.node) {
            return Ok(LinkEnd::Switch(bridge));
        }

        let ns = self
            .hosts
            .iter()
            .find(|h| h.name == endpoint.node)
            .ok_or_else(|| EmulationError::UnknownHost(endpoint.node.clone()))?;

        // Address and MAC belong to the host's first interface
        let node = self.topology.node(&endpoint.node);
        let (mac, cidr) = match node {
            Some(node) if endpoint.port == 0 => (node.mac(), node.cidr()),
            _ => (None, None),
        };
        debug!("{} attaches to host {}", endpoint.interface(), ns.name);
        Ok(LinkEnd::Host { ns, mac, cidr })
    }
}

impl Drop for Network<'_> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emulation::command::RecordingRunner;
    use crate::topology::{LinkParams, OpenFlowVersion};

    const UUID: &str = "0f3c2b1a-9d8e-4f7a-b6c5-d4e3f2a1b0c9";

    fn small_topology() -> Topology {
        let mut topo = Topology::new();
        topo.add_controller("c0", "10.1.1.1", 6653).unwrap();
        topo.add_switch("s1", OpenFlowVersion::OpenFlow13).unwrap();
        topo.add_switch("s2", OpenFlowVersion::OpenFlow13).unwrap();
        topo.add_host("h1", "10.0.0.1/24", "00:00:00:00:00:01").unwrap();
        topo.add_link("h1", "s1", LinkParams::new(100, 5)).unwrap();
        topo.add_link("s1", "s2", LinkParams::new(100, 10)).unwrap();
        topo
    }

    #[test]
    fn test_start_creates_everything() {
        let runner = RecordingRunner::new();
        let mut net = Network::new(small_topology(), &runner);
        net.start().unwrap();

        assert_eq!(net.state(), NetworkState::Started);
        assert_eq!(runner.count("ip netns add h1"), 1);
        assert_eq!(runner.count("add-br s1"), 1);
        assert_eq!(runner.count("add-br s2"), 1);
        assert_eq!(runner.count("set-controller s1 tcp:10.1.1.1:6653"), 1);
        assert_eq!(runner.count("set-controller s2 tcp:10.1.1.1:6653"), 1);
        assert_eq!(runner.count("ip link add s1-eth2 type veth peer name s2-eth1"), 1);
        assert_eq!(runner.count("ip netns exec h1 ip addr add 10.0.0.1/24 dev h1-eth0"), 1);

        // controllers are attached once every port exists
        assert!(runner.position("add-port s2 s2-eth1").unwrap() < runner.position("set-controller").unwrap());
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let runner = RecordingRunner::new();
        let mut net = Network::new(small_topology(), &runner);
        net.start().unwrap();
        assert!(matches!(net.start(), Err(EmulationError::AlreadyStarted)));
    }

    #[test]
    fn test_wait_connected_polls_until_all_switches_connect() {
        let runner = RecordingRunner::new();
        runner.reply("Bridge", CommandOutput::ok(&format!("[{}]\n", UUID)));
        for _ in 0..5 {
            runner.reply("is_connected", CommandOutput::ok("false\n"));
        }
        runner.reply("is_connected", CommandOutput::ok("true\n"));

        let mut net = Network::new(small_topology(), &runner);
        net.start().unwrap();
        net.wait_connected(Duration::ZERO).unwrap();

        assert_eq!(net.state(), NetworkState::Connected);
        // 5 refusals followed by one success per switch
        assert_eq!(runner.count("is_connected"), 7);
    }

    #[test]
    fn test_wait_requires_started_network() {
        let runner = RecordingRunner::new();
        let mut net = Network::new(small_topology(), &runner);
        assert!(matches!(net.wait_connected(Duration::ZERO), Err(EmulationError::NotRunning)));
    }

    #[test]
    fn test_stop_releases_resources_once() {
        let runner = RecordingRunner::new();
        let mut net = Network::new(small_topology(), &runner);
        net.start().unwrap();
        runner.clear();

        net.stop();
        assert_eq!(net.state(), NetworkState::Stopped);
        assert_eq!(
            runner.commands(),
            vec![
                "ip link del s1-eth2",
                "ovs-vsctl --if-exists del-br s1",
                "ovs-vsctl --if-exists del-br s2",
                "ip netns del h1",
            ]
        );

        net.stop();
        drop(net);
        assert_eq!(runner.commands().len(), 4);
    }

    #[test]
    fn test_drop_stops_started_network() {
        let runner = RecordingRunner::new();
        {
            let mut net = Network::new(small_topology(), &runner);
            net.start().unwrap();
        }
        assert_eq!(runner.count("ovs-vsctl --if-exists del-br s1"), 2);
        assert_eq!(runner.count("ip netns del h1"), 2);
    }

    #[test]
    fn test_host_exec() {
        let runner = RecordingRunner::new();
        let mut net = Network::new(small_topology(), &runner);
        assert!(matches!(net.host_exec("h1", "ip", &["addr"]), Err(EmulationError::NotRunning)));

        net.start().unwrap();
        net.host_exec("h1", "ip", &["addr"]).unwrap();
        assert_eq!(runner.count("ip netns exec h1 ip addr"), 2);
        assert!(matches!(net.host_exec("h9", "ip", &["addr"]), Err(EmulationError::UnknownHost(_))));
    }
}
