//! Emulated OpenFlow switches.
//!
//! Each switch is an Open vSwitch bridge in secure fail mode, so it forwards
//! nothing until the controller installs rules.

use std::sync::LazyLock;

use regex::Regex;

use super::command::{run_best_effort, CommandRunner};
use super::EmulationError;
use crate::topology::{ControllerRef, OpenFlowVersion};

static UUID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}")
        .expect("Invalid uuid regex")
});

/// A switch backed by an OVS bridge
#[derive(Debug, Clone, PartialEq)]
pub struct OvsBridge {
    pub name: String,
    pub protocol: OpenFlowVersion,
    pub dpid: String,
}

impl OvsBridge {
    /// Create the bridge with its protocol, fail mode and datapath id
    pub fn create(
        runner: &dyn CommandRunner,
        name: &str,
        protocol: OpenFlowVersion,
        dpid: &str,
    ) -> Result<Self, EmulationError> {
        run_best_effort(runner, "ovs-vsctl", &["--if-exists", "del-br", name]);

        let protocols = format!("protocols={}", protocol.ovs_name());
        let datapath = format!("other_config:datapath-id={}", dpid);
        runner.run_checked(
            "ovs-vsctl",
            &[
                "add-br", name, "--", "set", "Bridge", name, &protocols, "fail_mode=secure", &datapath,
            ],
        )?;
        log::debug!("Created bridge {} ({}, dpid {})", name, protocol, dpid);

        Ok(Self {
            name: name.to_string(),
            protocol,
            dpid: dpid.to_string(),
        })
    }

    /// Attach an interface as a bridge port and bring it up
    pub fn add_port(&self, runner: &dyn CommandRunner, iface: &str) -> Result<(), EmulationError> {
        runner.run_checked("ovs-vsctl", &["add-port", &self.name, iface])?;
        runner.run_checked("ip", &["link", "set", iface, "up"])?;
        Ok(())
    }

    /// Point the bridge at the remote controller
    pub fn set_controller(&self, runner: &dyn CommandRunner, controller: &ControllerRef) -> Result<(), EmulationError> {
        let target = controller.target();
        runner.run_checked("ovs-vsctl", &["set-controller", &self.name, &target])?;
        log::debug!("{} -> controller {} ({})", self.name, controller.name, target);
        Ok(())
    }

    /// True when the bridge has controllers and every one reports a session
    pub fn is_connected(&self, runner: &dyn CommandRunner) -> Result<bool, EmulationError> {
        let records = runner.run("ovs-vsctl", &["--", "get", "Bridge", &self.name, "controller"])?;
        if !records.success {
            return Ok(false);
        }

        let uuids = parse_uuids(&records.stdout);
        if uuids.is_empty() {
            return Ok(false);
        }

        for uuid in uuids {
            let state = runner.run("ovs-vsctl", &["--", "get", "Controller", uuid, "is_connected"])?;
            if !state.success || state.stdout.trim() != "true" {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Remove the bridge
    pub fn delete(&self, runner: &dyn CommandRunner) -> Result<(), EmulationError> {
        log::debug!("Deleting bridge {}", self.name);
        runner.run_checked("ovs-vsctl", &["--if-exists", "del-br", &self.name])?;
        Ok(())
    }
}

/// Extract controller record UUIDs from `ovs-vsctl get Bridge ... controller`
///
/// The output looks like `[5c2f...-..., 9a1b...-...]` or `[]`.
pub fn parse_uuids(output: &str) -> Vec<&str> {
    UUID_PATTERN.find_iter(output).map(|m| m.as_str()).collect()
}
