//! Emulated hosts.
//!
//! A host is a Linux network namespace named after the node. Commands run
//! inside it through `ip netns exec`.

use super::command::{run_best_effort, CommandOutput, CommandRunner};
use super::EmulationError;

/// A host backed by a network namespace
#[derive(Debug, Clone, PartialEq)]
pub struct HostNamespace {
    pub name: String,
}

impl HostNamespace {
    /// Create the namespace and bring up loopback
    ///
    /// A stale namespace with the same name from an earlier run is removed
    /// first.
    pub fn create(runner: &dyn CommandRunner, name: &str) -> Result<Self, EmulationError> {
        run_best_effort(runner, "ip", &["netns", "del", name]);

        runner.run_checked("ip", &["netns", "add", name])?;
        log::debug!("Created network namespace {}", name);

        let ns = Self {
            name: name.to_string(),
        };

        // Loopback is best-effort
        if let Err(e) = ns.exec(runner, "ip", &["link", "set", "lo", "up"]) {
            log::debug!("{}: loopback not brought up: {}", name, e);
        }

        Ok(ns)
    }

    /// Run a command inside this namespace, returning raw output
    pub fn exec(&self, runner: &dyn CommandRunner, cmd: &str, args: &[&str]) -> Result<CommandOutput, EmulationError> {
        let mut full_args = vec!["netns", "exec", self.name.as_str(), cmd];
        full_args.extend_from_slice(args);
        runner.run("ip", &full_args)
    }

    /// Run a command inside this namespace, failing if it exits non-zero
    pub fn exec_checked(
        &self,
        runner: &dyn CommandRunner,
        cmd: &str,
        args: &[&str],
    ) -> Result<CommandOutput, EmulationError> {
        let mut full_args = vec!["netns", "exec", self.name.as_str(), cmd];
        full_args.extend_from_slice(args);
        runner.run_checked("ip", &full_args)
    }

    /// Assign MAC and address to an interface already moved into this namespace
    pub fn configure_interface(
        &self,
        runner: &dyn CommandRunner,
        iface: &str,
        mac: &str,
        cidr: &str,
    ) -> Result<(), EmulationError> {
        self.exec_checked(runner, "ip", &["link", "set", iface, "address", mac])?;
        self.exec_checked(runner, "ip", &["addr", "add", cidr, "dev", iface])?;
        self.exec_checked(runner, "ip", &["link", "set", iface, "up"])?;
        log::debug!("{}: {} configured with {} ({})", self.name, iface, cidr, mac);
        Ok(())
    }

    /// PIDs of the processes attached to this namespace
    pub fn pids(&self, runner: &dyn CommandRunner) -> Result<Vec<u32>, EmulationError> {
        let output = runner.run_checked("ip", &["netns", "pids", &self.name])?;
        Ok(output
            .stdout
            .split_whitespace()
            .filter_map(|pid| pid.parse().ok())
            .collect())
    }

    /// Delete the namespace; interfaces inside it go with it
    pub fn delete(&self, runner: &dyn CommandRunner) -> Result<(), EmulationError> {
        log::debug!("Deleting network namespace {}", self.name);
        runner.run_checked("ip", &["netns", "del", &self.name])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emulation::command::{command_line, RecordingRunner};
    use std::cell::RefCell;
    use std::io;

    /// A machine without the `ip` binary
    #[derive(Default)]
    struct MissingTools {
        attempted: RefCell<Vec<String>>,
    }

    impl CommandRunner for MissingTools {
        fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, EmulationError> {
            let command = command_line(program, args);
            self.attempted.borrow_mut().push(command.clone());
            Err(EmulationError::Spawn {
                command,
                source: io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
            })
        }
    }

    #[test]
    fn test_create_host_namespace() {
        let runner = RecordingRunner::new();
        let ns = HostNamespace::create(&runner, "h1").unwrap();
        assert_eq!(ns.name, "h1");
        assert_eq!(
            runner.commands(),
            vec![
                "ip netns del h1",
                "ip netns add h1",
                "ip netns exec h1 ip link set lo up",
            ]
        );
    }

    #[test]
    fn test_create_fails_when_add_fails() {
        let runner = RecordingRunner::new();
        runner.reply("netns add", CommandOutput::failed("Operation not permitted"));
        assert!(HostNamespace::create(&runner, "h1").is_err());
    }

    #[test]
    fn test_missing_tool_surfaces_on_checked_step() {
        let runner = MissingTools::default();
        let err = HostNamespace::create(&runner, "h1").unwrap_err();

        assert!(matches!(err, EmulationError::Spawn { ref command, .. } if command == "ip netns add h1"));
        assert_eq!(*runner.attempted.borrow(), vec!["ip netns del h1", "ip netns add h1"]);
    }

    #[test]
    fn test_pids() {
        let runner = RecordingRunner::new();
        runner.reply("netns pids h1", CommandOutput::ok("311\n4242\n"));
        let ns = HostNamespace {
            name: "h1".to_string(),
        };
        assert_eq!(ns.pids(&runner).unwrap(), vec![311, 4242]);

        let empty = RecordingRunner::new();
        assert!(ns.pids(&empty).unwrap().is_empty());
    }

    #[test]
    fn test_configure_interface() {
        let runner = RecordingRunner::new();
        let ns = HostNamespace {
            name: "h2".to_string(),
        };
        ns.configure_interface(&runner, "h2-eth0", "00:00:00:00:00:02", "10.0.0.2/24")
            .unwrap();
        assert_eq!(
            runner.commands(),
            vec![
                "ip netns exec h2 ip link set h2-eth0 address 00:00:00:00:00:02",
                "ip netns exec h2 ip addr add 10.0.0.2/24 dev h2-eth0",
                "ip netns exec h2 ip link set h2-eth0 up",
            ]
        );
    }
}
