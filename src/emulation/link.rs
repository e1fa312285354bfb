//! Traffic-controlled links.
//!
//! A link is a veth pair whose ends carry the endpoint interface names. Both
//! ends get an HTB root class enforcing the rate and a netem child adding
//! the delay.

use super::command::{run_best_effort, CommandRunner};
use super::host::HostNamespace;
use super::switch::OvsBridge;
use super::EmulationError;
use crate::topology::LinkParams;

/// `tc` configuration for one interface
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TcShaping {
    pub rate_mbit: u32,
    pub delay_ms: u128,
}

impl From<LinkParams> for TcShaping {
    fn from(params: LinkParams) -> Self {
        Self {
            rate_mbit: params.bandwidth_mbit,
            delay_ms: params.delay.as_millis(),
        }
    }
}

impl TcShaping {
    /// HTB burst in bytes: one jiffy of traffic at the rate, at least 15k
    fn burst(&self) -> String {
        let bytes_per_ms = u64::from(self.rate_mbit) * 1000 / 8;
        format!("{}", (bytes_per_ms * 10).max(15_000))
    }

    /// The `tc` argument lists applied to `iface`, in order
    pub fn commands(&self, iface: &str) -> Vec<Vec<String>> {
        let rate = format!("{}Mbit", self.rate_mbit);
        let mut cmds = vec![
            strings(&["qdisc", "add", "dev", iface, "root", "handle", "5:0", "htb", "default", "1"]),
            strings(&[
                "class", "add", "dev", iface, "parent", "5:0", "classid", "5:1", "htb", "rate", &rate, "burst",
                &self.burst(),
            ]),
        ];
        if self.delay_ms > 0 {
            let delay = format!("{}ms", self.delay_ms);
            cmds.push(strings(&[
                "qdisc", "add", "dev", iface, "parent", "5:1", "handle", "10:", "netem", "delay", &delay,
            ]));
        }
        cmds
    }
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

/// Where one end of a link lives
pub enum LinkEnd<'a> {
    /// Inside a host namespace, with the MAC and address to assign
    Host {
        ns: &'a HostNamespace,
        mac: Option<&'a str>,
        cidr: Option<String>,
    },
    /// A port on an OVS bridge in the root namespace
    Switch(&'a OvsBridge),
}

/// Create a veth pair `a_iface <-> b_iface`, attach both ends and shape them
pub fn create_link(
    runner: &dyn CommandRunner,
    (a_iface, a_end): (&str, LinkEnd<'_>),
    (b_iface, b_end): (&str, LinkEnd<'_>),
    params: LinkParams,
) -> Result<(), EmulationError> {
    // Stale veth from an earlier run
    run_best_effort(runner, "ip", &["link", "del", a_iface]);

    runner.run_checked("ip", &["link", "add", a_iface, "type", "veth", "peer", "name", b_iface])?;
    log::debug!("Created veth pair {} <-> {}", a_iface, b_iface);

    let shaping = TcShaping::from(params);
    for (iface, end) in [(a_iface, a_end), (b_iface, b_end)] {
        attach(runner, iface, &end)?;
        shape(runner, iface, &end, &shaping)?;
    }

    Ok(())
}

fn attach(runner: &dyn CommandRunner, iface: &str, end: &LinkEnd<'_>) -> Result<(), EmulationError> {
    match end {
        LinkEnd::Host { ns, mac, cidr } => {
            runner.run_checked("ip", &["link", "set", iface, "netns", &ns.name])?;
            match (mac, cidr) {
                (Some(mac), Some(cidr)) => ns.configure_interface(runner, iface, mac, cidr),
                _ => ns.exec_checked(runner, "ip", &["link", "set", iface, "up"]).map(|_| ()),
            }
        }
        LinkEnd::Switch(bridge) => bridge.add_port(runner, iface),
    }
}

fn shape(runner: &dyn CommandRunner, iface: &str, end: &LinkEnd<'_>, shaping: &TcShaping) -> Result<(), EmulationError> {
    for args in shaping.commands(iface) {
        let args: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
        match end {
            LinkEnd::Host { ns, .. } => ns.exec_checked(runner, "tc", &args)?,
            LinkEnd::Switch(_) => runner.run_checked("tc", &args)?,
        };
    }
    log::debug!("{}: {} Mbit/s, {} ms", iface, shaping.rate_mbit, shaping.delay_ms);
    Ok(())
}

/// Delete a veth pair through one of its root-namespace ends
pub fn delete_link(runner: &dyn CommandRunner, iface: &str) -> Result<(), EmulationError> {
    runner.run_checked("ip", &["link", "del", iface])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emulation::command::RecordingRunner;
    use crate::topology::OpenFlowVersion;

    #[test]
    fn test_tc_commands() {
        let shaping = TcShaping::from(LinkParams::new(100, 5));
        let cmds: Vec<String> = shaping.commands("s1-eth1").iter().map(|c| c.join(" ")).collect();
        assert_eq!(
            cmds,
            vec![
                "qdisc add dev s1-eth1 root handle 5:0 htb default 1",
                "class add dev s1-eth1 parent 5:0 classid 5:1 htb rate 100Mbit burst 125000",
                "qdisc add dev s1-eth1 parent 5:1 handle 10: netem delay 5ms",
            ]
        );
    }

    #[test]
    fn test_zero_delay_skips_netem() {
        let shaping = TcShaping { rate_mbit: 1, delay_ms: 0 };
        let cmds = shaping.commands("h1-eth0");
        assert_eq!(cmds.len(), 2);
        // small rates still get a usable burst
        assert_eq!(cmds[1].last().map(String::as_str), Some("15000"));
    }

    #[test]
    fn test_host_to_switch_link() {
        let runner = RecordingRunner::new();
        let ns = HostNamespace { name: "h1".to_string() };
        let bridge = OvsBridge {
            name: "s1".to_string(),
            protocol: OpenFlowVersion::OpenFlow13,
            dpid: "0000000000000001".to_string(),
        };

        create_link(
            &runner,
            (
                "h1-eth0",
                LinkEnd::Host {
                    ns: &ns,
                    mac: Some("00:00:00:00:00:01"),
                    cidr: Some("10.0.0.1/24".to_string()),
                },
            ),
            ("s1-eth1", LinkEnd::Switch(&bridge)),
            LinkParams::new(100, 5),
        )
        .unwrap();

        let cmds = runner.commands();
        assert!(cmds.contains(&"ip link add h1-eth0 type veth peer name s1-eth1".to_string()));
        assert!(cmds.contains(&"ip link set h1-eth0 netns h1".to_string()));
        assert!(cmds.contains(&"ovs-vsctl add-port s1 s1-eth1".to_string()));
        assert!(cmds.contains(&"ip netns exec h1 tc qdisc add dev h1-eth0 parent 5:1 handle 10: netem delay 5ms".to_string()));
        assert!(cmds.contains(&"tc qdisc add dev s1-eth1 parent 5:1 handle 10: netem delay 5ms".to_string()));
        // the interface moves before it is configured
        assert!(
            runner.position("netns h1").unwrap() < runner.position("ip addr add 10.0.0.1/24").unwrap()
        );
    }
}
