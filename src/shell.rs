//! Interactive command prompt against the running network.
//!
//! ```text
//! sdnlab> pingall
//! sdnlab> iperf h1 h2
//! sdnlab> h1 ping -c3 h2
//! sdnlab> s1 ovs-ofctl -O OpenFlow13 dump-flows s1 | grep priority
//! sdnlab> h2 iperf -s &
//! ```
//!
//! Node commands run through `sh -c`, inside the host's namespace or in the
//! root namespace for switches. Host names appearing as whole words are
//! replaced by the host's address.
//! Errors are printed and the prompt continues; `exit`, `quit` or EOF leave.

use std::io::{self, BufRead, Write};
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::config::RunSettings;
use crate::emulation::Network;
use crate::probe;
use crate::topology::{NodeKind, Topology};

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\S+").expect("Invalid word regex"));

const HELP: &str = "\
Commands:
  help                  show this message
  nodes                 list nodes
  net                   list links per node
  links                 list links with bandwidth and delay
  dump                  show node details
  pingall               ping between all hosts
  iperf <h1> <h2>       TCP bandwidth test between two hosts
  <node> <cmd> [args]   run a shell command on a node (host names expand to IPs)
  exit | quit           stop the network and leave
";

/// A parsed prompt line
#[derive(Debug, Clone, PartialEq)]
pub enum ShellCommand {
    Empty,
    Help,
    Nodes,
    Net,
    Links,
    Dump,
    PingAll,
    Iperf { client: String, server: String },
    /// Shell command line for a node, as typed
    Exec { node: String, command: String },
    Exit,
}

/// Parse one input line
pub fn parse_command(line: &str, topology: &Topology) -> Result<ShellCommand, String> {
    let line = line.trim();
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let Some((&first, rest)) = tokens.split_first() else {
        return Ok(ShellCommand::Empty);
    };

    let command = match first {
        "help" | "?" => ShellCommand::Help,
        "nodes" => ShellCommand::Nodes,
        "net" => ShellCommand::Net,
        "links" => ShellCommand::Links,
        "dump" => ShellCommand::Dump,
        "pingall" => ShellCommand::PingAll,
        "exit" | "quit" => ShellCommand::Exit,
        "iperf" => match rest {
            [client, server] => ShellCommand::Iperf {
                client: client.to_string(),
                server: server.to_string(),
            },
            _ => return Err("usage: iperf <host> <host>".to_string()),
        },
        node if topology.node(node).is_some() => {
            if rest.is_empty() {
                return Err(format!("usage: {} <cmd> [args]", node));
            }
            let command = line[node.len()..].trim_start();
            ShellCommand::Exec {
                node: node.to_string(),
                command: command.to_string(),
            }
        }
        other => return Err(format!("unknown command: {}", other)),
    };
    Ok(command)
}

/// Replace whole-word host names with their IP address, keeping spacing
pub fn expand_hosts(command: &str, topology: &Topology) -> String {
    WORD.replace_all(command, |caps: &Captures| {
        let word = &caps[0];
        topology
            .node(word)
            .and_then(|n| n.ip())
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| word.to_string())
    })
    .into_owned()
}

/// Detach a trailing `&` job from the captured output so the prompt returns
pub fn shell_line(command: &str) -> String {
    let command = command.trim_end();
    match command.strip_suffix('&') {
        Some(job) if !job.ends_with('&') => format!("{} >/dev/null 2>&1 &", job.trim_end()),
        _ => command.to_string(),
    }
}

/// Read-eval loop until `exit`, `quit` or end of input
pub fn run_shell<R: BufRead, W: Write>(
    net: &Network<'_>,
    settings: &RunSettings,
    mut input: R,
    mut output: W,
) -> io::Result<()> {
    let mut line = String::new();
    loop {
        write!(output, "{}", settings.prompt)?;
        output.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            writeln!(output)?;
            break;
        }

        match parse_command(&line, net.topology()) {
            Ok(ShellCommand::Exit) => break,
            Ok(command) => execute(net, settings, &command, &mut output)?,
            Err(message) => writeln!(output, "*** {}", message)?,
        }
    }
    log::debug!("Interactive session finished");
    Ok(())
}

fn execute<W: Write>(net: &Network<'_>, settings: &RunSettings, command: &ShellCommand, out: &mut W) -> io::Result<()> {
    let topo = net.topology();
    match command {
        ShellCommand::Empty | ShellCommand::Exit => {}
        ShellCommand::Help => write!(out, "{}", HELP)?,
        ShellCommand::Nodes => {
            let names: Vec<&str> = topo.nodes().iter().map(|n| n.name.as_str()).collect();
            let controller = topo.controller().map(|c| c.name.as_str());
            writeln!(out, "available nodes are:")?;
            writeln!(out, "{}", controller.into_iter().chain(names).collect::<Vec<_>>().join(" "))?;
        }
        ShellCommand::Net => write!(out, "{}", render_net(topo))?,
        ShellCommand::Links => write!(out, "{}", render_links(topo))?,
        ShellCommand::Dump => write!(out, "{}", render_dump(topo))?,
        ShellCommand::PingAll => write!(out, "{}", probe::ping_all(net).render())?,
        ShellCommand::Iperf { client, server } => {
            match probe::iperf(net, client, server, settings.iperf_duration) {
                Ok(report) => writeln!(out, "*** Results: {} ({} -> {})", report.rate, report.client, report.server)?,
                Err(e) => writeln!(out, "*** Error: {}", e)?,
            }
        }
        ShellCommand::Exec { node, command } => {
            let line = shell_line(&expand_hosts(command, topo));
            let is_host = topo.node(node).is_some_and(|n| n.is_host());
            let result = if is_host {
                net.host_exec(node, "sh", &["-c", &line])
            } else {
                // switches live in the root namespace
                net.runner().run("sh", &["-c", &line])
            };
            match result {
                Ok(res) => {
                    write!(out, "{}", res.stdout)?;
                    write!(out, "{}", res.stderr)?;
                }
                Err(e) => writeln!(out, "*** Error: {}", e)?,
            }
        }
    }
    Ok(())
}

/// `node iface:peer-iface ...` for every node
pub fn render_net(topo: &Topology) -> String {
    let mut out = String::new();
    for node in topo.nodes() {
        let mut line = node.name.clone();
        for link in topo.links_of(&node.name) {
            let (own, peer) = if link.a.node == node.name { (&link.a, &link.b) } else { (&link.b, &link.a) };
            line.push_str(&format!(" {}:{}", own.interface(), peer.interface()));
        }
        out.push_str(&line);
        out.push('\n');
    }
    if let Some(controller) = topo.controller() {
        out.push_str(&format!("{}\n", controller.name));
    }
    out
}

/// One line per link with its shaping parameters
pub fn render_links(topo: &Topology) -> String {
    topo.links()
        .iter()
        .map(|l| {
            format!(
                "{}<->{} {} Mbit/s {}ms\n",
                l.a.interface(),
                l.b.interface(),
                l.params.bandwidth_mbit,
                l.params.delay.as_millis()
            )
        })
        .collect()
}

/// Node details: addresses for hosts, protocol and dpid for switches
pub fn render_dump(topo: &Topology) -> String {
    let mut out = String::new();
    for node in topo.nodes() {
        match &node.kind {
            NodeKind::Host { mac, .. } => {
                let cidr = node.cidr().unwrap_or_default();
                out.push_str(&format!("<Host {}: {}-eth0:{} mac={}>\n", node.name, node.name, cidr, mac));
            }
            NodeKind::Switch { protocol, dpid } => {
                let ports: Vec<String> = topo
                    .links_of(&node.name)
                    .map(|l| if l.a.node == node.name { l.a.interface() } else { l.b.interface() })
                    .collect();
                out.push_str(&format!(
                    "<OVSSwitch {}: {} protocols={} dpid={}>\n",
                    node.name,
                    ports.join(","),
                    protocol,
                    dpid
                ));
            }
        }
    }
    if let Some(controller) = topo.controller() {
        out.push_str(&format!("<RemoteController {}: {}:{}>\n", controller.name, controller.ip, controller.port));
    }
    out
}
