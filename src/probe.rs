//! Reachability and bandwidth probes.
//!
//! `ping_all` sends one echo request between every ordered pair of hosts and
//! renders the classic matrix:
//!
//! ```text
//! *** Ping: testing ping reachability
//! h1 -> h2 h3 h4 h5
//! h2 -> h1 X h4 h5
//! *** Results: 10% dropped (18/20 received)
//! ```
//!
//! Probe failures are data, never errors: an unreachable pair is an `X`.

use std::fmt::Write as _;
use std::sync::LazyLock;
use std::time::Duration;

use log::{debug, info, warn};
use regex::Regex;
use serde::Serialize;

use crate::emulation::{EmulationError, Network};

static PING_SUMMARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+) packets transmitted, (\d+) (?:packets )?received").expect("Invalid ping summary regex")
});

static IPERF_RATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\d.]+\s+[KMG]?bits/sec)").expect("Invalid iperf rate regex"));

/// Outcome of one ping between two hosts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PingResult {
    pub src: String,
    pub dst: String,
    pub reachable: bool,
}

/// All-pairs reachability results in probe order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PingReport {
    pub results: Vec<PingResult>,
}

impl PingReport {
    pub fn sent(&self) -> usize {
        self.results.len()
    }

    pub fn received(&self) -> usize {
        self.results.iter().filter(|r| r.reachable).count()
    }

    /// Share of lost probes, truncated to a whole percent
    pub fn dropped_percent(&self) -> u32 {
        if self.results.is_empty() {
            return 0;
        }
        let lost = self.sent() - self.received();
        (lost * 100 / self.sent()) as u32
    }

    /// One line per source host, `X` marking unreachable destinations
    pub fn render(&self) -> String {
        let mut out = String::from("*** Ping: testing ping reachability\n");
        let mut current: Option<&str> = None;
        for r in &self.results {
            if current != Some(r.src.as_str()) {
                if current.is_some() {
                    out.push('\n');
                }
                let _ = write!(out, "{} ->", r.src);
                current = Some(r.src.as_str());
            }
            let _ = write!(out, " {}", if r.reachable { r.dst.as_str() } else { "X" });
        }
        if current.is_some() {
            out.push('\n');
        }
        let _ = writeln!(
            out,
            "*** Results: {}% dropped ({}/{} received)",
            self.dropped_percent(),
            self.received(),
            self.sent()
        );
        out
    }
}

/// Parse `(transmitted, received)` from ping's summary line
pub fn parse_ping_summary(output: &str) -> Option<(u32, u32)> {
    let caps = PING_SUMMARY.captures(output)?;
    let sent = caps.get(1)?.as_str().parse().ok()?;
    let received = caps.get(2)?.as_str().parse().ok()?;
    Some((sent, received))
}

/// Ping every other host from every host, once each
pub fn ping_all(net: &Network<'_>) -> PingReport {
    let hosts: Vec<(String, String)> = net
        .topology()
        .hosts()
        .filter_map(|h| Some((h.name.clone(), h.ip()?.to_string())))
        .collect();

    let mut report = PingReport::default();
    for (src, _) in &hosts {
        for (dst, dst_ip) in &hosts {
            if src == dst {
                continue;
            }
            let reachable = ping(net, src, dst_ip);
            debug!("ping {} -> {}: {}", src, dst, if reachable { "ok" } else { "lost" });
            report.results.push(PingResult {
                src: src.clone(),
                dst: dst.clone(),
                reachable,
            });
        }
    }

    info!(
        "Reachability: {}/{} probes answered",
        report.received(),
        report.sent()
    );
    report
}

/// One echo request from `src` to `dst_ip`; any failure counts as unreachable
pub fn ping(net: &Network<'_>, src: &str, dst_ip: &str) -> bool {
    match net.host_exec(src, "ping", &["-c1", "-W1", dst_ip]) {
        Ok(out) => parse_ping_summary(&out.stdout).is_some_and(|(_, received)| received > 0),
        Err(e) => {
            warn!("ping from {} failed to run: {}", src, e);
            false
        }
    }
}

/// Throughput measured between two hosts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IperfReport {
    pub client: String,
    pub server: String,
    pub rate: String,
}

/// Extract the last reported rate (e.g. `94.1 Mbits/sec`) from iperf output
pub fn parse_iperf_rate(output: &str) -> Option<String> {
    IPERF_RATE
        .captures_iter(output)
        .last()
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().split_whitespace().collect::<Vec<_>>().join(" "))
}

/// TCP bandwidth test: iperf server on `server`, client on `client`
pub fn iperf(net: &Network<'_>, client: &str, server: &str, duration: Duration) -> Result<IperfReport, EmulationError> {
    let server_ip = net
        .topology()
        .node(server)
        .and_then(|n| n.ip())
        .ok_or_else(|| EmulationError::UnknownHost(server.to_string()))?
        .to_string();
    // fail before starting anything if the client is unknown
    net.host(client)?;

    info!("*** Iperf: testing TCP bandwidth between {} and {}", client, server);
    let server_ns = net.host(server)?;
    let before = server_ns.pids(net.runner())?;
    server_ns.exec_checked(net.runner(), "iperf", &["-s", "-D"])?;

    // Only the daemon just started; other iperf servers in the lab stay up
    let started: Vec<u32> = match server_ns.pids(net.runner()) {
        Ok(pids) => pids.into_iter().filter(|pid| !before.contains(pid)).collect(),
        Err(e) => {
            warn!("Failed to list processes on {}: {}", server, e);
            Vec::new()
        }
    };

    let secs = duration.as_secs().max(1).to_string();
    let result = net.host_exec(client, "iperf", &["-c", &server_ip, "-t", &secs, "-f", "m"]);

    // Stop the server whatever the client did
    stop_server(net, server, &started);

    let output = result?;
    let rate = parse_iperf_rate(&output.stdout).ok_or_else(|| EmulationError::UnexpectedOutput {
        command: format!("iperf -c {}", server_ip),
        output: if output.stderr.trim().is_empty() {
            output.stdout.trim().to_string()
        } else {
            output.stderr.trim().to_string()
        },
    })?;

    Ok(IperfReport {
        client: client.to_string(),
        server: server.to_string(),
        rate,
    })
}

fn stop_server(net: &Network<'_>, server: &str, pids: &[u32]) {
    if pids.is_empty() {
        warn!("No new iperf server process found on {}; nothing to stop", server);
        return;
    }
    let pids: Vec<String> = pids.iter().map(|pid| pid.to_string()).collect();
    let args: Vec<&str> = pids.iter().map(|pid| pid.as_str()).collect();
    match net.runner().run_checked("kill", &args) {
        Ok(_) => debug!("Stopped iperf server on {} (pid {})", server, pids.join(" ")),
        Err(e) => warn!("Failed to stop iperf server on {}: {}", server, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emulation::{CommandOutput, RecordingRunner};
    use crate::topology::{LinkParams, OpenFlowVersion, Topology};

    const PING_OK: &str = "1 packets transmitted, 1 received, 0% packet loss, time 0ms\n";
    const PING_LOST: &str = "1 packets transmitted, 0 received, 100% packet loss, time 0ms\n";

    fn three_hosts() -> Topology {
        let mut topo = Topology::new();
        topo.add_switch("s1", OpenFlowVersion::OpenFlow13).unwrap();
        for n in 1..=3 {
            let name = format!("h{}", n);
            topo.add_host(&name, &format!("10.0.0.{}/24", n), &format!("00:00:00:00:00:0{}", n))
                .unwrap();
            topo.add_link(&name, "s1", LinkParams::new(100, 5)).unwrap();
        }
        topo
    }

    #[test]
    fn test_parse_ping_summary() {
        assert_eq!(parse_ping_summary(PING_OK), Some((1, 1)));
        assert_eq!(parse_ping_summary(PING_LOST), Some((1, 0)));
        assert_eq!(
            parse_ping_summary("1 packets transmitted, 1 packets received, 0.0% packet loss"),
            Some((1, 1))
        );
        assert_eq!(parse_ping_summary("connect: Network is unreachable"), None);
    }

    #[test]
    fn test_parse_iperf_rate() {
        let output = "[  3]  0.0- 5.0 sec  56.2 MBytes  94.3 Mbits/sec\n";
        assert_eq!(parse_iperf_rate(output).as_deref(), Some("94.3 Mbits/sec"));
        assert_eq!(parse_iperf_rate("connect failed: Connection refused"), None);
    }

    #[test]
    fn test_report_render() {
        let report = PingReport {
            results: vec![
                PingResult { src: "h1".into(), dst: "h2".into(), reachable: true },
                PingResult { src: "h1".into(), dst: "h3".into(), reachable: false },
                PingResult { src: "h2".into(), dst: "h1".into(), reachable: true },
                PingResult { src: "h2".into(), dst: "h3".into(), reachable: true },
            ],
        };
        assert_eq!(report.dropped_percent(), 25);
        assert_eq!(
            report.render(),
            "*** Ping: testing ping reachability\n\
             h1 -> h2 X\n\
             h2 -> h1 h3\n\
             *** Results: 25% dropped (3/4 received)\n"
        );
    }

    #[test]
    fn test_ping_all_tolerates_failures() {
        let runner = RecordingRunner::new();
        runner.reply("exec h1 ping", CommandOutput::ok(PING_OK));
        runner.reply("exec h2 ping", CommandOutput::failed("connect: Network is unreachable"));
        runner.reply("exec h3 ping", CommandOutput::ok(PING_LOST));

        let mut net = Network::new(three_hosts(), &runner);
        net.start().unwrap();
        let report = ping_all(&net);

        assert_eq!(report.sent(), 6);
        assert_eq!(report.received(), 2);
        assert_eq!(report.dropped_percent(), 66);
        assert_eq!(runner.count("ping -c1 -W1"), 6);
        assert!(runner.commands().contains(&"ip netns exec h1 ping -c1 -W1 10.0.0.3".to_string()));
    }

    #[test]
    fn test_iperf() {
        let runner = RecordingRunner::new();
        runner.reply("iperf -c", CommandOutput::ok("[  3]  0.0- 5.0 sec  56.2 MBytes  94.3 Mbits/sec\n"));
        runner.reply("netns pids h2", CommandOutput::ok(""));
        runner.reply("netns pids h2", CommandOutput::ok("4242\n"));

        let mut net = Network::new(three_hosts(), &runner);
        net.start().unwrap();
        let report = iperf(&net, "h1", "h2", Duration::from_secs(5)).unwrap();

        assert_eq!(report.rate, "94.3 Mbits/sec");
        assert!(runner.position("exec h2 iperf -s -D").unwrap() < runner.position("exec h1 iperf -c 10.0.0.2 -t 5").unwrap());
        assert!(runner.position("exec h1 iperf -c").unwrap() < runner.position("kill 4242").unwrap());
    }

    #[test]
    fn test_iperf_stops_only_its_own_server() {
        let runner = RecordingRunner::new();
        runner.reply("iperf -c", CommandOutput::ok("[  3]  0.0- 1.0 sec  11.2 MBytes  94.1 Mbits/sec\n"));
        // h2 already runs an operator server (311) before the test starts its own
        runner.reply("netns pids h2", CommandOutput::ok("311\n"));
        runner.reply("netns pids h2", CommandOutput::ok("311\n4242\n"));

        let mut net = Network::new(three_hosts(), &runner);
        net.start().unwrap();
        net.host_exec("h3", "iperf", &["-s", "-D"]).unwrap();
        iperf(&net, "h1", "h2", Duration::from_secs(1)).unwrap();

        let kills: Vec<String> = runner.commands().into_iter().filter(|c| c.contains("kill")).collect();
        assert_eq!(kills, vec!["kill 4242"]);
    }

    #[test]
    fn test_iperf_without_new_server_process_kills_nothing() {
        let runner = RecordingRunner::new();
        runner.reply("iperf -c", CommandOutput::ok("[  3]  0.0- 1.0 sec  11.2 MBytes  94.1 Mbits/sec\n"));
        runner.reply("netns pids h2", CommandOutput::ok("311\n"));

        let mut net = Network::new(three_hosts(), &runner);
        net.start().unwrap();
        iperf(&net, "h1", "h2", Duration::from_secs(1)).unwrap();

        assert_eq!(runner.count("kill"), 0);
    }

    #[test]
    fn test_iperf_unknown_host() {
        let runner = RecordingRunner::new();
        let mut net = Network::new(three_hosts(), &runner);
        net.start().unwrap();
        runner.clear();

        assert!(matches!(iperf(&net, "h1", "h9", Duration::from_secs(1)), Err(EmulationError::UnknownHost(_))));
        assert!(matches!(iperf(&net, "h9", "h1", Duration::from_secs(1)), Err(EmulationError::UnknownHost(_))));
        assert!(runner.commands().is_empty());
    }
}
