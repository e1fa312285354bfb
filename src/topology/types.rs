//! Topology type definitions.
//!
//! Plain data describing the emulated network: nodes (switches and hosts),
//! links with their traffic-control parameters, and the remote controller
//! the switches connect to.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

/// OpenFlow protocol version requested from a switch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpenFlowVersion {
    OpenFlow10,
    OpenFlow13,
}

impl OpenFlowVersion {
    /// Name used by Open vSwitch in the `protocols` column of a bridge
    pub fn ovs_name(&self) -> &'static str {
        match self {
            Self::OpenFlow10 => "OpenFlow10",
            Self::OpenFlow13 => "OpenFlow13",
        }
    }
}

impl fmt::Display for OpenFlowVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ovs_name())
    }
}

/// Role-specific node attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum NodeKind {
    /// An OpenFlow switch backed by an Open vSwitch bridge
    Switch {
        protocol: OpenFlowVersion,
        /// 16 hex digit datapath id
        dpid: String,
    },
    /// A host backed by its own network namespace
    Host {
        ip: Ipv4Addr,
        prefix_len: u8,
        mac: String,
    },
}

/// A named node in the topology
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    #[serde(flatten)]
    pub kind: NodeKind,
}

impl Node {
    pub fn is_host(&self) -> bool {
        matches!(self.kind, NodeKind::Host { .. })
    }

    pub fn is_switch(&self) -> bool {
        matches!(self.kind, NodeKind::Switch { .. })
    }

    /// Host address in `a.b.c.d/len` form, `None` for switches
    pub fn cidr(&self) -> Option<String> {
        match &self.kind {
            NodeKind::Host { ip, prefix_len, .. } => Some(format!("{}/{}", ip, prefix_len)),
            NodeKind::Switch { .. } => None,
        }
    }

    pub fn ip(&self) -> Option<Ipv4Addr> {
        match &self.kind {
            NodeKind::Host { ip, .. } => Some(*ip),
            NodeKind::Switch { .. } => None,
        }
    }

    pub fn mac(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Host { mac, .. } => Some(mac),
            NodeKind::Switch { .. } => None,
        }
    }
}

/// Bandwidth and delay enforced on both ends of a link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkParams {
    /// Rate limit in Mbit/s
    pub bandwidth_mbit: u32,
    /// One-way propagation delay added on each interface
    #[serde(with = "humantime_serde")]
    pub delay: Duration,
}

impl LinkParams {
    pub const fn new(bandwidth_mbit: u32, delay_ms: u64) -> Self {
        Self {
            bandwidth_mbit,
            delay: Duration::from_millis(delay_ms),
        }
    }
}

/// One side of a link: a node and the port number allocated on it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub node: String,
    pub port: u32,
}

impl Endpoint {
    /// Interface name, e.g. `h1-eth0` or `s3-eth2`
    pub fn interface(&self) -> String {
        format!("{}-eth{}", self.node, self.port)
    }
}

/// An unordered link between two nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub a: Endpoint,
    pub b: Endpoint,
    #[serde(flatten)]
    pub params: LinkParams,
}

impl Link {
    /// True if this link joins `x` and `y` in either direction
    pub fn connects(&self, x: &str, y: &str) -> bool {
        (self.a.node == x && self.b.node == y) || (self.a.node == y && self.b.node == x)
    }

    pub fn endpoints(&self) -> [&Endpoint; 2] {
        [&self.a, &self.b]
    }
}

/// Remote controller the switches are pointed at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerRef {
    pub name: String,
    pub ip: String,
    pub port: u16,
}

impl ControllerRef {
    /// OVS controller target string, e.g. `tcp:127.0.0.1:6653`
    pub fn target(&self) -> String {
        format!("tcp:{}:{}", self.ip, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_interface_name() {
        let ep = Endpoint { node: "s3".to_string(), port: 2 };
        assert_eq!(ep.interface(), "s3-eth2");
    }

    #[test]
    fn test_link_connects_is_unordered() {
        let link = Link {
            a: Endpoint { node: "s1".to_string(), port: 2 },
            b: Endpoint { node: "s2".to_string(), port: 2 },
            params: LinkParams::new(100, 10),
        };
        assert!(link.connects("s1", "s2"));
        assert!(link.connects("s2", "s1"));
        assert!(!link.connects("s1", "s3"));
    }

    #[test]
    fn test_controller_target() {
        let controller = ControllerRef {
            name: "c0".to_string(),
            ip: "192.168.1.50".to_string(),
            port: 6653,
        };
        assert_eq!(controller.target(), "tcp:192.168.1.50:6653");
    }

    #[test]
    fn test_node_serializes_with_role_tag() {
        let node = Node {
            name: "h1".to_string(),
            kind: NodeKind::Host {
                ip: Ipv4Addr::new(10, 0, 0, 1),
                prefix_len: 24,
                mac: "00:00:00:00:00:01".to_string(),
            },
        };
        let yaml = serde_yaml::to_string(&node).unwrap();
        assert!(yaml.contains("role: host"));
        assert!(yaml.contains("ip: 10.0.0.1"));
        assert_eq!(node.cidr().as_deref(), Some("10.0.0.1/24"));
    }
}
