//! Topology container.
//!
//! Owns every node and link of the emulated network and enforces the
//! structural invariants: unique node names, links only between existing
//! nodes, no self links and at most one link per node pair. Port numbers are
//! handed out in declaration order so interface names are stable.

use super::types::{ControllerRef, Endpoint, Link, LinkParams, Node, NodeKind, OpenFlowVersion};
use crate::utils::ip_utils::{dpid_from_name, is_valid_mac, parse_cidr};
use serde::Serialize;
use std::collections::HashMap;

/// Errors raised while declaring the topology
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TopologyError {
    #[error("Node '{0}' is already declared")]
    DuplicateNode(String),

    #[error("Unknown node '{0}'")]
    UnknownNode(String),

    #[error("Link between '{a}' and '{b}' is already declared")]
    DuplicateLink { a: String, b: String },

    #[error("Node '{0}' cannot be linked to itself")]
    SelfLink(String),

    #[error("Invalid address '{value}' for host '{node}': {reason}")]
    InvalidAddress { node: String, value: String, reason: String },

    #[error("Invalid MAC address '{value}' for host '{node}'")]
    InvalidMac { node: String, value: String },

    #[error("Cannot derive a datapath id from switch name '{0}'")]
    InvalidSwitchName(String),

    #[error("A controller is already registered")]
    ControllerAlreadySet,
}

/// Network container: controller binding, nodes and links
#[derive(Debug, Default, Serialize)]
pub struct Topology {
    #[serde(skip_serializing_if = "Option::is_none")]
    controller: Option<ControllerRef>,
    nodes: Vec<Node>,
    links: Vec<Link>,
    /// Next free port per node
    #[serde(skip)]
    next_port: HashMap<String, u32>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the single remote controller
    pub fn add_controller(&mut self, name: &str, ip: &str, port: u16) -> Result<&ControllerRef, TopologyError> {
        if self.controller.is_some() {
            return Err(TopologyError::ControllerAlreadySet);
        }
        log::debug!("Registering controller {} at {}:{}", name, ip, port);
        Ok(self.controller.insert(ControllerRef {
            name: name.to_string(),
            ip: ip.to_string(),
            port,
        }))
    }

    /// Declare a switch speaking the given OpenFlow version
    pub fn add_switch(&mut self, name: &str, protocol: OpenFlowVersion) -> Result<&Node, TopologyError> {
        self.check_new_node(name)?;
        let dpid = dpid_from_name(name).ok_or_else(|| TopologyError::InvalidSwitchName(name.to_string()))?;

        // switch ports start at 1
        Ok(self.push_node(name, NodeKind::Switch { protocol, dpid }, 1))
    }

    /// Declare a host with a static `a.b.c.d/len` address and MAC
    pub fn add_host(&mut self, name: &str, cidr: &str, mac: &str) -> Result<&Node, TopologyError> {
        self.check_new_node(name)?;
        let (ip, prefix_len) = parse_cidr(cidr).map_err(|reason| TopologyError::InvalidAddress {
            node: name.to_string(),
            value: cidr.to_string(),
            reason,
        })?;
        if !is_valid_mac(mac) {
            return Err(TopologyError::InvalidMac {
                node: name.to_string(),
                value: mac.to_string(),
            });
        }

        Ok(self.push_node(
            name,
            NodeKind::Host {
                ip,
                prefix_len,
                mac: mac.to_lowercase(),
            },
            0,
        ))
    }

    /// Declare a traffic-controlled link between two existing nodes
    pub fn add_link(&mut self, a: &str, b: &str, params: LinkParams) -> Result<&Link, TopologyError> {
        if a == b {
            return Err(TopologyError::SelfLink(a.to_string()));
        }
        for name in [a, b] {
            if self.node(name).is_none() {
                return Err(TopologyError::UnknownNode(name.to_string()));
            }
        }
        if self.links.iter().any(|l| l.connects(a, b)) {
            return Err(TopologyError::DuplicateLink {
                a: a.to_string(),
                b: b.to_string(),
            });
        }

        let link = Link {
            a: self.allocate_endpoint(a),
            b: self.allocate_endpoint(b),
            params,
        };
        log::debug!(
            "Adding link {} <-> {} ({} Mbit/s, {:?})",
            link.a.interface(),
            link.b.interface(),
            params.bandwidth_mbit,
            params.delay
        );
        self.links.push(link);
        Ok(&self.links[self.links.len() - 1])
    }

    pub fn controller(&self) -> Option<&ControllerRef> {
        self.controller.as_ref()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Hosts in declaration order
    pub fn hosts(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.is_host())
    }

    /// Switches in declaration order
    pub fn switches(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.is_switch())
    }

    /// Links attached to `name`, in declaration order
    pub fn links_of<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Link> + 'a {
        self.links
            .iter()
            .filter(move |l| l.a.node == name || l.b.node == name)
    }

    /// True when both ends of the link are switches
    pub fn is_switch_link(&self, link: &Link) -> bool {
        link.endpoints()
            .iter()
            .all(|ep| self.node(&ep.node).is_some_and(Node::is_switch))
    }

    fn check_new_node(&self, name: &str) -> Result<(), TopologyError> {
        if self.node(name).is_some() {
            return Err(TopologyError::DuplicateNode(name.to_string()));
        }
        Ok(())
    }

    fn push_node(&mut self, name: &str, kind: NodeKind, first_port: u32) -> &Node {
        self.next_port.insert(name.to_string(), first_port);
        self.nodes.push(Node {
            name: name.to_string(),
            kind,
        });
        &self.nodes[self.nodes.len() - 1]
    }

    fn allocate_endpoint(&mut self, node: &str) -> Endpoint {
        let counter = self.next_port.entry(node.to_string()).or_insert(0);
        let port = *counter;
        *counter += 1;
        Endpoint {
            node: node.to_string(),
            port,
        }
    }
}
