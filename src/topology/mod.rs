//! Network topology module.
//!
//! This module contains the topology data model, the container that
//! validates declarations, and the fixed lab layout.

pub mod types;
pub mod graph;
pub mod lab;

// Re-export key types and functions for easier access
pub use types::{ControllerRef, Endpoint, Link, LinkParams, Node, NodeKind, OpenFlowVersion};
pub use graph::{Topology, TopologyError};
pub use lab::sdn_lab;
