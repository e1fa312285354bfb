//! The SDN dynamic routing lab.
//!
//! Five OpenFlow 1.3 switches, five hosts and redundant switch paths for
//! exercising congestion detection and rerouting in the controller:
//!
//! ```text
//!          h1----s1----s2----h2
//!                 |\ /|
//!                 | X |
//!                 |/ \|
//!          h3----s3----s4----h4
//!                 |
//!                 s5
//!                 |
//!                 h5
//! ```
//!
//! Every node and link is an explicit literal. Loops between the tiers are
//! intentional; breaking them is the controller's job.

use super::graph::{Topology, TopologyError};
use super::types::{ControllerRef, LinkParams, OpenFlowVersion};

/// Host access links: 100 Mbit/s, 5 ms
pub const HOST_LINK: LinkParams = LinkParams::new(100, 5);

/// Inter-switch links: 100 Mbit/s, 10 ms
pub const SWITCH_LINK: LinkParams = LinkParams::new(100, 10);

/// Protocol requested from every switch
pub const SWITCH_PROTOCOL: OpenFlowVersion = OpenFlowVersion::OpenFlow13;

/// Build the lab topology bound to `controller`
pub fn sdn_lab(controller: &ControllerRef) -> Result<Topology, TopologyError> {
    let mut net = Topology::new();

    log::info!("*** Adding controller");
    net.add_controller(&controller.name, &controller.ip, controller.port)?;

    log::info!("*** Adding switches");
    net.add_switch("s1", SWITCH_PROTOCOL)?;
    net.add_switch("s2", SWITCH_PROTOCOL)?;
    net.add_switch("s3", SWITCH_PROTOCOL)?;
    net.add_switch("s4", SWITCH_PROTOCOL)?;
    net.add_switch("s5", SWITCH_PROTOCOL)?;

    log::info!("*** Adding hosts");
    net.add_host("h1", "10.0.0.1/24", "00:00:00:00:00:01")?;
    net.add_host("h2", "10.0.0.2/24", "00:00:00:00:00:02")?;
    net.add_host("h3", "10.0.0.3/24", "00:00:00:00:00:03")?;
    net.add_host("h4", "10.0.0.4/24", "00:00:00:00:00:04")?;
    net.add_host("h5", "10.0.0.5/24", "00:00:00:00:00:05")?;

    log::info!("*** Creating links");
    net.add_link("h1", "s1", HOST_LINK)?;
    net.add_link("h2", "s2", HOST_LINK)?;
    net.add_link("h3", "s3", HOST_LINK)?;
    net.add_link("h4", "s4", HOST_LINK)?;
    net.add_link("h5", "s5", HOST_LINK)?;

    // Primary path
    net.add_link("s1", "s2", SWITCH_LINK)?;

    // Cross paths between the upper and lower tier
    net.add_link("s1", "s3", SWITCH_LINK)?;
    net.add_link("s1", "s4", SWITCH_LINK)?;
    net.add_link("s2", "s3", SWITCH_LINK)?;
    net.add_link("s2", "s4", SWITCH_LINK)?;

    // Lower tier
    net.add_link("s3", "s4", SWITCH_LINK)?;
    net.add_link("s3", "s5", SWITCH_LINK)?;

    Ok(net)
}
