//! # Network emulation driver
//!
//! Turns a declared [`Topology`](crate::topology::Topology) into running
//! virtual infrastructure and tears it down again:
//!
//! - **Hosts** become Linux network namespaces (`ip netns`)
//! - **Switches** become Open vSwitch bridges speaking the requested
//!   OpenFlow version, pointed at the remote controller (`ovs-vsctl`)
//! - **Links** become veth pairs shaped with HTB and netem (`ip link`, `tc`)
//!
//! All OS interaction goes through [`CommandRunner`], so the same code path
//! serves real runs, dry runs and tests.

pub mod command;
pub mod host;
pub mod link;
pub mod network;
pub mod switch;

pub use command::{CommandOutput, CommandRunner, RecordingRunner, SystemRunner};
pub use host::HostNamespace;
pub use network::{Network, NetworkState};
pub use switch::OvsBridge;

/// Errors raised while driving the emulated network
#[derive(Debug, thiserror::Error)]
pub enum EmulationError {
    #[error("Failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command failed: {command}\n{stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Unexpected output from `{command}`: {output}")]
    UnexpectedOutput { command: String, output: String },

    #[error("Unknown host '{0}'")]
    UnknownHost(String),

    #[error("Network has already been started")]
    AlreadyStarted,

    #[error("Network is not running")]
    NotRunning,

    #[error("No controller registered")]
    NoController,
}
