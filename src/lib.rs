//! # SdnLab - OpenFlow lab topology runner
//!
//! This library builds and runs a fixed emulated network for experimenting
//! with SDN dynamic routing against a remote controller (ONOS by default).
//!
//! ## Overview
//!
//! The lab consists of five OpenFlow 1.3 switches and five hosts joined by
//! twelve traffic-shaped links with redundant paths between the upper and
//! lower switch tier:
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
//! Hosts are Linux network namespaces, switches are Open vSwitch bridges
//! and links are veth pairs shaped with `tc`. Forwarding is left entirely
//! to the external controller.
//!
//! ## Architecture
//!
//! - `config`: controller resolution (`ONOS_IP`) and run settings
//! - `config_loader`: YAML settings loading
//! - `topology`: node/link data model, validating container, lab layout
//! - `emulation`: command runners and the network lifecycle
//! - `probe`: all-pairs ping and iperf measurements
//! - `shell`: interactive prompt
//! - `orchestrator`: the end-to-end scenario
//! - `utils`: address helpers
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use sdnlab::{config::RunSettings, orchestrator};
//!
//! // Blocks until the interactive session exits
//! orchestrator::build_and_run(&RunSettings::default())?;
//! # Ok::<(), color_eyre::eyre::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! Modules expose `thiserror` enums; the orchestrator and binary wrap them
//! with `color_eyre` context.

pub mod config;
pub mod config_loader;
pub mod emulation;
pub mod orchestrator;
pub mod probe;
pub mod shell;
pub mod topology;
pub mod utils;
