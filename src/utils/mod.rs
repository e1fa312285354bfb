//! Shared utilities: address parsing and datapath id derivation.

pub mod ip_utils;

pub use ip_utils::{dpid_from_name, is_valid_mac, parse_cidr};
