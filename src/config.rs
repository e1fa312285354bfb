use crate::topology::ControllerRef;
use log::warn;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Environment variable holding the controller address
pub const CONTROLLER_ENV: &str = "ONOS_IP";

/// Controller address used when the environment does not set one
pub const DEFAULT_CONTROLLER_IP: &str = "127.0.0.1";

/// OpenFlow port the controller listens on
pub const CONTROLLER_PORT: u16 = 6653;

/// Name of the single remote controller
pub const CONTROLLER_NAME: &str = "c0";

/// Resolve the controller from `ONOS_IP`, falling back to localhost
///
/// The value is passed through unvalidated; an unreachable or malformed
/// address only shows up later as switches that never connect. Bytes that
/// are not UTF-8 are replaced, never dropped.
pub fn controller_from_env() -> ControllerRef {
    let ip = env::var_os(CONTROLLER_ENV).map(|raw| {
        let value = raw.to_string_lossy().into_owned();
        if raw.to_str().is_none() {
            warn!("{} is not valid UTF-8, using {:?}", CONTROLLER_ENV, value);
        }
        value
    });
    resolve_controller(ip)
}

/// Build the controller reference from an optional address override
pub fn resolve_controller(ip: Option<String>) -> ControllerRef {
    ControllerRef {
        name: CONTROLLER_NAME.to_string(),
        ip: ip.unwrap_or_else(|| DEFAULT_CONTROLLER_IP.to_string()),
        port: CONTROLLER_PORT,
    }
}

/// Runtime settings, optionally loaded from a YAML file
///
/// ```yaml
/// connect_poll: 500ms
/// iperf_duration: 5s
/// use_sudo: false
/// prompt: "sdnlab> "
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunSettings {
    /// Interval between controller session checks
    #[serde(with = "humantime_serde")]
    pub connect_poll: Duration,
    /// Length of an `iperf` run started from the shell
    #[serde(with = "humantime_serde")]
    pub iperf_duration: Duration,
    /// Prefix every system command with `sudo`
    pub use_sudo: bool,
    /// Interactive prompt
    pub prompt: String,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            connect_poll: Duration::from_millis(500),
            iperf_duration: Duration::from_secs(5),
            use_sudo: false,
            prompt: "sdnlab> ".to_string(),
        }
    }
}

impl RunSettings {
    /// Validate the settings
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.connect_poll.is_zero() {
            return Err(SettingsError::Invalid(
                "connect_poll must be greater than zero".to_string(),
            ));
        }
        if self.iperf_duration.as_secs() == 0 {
            return Err(SettingsError::Invalid(
                "iperf_duration must be at least one second".to_string(),
            ));
        }
        if self.prompt.trim().is_empty() {
            return Err(SettingsError::Invalid("prompt cannot be empty".to_string()));
        }
        Ok(())
    }
}

/// Settings validation errors
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Invalid settings: {0}")]
    Invalid(String),
}
