//! Runtime settings of the gate controller binary.
//!
//! Settings come from three layers, later layers winning:
//!
//! 1. built-in defaults
//! 2. a JSON file named by `PARKGATE_CONFIG`
//! 3. the `PARKGATE_SERVER_URL`, `PARKGATE_LISTEN` and `PARKGATE_CAPACITY`
//!    environment variables
//!
//! ```json
//! {
//!   "authority": { "base_url": "http://192.168.1.10:3000" },
//!   "listen": "0.0.0.0:8080",
//!   "capacity": 5,
//!   "timing": { "hold_grace_ms": 3000, "hold_ceiling_ms": 10000 }
//! }
//! ```

use std::net::SocketAddr;

use parkgate_controller::GateTiming;
use parkgate_core::constants::{DEFAULT_CAPACITY, DEFAULT_COMMAND_LISTEN};
use parkgate_core::{Error, Result};
use parkgate_hardware::SweepConfig;
use parkgate_network::AuthorityConfig;
use serde::{Deserialize, Serialize};

pub const CONFIG_PATH_VAR: &str = "PARKGATE_CONFIG";
pub const SERVER_URL_VAR: &str = "PARKGATE_SERVER_URL";
pub const LISTEN_VAR: &str = "PARKGATE_LISTEN";
pub const CAPACITY_VAR: &str = "PARKGATE_CAPACITY";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub authority: AuthorityConfig,

    /// Address of the operator command endpoint.
    pub listen: String,

    /// Number of parking slots, one sensor line each.
    pub capacity: usize,

    pub timing: GateTiming,

    pub sweep: SweepConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            authority: AuthorityConfig::default(),
            listen: DEFAULT_COMMAND_LISTEN.to_string(),
            capacity: DEFAULT_CAPACITY,
            timing: GateTiming::default(),
            sweep: SweepConfig::default(),
        }
    }
}

impl Settings {
    /// Load settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the file cannot be read or parsed, an
    /// override is malformed, or the result fails validation.
    pub fn load() -> Result<Self> {
        let file = match std::env::var(CONFIG_PATH_VAR) {
            Ok(path) => Some(std::fs::read_to_string(&path).map_err(|e| {
                Error::Config(format!("cannot read {path}: {e}"))
            })?),
            Err(_) => None,
        };
        Self::from_sources(file.as_deref(), |key| std::env::var(key).ok())
    }

    /// Build settings from optional JSON text and an environment lookup.
    pub fn from_sources(
        json: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut settings = match json {
            Some(text) => serde_json::from_str(text)
                .map_err(|e| Error::Config(format!("invalid settings file: {e}")))?,
            None => Self::default(),
        };

        if let Some(url) = env(SERVER_URL_VAR) {
            settings.authority.base_url = url;
        }
        if let Some(listen) = env(LISTEN_VAR) {
            settings.listen = listen;
        }
        if let Some(capacity) = env(CAPACITY_VAR) {
            settings.capacity = capacity
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("{CAPACITY_VAR} is not a number: {capacity}")))?;
        }

        settings.validate()?;
        Ok(settings)
    }

    /// A full barrier sweep must finish within the actuator timeout.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::Config("capacity must be at least 1".to_string()));
        }

        self.listen
            .parse::<SocketAddr>()
            .map_err(|e| Error::Config(format!("invalid listen address {}: {e}", self.listen)))?;

        let url = self.authority.base_url.as_str();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "authority URL must be http or https: {url}"
            )));
        }
        if self.authority.request_timeout_ms == 0 {
            return Err(Error::Config("request timeout must be non-zero".to_string()));
        }

        self.timing.validate()?;
        self.sweep
            .validate()
            .map_err(|e| Error::Config(format!("invalid sweep: {e}")))?;

        let travel = self.sweep.travel_time();
        if travel >= self.timing.actuator_timeout() {
            return Err(Error::Config(format!(
                "sweep takes {}ms, not shorter than the {}ms actuator timeout",
                travel.as_millis(),
                self.timing.actuator_timeout_ms
            )));
        }
        Ok(())
    }
}
