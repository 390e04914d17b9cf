//! The remote authority as seen by the gate controller.

#![allow(async_fn_in_trait)]

use std::net::IpAddr;
use std::time::Duration;

use parkgate_core::constants::{DEFAULT_AUTHORITY_URL, DEFAULT_HTTP_TIMEOUT_MS};
use parkgate_core::{AuthorizationDecision, OccupancyBitmap};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::link::ReconnectPolicy;

/// Remote system that authorizes scans and collects occupancy reports.
///
/// `authorize` never fails: every failure is folded into a denied
/// decision. `report` is best-effort and returns the error so the caller
/// can log it.
pub trait RemoteAuthority: Send + Sync {
    /// Whether the transport is currently believed to be up.
    fn transport_ready(&self) -> bool;

    /// Run one bounded recovery attempt. Returns the new transport state.
    async fn recover_transport(&self) -> bool;

    /// Address of this controller, as reported to the authority.
    fn local_address(&self) -> Option<IpAddr>;

    /// Ask the authority whether the card `uid` may pass.
    async fn authorize(&self, uid: &str) -> AuthorizationDecision;

    /// Push an occupancy report. Returns the reply body.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport is down, the request fails or
    /// the authority answers with a non-success status.
    async fn report(&self, report: &OccupancyReport) -> Result<String>;
}

/// Occupancy report as sent on the wire.
///
/// # Examples
///
/// ```
/// use parkgate_core::OccupancyBitmap;
/// use parkgate_network::OccupancyReport;
///
/// let bitmap = OccupancyBitmap::new(vec![true, false, false, true, false]);
/// let report = OccupancyReport::new(&bitmap, Some("192.168.1.50".parse().unwrap()));
/// assert_eq!(report.states, "10010");
/// assert_eq!(report.total, 5);
/// assert_eq!(report.ip, "192.168.1.50");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancyReport {
    /// One `'1'`/`'0'` per slot, in sensor order.
    pub states: String,

    /// Facility capacity.
    pub total: usize,

    /// Controller address.
    pub ip: String,
}

impl OccupancyReport {
    pub fn new(bitmap: &OccupancyBitmap, address: Option<IpAddr>) -> Self {
        Self {
            states: bitmap.to_state_string(),
            total: bitmap.capacity(),
            ip: address.map_or_else(|| "0.0.0.0".to_string(), |ip| ip.to_string()),
        }
    }
}

/// Where the authority lives and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorityConfig {
    /// Base URL, e.g. `http://192.168.1.10:3000`.
    pub base_url: String,

    /// Bound on one request, connect included (milliseconds).
    pub request_timeout_ms: u64,

    pub reconnect: ReconnectPolicy,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_AUTHORITY_URL.to_string(),
            request_timeout_ms: DEFAULT_HTTP_TIMEOUT_MS,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl AuthorityConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
