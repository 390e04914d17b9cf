//! HTTP client for the remote authority.
//!
//! # Architecture
//!
//! ```text
//! GateController
//!     │
//!     └─> HttpAuthority ───(HTTP GET)───> Authority
//!            │    /api/rfid-request?uid=..
//!            │    /updateSlots?states=..&total=..&ip=..
//!            │
//!            └─> LinkMonitor (transport up/down, local address)
//! ```
//!
//! # Design Principles
//!
//! - **No retry within a request**: a failed authorization is a denied
//!   decision, a failed report waits for the next cadence tick.
//! - **Fail closed**: only a decoded success reply can grant access.
//! - **Short-circuit when down**: no request is attempted while the link
//!   monitor reports the transport down.

use std::net::IpAddr;
use std::time::Duration;

use parkgate_core::AuthorizationDecision;
use parkgate_core::constants::{AUTHORIZE_PATH, REPORT_PATH};
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::authority::{AuthorityConfig, OccupancyReport, RemoteAuthority};
use crate::decode::{decode_reply, error_reply};
use crate::error::{NetworkError, Result};
use crate::link::{LinkMonitor, TcpLink, ReconnectPolicy};

/// [`RemoteAuthority`] over HTTP.
///
/// # Example
///
/// ```no_run
/// use parkgate_network::{AuthorityConfig, HttpAuthority, RemoteAuthority};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let authority = HttpAuthority::connect(AuthorityConfig::new("http://192.168.1.10:3000"))?;
/// authority.recover_transport().await;
///
/// let decision = authority.authorize("04ABCDEF").await;
/// println!("{}", decision.summary());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct HttpAuthority<L: LinkMonitor = TcpLink> {
    client: Client,
    base_url: String,
    timeout: Duration,
    link: L,
    reconnect: ReconnectPolicy,
}

impl HttpAuthority<TcpLink> {
    /// Build a client whose link is checked at the authority's host and port.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client
    /// cannot be built.
    pub fn connect(config: AuthorityConfig) -> Result<Self> {
        let link = TcpLink::for_url(&config.base_url, config.request_timeout())?;
        Self::with_link(config, link)
    }
}

impl<L: LinkMonitor> HttpAuthority<L> {
    /// Build a client over an explicit link monitor.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client
    /// cannot be built.
    pub fn with_link(config: AuthorityConfig, link: L) -> Result<Self> {
        let url = reqwest::Url::parse(&config.base_url)
            .map_err(|e| NetworkError::invalid_base_url(&config.base_url, e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(NetworkError::invalid_base_url(
                &config.base_url,
                "scheme must be http or https",
            ));
        }

        let timeout = config.request_timeout();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NetworkError::Request(e.to_string()))?;

        debug!(base_url = %config.base_url, timeout_ms = config.request_timeout_ms, "Creating authority client");

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout,
            link,
            reconnect: config.reconnect,
        })
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Map a transport-level failure, marking the link down when the
    /// authority could not be reached at all.
    fn classify(&self, err: reqwest::Error) -> NetworkError {
        if err.is_timeout() {
            NetworkError::Timeout(self.timeout.as_millis() as u64)
        } else if err.is_connect() {
            self.link.mark_down();
            NetworkError::TransportUnavailable
        } else {
            NetworkError::Request(err.to_string())
        }
    }
}

impl<L: LinkMonitor> RemoteAuthority for HttpAuthority<L> {
    fn transport_ready(&self) -> bool {
        self.link.is_up()
    }

    async fn recover_transport(&self) -> bool {
        self.reconnect.recover(&self.link).await
    }

    fn local_address(&self) -> Option<IpAddr> {
        self.link.local_addr()
    }

    async fn authorize(&self, uid: &str) -> AuthorizationDecision {
        if !self.link.is_up() {
            warn!(uid, "Authorization skipped, transport unavailable");
            return AuthorizationDecision::denied(NetworkError::TransportUnavailable.to_string());
        }

        debug!(uid, "Requesting authorization");
        let response = match self
            .client
            .get(self.endpoint(AUTHORIZE_PATH))
            .query(&[("uid", uid)])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let err = self.classify(e);
                warn!(uid, error = %err, "Authorization request failed");
                return AuthorizationDecision::denied(err.to_string());
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                let err = self.classify(e);
                warn!(uid, error = %err, "Authorization reply lost");
                return AuthorizationDecision::denied(err.to_string());
            }
        };

        let decision = if status.is_success() {
            decode_reply(&body)
        } else {
            warn!(uid, status = status.as_u16(), "Authority rejected request");
            error_reply(status.as_u16(), &body)
        };

        info!(
            uid,
            granted = decision.granted,
            slots = decision.reported_occupied_count,
            "{}",
            decision.summary()
        );
        decision
    }

    async fn report(&self, report: &OccupancyReport) -> Result<String> {
        if !self.link.is_up() {
            return Err(NetworkError::TransportUnavailable);
        }

        let response = self
            .client
            .get(self.endpoint(REPORT_PATH))
            .query(report)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::Status(status.as_u16()));
        }

        let body = response.text().await.map_err(|e| self.classify(e))?;
        debug!(states = %report.states, total = report.total, reply = %body, "Occupancy reported");
        Ok(body)
    }
}
