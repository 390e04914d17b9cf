//! Transport health and recovery.
//!
//! The gate controller checks the link once per cycle. While the link is
//! down, authorization and reporting short-circuit to failure and the
//! [`ReconnectPolicy`] is used to bring it back:
//!
//! ```text
//! down ──check──► up
//!   ▲  (every backoff, for at most window)
//!   └── connect error during a request
//! ```

#![allow(async_fn_in_trait)]

use std::net::IpAddr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parkgate_core::constants::{DEFAULT_RECONNECT_BACKOFF_MS, DEFAULT_RECONNECT_WINDOW_MS};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{NetworkError, Result};

/// Health of the network path to the authority.
pub trait LinkMonitor: Send + Sync {
    /// Last known state of the link.
    fn is_up(&self) -> bool;

    /// Record that a request could not reach the authority.
    fn mark_down(&self);

    /// Try once to establish the link. Returns the new state.
    async fn check(&self) -> bool;

    /// Address of this controller on the link, once known.
    fn local_addr(&self) -> Option<IpAddr>;
}

/// Link monitor that checks the authority with a TCP connect.
///
/// A successful connect proves the path and gives the local address the
/// controller reports to the authority.
#[derive(Debug)]
pub struct TcpLink {
    target: String,
    connect_timeout: Duration,
    up: AtomicBool,
    local: Mutex<Option<IpAddr>>,
}

impl TcpLink {
    /// Monitor the `host:port` target. The link starts down.
    pub fn new(target: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            target: target.into(),
            connect_timeout,
            up: AtomicBool::new(false),
            local: Mutex::new(None),
        }
    }

    /// Monitor the host and port of an `http(s)` URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL does not parse or has no host.
    ///
    /// # Examples
    ///
    /// ```
    /// use parkgate_network::TcpLink;
    /// use std::time::Duration;
    ///
    /// let link = TcpLink::for_url("http://192.168.1.10:3000", Duration::from_secs(1)).unwrap();
    /// assert_eq!(link.target(), "192.168.1.10:3000");
    ///
    /// let default_port = TcpLink::for_url("http://authority.local", Duration::from_secs(1)).unwrap();
    /// assert_eq!(default_port.target(), "authority.local:80");
    /// ```
    pub fn for_url(url: &str, connect_timeout: Duration) -> Result<Self> {
        let parsed =
            reqwest::Url::parse(url).map_err(|e| NetworkError::invalid_base_url(url, e.to_string()))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| NetworkError::invalid_base_url(url, "missing host"))?;
        let port = parsed
            .port_or_known_default()
            .ok_or_else(|| NetworkError::invalid_base_url(url, "missing port"))?;
        Ok(Self::new(format!("{host}:{port}"), connect_timeout))
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    fn set_local(&self, addr: Option<IpAddr>) {
        match self.local.lock() {
            Ok(mut local) => *local = addr,
            Err(poisoned) => *poisoned.into_inner() = addr,
        }
    }
}

impl LinkMonitor for TcpLink {
    fn is_up(&self) -> bool {
        self.up.load(Ordering::SeqCst)
    }

    fn mark_down(&self) {
        if self.up.swap(false, Ordering::SeqCst) {
            warn!(target = %self.target, "Transport link lost");
        }
    }

    async fn check(&self) -> bool {
        match tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.target)).await {
            Ok(Ok(stream)) => {
                let local = stream.local_addr().ok().map(|addr| addr.ip());
                self.set_local(local);
                if !self.up.swap(true, Ordering::SeqCst) {
                    info!(target = %self.target, local = ?local, "Transport link up");
                }
                true
            }
            Ok(Err(e)) => {
                debug!(target = %self.target, error = %e, "Transport check failed");
                self.mark_down();
                false
            }
            Err(_) => {
                debug!(
                    target = %self.target,
                    timeout_ms = self.connect_timeout.as_millis() as u64,
                    "Transport check timed out"
                );
                self.mark_down();
                false
            }
        }
    }

    fn local_addr(&self) -> Option<IpAddr> {
        match self.local.lock() {
            Ok(local) => *local,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Bounded reconnect: retry every `backoff` for at most `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    /// How long one recovery attempt keeps retrying (milliseconds).
    pub window_ms: u64,

    /// Pause between two attempts (milliseconds).
    pub backoff_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            window_ms: DEFAULT_RECONNECT_WINDOW_MS,
            backoff_ms: DEFAULT_RECONNECT_BACKOFF_MS,
        }
    }
}

impl ReconnectPolicy {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    /// Check `link` until it comes up or the window is exhausted.
    ///
    /// Returns `true` if the link is up on return. At least one check is
    /// always made.
    pub async fn recover<L: LinkMonitor>(&self, link: &L) -> bool {
        let started = Instant::now();
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            if link.check().await {
                info!(attempts, "Transport recovered");
                return true;
            }
            if started.elapsed() + self.backoff() >= self.window() {
                warn!(
                    attempts,
                    window_ms = self.window_ms,
                    "Transport recovery window exhausted"
                );
                return false;
            }
            tokio::time::sleep(self.backoff()).await;
        }
    }
}
