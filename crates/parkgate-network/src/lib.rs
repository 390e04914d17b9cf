//! Network communication layer for the parking gate controller.
//!
//! This crate connects the controller to the remote authority in both
//! directions. It handles HTTP transport, reply decoding and transport
//! health, and exposes the operator command endpoint.
//!
//! # Components
//!
//! - **HttpAuthority**: authorization requests and occupancy reports
//! - **TcpLink / ReconnectPolicy**: transport health and bounded recovery
//! - **CommandEndpoint**: HTTP server receiving operator open/close commands
//!
//! # Example
//!
//! ```no_run
//! use parkgate_core::OccupancyBitmap;
//! use parkgate_network::{AuthorityConfig, HttpAuthority, OccupancyReport, RemoteAuthority};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let authority = HttpAuthority::connect(AuthorityConfig::new("http://192.168.1.10:3000"))?;
//! if authority.recover_transport().await {
//!     let bitmap = OccupancyBitmap::new(vec![true, false, false, true, false]);
//!     let report = OccupancyReport::new(&bitmap, authority.local_address());
//!     authority.report(&report).await?;
//! }
//! # Ok(())
//! # }
//! ```

mod authority;
mod client;
mod decode;
mod error;
mod link;
mod server;

pub use authority::{AuthorityConfig, OccupancyReport, RemoteAuthority};
pub use client::HttpAuthority;
pub use decode::{decode_reply, error_reply};
pub use error::{NetworkError, Result};
pub use link::{LinkMonitor, TcpLink, ReconnectPolicy};
pub use server::{
    CommandEndpoint, CommandReceiver, CommandRequest, CommandSender, DEFAULT_COMMAND_QUEUE,
    DEFAULT_COMMAND_REPLY_TIMEOUT_MS, command_channel, router,
};
