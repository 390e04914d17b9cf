//! Common test utilities for the network integration tests.
//!
//! The authority is stubbed with a small axum router served on an
//! ephemeral loopback port. Handlers record the query strings they see so
//! tests can check what went over the wire.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::Router;
use parkgate_network::{AuthorityConfig, HttpAuthority, RemoteAuthority};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Query strings received by a stub handler, in arrival order.
pub type Captured = Arc<Mutex<Vec<HashMap<String, String>>>>;

pub fn captured() -> Captured {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn take(captured: &Captured) -> Vec<HashMap<String, String>> {
    captured.lock().unwrap().clone()
}

/// Serve `router` on `127.0.0.1:0`.
pub async fn serve(router: Router) -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (addr, handle)
}

pub fn config_for(addr: SocketAddr, timeout_ms: u64) -> AuthorityConfig {
    AuthorityConfig {
        base_url: format!("http://{addr}"),
        request_timeout_ms: timeout_ms,
        ..AuthorityConfig::default()
    }
}

/// Client for the stub at `addr` with its transport already up.
pub async fn connected_authority(addr: SocketAddr, timeout_ms: u64) -> HttpAuthority {
    let authority = HttpAuthority::connect(config_for(addr, timeout_ms)).unwrap();
    assert!(authority.recover_transport().await, "stub authority unreachable");
    authority
}
