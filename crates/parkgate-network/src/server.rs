//! Operator command endpoint.
//!
//! The authority drives the barrier by calling the controller back:
//!
//! ```text
//! Authority ──GET /control-gate?action=open──> CommandEndpoint (axum)
//!                                                   │ CommandRequest
//!                                                   ▼
//!                                            GateController cycle
//!                                                   │ CommandOutcome
//! Authority <──200 "Gate opened"────────────────────┘
//! ```
//!
//! The endpoint never touches gate state. It forwards each command through
//! a bounded channel and waits for the controller to apply it, so the
//! caller sees the effect of the command, not just its receipt.

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use parkgate_core::constants::CONTROL_PATH;
use parkgate_core::{CommandOutcome, ControlCommand, GateState};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::error::{NetworkError, Result};

/// How long the endpoint waits for the controller to apply a command.
///
/// Covers a full authorization round-trip plus a sweep, since the
/// controller only services commands between those.
pub const DEFAULT_COMMAND_REPLY_TIMEOUT_MS: u64 = 20_000;

/// Pending commands buffered between the endpoint and the controller.
pub const DEFAULT_COMMAND_QUEUE: usize = 8;

const INVALID_ACTION: &str = "Invalid action. Use 'open' or 'close'.";

/// One command waiting for the controller.
#[derive(Debug)]
pub struct CommandRequest {
    pub command: ControlCommand,
    reply: oneshot::Sender<CommandOutcome>,
}

impl CommandRequest {
    /// Whether the caller stopped waiting, e.g. after its reply timeout.
    /// An abandoned command must not be applied.
    pub fn is_abandoned(&self) -> bool {
        self.reply.is_closed()
    }

    /// Hand the outcome back to the caller. A caller that gave up is ignored.
    pub fn respond(self, outcome: CommandOutcome) {
        if self.reply.send(outcome).is_err() {
            debug!(command = %self.command, "Command caller went away before the reply");
        }
    }
}

/// Create the command channel between endpoint and controller.
pub fn command_channel(capacity: usize) -> (CommandSender, CommandReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (CommandSender { tx }, CommandReceiver { rx })
}

/// Submitting side, cloned into every request handler.
#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: mpsc::Sender<CommandRequest>,
}

impl CommandSender {
    /// Submit a command and wait up to `timeout` for its outcome.
    ///
    /// # Errors
    ///
    /// Returns `ControllerUnavailable` if the controller is gone and
    /// `Timeout` if it does not answer in time.
    pub async fn submit(&self, command: ControlCommand, timeout: Duration) -> Result<CommandOutcome> {
        let (reply, rx) = oneshot::channel();
        let exchange = async {
            self.tx
                .send(CommandRequest { command, reply })
                .await
                .map_err(|_| NetworkError::ControllerUnavailable)?;
            rx.await.map_err(|_| NetworkError::ControllerUnavailable)
        };

        tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| NetworkError::Timeout(timeout.as_millis() as u64))?
    }
}

/// Receiving side, owned by the controller.
#[derive(Debug)]
pub struct CommandReceiver {
    rx: mpsc::Receiver<CommandRequest>,
}

impl CommandReceiver {
    /// Take the next pending command without waiting.
    pub fn try_next(&mut self) -> Option<CommandRequest> {
        self.rx.try_recv().ok()
    }

    /// Wait for the next command. `None` once every sender is dropped.
    pub async fn recv(&mut self) -> Option<CommandRequest> {
        self.rx.recv().await
    }
}

#[derive(Debug, Clone)]
struct EndpointState {
    sender: CommandSender,
    reply_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct ControlQuery {
    action: Option<String>,
}

/// Build the command router.
pub fn router(sender: CommandSender, reply_timeout: Duration) -> Router {
    Router::new()
        .route(CONTROL_PATH, get(control_gate))
        .with_state(EndpointState {
            sender,
            reply_timeout,
        })
}

async fn control_gate(
    State(state): State<EndpointState>,
    Query(query): Query<ControlQuery>,
) -> (StatusCode, String) {
    let Some(command) = query.action.as_deref().and_then(|a| a.parse::<ControlCommand>().ok())
    else {
        warn!(action = ?query.action, "Rejected command");
        return (StatusCode::BAD_REQUEST, INVALID_ACTION.to_string());
    };

    info!(%command, "Operator command received");
    match state.sender.submit(command, state.reply_timeout).await {
        Ok(outcome) => render(command, &outcome),
        Err(e) => {
            warn!(%command, error = %e, "Command not applied");
            (StatusCode::SERVICE_UNAVAILABLE, format!("Gate controller unavailable: {e}"))
        }
    }
}

fn render(command: ControlCommand, outcome: &CommandOutcome) -> (StatusCode, String) {
    match (command, outcome) {
        (ControlCommand::Open, CommandOutcome::Applied { .. }) => {
            (StatusCode::OK, "Gate opened".to_string())
        }
        (ControlCommand::Close, CommandOutcome::Applied { .. }) => {
            (StatusCode::OK, "Gate closed".to_string())
        }
        (ControlCommand::Open, CommandOutcome::Unchanged { .. }) => {
            (StatusCode::OK, "Gate already open".to_string())
        }
        (ControlCommand::Close, CommandOutcome::Unchanged { .. }) => {
            (StatusCode::OK, "Gate already closed".to_string())
        }
        (_, CommandOutcome::Busy { state }) => (StatusCode::CONFLICT, busy_message(*state)),
        (_, CommandOutcome::Failed { reason, .. }) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Actuator fault: {reason}"),
        ),
    }
}

fn busy_message(state: GateState) -> String {
    format!("Gate busy ({state})")
}

/// HTTP server for operator commands.
///
/// # Example
///
/// ```no_run
/// use parkgate_network::{CommandEndpoint, command_channel, DEFAULT_COMMAND_QUEUE};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (sender, mut receiver) = command_channel(DEFAULT_COMMAND_QUEUE);
/// let endpoint = CommandEndpoint::bind("0.0.0.0:80", sender, Duration::from_secs(20)).await?;
/// tokio::spawn(endpoint.serve());
///
/// while let Some(request) = receiver.recv().await {
///     println!("command: {}", request.command);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct CommandEndpoint {
    listener: TcpListener,
    router: Router,
}

impl CommandEndpoint {
    /// Bind the listener.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn bind(addr: &str, sender: CommandSender, reply_timeout: Duration) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| NetworkError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        info!(addr, "Command endpoint listening");
        Ok(Self {
            listener,
            router: router(sender, reply_timeout),
        })
    }

    /// Bound address (useful when binding port 0).
    ///
    /// # Errors
    ///
    /// Returns an error if the socket address cannot be read.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve requests until the task is aborted.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails.
    pub async fn serve(self) -> Result<()> {
        axum::serve(self.listener, self.router).await?;
        Ok(())
    }
}
