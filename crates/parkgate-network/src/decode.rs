//! Decoding of authorization replies.
//!
//! The authority answers a scan with a small JSON object:
//!
//! ```text
//! {"openGate": true, "slots": 3, "message": "Welcome", "licensePlate": "51F-12345", "fee": 5000}
//! ```
//!
//! Every field is optional on the wire. Anything that cannot be decoded is a
//! denied decision, so a garbled reply never opens the gate.

use parkgate_core::AuthorizationDecision;
use parkgate_core::constants::OCCUPANCY_NOT_REPORTED;
use serde::Deserialize;
use tracing::warn;

const DEFAULT_REPLY_MESSAGE: &str = "No message from server";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorityReply {
    #[serde(default)]
    open_gate: bool,
    slots: Option<i32>,
    message: Option<String>,
    license_plate: Option<String>,
    fee: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Decode a success reply into a decision.
///
/// # Examples
///
/// ```
/// use parkgate_network::decode_reply;
///
/// let decision = decode_reply(r#"{"openGate": true, "slots": 3, "message": "ok"}"#);
/// assert!(decision.granted);
/// assert_eq!(decision.reported_occupied_count, 3);
///
/// let garbled = decode_reply("<html>");
/// assert!(!garbled.granted);
/// assert_eq!(garbled.message, "decode error");
/// ```
pub fn decode_reply(body: &str) -> AuthorizationDecision {
    match serde_json::from_str::<AuthorityReply>(body) {
        Ok(reply) => AuthorizationDecision {
            granted: reply.open_gate,
            reported_occupied_count: reply.slots.unwrap_or(OCCUPANCY_NOT_REPORTED),
            message: reply
                .message
                .unwrap_or_else(|| DEFAULT_REPLY_MESSAGE.to_string()),
            plate: reply.license_plate,
            fee: reply.fee,
        },
        Err(e) => {
            warn!(error = %e, "Undecodable authorization reply");
            AuthorizationDecision::denied("decode error")
        }
    }
}

/// Build the decision for a non-success status.
///
/// The body's `message` is used when it has one.
pub fn error_reply(status: u16, body: &str) -> AuthorizationDecision {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .unwrap_or_else(|| format!("server error: {status}"));
    AuthorizationDecision::denied(message)
}
