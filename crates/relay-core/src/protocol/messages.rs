//! JSON message types for the server → subscriber line protocol.
//!
//! Every message is one JSON object on one line.  The server sends exactly two
//! kinds of object:
//!
//! ```text
//! {"type":"status","message":"connected","platform_version":"linux"}   ← once, first
//! {"app":"Mail","title":"Hi","text":"body","packageName":"com.mail"}    ← per event
//! ```
//!
//! Event objects carry an extra `"icon"` field (standard base64) only when the
//! producer attached icon bytes.  Subscribers never send anything back.
//!
//! # Why is the event object untagged?
//!
//! Existing subscribers key off the presence of `"app"` rather than a `"type"`
//! discriminant, so events are emitted as a flat object and only the control
//! message carries `"type"`.  [`ServerMessage`] is therefore `untagged`: serde
//! tries [`ControlMessage`] first (which requires `"type"`) and falls back to
//! [`EventMessage`].

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::domain::event::ForwardedEvent;
use crate::protocol::codec::ProtocolError;

/// `message` value of the handshake sent to every new connection.
pub const HANDSHAKE_MESSAGE: &str = "connected";

// ── Control messages ──────────────────────────────────────────────────────────

/// Messages that carry a `"type"` discriminant.
///
/// # Serde representation
///
/// ```json
/// {"type":"status","message":"connected","platform_version":"linux"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlMessage {
    /// Status notice from the server.  The handshake is a `Status` whose
    /// `message` is [`HANDSHAKE_MESSAGE`].
    #[serde(rename = "status")]
    Status {
        message: String,
        /// Free-form description of the producer platform.
        platform_version: String,
    },
}

impl ControlMessage {
    /// Builds the handshake line sent once per accepted connection.
    pub fn handshake(platform_version: impl Into<String>) -> Self {
        Self::Status {
            message: HANDSHAKE_MESSAGE.to_string(),
            platform_version: platform_version.into(),
        }
    }

    /// Returns `true` if this is the connection handshake.
    pub fn is_handshake(&self) -> bool {
        match self {
            Self::Status { message, .. } => message == HANDSHAKE_MESSAGE,
        }
    }
}

// ── Event messages ────────────────────────────────────────────────────────────

/// Wire form of a [`ForwardedEvent`].
///
/// Field order is the serialization order: `app`, `title`, `text`,
/// `packageName`, then `icon` when present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMessage {
    pub app: String,
    pub title: String,
    pub text: String,
    #[serde(rename = "packageName")]
    pub package_name: String,
    /// Standard (RFC 4648) base64 of the raw icon bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl From<&ForwardedEvent> for EventMessage {
    fn from(event: &ForwardedEvent) -> Self {
        Self {
            app: event.source_app_name().to_string(),
            title: event.title().to_string(),
            text: event.body().to_string(),
            package_name: event.source_package_id().to_string(),
            icon: event.icon().map(|bytes| BASE64.encode(bytes)),
        }
    }
}

impl TryFrom<EventMessage> for ForwardedEvent {
    type Error = ProtocolError;

    /// Rebuilds the domain event on the subscriber side.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidIcon`] if `icon` is not valid base64.
    fn try_from(msg: EventMessage) -> Result<Self, Self::Error> {
        let event = ForwardedEvent::new(msg.app, msg.title, msg.text, msg.package_name);
        match msg.icon {
            Some(encoded) => {
                let bytes = BASE64.decode(encoded).map_err(ProtocolError::InvalidIcon)?;
                Ok(event.with_icon(bytes))
            }
            None => Ok(event),
        }
    }
}

// ── Envelope ──────────────────────────────────────────────────────────────────

/// Any line the server can send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
    Control(ControlMessage),
    Event(EventMessage),
}

impl From<ControlMessage> for ServerMessage {
    fn from(msg: ControlMessage) -> Self {
        Self::Control(msg)
    }
}

impl From<&ForwardedEvent> for ServerMessage {
    fn from(event: &ForwardedEvent) -> Self {
        Self::Event(EventMessage::from(event))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
