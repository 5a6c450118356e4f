//! Line codec for the relay wire protocol.
//!
//! Wire format:
//! ```text
//! <compact JSON object>\n
//! ```
//! UTF-8, one object per line.  Compact `serde_json` output never contains a
//! raw newline (newlines inside strings are escaped as `\n`), so the line
//! terminator is an unambiguous frame boundary.

use serde::Serialize;
use thiserror::Error;

use crate::protocol::messages::ServerMessage;

/// Line terminator appended to every encoded message.
pub const LINE_TERMINATOR: char = '\n';

/// Errors that can occur during message encoding or decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The message could not be serialized to JSON.
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),

    /// The line is not a JSON object the protocol understands.
    #[error("failed to decode line: {0}")]
    Decode(#[source] serde_json::Error),

    /// The line was empty after stripping the terminator.
    #[error("empty line")]
    EmptyLine,

    /// The `icon` field of an event is not valid base64.
    #[error("invalid icon encoding: {0}")]
    InvalidIcon(#[source] base64::DecodeError),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a message as one compact JSON object followed by `\n`.
///
/// # Errors
///
/// Returns [`ProtocolError::Encode`] if serialization fails.
///
/// # Examples
///
/// ```rust
/// use relay_core::{encode_line, ControlMessage};
///
/// let line = encode_line(&ControlMessage::handshake("14")).unwrap();
/// assert!(line.ends_with('\n'));
/// ```
pub fn encode_line<T: Serialize + ?Sized>(msg: &T) -> Result<String, ProtocolError> {
    let mut line = serde_json::to_string(msg).map_err(ProtocolError::Encode)?;
    line.push(LINE_TERMINATOR);
    Ok(line)
}

/// Decodes one line (with or without its terminator) into a [`ServerMessage`].
///
/// A trailing `\r\n` is tolerated so subscribers that read through
/// line-oriented tools do not have to normalise line endings first.
///
/// # Errors
///
/// Returns [`ProtocolError::EmptyLine`] for blank input and
/// [`ProtocolError::Decode`] for anything that is not a known message.
pub fn decode_line(line: &str) -> Result<ServerMessage, ProtocolError> {
    let trimmed = line.trim_end_matches(['\n', '\r']);
    if trimmed.trim().is_empty() {
        return Err(ProtocolError::EmptyLine);
    }
    serde_json::from_str(trimmed).map_err(ProtocolError::Decode)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::ForwardedEvent;
    use crate::protocol::messages::{ControlMessage, EventMessage};

    #[test]
    fn test_encode_line_appends_single_newline() {
        let line = encode_line(&ControlMessage::handshake("14")).unwrap();
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
    }

    #[test]
    fn test_encode_line_escapes_newlines_inside_fields() {
        // A multi-line notification body must still occupy a single line.
        let event = ForwardedEvent::new("Chat", "Bob", "line one\nline two", "org.chat");

        let line = encode_line(&EventMessage::from(&event)).unwrap();

        assert_eq!(line.matches('\n').count(), 1);
        assert!(line.contains(r"line one\nline two"));
    }

    #[test]
    fn test_encode_line_preserves_unicode() {
        let event = ForwardedEvent::new("Bóbr", "Zażółć", "🙂", "pl.app");
        let line = encode_line(&EventMessage::from(&event)).unwrap();
        assert!(line.contains("Zażółć"));
        assert!(line.contains("🙂"));
    }

    #[test]
    fn test_decode_line_accepts_crlf_terminator() {
        let msg = decode_line("{\"app\":\"A\",\"title\":\"B\",\"text\":\"C\",\"packageName\":\"d\"}\r\n")
            .unwrap();
        assert!(matches!(msg, ServerMessage::Event(_)));
    }

    #[test]
    fn test_decode_line_rejects_empty_line() {
        assert!(matches!(decode_line("\n"), Err(ProtocolError::EmptyLine)));
        assert!(matches!(decode_line("   "), Err(ProtocolError::EmptyLine)));
    }

    #[test]
    fn test_decode_line_rejects_unknown_object() {
        assert!(matches!(
            decode_line(r#"{"hello":"world"}"#),
            Err(ProtocolError::Decode(_))
        ));
    }

    #[test]
    fn test_decode_line_rejects_non_json() {
        assert!(matches!(
            decode_line("not json at all"),
            Err(ProtocolError::Decode(_))
        ));
    }
}
