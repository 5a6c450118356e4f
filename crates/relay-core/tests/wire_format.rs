//! Integration tests for the relay-core wire format.
//!
//! These tests pin the exact bytes subscribers depend on, going through the
//! public API the server and client use: intake filter → event → line.

use relay_core::{
    decode_line, encode_line, ControlMessage, EventMessage, ForwardedEvent, IntakeFilter,
    NotificationCandidate, ServerMessage,
};

/// The event object from the reference scenario must be byte-for-byte stable.
#[test]
fn test_reference_event_line_is_exact() {
    let event = ForwardedEvent::new("Mail", "Hi", "body", "com.mail");

    let line = encode_line(&ServerMessage::from(&event)).expect("encode");

    assert_eq!(
        line,
        "{\"app\":\"Mail\",\"title\":\"Hi\",\"text\":\"body\",\"packageName\":\"com.mail\"}\n"
    );
}

/// The handshake line must carry `type`, `message`, and `platform_version`.
#[test]
fn test_handshake_line_is_exact() {
    let line = encode_line(&ServerMessage::from(ControlMessage::handshake("linux"))).expect("encode");

    assert_eq!(
        line,
        "{\"type\":\"status\",\"message\":\"connected\",\"platform_version\":\"linux\"}\n"
    );
}

/// A subscriber decoding a server line gets back the event the producer built,
/// icon bytes included.
#[test]
fn test_subscriber_decodes_event_with_icon() {
    let original = ForwardedEvent::new("Chat", "Bob", "hey", "org.chat").with_icon(vec![0u8, 255, 7]);
    let line = encode_line(&ServerMessage::from(&original)).expect("encode");

    let decoded = match decode_line(&line).expect("decode") {
        ServerMessage::Event(msg) => ForwardedEvent::try_from(msg).expect("valid icon"),
        other => panic!("expected event, got {other:?}"),
    };

    assert_eq!(decoded, original);
}

/// Notifications accepted by the intake filter become the wire object
/// subscribers expect, with big text promoted to `text`.
#[test]
fn test_intake_filter_output_maps_to_wire_fields() {
    let filter = IntakeFilter::new("dev.relay.forwarder");
    let candidate = NotificationCandidate {
        package_id: "com.mail".to_string(),
        app_label: Some("Mail".to_string()),
        title: "Hi".to_string(),
        text: "short".to_string(),
        big_text: Some("long body".to_string()),
        ..NotificationCandidate::default()
    };

    let event = filter.accept(candidate).expect("accepted");
    let msg = EventMessage::from(&event);

    assert_eq!(msg.app, "Mail");
    assert_eq!(msg.text, "long body");
    assert_eq!(msg.package_name, "com.mail");
    assert!(msg.icon.is_none());
}

/// Clipboard payloads are ordinary events on the wire.
#[test]
fn test_clipboard_event_line_uses_clipboard_package() {
    let line = encode_line(&ServerMessage::from(&ForwardedEvent::clipboard("copied"))).expect("encode");

    assert!(line.contains("\"packageName\":\"clipboard\""));
    assert!(line.contains("\"text\":\"copied\""));
}
