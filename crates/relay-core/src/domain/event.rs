//! The [`ForwardedEvent`] value type.
//!
//! One `ForwardedEvent` represents one forwarding attempt: it is created by the
//! producer at ingestion time, consumed exactly once by the server's delivery
//! loop, and then dropped.  Events carry no identity beyond their position in
//! the ingestion queue, so two events with identical fields are still two
//! separate deliveries.
//!
//! Fields are private and only exposed through accessors so an event cannot be
//! modified after construction.

/// App name used for events built from shared clipboard text.
pub const CLIPBOARD_APP_NAME: &str = "Clipboard";
/// Title used for events built from shared clipboard text.
pub const CLIPBOARD_TITLE: &str = "Shared text";
/// Package id used for events built from shared clipboard text.
pub const CLIPBOARD_PACKAGE_ID: &str = "clipboard";

/// One event forwarded from the producer device to every subscriber.
///
/// No validation is performed on any field: empty titles or bodies are
/// accepted as-is.  Filtering uninteresting notifications is the job of the
/// producer (see [`crate::domain::intake`]), not of the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardedEvent {
    source_app_name: String,
    title: String,
    body: String,
    source_package_id: String,
    icon: Option<Vec<u8>>,
}

impl ForwardedEvent {
    /// Creates an event without an icon.
    pub fn new(
        source_app_name: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
        source_package_id: impl Into<String>,
    ) -> Self {
        Self {
            source_app_name: source_app_name.into(),
            title: title.into(),
            body: body.into(),
            source_package_id: source_package_id.into(),
            icon: None,
        }
    }

    /// Creates an event carrying a piece of shared clipboard text.
    ///
    /// Clipboard payloads travel through the same ingestion path as
    /// notifications, so subscribers only have to understand one event shape.
    pub fn clipboard(text: impl Into<String>) -> Self {
        Self::new(
            CLIPBOARD_APP_NAME,
            CLIPBOARD_TITLE,
            text,
            CLIPBOARD_PACKAGE_ID,
        )
    }

    /// Returns a copy of this event with the given raw icon bytes attached.
    ///
    /// The bytes are base64-encoded only when the event is put on the wire.
    #[must_use]
    pub fn with_icon(mut self, icon: impl Into<Vec<u8>>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn source_app_name(&self) -> &str {
        &self.source_app_name
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn source_package_id(&self) -> &str {
        &self.source_package_id
    }

    /// Raw icon bytes, if the producer attached any.
    pub fn icon(&self) -> Option<&[u8]> {
        self.icon.as_deref()
    }

    /// Returns `true` if this event was built by [`ForwardedEvent::clipboard`].
    pub fn is_clipboard(&self) -> bool {
        self.source_package_id == CLIPBOARD_PACKAGE_ID
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
