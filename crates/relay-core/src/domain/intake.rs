//! Producer-side intake filter: decides which raw notifications are forwarded.
//!
//! The server core accepts every event it is handed.  Deciding that a
//! notification is not worth forwarding happens *before* ingestion, on the
//! producer side, and this module holds those rules so every producer applies
//! them the same way.
//!
//! # Rules
//!
//! A [`NotificationCandidate`] is rejected when:
//!
//! 1. it is ongoing **and** belongs to a foreground service (download
//!    progress, media sessions pinned by a service, the relay's own status);
//! 2. it was posted by the forwarder's own package;
//! 3. its title, text, and big text are all blank.
//!
//! Otherwise it becomes a [`ForwardedEvent`] whose body is the big text when
//! present (expanded notifications carry more detail there) and the short
//! text otherwise, and whose app name falls back to the package id when the
//! producer could not resolve a human-readable label.

use thiserror::Error;
use tracing::debug;

use crate::domain::event::ForwardedEvent;

/// A raw notification as observed by the producer, before filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationCandidate {
    /// Package id of the app that posted the notification.
    pub package_id: String,
    /// Human-readable app label, if the producer could resolve one.
    pub app_label: Option<String>,
    pub title: String,
    pub text: String,
    /// Expanded text shown when the notification is pulled down.
    pub big_text: Option<String>,
    /// The notification cannot be dismissed by the user.
    pub is_ongoing: bool,
    /// The notification is pinned by a foreground service.
    pub is_foreground_service: bool,
}

/// Why a candidate was not turned into an event.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum RejectReason {
    #[error("ongoing foreground-service notification")]
    ForegroundService,
    #[error("notification posted by the forwarder itself")]
    OwnPackage,
    #[error("notification has no visible text")]
    NoVisibleText,
}

/// Applies the intake rules for one forwarding device.
#[derive(Debug, Clone)]
pub struct IntakeFilter {
    own_package_id: String,
}

impl IntakeFilter {
    /// Creates a filter that drops notifications posted by `own_package_id`.
    pub fn new(own_package_id: impl Into<String>) -> Self {
        Self {
            own_package_id: own_package_id.into(),
        }
    }

    /// Turns a candidate into a [`ForwardedEvent`], or explains why not.
    ///
    /// # Errors
    ///
    /// Returns the first [`RejectReason`] that applies.
    pub fn accept(&self, candidate: NotificationCandidate) -> Result<ForwardedEvent, RejectReason> {
        if candidate.is_ongoing && candidate.is_foreground_service {
            debug!(package = %candidate.package_id, "ignoring foreground service notification");
            return Err(RejectReason::ForegroundService);
        }

        if candidate.package_id == self.own_package_id {
            debug!(package = %candidate.package_id, "ignoring notification from own package");
            return Err(RejectReason::OwnPackage);
        }

        let big_text = candidate
            .big_text
            .filter(|text| !text.trim().is_empty());

        if candidate.title.trim().is_empty() && candidate.text.trim().is_empty() && big_text.is_none()
        {
            debug!(package = %candidate.package_id, "ignoring notification with no visible text");
            return Err(RejectReason::NoVisibleText);
        }

        let app_name = candidate
            .app_label
            .filter(|label| !label.trim().is_empty())
            .unwrap_or_else(|| candidate.package_id.clone());
        let body = big_text.unwrap_or(candidate.text);

        Ok(ForwardedEvent::new(
            app_name,
            candidate.title,
            body,
            candidate.package_id,
        ))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
