//! Error taxonomy for the capability broker.
//!
//! Two families live in [`BrokerError`]:
//!
//! - **Terminal** errors end an accepted request. They are never returned
//!   to the caller as faults; the broker converts them into exactly one
//!   [`ResultEvent`] via [`BrokerError::to_event`].
//! - **Caller-facing** errors (`Busy`, `NotInitialized`, `StaleCallback`)
//!   reject a call without touching the active request and without
//!   emitting anything.

use std::io;

use thiserror::Error;

use crate::broker::CapabilityKind;
use crate::codec::CodecError;
use crate::dispatch::DispatchError;
use crate::events::ResultEvent;

/// Errors produced while brokering a capture or pick request.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// One or more of the required grants was refused.
    #[error("Permission Denied")]
    PermissionDenied,

    /// The user backed out of the camera or picker.
    #[error("User cancelled the {0} request.")]
    UserCancelled(CapabilityKind),

    /// The picker returned OK without a content handle.
    #[error("No image selected from gallery.")]
    NoImageSelected,

    /// The captured file could not be decoded into a bitmap.
    #[error("Failed to decode captured image.")]
    DecodeFailure(#[source] CodecError),

    /// The picked content could not be resolved or decoded.
    #[error("Failed to load gallery image.")]
    GalleryLoad(#[source] CodecError),

    /// No handler application accepted the launch.
    #[error("No application available to handle {kind}.")]
    DispatchUnavailable {
        kind: CapabilityKind,
        #[source]
        source: DispatchError,
    },

    /// The capture destination could not be allocated.
    #[error("Error creating image file: {0}")]
    Storage(#[from] io::Error),

    /// A request is already in flight; the broker holds a single slot.
    #[error("A {active} request is already in flight.")]
    Busy { active: CapabilityKind },

    /// No listener has been registered via `initialize`.
    #[error("Broker not initialized: no listener registered.")]
    NotInitialized,

    /// A callback arrived that does not belong to the active request.
    #[error("Stale callback ({received}) does not match the active request.")]
    StaleCallback { received: String },
}

impl BrokerError {
    /// Whether this error ends an accepted request.
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            BrokerError::Busy { .. } | BrokerError::NotInitialized | BrokerError::StaleCallback { .. }
        )
    }

    /// The terminal event this error maps to, or `None` for caller-facing
    /// rejections.
    pub fn to_event(&self) -> Option<ResultEvent> {
        match self {
            BrokerError::PermissionDenied => Some(ResultEvent::PermissionDenied),
            BrokerError::UserCancelled(_) => Some(ResultEvent::Cancelled),
            BrokerError::NoImageSelected
            | BrokerError::DecodeFailure(_)
            | BrokerError::GalleryLoad(_)
            | BrokerError::DispatchUnavailable { .. }
            | BrokerError::Storage(_) => Some(ResultEvent::Failure {
                reason: self.to_string(),
            }),
            BrokerError::Busy { .. }
            | BrokerError::NotInitialized
            | BrokerError::StaleCallback { .. } => None,
        }
    }

    /// Terminal event for this error. Caller-facing errors never reach a
    /// terminal path, but render as a failure if they do.
    pub(crate) fn into_event(self) -> ResultEvent {
        self.to_event()
            .unwrap_or_else(|| ResultEvent::failure(self.to_string()))
    }
}
