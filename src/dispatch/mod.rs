//! Action-dispatch collaborator: launches the camera or the gallery picker.
//!
//! A launch is fire-and-forget. The dispatcher reports synchronous launch
//! failures through its return value; the user's eventual answer comes back
//! later as an [`ActionOutcome`] handed to
//! `CapabilityBroker::on_action_result`.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::broker::Correlation;
use crate::storage::CaptureDestination;

/// MIME filter handed to the picker.
pub const IMAGE_MIME_FILTER: &str = "image/*";

/// Opaque reference to picked content (a `content://` or `file://` URI).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHandle(String);

impl ContentHandle {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How the platform delivered the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImagePayload {
    File(PathBuf),
    Content(ContentHandle),
}

/// Whether the user completed the action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Ok,
    Cancelled,
}

/// The single callback delivered for a dispatched action.
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    pub correlation: Correlation,
    pub status: ActionStatus,
    pub payload: Option<ImagePayload>,
}

impl ActionOutcome {
    pub fn ok(correlation: Correlation, payload: Option<ImagePayload>) -> Self {
        Self {
            correlation,
            status: ActionStatus::Ok,
            payload,
        }
    }

    pub fn cancelled(correlation: Correlation) -> Self {
        Self {
            correlation,
            status: ActionStatus::Cancelled,
            payload: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ActionStatus::Ok
    }
}

/// Synchronous launch failures.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("no application can handle {0}")]
    NoHandler(String),

    #[error("launch failed: {0}")]
    LaunchFailed(String),
}

/// Collaborator that opens the platform camera or picker.
pub trait ActionDispatcher: Send + Sync {
    /// Open the camera, writing the photo to `destination`.
    fn launch_capture(
        &self,
        destination: &CaptureDestination,
        correlation: &Correlation,
    ) -> Result<(), DispatchError>;

    /// Open the picker restricted to `mime_filter`.
    fn launch_picker(&self, mime_filter: &str, correlation: &Correlation) -> Result<(), DispatchError>;
}
