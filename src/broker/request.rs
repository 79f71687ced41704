//! The single in-flight request and the identifiers that correlate it with
//! platform callbacks.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::CaptureDestination;

/// Platform request code for a camera capture.
pub const REQUEST_IMAGE_CAPTURE: i32 = 1;
/// Platform request code for a gallery pick.
pub const REQUEST_PICK_IMAGE: i32 = 2;
/// Platform request code for the permission prompt.
pub const PERMISSION_REQUEST_CODE: i32 = 3;

/// Which device capability a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    Capture,
    Pick,
}

impl CapabilityKind {
    /// Lowercase name used in logs and failure reasons.
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityKind::Capture => "capture",
            CapabilityKind::Pick => "pick",
        }
    }

    /// Request code the platform echoes back on the action result.
    pub fn request_code(&self) -> i32 {
        match self {
            CapabilityKind::Capture => REQUEST_IMAGE_CAPTURE,
            CapabilityKind::Pick => REQUEST_PICK_IMAGE,
        }
    }

    /// Source discriminator prefixed to a successful payload.
    pub fn success_tag(&self) -> &'static str {
        match self {
            CapabilityKind::Capture => "CAMERA_SUCCESS",
            CapabilityKind::Pick => "GALLERY_SUCCESS",
        }
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unique token minted per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationToken(Uuid);

impl CorrelationToken {
    /// Mint a fresh random token.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CorrelationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Carried through every collaborator call and handed back on callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Correlation {
    pub token: CorrelationToken,
    pub kind: CapabilityKind,
}

impl Correlation {
    /// A new correlation for `kind` with a fresh token.
    pub fn new(kind: CapabilityKind) -> Self {
        Self {
            token: CorrelationToken::new(),
            kind,
        }
    }

    /// Platform request code for the gated action.
    pub fn request_code(&self) -> i32 {
        self.kind.request_code()
    }
}

impl fmt::Display for Correlation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.token)
    }
}

/// Where an active request sits in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestPhase {
    PermissionPending,
    ActionDispatched,
}

/// The broker's one active request.
#[derive(Debug, Clone)]
pub struct Request {
    correlation: Correlation,
    phase: RequestPhase,
    destination: Option<CaptureDestination>,
    created_at: DateTime<Utc>,
}

impl Request {
    pub(crate) fn new(kind: CapabilityKind, phase: RequestPhase) -> Self {
        Self {
            correlation: Correlation::new(kind),
            phase,
            destination: None,
            created_at: Utc::now(),
        }
    }

    /// Correlation handed out when the request was accepted.
    pub fn correlation(&self) -> &Correlation {
        &self.correlation
    }

    /// Capability the request asks for.
    pub fn kind(&self) -> CapabilityKind {
        self.correlation.kind
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> RequestPhase {
        self.phase
    }

    /// File allocated for a capture, once dispatched.
    pub fn destination(&self) -> Option<&CaptureDestination> {
        self.destination.as_ref()
    }

    /// When the request was accepted.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// True when `correlation` is this request's and it is in `phase`.
    pub fn matches(&self, correlation: &Correlation, phase: RequestPhase) -> bool {
        self.correlation == *correlation && self.phase == phase
    }

    pub(crate) fn set_phase(&mut self, phase: RequestPhase) {
        self.phase = phase;
    }

    pub(crate) fn set_destination(&mut self, destination: CaptureDestination) {
        self.destination = Some(destination);
    }
}
