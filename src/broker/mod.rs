//! # Capability Broker
//!
//! Owns the lifecycle of the one in-flight capture or pick request.
//!
//! ```text
//!            request_capture / request_pick
//!   Idle ──────────────────────────────────────┐
//!    ▲            │ grants missing              │ grants held
//!    │            ▼                             ▼
//!    │     PermissionPending ── granted ──► ActionDispatched
//!    │            │ refused                     │ on_action_result
//!    │            ▼                             ▼
//!    └──────── Completed ◄──────────────────────┘
//!              (emit exactly one ResultEvent)
//! ```
//!
//! The broker is driven entirely by `&mut self` calls: the caller's entry
//! points and the two platform callbacks. Each callback carries the
//! [`Correlation`] handed out when the request was accepted; anything that
//! does not match the active request is rejected as stale and leaves the
//! request untouched.

pub mod request;

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::codec::{CodecError, ContentResolver, PayloadEncoder};
use crate::config::{BrokerConfig, GrantPolicy};
use crate::dispatch::{ActionDispatcher, ActionOutcome, ImagePayload};
use crate::error::BrokerError;
use crate::events::{EmissionHistory, EmissionRecord, Listener, ResultEvent};
use crate::permissions::{PermissionGate, PermissionGrants, PermissionSet};
use crate::storage::{CaptureDestination, CaptureStorage};

pub use request::{
    CapabilityKind, Correlation, CorrelationToken, Request, RequestPhase,
    PERMISSION_REQUEST_CODE, REQUEST_IMAGE_CAPTURE, REQUEST_PICK_IMAGE,
};

/// Observable broker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BrokerState {
    Idle,
    PermissionPending,
    ActionDispatched,
}

impl From<RequestPhase> for BrokerState {
    fn from(phase: RequestPhase) -> Self {
        match phase {
            RequestPhase::PermissionPending => BrokerState::PermissionPending,
            RequestPhase::ActionDispatched => BrokerState::ActionDispatched,
        }
    }
}

/// External collaborators the broker delegates platform work to.
#[derive(Clone)]
pub struct Collaborators {
    pub permissions: Arc<dyn PermissionGate>,
    pub dispatcher: Arc<dyn ActionDispatcher>,
    pub storage: Arc<dyn CaptureStorage>,
    pub resolver: Arc<dyn ContentResolver>,
}

/// Single-slot, permission-gated capture/pick broker.
pub struct CapabilityBroker {
    config: BrokerConfig,
    permissions: Arc<dyn PermissionGate>,
    dispatcher: Arc<dyn ActionDispatcher>,
    storage: Arc<dyn CaptureStorage>,
    encoder: PayloadEncoder,
    listener: Option<Listener>,
    active: Option<Request>,
    history: EmissionHistory,
}

impl CapabilityBroker {
    /// Build an idle broker. No listener is registered yet.
    pub fn new(config: BrokerConfig, collaborators: Collaborators) -> Self {
        let history = EmissionHistory::new(config.history_capacity);
        Self {
            config,
            permissions: collaborators.permissions,
            dispatcher: collaborators.dispatcher,
            storage: collaborators.storage,
            encoder: PayloadEncoder::new(collaborators.resolver),
            listener: None,
            active: None,
            history,
        }
    }

    /// Register the sink that receives result messages. Replaces any
    /// previous registration; the active request, if any, is kept.
    pub fn initialize(&mut self, listener: Listener) {
        log::debug!(
            "Broker initialized with target: {}, callback: {}",
            listener.target(),
            listener.method()
        );
        self.listener = Some(listener);
    }

    /// Whether a listener has been registered.
    pub fn is_initialized(&self) -> bool {
        self.listener.is_some()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> BrokerState {
        self.active
            .as_ref()
            .map(|r| r.phase().into())
            .unwrap_or(BrokerState::Idle)
    }

    /// The in-flight request, if any.
    pub fn active_request(&self) -> Option<&Request> {
        self.active.as_ref()
    }

    /// Recently emitted terminal events, oldest first.
    pub fn history(&self) -> &EmissionHistory {
        &self.history
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Ask for a camera capture.
    pub fn request_capture(&mut self) -> Result<Correlation, BrokerError> {
        self.begin(CapabilityKind::Capture)
    }

    /// Ask for a gallery pick.
    pub fn request_pick(&mut self) -> Result<Correlation, BrokerError> {
        self.begin(CapabilityKind::Pick)
    }

    fn begin(&mut self, kind: CapabilityKind) -> Result<Correlation, BrokerError> {
        log::debug!("{} requested", kind);
        if self.listener.is_none() {
            log::error!("Broker not initialized; rejecting {} request", kind);
            return Err(BrokerError::NotInitialized);
        }
        if let Some(active) = &self.active {
            log::warn!(
                "Rejecting {} request: {} still in flight",
                kind,
                active.correlation()
            );
            return Err(BrokerError::Busy {
                active: active.kind(),
            });
        }

        let required = PermissionSet::required_for(kind);
        if self.permissions.check_granted(&required) {
            let request = Request::new(kind, RequestPhase::ActionDispatched);
            let correlation = *request.correlation();
            self.active = Some(request);
            self.dispatch();
            Ok(correlation)
        } else {
            let request = Request::new(kind, RequestPhase::PermissionPending);
            let correlation = *request.correlation();
            self.active = Some(request);
            log::debug!(
                "Prompting for {:?} on behalf of {}",
                required.manifest_names(),
                correlation
            );
            self.permissions.prompt_for(&required, &correlation);
            Ok(correlation)
        }
    }

    /// Platform callback for the permission prompt.
    ///
    /// A refusal of any required grant emits `PermissionDenied`. A full
    /// grant follows [`GrantPolicy`].
    pub fn on_permission_result(
        &mut self,
        correlation: &Correlation,
        grants: &PermissionGrants,
    ) -> Result<(), BrokerError> {
        self.ensure_active(correlation, RequestPhase::PermissionPending)?;

        let required = PermissionSet::required_for(correlation.kind);
        let missing = grants.missing(&required);
        if !missing.is_empty() {
            log::error!("Permissions denied for {}: {:?}", correlation, missing);
            self.finish(BrokerError::PermissionDenied.into_event());
            return Ok(());
        }

        log::debug!("Permissions granted for {}", correlation);
        match self.config.grant_policy {
            GrantPolicy::Resume => self.dispatch(),
            GrantPolicy::AwaitCaller => {
                log::info!(
                    "Permissions granted; dropping {} until the caller retries",
                    correlation
                );
                self.active = None;
            }
        }
        Ok(())
    }

    /// Platform callback for a dispatched action.
    pub fn on_action_result(&mut self, outcome: ActionOutcome) -> Result<(), BrokerError> {
        self.ensure_active(&outcome.correlation, RequestPhase::ActionDispatched)?;

        let kind = outcome.correlation.kind;
        let event = match self.complete_action(outcome) {
            Ok(payload) => ResultEvent::Success {
                source: kind,
                payload,
            },
            Err(err) => {
                log::error!("{} request failed: {}", kind, err);
                err.into_event()
            }
        };
        self.finish(event);
        Ok(())
    }

    fn ensure_active(
        &self,
        correlation: &Correlation,
        phase: RequestPhase,
    ) -> Result<(), BrokerError> {
        match &self.active {
            Some(request) if request.matches(correlation, phase) => Ok(()),
            active => {
                log::warn!(
                    "Ignoring stale callback for {} (active: {:?})",
                    correlation,
                    active.as_ref().map(|r| (r.correlation().to_string(), r.phase()))
                );
                Err(BrokerError::StaleCallback {
                    received: correlation.to_string(),
                })
            }
        }
    }

    /// Launch the active request's action. Launch failures terminate the
    /// request.
    fn dispatch(&mut self) {
        let Some(correlation) = self.active.as_ref().map(|r| *r.correlation()) else {
            return;
        };
        if let Some(request) = self.active.as_mut() {
            request.set_phase(RequestPhase::ActionDispatched);
        }

        let launched = match correlation.kind {
            CapabilityKind::Capture => self.launch_capture(&correlation),
            CapabilityKind::Pick => self
                .dispatcher
                .launch_picker(&self.config.mime_filter, &correlation)
                .map_err(|source| BrokerError::DispatchUnavailable {
                    kind: CapabilityKind::Pick,
                    source,
                }),
        };

        match launched {
            Ok(()) => log::debug!("Dispatched {}", correlation),
            Err(err) => {
                log::error!("Failed to dispatch {}: {}", correlation, err);
                self.finish(err.into_event());
            }
        }
    }

    fn launch_capture(&mut self, correlation: &Correlation) -> Result<(), BrokerError> {
        let destination = self.storage.allocate(correlation)?;
        if let Some(request) = self.active.as_mut() {
            request.set_destination(destination.clone());
        }
        self.dispatcher
            .launch_capture(&destination, correlation)
            .map_err(|source| {
                discard_capture_file(&destination);
                BrokerError::DispatchUnavailable {
                    kind: CapabilityKind::Capture,
                    source,
                }
            })
    }

    /// Turn an action outcome into a base64 payload or a terminal error.
    fn complete_action(&self, outcome: ActionOutcome) -> Result<String, BrokerError> {
        let kind = outcome.correlation.kind;
        if !outcome.is_ok() {
            log::debug!("Action not completed for {}", outcome.correlation);
            if let Some(destination) = self.active.as_ref().and_then(|r| r.destination()) {
                discard_capture_file(destination);
            }
            return Err(BrokerError::UserCancelled(kind));
        }

        match kind {
            CapabilityKind::Capture => {
                let path = self
                    .active
                    .as_ref()
                    .and_then(|r| r.destination())
                    .map(|d| d.path.clone())
                    .or(match outcome.payload {
                        Some(ImagePayload::File(path)) => Some(path),
                        _ => None,
                    })
                    .ok_or(BrokerError::DecodeFailure(CodecError::MissingPayload))?;
                log::debug!("Image captured successfully. Path: {}", path.display());
                self.encoder
                    .encode_file(&path)
                    .map_err(BrokerError::DecodeFailure)
            }
            CapabilityKind::Pick => match outcome.payload {
                Some(ImagePayload::Content(handle)) => {
                    log::debug!("Image picked from gallery. URI: {}", handle);
                    self.encoder
                        .encode_content(&handle)
                        .map_err(BrokerError::GalleryLoad)
                }
                Some(ImagePayload::File(path)) => {
                    log::debug!("Image picked from gallery. Path: {}", path.display());
                    self.encoder
                        .encode_file(&path)
                        .map_err(BrokerError::GalleryLoad)
                }
                None => Err(BrokerError::NoImageSelected),
            },
        }
    }

    /// Emit the terminal event for the active request and return to idle.
    fn finish(&mut self, event: ResultEvent) {
        let Some(request) = self.active.take() else {
            log::warn!("No active request to complete with {}", event);
            return;
        };

        self.history.push(EmissionRecord {
            token: request.correlation().token,
            kind: request.kind(),
            event: event.clone(),
            emitted_at: Utc::now(),
        });

        match &self.listener {
            Some(listener) => listener.deliver(&event),
            None => log::error!(
                "No listener registered; dropping {} for {}",
                event,
                request.correlation()
            ),
        }
    }
}

/// Remove a capture file the camera never filled.
fn discard_capture_file(destination: &CaptureDestination) {
    match std::fs::remove_file(&destination.path) {
        Ok(()) => log::debug!("Removed unused capture file {}", destination.path.display()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => log::warn!(
            "Failed to remove capture file {}: {}",
            destination.path.display(),
            err
        ),
    }
}

impl std::fmt::Debug for CapabilityBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityBroker")
            .field("config", &self.config)
            .field("listener", &self.listener)
            .field("active", &self.active)
            .field("emitted", &self.history.len())
            .finish_non_exhaustive()
    }
}
