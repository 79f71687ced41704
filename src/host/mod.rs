//! Host integration surface.
//!
//! A native host (the engine's platform activity) does not see correlation
//! tokens: it calls entry points and forwards the platform's integer
//! request codes, result codes and grant results. [`HostBridge`] translates
//! those into broker calls against a shared [`CapabilityBroker`], recovering
//! the correlation from the active request and rejecting codes that do not
//! belong to it.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::broker::{CapabilityBroker, Correlation, RequestPhase, PERMISSION_REQUEST_CODE};
use crate::dispatch::{ActionOutcome, ContentHandle, ImagePayload};
use crate::error::BrokerError;
use crate::events::{Listener, MessageSink};
use crate::permissions::{Permission, PermissionGrants};

/// Activity result code for a completed action.
pub const RESULT_OK: i32 = -1;
/// Activity result code for a cancelled action.
pub const RESULT_CANCELED: i32 = 0;
/// Grant result for a granted permission.
pub const PERMISSION_GRANTED: i32 = 0;
/// Grant result for a refused permission.
pub const PERMISSION_DENIED: i32 = -1;

/// Broker shared between the host's entry points and its callbacks.
pub type SharedBroker = Arc<Mutex<CapabilityBroker>>;

/// Result data attached to an activity result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityData {
    /// Content URI of the picked item, if the picker returned one.
    pub uri: Option<ContentHandle>,
}

impl ActivityData {
    pub fn with_uri(uri: impl Into<String>) -> Self {
        Self {
            uri: Some(ContentHandle::new(uri)),
        }
    }
}

/// Entry points and callbacks a native host drives.
///
/// The broker lock is held while any collaborator runs: the permission
/// gate's prompt, the dispatcher's launches, storage allocation, content
/// resolution and the listener's sink. The lock is not reentrant, so none
/// of them may call back into the bridge synchronously. Deliver platform
/// results from a later turn of the host's event loop instead.
#[derive(Clone)]
pub struct HostBridge {
    broker: SharedBroker,
}

impl HostBridge {
    /// Wrap a broker in a fresh shared lock.
    pub fn new(broker: CapabilityBroker) -> Self {
        Self::from_shared(Arc::new(Mutex::new(broker)))
    }

    /// Bridge onto an already shared broker.
    pub fn from_shared(broker: SharedBroker) -> Self {
        Self { broker }
    }

    /// Handle to the shared broker.
    pub fn shared(&self) -> SharedBroker {
        Arc::clone(&self.broker)
    }

    /// Register the host object and method that receive result messages.
    pub fn initialize(
        &self,
        sink: Arc<dyn MessageSink>,
        target: impl Into<String>,
        method: impl Into<String>,
    ) {
        self.broker.lock().initialize(Listener::new(sink, target, method));
    }

    /// Host entry point for a camera capture.
    pub fn take_picture(&self) -> Result<Correlation, BrokerError> {
        log::debug!("take_picture called");
        self.broker.lock().request_capture()
    }

    /// Host entry point for a gallery pick.
    pub fn pick_image_from_gallery(&self) -> Result<Correlation, BrokerError> {
        log::debug!("pick_image_from_gallery called");
        self.broker.lock().request_pick()
    }

    /// Forward the platform permission result. `permissions` and
    /// `grant_results` are parallel arrays; unknown names are ignored.
    pub fn on_request_permissions_result(
        &self,
        request_code: i32,
        permissions: &[&str],
        grant_results: &[i32],
    ) -> Result<(), BrokerError> {
        if request_code != PERMISSION_REQUEST_CODE {
            log::debug!("Ignoring permission result for request code {}", request_code);
            return Err(stale(request_code));
        }

        let mut broker = self.broker.lock();
        let correlation = broker
            .active_request()
            .filter(|r| r.phase() == RequestPhase::PermissionPending)
            .map(|r| *r.correlation())
            .ok_or_else(|| stale(request_code))?;

        let grants: PermissionGrants = permissions
            .iter()
            .zip(grant_results)
            .filter_map(|(name, result)| {
                Permission::from_manifest_name(name).map(|p| (p, *result == PERMISSION_GRANTED))
            })
            .collect();
        broker.on_permission_result(&correlation, &grants)
    }

    /// Forward the platform activity result. Any result code other than
    /// [`RESULT_OK`] counts as a cancellation.
    pub fn on_activity_result(
        &self,
        request_code: i32,
        result_code: i32,
        data: Option<ActivityData>,
    ) -> Result<(), BrokerError> {
        let mut broker = self.broker.lock();
        let correlation = broker
            .active_request()
            .filter(|r| {
                r.phase() == RequestPhase::ActionDispatched
                    && r.correlation().request_code() == request_code
            })
            .map(|r| *r.correlation())
            .ok_or_else(|| stale(request_code))?;

        let outcome = if result_code == RESULT_OK {
            let payload = data.and_then(|d| d.uri).map(ImagePayload::Content);
            ActionOutcome::ok(correlation, payload)
        } else {
            log::debug!(
                "Activity result not OK. Request code: {}, result code: {}",
                request_code,
                result_code
            );
            ActionOutcome::cancelled(correlation)
        };
        broker.on_action_result(outcome)
    }
}

fn stale(request_code: i32) -> BrokerError {
    BrokerError::StaleCallback {
        received: format!("request code {}", request_code),
    }
}

impl std::fmt::Debug for HostBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostBridge")
            .field("state", &self.broker.lock().state())
            .finish()
    }
}
