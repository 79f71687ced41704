//! # Capability Broker
//!
//! Lets a host scripting layer open the platform camera or photo-gallery
//! picker and get the image back as a single text message.
//!
//! A [`CapabilityBroker`] owns one in-flight request at a time. It gates
//! the action behind the required OS permissions, hands a correlation
//! token to every platform collaborator, matches the asynchronous callback
//! against it, and emits exactly one terminal [`ResultEvent`] per accepted
//! request:
//!
//! | Event | Message |
//! |---|---|
//! | capture succeeded | `CAMERA_SUCCESS:<base64 png>` |
//! | pick succeeded | `GALLERY_SUCCESS:<base64 png>` |
//! | user cancelled | `CANCEL` |
//! | grant refused | `Permission Denied` |
//! | anything else | `ERROR:<reason>` |
//!
//! Platform work (prompts, launching the camera, storage, content
//! resolution, message delivery) sits behind the traits in [`permissions`],
//! [`dispatch`], [`storage`], [`codec`] and [`events`]. [`host::HostBridge`]
//! adapts the broker to a native host that speaks integer request codes.

pub mod broker;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod host;
pub mod permissions;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_support;

pub use broker::{
    BrokerState, CapabilityBroker, CapabilityKind, Collaborators, Correlation, CorrelationToken,
    Request,
};
pub use config::{BrokerConfig, GrantPolicy};
pub use dispatch::{ActionDispatcher, ActionOutcome, ActionStatus, ContentHandle, ImagePayload};
pub use error::BrokerError;
pub use events::{Listener, MessageSink, ResultEvent};
pub use host::HostBridge;
pub use permissions::{Permission, PermissionGate, PermissionGrants, PermissionSet};
pub use storage::{AppPictureStorage, CaptureDestination, CaptureStorage};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
