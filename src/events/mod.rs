//! Terminal result events and their delivery to the host.
//!
//! Every accepted request ends in exactly one [`ResultEvent`]. The broker
//! renders it to the host's text protocol and hands it to the registered
//! [`Listener`], which addresses a (target object, method name) pair
//! through a [`MessageSink`].

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::broker::{CapabilityKind, CorrelationToken};

/// Message sent for a user cancellation.
pub const CANCEL_MESSAGE: &str = "CANCEL";
/// Message sent when a grant is refused.
pub const PERMISSION_DENIED_MESSAGE: &str = "Permission Denied";
/// Prefix of every failure message.
pub const ERROR_PREFIX: &str = "ERROR:";

/// The single outcome of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ResultEvent {
    /// `payload` is base64 text of a PNG re-encoding.
    Success {
        source: CapabilityKind,
        payload: String,
    },
    Cancelled,
    PermissionDenied,
    Failure {
        reason: String,
    },
}

impl ResultEvent {
    pub fn failure(reason: impl Into<String>) -> Self {
        ResultEvent::Failure {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ResultEvent::Success { .. })
    }

    /// Render to the host text protocol.
    pub fn to_message(&self) -> String {
        match self {
            ResultEvent::Success { source, payload } => {
                format!("{}:{}", source.success_tag(), payload)
            }
            ResultEvent::Cancelled => CANCEL_MESSAGE.to_string(),
            ResultEvent::PermissionDenied => PERMISSION_DENIED_MESSAGE.to_string(),
            ResultEvent::Failure { reason } => format!("{}{}", ERROR_PREFIX, reason),
        }
    }

    /// Short form for logs; success payloads are elided.
    pub fn summary(&self) -> String {
        match self {
            ResultEvent::Success { source, payload } => {
                format!("{}:<{} chars>", source.success_tag(), payload.len())
            }
            other => other.to_message(),
        }
    }
}

impl fmt::Display for ResultEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

/// Synchronous text delivery into the host scripting layer.
///
/// Called while the broker is borrowed; implementations must not call back
/// into the broker.
pub trait MessageSink: Send + Sync {
    fn send_message(&self, target: &str, method: &str, message: &str);
}

/// A sink plus the address messages are delivered to.
#[derive(Clone)]
pub struct Listener {
    sink: Arc<dyn MessageSink>,
    target: String,
    method: String,
}

impl Listener {
    pub fn new(
        sink: Arc<dyn MessageSink>,
        target: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        Self {
            sink,
            target: target.into(),
            method: method.into(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub(crate) fn deliver(&self, event: &ResultEvent) {
        log::debug!(
            "Sending message to {}.{}: {}",
            self.target,
            self.method,
            event.summary()
        );
        self.sink
            .send_message(&self.target, &self.method, &event.to_message());
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("target", &self.target)
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

/// One emitted terminal event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmissionRecord {
    pub token: CorrelationToken,
    pub kind: CapabilityKind,
    pub event: ResultEvent,
    pub emitted_at: DateTime<Utc>,
}

/// Bounded log of recent emissions, oldest first.
#[derive(Debug, Clone)]
pub struct EmissionHistory {
    records: VecDeque<EmissionRecord>,
    capacity: usize,
}

impl EmissionHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity.min(64)),
            capacity,
        }
    }

    pub(crate) fn push(&mut self, record: EmissionRecord) {
        if self.capacity == 0 {
            return;
        }
        while self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    pub fn iter(&self) -> impl Iterator<Item = &EmissionRecord> {
        self.records.iter()
    }

    pub fn last(&self) -> Option<&EmissionRecord> {
        self.records.back()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of events recorded for `token`.
    pub fn count_for(&self, token: &CorrelationToken) -> usize {
        self.records.iter().filter(|r| &r.token == token).count()
    }
}
