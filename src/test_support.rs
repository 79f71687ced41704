//! In-memory collaborators for unit tests.

use std::path::Path;
use std::sync::Arc;

use image::{ImageFormat, Rgb, RgbImage};
use parking_lot::Mutex;
use tempfile::TempDir;

use crate::broker::{CapabilityBroker, Collaborators, Correlation};
use crate::codec::FileContentResolver;
use crate::config::BrokerConfig;
use crate::dispatch::{ActionDispatcher, DispatchError};
use crate::events::{Listener, MessageSink};
use crate::permissions::{PermissionGate, PermissionSet};
use crate::storage::{AppPictureStorage, CaptureDestination};

/// Write a small gradient JPEG to `path`.
pub(crate) fn write_jpeg(path: &Path, width: u32, height: u32) {
    write_image(path, width, height, ImageFormat::Jpeg);
}

/// Write a small gradient image to `path` in `format`.
pub(crate) fn write_image(path: &Path, width: u32, height: u32, format: ImageFormat) {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, 90])
    });
    img.save_with_format(path, format).unwrap();
}

#[derive(Debug, Default)]
pub(crate) struct FakeGate {
    granted: Mutex<bool>,
    prompts: Mutex<Vec<(PermissionSet, Correlation)>>,
}

impl FakeGate {
    pub(crate) fn new(granted: bool) -> Self {
        Self {
            granted: Mutex::new(granted),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn set_granted(&self, granted: bool) {
        *self.granted.lock() = granted;
    }

    pub(crate) fn prompts(&self) -> Vec<(PermissionSet, Correlation)> {
        self.prompts.lock().clone()
    }
}

impl PermissionGate for FakeGate {
    fn check_granted(&self, _set: &PermissionSet) -> bool {
        *self.granted.lock()
    }

    fn prompt_for(&self, set: &PermissionSet, correlation: &Correlation) {
        self.prompts.lock().push((set.clone(), *correlation));
    }
}

#[derive(Debug, Default)]
pub(crate) struct FakeDispatcher {
    captures: Mutex<Vec<(CaptureDestination, Correlation)>>,
    pickers: Mutex<Vec<(String, Correlation)>>,
    failure: Mutex<Option<String>>,
}

impl FakeDispatcher {
    /// Make every subsequent launch fail with `NoHandler`.
    pub(crate) fn fail_launches(&self, reason: &str) {
        *self.failure.lock() = Some(reason.to_string());
    }

    pub(crate) fn captures(&self) -> Vec<(CaptureDestination, Correlation)> {
        self.captures.lock().clone()
    }

    pub(crate) fn pickers(&self) -> Vec<(String, Correlation)> {
        self.pickers.lock().clone()
    }

    fn check(&self) -> Result<(), DispatchError> {
        match self.failure.lock().as_ref() {
            Some(reason) => Err(DispatchError::NoHandler(reason.clone())),
            None => Ok(()),
        }
    }
}

impl ActionDispatcher for FakeDispatcher {
    fn launch_capture(
        &self,
        destination: &CaptureDestination,
        correlation: &Correlation,
    ) -> Result<(), DispatchError> {
        self.check()?;
        self.captures
            .lock()
            .push((destination.clone(), *correlation));
        Ok(())
    }

    fn launch_picker(&self, mime_filter: &str, correlation: &Correlation) -> Result<(), DispatchError> {
        self.check()?;
        self.pickers
            .lock()
            .push((mime_filter.to_string(), *correlation));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub(crate) struct RecordingSink {
    calls: Mutex<Vec<(String, String, String)>>,
}

impl RecordingSink {
    pub(crate) fn calls(&self) -> Vec<(String, String, String)> {
        self.calls.lock().clone()
    }

    pub(crate) fn messages(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.2.clone()).collect()
    }
}

impl MessageSink for RecordingSink {
    fn send_message(&self, target: &str, method: &str, message: &str) {
        self.calls
            .lock()
            .push((target.to_string(), method.to_string(), message.to_string()));
    }
}

/// A broker wired to fakes, with a scratch directory for capture files.
pub(crate) struct Fixture {
    pub(crate) dir: TempDir,
    pub(crate) gate: Arc<FakeGate>,
    pub(crate) dispatcher: Arc<FakeDispatcher>,
    pub(crate) sink: Arc<RecordingSink>,
}

impl Fixture {
    pub(crate) fn granted() -> Self {
        Self::new(true)
    }

    pub(crate) fn denied() -> Self {
        Self::new(false)
    }

    fn new(granted: bool) -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            gate: Arc::new(FakeGate::new(granted)),
            dispatcher: Arc::new(FakeDispatcher::default()),
            sink: Arc::new(RecordingSink::default()),
        }
    }

    pub(crate) fn config(&self) -> BrokerConfig {
        BrokerConfig {
            pictures_dir: self.dir.path().join("Pictures"),
            provider_authority: "com.example.test.fileprovider".to_string(),
            ..BrokerConfig::default()
        }
    }

    pub(crate) fn broker_without_listener(&self) -> CapabilityBroker {
        let config = self.config();
        self.build(config)
    }

    pub(crate) fn broker(&self) -> CapabilityBroker {
        self.broker_with(self.config())
    }

    pub(crate) fn broker_with(&self, config: BrokerConfig) -> CapabilityBroker {
        let mut broker = self.build(config);
        broker.initialize(self.listener());
        broker
    }

    pub(crate) fn listener(&self) -> Listener {
        Listener::new(self.sink.clone(), "PhotoReceiver", "OnPhotoResult")
    }

    fn build(&self, config: BrokerConfig) -> CapabilityBroker {
        let collaborators = Collaborators {
            permissions: self.gate.clone(),
            dispatcher: self.dispatcher.clone(),
            storage: Arc::new(AppPictureStorage::from_config(&config)),
            resolver: Arc::new(FileContentResolver),
        };
        CapabilityBroker::new(config, collaborators)
    }
}
