//! Host simulator for the capability broker.
//!
//! Plays the part of the native host: drives a [`HostBridge`] with
//! file-backed collaborators and prints what the scripting layer would
//! receive.
//!
//! # Usage
//!
//! ```bash
//! bridge-sim capture photo.jpg            # camera writes photo.jpg
//! bridge-sim pick photo.jpg --prompt      # prompt, grant, then pick
//! bridge-sim pick photo.jpg --deny        # prompt and refuse
//! bridge-sim capture photo.jpg --cancel   # user backs out
//! ```
//!
//! # Environment Variables
//!
//! - `BROKER_CONFIG`: YAML config file (optional)
//! - `BROKER_PICTURES_DIR`, `BROKER_PROVIDER_AUTHORITY`, `BROKER_GRANT_POLICY`
//! - `RUST_LOG`: Tracing filter (default: "info,capability_broker=debug")

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use capability_broker::codec::FileContentResolver;
use capability_broker::dispatch::DispatchError;
use capability_broker::host::{
    ActivityData, PERMISSION_DENIED, PERMISSION_GRANTED, RESULT_CANCELED, RESULT_OK,
};
use capability_broker::{
    ActionDispatcher, AppPictureStorage, BrokerConfig, BrokerState, CapabilityBroker,
    CapabilityKind, CaptureDestination, Collaborators, Correlation, HostBridge, MessageSink,
    PermissionGate, PermissionSet, ResultEvent,
};

struct SimGate {
    granted: bool,
}

impl PermissionGate for SimGate {
    fn check_granted(&self, _set: &PermissionSet) -> bool {
        self.granted
    }

    fn prompt_for(&self, set: &PermissionSet, correlation: &Correlation) {
        tracing::info!("Prompt shown for {:?} ({})", set.manifest_names(), correlation);
    }
}

/// Stands in for the camera app: "captures" by copying the source image.
struct SimDispatcher {
    source: PathBuf,
}

impl ActionDispatcher for SimDispatcher {
    fn launch_capture(
        &self,
        destination: &CaptureDestination,
        correlation: &Correlation,
    ) -> Result<(), DispatchError> {
        fs::copy(&self.source, &destination.path)
            .map_err(|e| DispatchError::LaunchFailed(e.to_string()))?;
        tracing::info!("Camera wrote {} for {}", destination.handle, correlation);
        Ok(())
    }

    fn launch_picker(&self, mime_filter: &str, correlation: &Correlation) -> Result<(), DispatchError> {
        tracing::info!("Picker opened with filter {} for {}", mime_filter, correlation);
        Ok(())
    }
}

struct StdoutSink;

impl MessageSink for StdoutSink {
    fn send_message(&self, target: &str, method: &str, message: &str) {
        let shown = match message.split_once(':') {
            Some((tag, payload)) if tag.ends_with("_SUCCESS") => {
                format!("{}:<{} base64 chars>", tag, payload.len())
            }
            _ => message.to_string(),
        };
        println!("{}.{}({})", target, method, shown);
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Capability {
    /// Camera capture; the simulated camera copies IMAGE into the capture file.
    Capture,
    /// Gallery pick of IMAGE.
    Pick,
}

impl From<Capability> for CapabilityKind {
    fn from(capability: Capability) -> Self {
        match capability {
            Capability::Capture => CapabilityKind::Capture,
            Capability::Pick => CapabilityKind::Pick,
        }
    }
}

#[derive(Parser)]
#[command(
    name = "bridge-sim",
    about = "Drive the capability broker the way a native host would"
)]
struct Cli {
    /// Capability to request.
    #[arg(value_enum)]
    capability: Capability,

    /// Image the simulated camera or gallery returns.
    image: PathBuf,

    /// Start without grants and answer the permission prompt with a grant.
    #[arg(long)]
    prompt: bool,

    /// Start without grants and refuse the permission prompt.
    #[arg(long, conflicts_with = "prompt")]
    deny: bool,

    /// Back out of the camera or picker.
    #[arg(long)]
    cancel: bool,
}

fn load_config() -> Result<BrokerConfig> {
    let config = match std::env::var("BROKER_CONFIG") {
        Ok(path) => BrokerConfig::from_file(Path::new(&path))?,
        Err(_) => BrokerConfig::default(),
    };
    Ok(config.apply_env()?)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,capability_broker=debug".into()),
        )
        .init();

    let args = Cli::parse();
    let kind = CapabilityKind::from(args.capability);
    let image = fs::canonicalize(&args.image)
        .with_context(|| format!("image not found: {}", args.image.display()))?;
    let config = load_config()?;
    tracing::info!("Pictures directory: {}", config.pictures_dir.display());

    let collaborators = Collaborators {
        permissions: Arc::new(SimGate {
            granted: !(args.prompt || args.deny),
        }),
        dispatcher: Arc::new(SimDispatcher {
            source: image.clone(),
        }),
        storage: Arc::new(AppPictureStorage::from_config(&config)),
        resolver: Arc::new(FileContentResolver),
    };
    let bridge = HostBridge::new(CapabilityBroker::new(config, collaborators));
    bridge.initialize(Arc::new(StdoutSink), "PhotoReceiver", "OnPhotoResult");

    let correlation = match kind {
        CapabilityKind::Capture => bridge.take_picture()?,
        CapabilityKind::Pick => bridge.pick_image_from_gallery()?,
    };

    if args.prompt || args.deny {
        let names = PermissionSet::required_for(kind).manifest_names();
        let answer = if args.deny {
            PERMISSION_DENIED
        } else {
            PERMISSION_GRANTED
        };
        let results = vec![answer; names.len()];
        bridge.on_request_permissions_result(
            capability_broker::broker::PERMISSION_REQUEST_CODE,
            &names,
            &results,
        )?;
        if args.deny {
            return report(&bridge);
        }
    }

    // A failed launch or the await_caller policy already ended the request.
    let state = bridge.shared().lock().state();
    if state != BrokerState::ActionDispatched {
        tracing::info!("Request no longer awaiting an action result (state: {:?})", state);
        return report(&bridge);
    }

    let result_code = if args.cancel { RESULT_CANCELED } else { RESULT_OK };
    let data = match kind {
        CapabilityKind::Pick => Some(ActivityData::with_uri(format!("file://{}", image.display()))),
        CapabilityKind::Capture => None,
    };
    bridge.on_activity_result(correlation.request_code(), result_code, data)?;
    report(&bridge)
}

fn report(bridge: &HostBridge) -> Result<()> {
    let shared = bridge.shared();
    let broker = shared.lock();
    if let Some(record) = broker.history().last() {
        if !matches!(record.event, ResultEvent::Success { .. }) {
            tracing::warn!("Request ended without an image: {}", record.event);
        }
        tracing::info!("Emission record: {}", serde_json::to_string(&summary(record))?);
    }
    Ok(())
}

fn summary(record: &capability_broker::events::EmissionRecord) -> serde_json::Value {
    serde_json::json!({
        "token": record.token,
        "kind": record.kind,
        "outcome": record.event.summary(),
        "emitted_at": record.emitted_at,
    })
}
