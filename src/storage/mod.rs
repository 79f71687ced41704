//! Capture destinations in app-private picture storage.
//!
//! Each capture gets a fresh file named after the capture time
//! (`JPEG_<yyyyMMdd_HHmmss>_<random>.jpg`) and a sharable handle the
//! camera application can write through.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::broker::Correlation;
use crate::config::BrokerConfig;
use crate::dispatch::ContentHandle;

/// File name prefix before the capture timestamp.
pub const IMAGE_FILE_PREFIX: &str = "JPEG_";
/// Suffix of every capture file.
pub const IMAGE_FILE_SUFFIX: &str = ".jpg";

/// A file allocated for the camera to write into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureDestination {
    /// Absolute path the broker decodes once the capture completes.
    pub path: PathBuf,
    /// Handle passed to the camera application.
    pub handle: ContentHandle,
}

/// Collaborator that allocates capture destinations.
pub trait CaptureStorage: Send + Sync {
    fn allocate(&self, correlation: &Correlation) -> io::Result<CaptureDestination>;
}

/// Timestamp-named files under a pictures directory, shared through a
/// file-provider authority.
#[derive(Debug, Clone)]
pub struct AppPictureStorage {
    pictures_dir: PathBuf,
    authority: String,
}

impl AppPictureStorage {
    pub fn new(pictures_dir: impl Into<PathBuf>, authority: impl Into<String>) -> Self {
        Self {
            pictures_dir: pictures_dir.into(),
            authority: authority.into(),
        }
    }

    pub fn from_config(config: &BrokerConfig) -> Self {
        Self::new(&config.pictures_dir, &config.provider_authority)
    }

    pub fn pictures_dir(&self) -> &Path {
        &self.pictures_dir
    }

    /// `JPEG_<yyyyMMdd_HHmmss>_` for the given capture time.
    pub fn file_prefix(captured_at: DateTime<Local>) -> String {
        format!(
            "{}{}_",
            IMAGE_FILE_PREFIX,
            captured_at.format("%Y%m%d_%H%M%S")
        )
    }

    fn handle_for(&self, path: &Path) -> ContentHandle {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        ContentHandle::new(format!("content://{}/{}", self.authority, file_name))
    }
}

impl CaptureStorage for AppPictureStorage {
    fn allocate(&self, correlation: &Correlation) -> io::Result<CaptureDestination> {
        fs::create_dir_all(&self.pictures_dir)?;

        let prefix = Self::file_prefix(Local::now());
        let file = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(IMAGE_FILE_SUFFIX)
            .tempfile_in(&self.pictures_dir)?;
        let (_, path) = file.keep().map_err(|e| e.error)?;

        let handle = self.handle_for(&path);
        log::debug!(
            "Allocated capture file {} for {} (handle {})",
            path.display(),
            correlation,
            handle
        );
        Ok(CaptureDestination { path, handle })
    }
}
