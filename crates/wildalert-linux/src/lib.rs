//! Linux-specific implementation for wildalert.
//!
//! Local capture on Linux goes through V4L2 device nodes (`/dev/videoN`).
//! Holding an open handle on the node is what keeps the camera claimed, so
//! a [`VideoTrack`] is exactly that handle, released once on [`VideoTrack::stop`]
//! or drop.

#![cfg(target_os = "linux")]
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur while opening a video device.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The process is not allowed to open the device.
    #[error("permission denied opening {}", path.display())]
    PermissionDenied {
        /// Device path.
        path: PathBuf,
    },

    /// No such device node.
    #[error("no video device at {}", path.display())]
    NotFound {
        /// Device path.
        path: PathBuf,
    },

    /// The path exists but is not a character device.
    #[error("{} is not a video capture device", path.display())]
    NotADevice {
        /// Device path.
        path: PathBuf,
    },

    /// Any other I/O failure.
    #[error("failed to open {}: {source}", path.display())]
    Io {
        /// Device path.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },
}

impl DeviceError {
    fn from_io(path: &Path, source: io::Error) -> Self {
        let path = path.to_path_buf();
        match source.kind() {
            io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }
}

/// An open claim on a video device.
#[derive(Debug)]
pub struct VideoTrack {
    path: PathBuf,
    handle: Option<File>,
}

impl VideoTrack {
    /// Open the video device at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the device is missing, not a character device,
    /// or cannot be opened by this process.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DeviceError> {
        let path = path.as_ref();
        let metadata = fs::metadata(path).map_err(|e| DeviceError::from_io(path, e))?;
        if !metadata.file_type().is_char_device() {
            return Err(DeviceError::NotADevice {
                path: path.to_path_buf(),
            });
        }

        let handle = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| DeviceError::from_io(path, e))?;

        debug!(path = %path.display(), "Video device opened");
        Ok(Self {
            path: path.to_path_buf(),
            handle: Some(handle),
        })
    }

    /// Device path this track was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the device handle is still held.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.handle.is_some()
    }

    /// Release the device. Returns `true` only for the call that released it.
    pub fn stop(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => {
                drop(handle);
                debug!(path = %self.path.display(), "Video device released");
                true
            }
            None => false,
        }
    }
}

impl Drop for VideoTrack {
    fn drop(&mut self) {
        if self.stop() {
            warn!(path = %self.path.display(), "Video track dropped without stop()");
        }
    }
}

/// List `/dev/video*` nodes, sorted by name.
///
/// # Errors
///
/// Returns an error if `/dev` cannot be read.
pub fn list_video_devices() -> io::Result<Vec<PathBuf>> {
    list_video_devices_in(Path::new("/dev"))
}

fn list_video_devices_in(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut devices: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_name().to_string_lossy().starts_with("video"))
        .map(|entry| entry.path())
        .collect();
    devices.sort();
    Ok(devices)
}

/// Get platform name
#[must_use]
pub fn platform_name() -> &'static str {
    "Linux"
}
