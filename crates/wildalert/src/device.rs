//! Local capture devices.
//!
//! The local-webcam variant of a feed session holds one or more media tracks
//! acquired from a [`CaptureDevice`]. Every acquired track must be stopped
//! exactly once; [`LocalCapture`] owns them and guarantees that on
//! [`LocalCapture::stop_all`] or drop.

use std::path::{Path, PathBuf};

use tracing::{debug, trace, warn};

use crate::error::{Error, Result};

/// A single acquired media resource.
pub trait MediaTrack: Send + std::fmt::Debug {
    /// Human-readable label (usually the device path).
    fn label(&self) -> String;

    /// Whether the track still holds its resource.
    fn is_live(&self) -> bool;

    /// Release the resource. Returns `true` only for the call that released it.
    fn stop(&mut self) -> bool;
}

/// Something that can hand out media tracks.
pub trait CaptureDevice: Send + Sync + std::fmt::Debug {
    /// The name of this device (for logging).
    fn name(&self) -> String;

    /// Acquire all tracks of the device.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceAccessDenied`] when permission is refused, or
    /// [`Error::DeviceUnavailable`] when the device cannot be used.
    fn acquire(&self) -> Result<Vec<Box<dyn MediaTrack>>>;
}

/// The set of tracks held by a local-capture session.
#[derive(Debug)]
pub struct LocalCapture {
    device: String,
    tracks: Vec<Box<dyn MediaTrack>>,
}

impl LocalCapture {
    /// Acquire every track of `device`.
    ///
    /// # Errors
    ///
    /// Propagates the device's acquisition error; nothing is held on failure.
    pub fn acquire(device: &dyn CaptureDevice) -> Result<Self> {
        let tracks = device.acquire()?;
        if tracks.is_empty() {
            return Err(Error::DeviceUnavailable {
                path: PathBuf::from(device.name()),
                message: "device produced no tracks".to_string(),
            });
        }
        debug!(device = %device.name(), tracks = tracks.len(), "Local capture acquired");
        Ok(Self {
            device: device.name(),
            tracks,
        })
    }

    /// Name of the device the tracks came from.
    #[must_use]
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Number of tracks still holding their resource.
    #[must_use]
    pub fn live_tracks(&self) -> usize {
        self.tracks.iter().filter(|t| t.is_live()).count()
    }

    /// Labels of the tracks still holding their resource.
    #[must_use]
    pub fn live_labels(&self) -> Vec<String> {
        self.tracks
            .iter()
            .filter(|t| t.is_live())
            .map(|t| t.label())
            .collect()
    }

    /// Stop every track. Returns how many were released by this call.
    pub fn stop_all(&mut self) -> usize {
        let mut released = 0;
        for track in &mut self.tracks {
            if track.stop() {
                trace!(device = %self.device, track = %track.label(), "Track stopped");
                released += 1;
            }
        }
        if released > 0 {
            debug!(device = %self.device, released, "Local capture released");
        }
        released
    }
}

impl Drop for LocalCapture {
    fn drop(&mut self) {
        let live = self.live_labels();
        if !live.is_empty() {
            warn!(device = %self.device, tracks = ?live, "Local capture dropped while live");
            self.stop_all();
        }
    }
}

/// A V4L2 video device node such as `/dev/video0`.
#[derive(Debug, Clone)]
pub struct VideoDevice {
    path: PathBuf,
}

impl VideoDevice {
    /// Create a device for `path`. Nothing is opened until [`CaptureDevice::acquire`].
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Device path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(target_os = "linux")]
mod platform {
    use super::{CaptureDevice, Error, MediaTrack, Result, VideoDevice};
    use wildalert_linux::{DeviceError, VideoTrack};

    impl MediaTrack for VideoTrack {
        fn label(&self) -> String {
            self.path().display().to_string()
        }

        fn is_live(&self) -> bool {
            VideoTrack::is_live(self)
        }

        fn stop(&mut self) -> bool {
            VideoTrack::stop(self)
        }
    }

    impl From<DeviceError> for Error {
        fn from(err: DeviceError) -> Self {
            match err {
                DeviceError::PermissionDenied { path } => Self::DeviceAccessDenied { path },
                DeviceError::NotFound { ref path } | DeviceError::NotADevice { ref path } => {
                    Self::DeviceUnavailable {
                        path: path.clone(),
                        message: err.to_string(),
                    }
                }
                DeviceError::Io { ref path, .. } => Self::DeviceUnavailable {
                    path: path.clone(),
                    message: err.to_string(),
                },
            }
        }
    }

    impl CaptureDevice for VideoDevice {
        fn name(&self) -> String {
            self.path.display().to_string()
        }

        fn acquire(&self) -> Result<Vec<Box<dyn MediaTrack>>> {
            let track = VideoTrack::open(&self.path)?;
            Ok(vec![Box::new(track)])
        }
    }
}

#[cfg(not(target_os = "linux"))]
impl CaptureDevice for VideoDevice {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn acquire(&self) -> Result<Vec<Box<dyn MediaTrack>>> {
        Err(Error::DeviceUnavailable {
            path: self.path.clone(),
            message: "local capture is only supported on Linux".to_string(),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeDevice;
    use super::*;

    #[test]
    fn test_acquire_and_stop_all() {
        let device = FakeDevice::with_tracks(2);
        let mut capture = LocalCapture::acquire(&device).unwrap();

        assert_eq!(capture.device(), "fake-camera");
        assert_eq!(capture.live_tracks(), 2);
        assert_eq!(capture.stop_all(), 2);
        assert_eq!(capture.live_tracks(), 0);
        assert_eq!(device.stopped(), 2);
    }

    #[test]
    fn test_live_labels_follow_stops() {
        let device = FakeDevice::with_tracks(2);
        let mut capture = LocalCapture::acquire(&device).unwrap();

        assert_eq!(capture.live_labels(), vec!["fake-track-0", "fake-track-1"]);
        capture.stop_all();
        assert!(capture.live_labels().is_empty());
    }

    #[test]
    fn test_stop_all_is_idempotent() {
        let device = FakeDevice::with_tracks(3);
        let mut capture = LocalCapture::acquire(&device).unwrap();

        capture.stop_all();
        assert_eq!(capture.stop_all(), 0);
        drop(capture);
        assert_eq!(device.stopped(), 3);
    }

    #[test]
    fn test_drop_stops_live_tracks() {
        let device = FakeDevice::with_tracks(2);
        {
            let _capture = LocalCapture::acquire(&device).unwrap();
        }
        assert_eq!(device.stopped(), 2);
    }

    #[test]
    fn test_denied_device() {
        let err = LocalCapture::acquire(&FakeDevice::denied()).unwrap_err();
        assert!(err.is_permission_error());
    }

    #[test]
    fn test_device_without_tracks_is_unavailable() {
        let err = LocalCapture::acquire(&FakeDevice::with_tracks(0)).unwrap_err();
        assert!(matches!(err, Error::DeviceUnavailable { .. }));
    }

    #[test]
    fn test_video_device_missing_node() {
        let device = VideoDevice::new("/nonexistent/video7");
        assert_eq!(device.path(), Path::new("/nonexistent/video7"));
        let err = LocalCapture::acquire(&device).unwrap_err();
        assert!(matches!(err, Error::DeviceUnavailable { .. }));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_video_track_label_is_device_path() {
        // Any character device will do; /dev/null is always present
        let device = VideoDevice::new("/dev/null");
        let mut capture = LocalCapture::acquire(&device).unwrap();

        assert_eq!(capture.live_labels(), vec!["/dev/null"]);
        assert_eq!(capture.stop_all(), 1);
    }
}
