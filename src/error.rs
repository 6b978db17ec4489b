//! Error taxonomy for the gesture tracker.

use thiserror::Error;

/// Errors that can occur while acquiring the camera source.
///
/// Raised by `GestureTracker::initialize()`; the tracker stays unusable
/// until a later `initialize()` succeeds.
#[derive(Error, Debug)]
pub enum AcquisitionError {
    #[error("no capture device available")]
    NoDevice,
    #[error("camera {index} not found ({available} device(s) available)")]
    CameraNotFound { index: u32, available: usize },
    #[error("failed to open camera: {0}")]
    OpenFailed(String),
    #[error("failed to spawn capture thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),
    #[error("capture thread exited before the stream became ready")]
    Disconnected,
}

/// Per-tick frame capture failures.
///
/// Recovered locally by the processing loop (logged, tick skipped); never
/// surfaced through the gesture callback.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("no frame available yet")]
    NoFrame,
    #[error("capture stream has ended")]
    SourceClosed,
    #[error("frame capture failed: {0}")]
    Failed(String),
}
