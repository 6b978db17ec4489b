//! Gesture Tracker - camera-driven hand motion estimation
//!
//! Captures low-resolution camera frames, partitions them into a 5x5 block
//! grid, and turns frame-to-frame brightness differences into a smoothed
//! 2-axis gesture signal (vertical/horizontal movement, presence, speed)
//! suitable for real-time control of a rendering or animation layer.

pub mod camera;
pub mod config;
pub mod error;
pub mod motion;
pub mod tracker;

pub use camera::{CameraSource, Frame, FrameSource};
pub use config::TrackerConfig;
pub use error::{AcquisitionError, CaptureError};
pub use motion::{GestureData, MotionEstimator, MovementSpeed};
pub use tracker::GestureTracker;
