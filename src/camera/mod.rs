//! Camera frame source
//!
//! Cross-platform camera capture using the nokhwa crate. Frames are captured
//! on a background thread; the processing loop grabs the latest frame and
//! downscales it to the fixed low resolution the motion estimator works at.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use nokhwa::pixel_format::RgbAFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;
use parking_lot::Mutex;

use crate::config::TrackerConfig;
use crate::error::{AcquisitionError, CaptureError};

/// A captured RGBA frame.
#[derive(Clone)]
pub struct Frame {
    /// RGBA pixel data
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Monotonically increasing capture counter
    pub frame_number: u64,
}

impl Frame {
    /// Nearest-neighbor downscale to the target resolution.
    pub fn downscale(&self, target_width: u32, target_height: u32) -> Frame {
        if self.width == target_width && self.height == target_height {
            return self.clone();
        }

        let mut output = vec![0u8; (target_width * target_height * 4) as usize];
        let x_ratio = self.width as f32 / target_width as f32;
        let y_ratio = self.height as f32 / target_height as f32;

        for y in 0..target_height {
            for x in 0..target_width {
                let src_x = (x as f32 * x_ratio) as u32;
                let src_y = (y as f32 * y_ratio) as u32;
                let src_idx = ((src_y * self.width + src_x) * 4) as usize;
                let dst_idx = ((y * target_width + x) * 4) as usize;

                if src_idx + 3 < self.data.len() && dst_idx + 3 < output.len() {
                    output[dst_idx..dst_idx + 4].copy_from_slice(&self.data[src_idx..src_idx + 4]);
                }
            }
        }

        Frame {
            data: output,
            width: target_width,
            height: target_height,
            frame_number: self.frame_number,
        }
    }
}

/// Source of successive frames for the motion estimator.
///
/// The seam between capture hardware and the processing loop; tests and
/// embedders with their own capture stack provide scripted implementations.
pub trait FrameSource: Send {
    /// Grab the latest available frame at the processing resolution.
    fn grab(&mut self) -> Result<Frame, CaptureError>;
}

/// Information about an available camera.
#[derive(Clone, Debug)]
pub struct CameraInfo {
    /// Camera index
    pub index: u32,
    /// Camera name
    pub name: String,
}

/// List available cameras.
pub fn list_cameras() -> Vec<CameraInfo> {
    let mut cameras = Vec::new();

    match nokhwa::query(nokhwa::utils::ApiBackend::Auto) {
        Ok(camera_list) => {
            for (idx, info) in camera_list.iter().enumerate() {
                cameras.push(CameraInfo {
                    index: idx as u32,
                    name: info.human_name().to_string(),
                });
            }
        }
        Err(e) => {
            log::warn!("Failed to enumerate cameras: {:?}", e);
        }
    }

    cameras
}

/// Live camera frame source backed by a capture thread.
pub struct CameraSource {
    /// Latest captured frames - triple buffered
    frames: [Arc<Mutex<Option<Frame>>>; 3],
    /// Index of the latest complete frame
    latest_frame_idx: Arc<AtomicU64>,
    /// Whether capture is running
    running: Arc<AtomicBool>,
    /// Capture thread handle
    thread_handle: Option<std::thread::JoinHandle<()>>,
    /// Processing resolution frames are downscaled to
    process_width: u32,
    process_height: u32,
}

impl CameraSource {
    /// Open the configured camera and start the capture thread.
    ///
    /// Blocks until the camera stream is ready to deliver frames (which may
    /// include waiting on an OS permission prompt) or fails. No frames are
    /// delivered before this returns `Ok`.
    pub fn open(config: &TrackerConfig) -> Result<Self, AcquisitionError> {
        let available = list_cameras();
        if available.is_empty() {
            return Err(AcquisitionError::NoDevice);
        }
        if config.camera_index as usize >= available.len() {
            return Err(AcquisitionError::CameraNotFound {
                index: config.camera_index,
                available: available.len(),
            });
        }

        let frames: [Arc<Mutex<Option<Frame>>>; 3] = [
            Arc::new(Mutex::new(None)),
            Arc::new(Mutex::new(None)),
            Arc::new(Mutex::new(None)),
        ];
        let latest_frame_idx = Arc::new(AtomicU64::new(0));
        let running = Arc::new(AtomicBool::new(true));

        // Startup handshake: the thread reports ready or failed exactly once
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), String>>(1);

        let camera_index = config.camera_index;
        let frames_clone = frames.clone();
        let latest_frame_idx_clone = latest_frame_idx.clone();
        let running_clone = running.clone();

        let thread_handle = std::thread::Builder::new()
            .name("camera-capture".to_string())
            .spawn(move || {
                Self::capture_thread(
                    camera_index,
                    frames_clone,
                    latest_frame_idx_clone,
                    running_clone,
                    ready_tx,
                );
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                frames,
                latest_frame_idx,
                running,
                thread_handle: Some(thread_handle),
                process_width: config.capture_width,
                process_height: config.capture_height,
            }),
            Ok(Err(msg)) => {
                let _ = thread_handle.join();
                Err(AcquisitionError::OpenFailed(msg))
            }
            Err(_) => {
                let _ = thread_handle.join();
                Err(AcquisitionError::Disconnected)
            }
        }
    }

    /// Camera capture thread.
    fn capture_thread(
        camera_index: u32,
        frames: [Arc<Mutex<Option<Frame>>>; 3],
        latest_frame_idx: Arc<AtomicU64>,
        running: Arc<AtomicBool>,
        ready_tx: crossbeam_channel::Sender<Result<(), String>>,
    ) {
        log::info!("Starting camera capture thread (camera {})", camera_index);

        let mut camera = match Self::open_camera(camera_index) {
            Ok(c) => c,
            Err(msg) => {
                let _ = ready_tx.send(Err(msg));
                return;
            }
        };

        if let Err(e) = camera.open_stream() {
            let _ = ready_tx.send(Err(format!("Failed to open camera stream: {:?}", e)));
            return;
        }

        log::info!(
            "Camera opened: {} ({}x{})",
            camera.info().human_name(),
            camera.resolution().width(),
            camera.resolution().height()
        );
        let _ = ready_tx.send(Ok(()));

        let mut write_idx: u64 = 0;
        let mut frame_count: u64 = 0;

        while running.load(Ordering::Acquire) {
            match camera.frame() {
                Ok(frame) => match frame.decode_image::<RgbAFormat>() {
                    Ok(image) => {
                        let width = frame.resolution().width();
                        let height = frame.resolution().height();

                        let camera_frame = Frame {
                            data: image.into_raw(),
                            width,
                            height,
                            frame_number: frame_count,
                        };
                        frame_count += 1;

                        let slot = (write_idx % 3) as usize;
                        *frames[slot].lock() = Some(camera_frame);

                        latest_frame_idx.store(write_idx, Ordering::Release);
                        write_idx = write_idx.wrapping_add(1);
                    }
                    Err(e) => {
                        log::warn!("Failed to decode frame: {:?}", e);
                    }
                },
                Err(e) => {
                    log::warn!("Failed to capture frame: {:?}", e);
                    std::thread::sleep(std::time::Duration::from_millis(10));
                }
            }
        }

        log::info!("Camera capture thread stopped");
    }

    /// Open the camera, falling back through progressively looser formats.
    fn open_camera(camera_index: u32) -> Result<Camera, String> {
        let index = CameraIndex::Index(camera_index);

        let requested =
            RequestedFormat::new::<RgbAFormat>(RequestedFormatType::AbsoluteHighestResolution);
        match Camera::new(index.clone(), requested) {
            Ok(c) => return Ok(c),
            Err(e) => {
                log::warn!("Failed to open camera with highest resolution: {:?}", e);
            }
        }

        let requested = RequestedFormat::new::<RgbAFormat>(RequestedFormatType::HighestResolution(
            nokhwa::utils::Resolution::new(640, 480),
        ));
        match Camera::new(index.clone(), requested) {
            Ok(c) => return Ok(c),
            Err(e) => {
                log::warn!("Failed with HighestResolution: {:?}", e);
            }
        }

        let requested = RequestedFormat::new::<RgbAFormat>(RequestedFormatType::None);
        Camera::new(index, requested)
            .map_err(|e| format!("Failed to open camera with all format attempts: {:?}", e))
    }

    /// Whether the capture thread is still running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop capturing and join the capture thread.
    pub fn close(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl FrameSource for CameraSource {
    fn grab(&mut self) -> Result<Frame, CaptureError> {
        if self.thread_handle.is_none() || self.thread_handle.as_ref().is_some_and(|h| h.is_finished())
        {
            return Err(CaptureError::SourceClosed);
        }

        let idx = self.latest_frame_idx.load(Ordering::Acquire);
        let slot = (idx % 3) as usize;
        let frame = self.frames[slot].lock().clone().ok_or(CaptureError::NoFrame)?;

        Ok(frame.downscale(self.process_width, self.process_height))
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.close();
    }
}
