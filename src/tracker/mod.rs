//! Gesture tracker control surface
//!
//! Ties a frame source and the motion estimator together behind the
//! initialize/start/stop/poll contract. One worker thread runs exactly one
//! processing tick per frame interval; the latest gesture snapshot is
//! published for synchronous polling and handed to the registered callback.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::camera::{CameraSource, FrameSource};
use crate::config::TrackerConfig;
use crate::error::{AcquisitionError, CaptureError};
use crate::motion::{GestureData, MotionEstimator};

/// Callback invoked once per processed frame with a gesture snapshot.
pub type GestureCallback = Box<dyn FnMut(GestureData) + Send>;

/// Frame source plus estimator; survives stop/start so warm-up happens once.
struct Pipeline {
    source: Box<dyn FrameSource>,
    estimator: MotionEstimator,
}

impl Pipeline {
    /// Run one capture-and-process tick.
    ///
    /// Capture failures are recovered locally: the tick becomes a no-op and
    /// the loop keeps scheduling.
    fn tick(&mut self) -> Option<GestureData> {
        match self.source.grab() {
            Ok(frame) => Some(self.estimator.process(&frame)),
            Err(CaptureError::NoFrame) => {
                log::debug!("No frame available yet, skipping tick");
                None
            }
            Err(e) => {
                log::warn!("Frame capture failed, skipping tick: {}", e);
                None
            }
        }
    }
}

/// Camera-driven hand gesture tracker.
pub struct GestureTracker {
    config: TrackerConfig,
    pipeline: Option<Arc<Mutex<Pipeline>>>,
    latest: Arc<Mutex<GestureData>>,
    running: Arc<AtomicBool>,
    worker: Option<std::thread::JoinHandle<()>>,
}

impl GestureTracker {
    /// Create an uninitialized tracker; `initialize()` must succeed before
    /// `start()` can produce ticks.
    pub fn new(mut config: TrackerConfig) -> Self {
        config.sanitize();
        Self {
            config,
            pipeline: None,
            latest: Arc::new(Mutex::new(GestureData::default())),
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// Create a tracker over an externally supplied frame source.
    ///
    /// Skips camera acquisition entirely; used by embedders with their own
    /// capture stack and by tests.
    pub fn with_source(mut config: TrackerConfig, source: Box<dyn FrameSource>) -> Self {
        config.sanitize();
        Self {
            config,
            pipeline: Some(Arc::new(Mutex::new(Pipeline {
                source,
                estimator: MotionEstimator::new(),
            }))),
            latest: Arc::new(Mutex::new(GestureData::default())),
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// Acquire the camera frame source.
    ///
    /// Blocks until the camera stream is ready (possibly waiting on an OS
    /// permission prompt) or fails with an `AcquisitionError`, in which case
    /// the tracker remains unusable until a later call succeeds.
    pub fn initialize(&mut self) -> Result<(), AcquisitionError> {
        let source = CameraSource::open(&self.config)?;
        self.pipeline = Some(Arc::new(Mutex::new(Pipeline {
            source: Box::new(source),
            estimator: MotionEstimator::new(),
        })));
        log::info!(
            "Gesture tracker initialized ({}x{} @ {} fps)",
            self.config.capture_width,
            self.config.capture_height,
            self.config.target_fps
        );
        Ok(())
    }

    /// Begin continuous processing, invoking `callback` once per tick.
    ///
    /// Returns false (and logs) when the tracker has not been initialized.
    /// Calling while already running keeps the existing worker and callback.
    pub fn start(&mut self, mut callback: GestureCallback) -> bool {
        let Some(pipeline) = self.pipeline.clone() else {
            log::error!("Cannot start gesture tracking before initialize() succeeds");
            return false;
        };

        if self.running.swap(true, Ordering::AcqRel) {
            log::debug!("Gesture tracking already running");
            return true;
        }

        let running = self.running.clone();
        let latest = self.latest.clone();
        let interval = self.config.tick_interval();

        let worker = std::thread::Builder::new()
            .name("gesture-tick".to_string())
            .spawn(move || {
                log::info!("Gesture tick loop started");
                let mut next_tick = Instant::now();

                while running.load(Ordering::Acquire) {
                    if let Some(data) = pipeline.lock().tick() {
                        *latest.lock() = data;
                        callback(data);
                    }

                    // Fixed-rate pacing; resync instead of bursting after a stall
                    next_tick += interval;
                    let now = Instant::now();
                    if now < next_tick {
                        std::thread::sleep(next_tick - now);
                    } else {
                        next_tick = now;
                    }
                }

                log::info!("Gesture tick loop stopped");
            });

        match worker {
            Ok(handle) => {
                self.worker = Some(handle);
                true
            }
            Err(e) => {
                log::error!("Failed to spawn gesture tick thread: {}", e);
                self.running.store(false, Ordering::Release);
                false
            }
        }
    }

    /// Stop scheduling ticks. The in-flight tick completes; frame buffers and
    /// warm-up state are retained, so a later `start()` resumes directly.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }

    /// Whether the tick loop is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Latest gesture snapshot, independent of the callback mechanism.
    pub fn get_gesture_data(&self) -> GestureData {
        *self.latest.lock()
    }
}

impl Drop for GestureTracker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Frame;
    use std::time::Duration;

    const WIDTH: u32 = 160;
    const HEIGHT: u32 = 120;

    fn uniform_frame(gray: u8) -> Frame {
        Frame {
            data: vec![gray; (WIDTH * HEIGHT * 4) as usize],
            width: WIDTH,
            height: HEIGHT,
            frame_number: 0,
        }
    }

    fn corner_frame(base: u8, gray: u8) -> Frame {
        let mut frame = uniform_frame(base);
        for y in 0..(HEIGHT as usize / 5) {
            for x in 0..(WIDTH as usize / 5) {
                let p = (y * WIDTH as usize + x) * 4;
                frame.data[p] = gray;
                frame.data[p + 1] = gray;
                frame.data[p + 2] = gray;
            }
        }
        frame
    }

    /// Cycles through a fixed list of frames, counting grabs.
    struct ScriptedSource {
        frames: Vec<Frame>,
        grabs: Arc<Mutex<usize>>,
    }

    impl FrameSource for ScriptedSource {
        fn grab(&mut self) -> Result<Frame, CaptureError> {
            let mut grabs = self.grabs.lock();
            let frame = self.frames[*grabs % self.frames.len()].clone();
            *grabs += 1;
            Ok(frame)
        }
    }

    /// Serves whatever frame the test has currently installed.
    struct SwitchableSource {
        current: Arc<Mutex<Frame>>,
        grabs: Arc<Mutex<usize>>,
    }

    impl FrameSource for SwitchableSource {
        fn grab(&mut self) -> Result<Frame, CaptureError> {
            *self.grabs.lock() += 1;
            Ok(self.current.lock().clone())
        }
    }

    /// Always fails; the loop must keep running regardless.
    struct FailingSource;

    impl FrameSource for FailingSource {
        fn grab(&mut self) -> Result<Frame, CaptureError> {
            Err(CaptureError::Failed("disconnected".to_string()))
        }
    }

    fn fast_config() -> TrackerConfig {
        TrackerConfig {
            target_fps: 240,
            ..Default::default()
        }
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_start_requires_initialize() {
        let mut tracker = GestureTracker::new(TrackerConfig::default());
        assert!(!tracker.start(Box::new(|_| {})));
        assert!(!tracker.is_running());
    }

    #[test]
    fn test_callback_and_poll_see_motion() {
        let grabs = Arc::new(Mutex::new(0));
        let source = ScriptedSource {
            frames: vec![uniform_frame(100), corner_frame(100, 255)],
            grabs: grabs.clone(),
        };

        let mut tracker = GestureTracker::with_source(fast_config(), Box::new(source));
        let seen_present = Arc::new(AtomicBool::new(false));
        let seen_present_cb = seen_present.clone();

        assert!(tracker.start(Box::new(move |data| {
            if data.hand_present {
                seen_present_cb.store(true, Ordering::Release);
            }
        })));
        assert!(tracker.is_running());

        // Alternating frames flicker the top-left corner block
        assert!(wait_until(|| seen_present.load(Ordering::Acquire)));
        assert!(wait_until(|| {
            let data = tracker.get_gesture_data();
            data.horizontal_movement < 0.0 && data.vertical_movement < 0.0
        }));

        tracker.stop();
        assert!(!tracker.is_running());
    }

    #[test]
    fn test_failed_captures_keep_loop_alive() {
        let mut tracker = GestureTracker::with_source(fast_config(), Box::new(FailingSource));
        assert!(tracker.start(Box::new(|_| panic!("no snapshot expected"))));

        std::thread::sleep(Duration::from_millis(50));
        assert!(tracker.is_running());
        assert_eq!(tracker.get_gesture_data(), GestureData::default());
        tracker.stop();
    }

    #[test]
    fn test_stop_start_resumes_without_rewarmup() {
        let grabs = Arc::new(Mutex::new(0));
        let current = Arc::new(Mutex::new(uniform_frame(100)));
        let source = SwitchableSource {
            current: current.clone(),
            grabs: grabs.clone(),
        };

        // Warm up on uniform frames, then stop
        let mut tracker = GestureTracker::with_source(fast_config(), Box::new(source));
        assert!(tracker.start(Box::new(|_| {})));
        assert!(wait_until(|| *grabs.lock() >= 3));
        tracker.stop();
        assert!(!tracker.is_running());

        // Restart against a changed scene. The pipeline kept its warmed-up
        // previous frame, so the very first resumed tick sees the corner
        // delta and reports presence. A second forced-zero warm-up would
        // instead seed on the corner frame and never fire.
        *current.lock() = corner_frame(100, 255);
        let seen_present = Arc::new(AtomicBool::new(false));
        let seen_present_cb = seen_present.clone();
        assert!(tracker.start(Box::new(move |data| {
            if data.hand_present {
                seen_present_cb.store(true, Ordering::Release);
            }
        })));
        assert!(wait_until(|| seen_present.load(Ordering::Acquire)));
        tracker.stop();
    }

    #[test]
    fn test_start_twice_keeps_single_worker() {
        let grabs = Arc::new(Mutex::new(0));
        let source = ScriptedSource {
            frames: vec![uniform_frame(100)],
            grabs: grabs.clone(),
        };

        let mut tracker = GestureTracker::with_source(fast_config(), Box::new(source));
        assert!(tracker.start(Box::new(|_| {})));
        assert!(tracker.start(Box::new(|_| {})));
        assert!(tracker.is_running());
        tracker.stop();
        assert!(!tracker.is_running());
    }
}
