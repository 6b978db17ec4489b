//! Motion estimation core
//!
//! Turns successive camera frames into a smoothed 2-axis gesture signal.
//! The frame is partitioned into a 5x5 block grid; per-block luma deltas
//! between the previous and current frame are aggregated into a raw motion
//! vector (center-weighted, direction-signed), shaped with a power-law
//! response curve, and exponentially blended into the persistent gesture
//! state. An adaptive threshold keeps sensitivity usable across busy and
//! quiet scenes.

use serde::Serialize;

use crate::camera::Frame;

/// Blocks per grid axis.
pub const GRID_SIZE: usize = 5;

/// Block offset of the grid midpoint, in grid units.
const GRID_CENTER: f32 = (GRID_SIZE as f32 - 1.0) / 2.0;

/// Sample every Nth pixel when averaging block brightness.
const SAMPLE_STRIDE: usize = 4;

/// Extra gain applied to per-block directional contributions.
const DIRECTIONAL_GAIN: f32 = 1.5;

/// Divisor normalizing the raw accumulated vector into [-1, 1].
const NORM_SCALE: f32 = 60.0;

/// Power-law exponent making small motions disproportionately visible.
const RESPONSE_EXPONENT: f32 = 0.7;

/// Adaptive threshold baseline, floor, and adaptation rate.
const THRESHOLD_BASE: f32 = 10.0;
const THRESHOLD_FLOOR: f32 = 5.0;
const THRESHOLD_ADAPT_RATE: f32 = 1000.0;

/// Vector magnitude above which a hand is considered present.
const PRESENCE_CUTOFF: f32 = 0.05;

/// Exponential smoothing factor and input gain for present-hand blending.
const SMOOTHING_FACTOR: f32 = 0.85;
const INPUT_GAIN: f32 = 5.0;

/// Per-tick decay applied while no hand is present.
const REST_DECAY: f32 = 0.95;

/// Absolute per-axis speed of the smoothed gesture signal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct MovementSpeed {
    pub x: f32,
    pub y: f32,
}

/// Snapshot of the gesture state, published once per processed frame.
///
/// Plain value - consumers receive a copy, never a live reference into the
/// estimator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct GestureData {
    /// True when the motion-vector magnitude exceeds the presence cutoff
    #[serde(rename = "handPresent")]
    pub hand_present: bool,
    /// Smoothed vertical movement, -1 (up) to 1 (down)
    #[serde(rename = "verticalMovement")]
    pub vertical_movement: f32,
    /// Smoothed horizontal movement, -1 (left) to 1 (right)
    #[serde(rename = "horizontalMovement")]
    pub horizontal_movement: f32,
    /// Absolute movement speed per axis
    #[serde(rename = "movementSpeed")]
    pub movement_speed: MovementSpeed,
}

/// Per-block luma averages for one frame.
type BlockLumas = [[f32; GRID_SIZE]; GRID_SIZE];

/// Grid-differencing motion estimator.
///
/// Owns all per-frame state; `process` is synchronous, allocation-free and
/// mutates the state exactly once per call.
pub struct MotionEstimator {
    /// Block lumas of the previous frame
    prev_lumas: BlockLumas,
    /// False until the first frame has seeded `prev_lumas`
    warmed_up: bool,
    /// Adaptive per-block difference threshold, in [5, 10]
    motion_threshold: f32,
    /// Current smoothed gesture state
    state: GestureData,
}

impl MotionEstimator {
    pub fn new() -> Self {
        Self {
            prev_lumas: [[0.0; GRID_SIZE]; GRID_SIZE],
            warmed_up: false,
            motion_threshold: THRESHOLD_BASE,
            state: GestureData::default(),
        }
    }

    /// Process one frame and return the updated gesture snapshot.
    ///
    /// The first call seeds the previous-frame buffer from the given frame
    /// and returns the zero/rest state (warm-up tick).
    pub fn process(&mut self, frame: &Frame) -> GestureData {
        // A frame too small to partition cannot be compared; skip the tick
        if (frame.width as usize) < GRID_SIZE || (frame.height as usize) < GRID_SIZE {
            return self.state;
        }

        let lumas = block_lumas(frame);

        if !self.warmed_up {
            self.prev_lumas = lumas;
            self.warmed_up = true;
            return self.state;
        }

        let (raw_x, raw_y, total_motion) = self.accumulate_vector(&lumas);
        self.prev_lumas = lumas;

        // Busier scenes lower the bar for the next tick, floored at 5
        self.motion_threshold =
            (THRESHOLD_BASE - total_motion / THRESHOLD_ADAPT_RATE).max(THRESHOLD_FLOOR);

        let shaped_x = shape_response((raw_x / NORM_SCALE).clamp(-1.0, 1.0));
        let shaped_y = shape_response((raw_y / NORM_SCALE).clamp(-1.0, 1.0));

        let magnitude = (shaped_x * shaped_x + shaped_y * shaped_y).sqrt();
        self.state.hand_present = magnitude > PRESENCE_CUTOFF;

        if self.state.hand_present {
            self.state.horizontal_movement = self.state.horizontal_movement * SMOOTHING_FACTOR
                + shaped_x * (1.0 - SMOOTHING_FACTOR) * INPUT_GAIN;
            self.state.vertical_movement = self.state.vertical_movement * SMOOTHING_FACTOR
                + shaped_y * (1.0 - SMOOTHING_FACTOR) * INPUT_GAIN;
        } else {
            // Gradual return to rest rather than a hard reset
            self.state.horizontal_movement *= REST_DECAY;
            self.state.vertical_movement *= REST_DECAY;
        }

        self.state.horizontal_movement = self.state.horizontal_movement.clamp(-1.0, 1.0);
        self.state.vertical_movement = self.state.vertical_movement.clamp(-1.0, 1.0);

        self.state.movement_speed = MovementSpeed {
            x: self.state.horizontal_movement.abs(),
            y: self.state.vertical_movement.abs(),
        };

        self.state
    }

    /// Sum center-weighted directional contributions over all blocks whose
    /// luma delta exceeds the current threshold.
    fn accumulate_vector(&self, current: &BlockLumas) -> (f32, f32, f32) {
        let mut raw_x = 0.0f32;
        let mut raw_y = 0.0f32;
        let mut total_motion = 0.0f32;

        for (row, row_lumas) in current.iter().enumerate() {
            for (col, &luma) in row_lumas.iter().enumerate() {
                let diff = (luma - self.prev_lumas[row][col]).abs();
                total_motion += diff;

                if diff > self.motion_threshold {
                    let x_offset = col as f32 - GRID_CENTER;
                    let y_offset = row as f32 - GRID_CENTER;
                    let distance = (x_offset * x_offset + y_offset * y_offset).sqrt();
                    let weight = 1.0 - (distance / 3.0).min(1.0);

                    raw_x += x_offset * diff * weight * DIRECTIONAL_GAIN;
                    raw_y += y_offset * diff * weight * DIRECTIONAL_GAIN;
                }
            }
        }

        (raw_x, raw_y, total_motion)
    }

    /// Latest gesture snapshot without processing a frame.
    pub fn data(&self) -> GestureData {
        self.state
    }

    /// Current adaptive threshold.
    pub fn motion_threshold(&self) -> f32 {
        self.motion_threshold
    }

    /// Whether the warm-up tick has completed.
    pub fn is_warmed_up(&self) -> bool {
        self.warmed_up
    }
}

impl Default for MotionEstimator {
    fn default() -> Self {
        Self::new()
    }
}

/// Sign-preserving power-law response curve.
fn shape_response(v: f32) -> f32 {
    if v == 0.0 {
        0.0
    } else {
        v.signum() * v.abs().powf(RESPONSE_EXPONENT)
    }
}

/// Average luma per grid block, sampled at a fixed pixel stride.
///
/// Exactness is not required, only consistent relative comparison between
/// frames; the stride is the same every tick.
fn block_lumas(frame: &Frame) -> BlockLumas {
    let mut lumas = [[0.0f32; GRID_SIZE]; GRID_SIZE];

    let block_width = (frame.width as usize) / GRID_SIZE;
    let block_height = (frame.height as usize) / GRID_SIZE;
    if block_width == 0 || block_height == 0 {
        return lumas;
    }

    for (row, row_lumas) in lumas.iter_mut().enumerate() {
        for (col, luma) in row_lumas.iter_mut().enumerate() {
            *luma = block_luma(frame, col * block_width, row * block_height, block_width, block_height);
        }
    }

    lumas
}

/// Luma-weighted average brightness of one block rectangle.
fn block_luma(frame: &Frame, x0: usize, y0: usize, width: usize, height: usize) -> f32 {
    let mut sum = 0.0f32;
    let mut samples = 0u32;
    let mut index = 0usize;

    for y in y0..y0 + height {
        let row_start = (y * frame.width as usize + x0) * 4;
        for x in 0..width {
            if index % SAMPLE_STRIDE == 0 {
                let p = row_start + x * 4;
                if p + 2 < frame.data.len() {
                    sum += frame.data[p] as f32 * 0.299
                        + frame.data[p + 1] as f32 * 0.587
                        + frame.data[p + 2] as f32 * 0.114;
                    samples += 1;
                }
            }
            index += 1;
        }
    }

    if samples == 0 {
        0.0
    } else {
        sum / samples as f32
    }
}
