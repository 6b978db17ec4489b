//! Tracker configuration with JSON persistence.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Configuration for camera capture and tick pacing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Camera device index (0 for default)
    pub camera_index: u32,
    /// Processing frame width
    #[serde(rename = "captureWidth")]
    pub capture_width: u32,
    /// Processing frame height
    #[serde(rename = "captureHeight")]
    pub capture_height: u32,
    /// Tick rate for the processing loop (1-240)
    #[serde(rename = "targetFps")]
    pub target_fps: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            camera_index: 0,
            capture_width: 160,
            capture_height: 120,
            target_fps: 60,
        }
    }
}

impl TrackerConfig {
    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self, String> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config {:?}: {}", path, e))?;
        let mut config: TrackerConfig = serde_json::from_str(&contents)
            .map_err(|e| format!("Failed to parse config {:?}: {}", path, e))?;
        config.sanitize();
        Ok(config)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;
        fs::write(path, contents).map_err(|e| format!("Failed to write config {:?}: {}", path, e))
    }

    /// Clamp values to usable ranges.
    pub fn sanitize(&mut self) {
        self.target_fps = self.target_fps.clamp(1, 240);
        // The 5x5 grid needs at least one pixel per block
        self.capture_width = self.capture_width.max(crate::motion::GRID_SIZE as u32);
        self.capture_height = self.capture_height.max(crate::motion::GRID_SIZE as u32);
    }

    /// Duration of one processing tick.
    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_nanos(1_000_000_000u64 / self.target_fps.max(1) as u64)
    }
}
