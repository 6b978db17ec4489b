//! Gesture Tracker - demo entry point
//!
//! Opens the configured camera, runs the gesture estimation loop, and prints
//! live gesture values until Enter is pressed.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use gesture_tracker::{camera, GestureTracker, TrackerConfig};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Gesture Tracker v0.1.0");

    // Optional config file path as the first argument
    let config = match std::env::args().nth(1) {
        Some(path) => {
            let path = PathBuf::from(path);
            TrackerConfig::load(&path)
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("loading config {:?}", path))?
        }
        None => TrackerConfig::default(),
    };

    let cameras = camera::list_cameras();
    if cameras.is_empty() {
        log::warn!("No cameras detected");
    }
    for info in &cameras {
        log::info!("Camera {}: {}", info.index, info.name);
    }

    let mut tracker = GestureTracker::new(config);
    tracker
        .initialize()
        .context("camera acquisition failed; gesture control unavailable")?;

    // Log presence transitions from the per-tick callback
    let was_present = Arc::new(AtomicBool::new(false));
    let was_present_cb = was_present.clone();
    let started = tracker.start(Box::new(move |data| {
        if data.hand_present != was_present_cb.swap(data.hand_present, Ordering::AcqRel) {
            if data.hand_present {
                log::info!("Hand detected");
            } else {
                log::info!("Hand lost");
            }
        }
    }));
    anyhow::ensure!(started, "failed to start gesture tracking");

    log::info!("Tracking... press Enter to stop");

    // Poll and print alongside the callback until Enter is pressed
    let quit = Arc::new(AtomicBool::new(false));
    let quit_input = quit.clone();
    std::thread::spawn(move || {
        let mut line = String::new();
        let _ = std::io::stdin().read_line(&mut line);
        quit_input.store(true, Ordering::Release);
    });

    while !quit.load(Ordering::Acquire) {
        let data = tracker.get_gesture_data();
        log::info!(
            "present={} h={:+.3} v={:+.3} speed=({:.3}, {:.3})",
            data.hand_present,
            data.horizontal_movement,
            data.vertical_movement,
            data.movement_speed.x,
            data.movement_speed.y
        );
        std::thread::sleep(Duration::from_millis(250));
    }

    tracker.stop();
    log::info!("Stopped");
    Ok(())
}
