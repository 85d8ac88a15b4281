use crate::core::progress::ProgressReporter;
use image::{ImageBuffer, Rgb};
use std::path::Path;
use std::sync::Mutex;

pub fn create_gradient(path: &Path, width: u32, height: u32) {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        let intensity = ((x * 255 / width.max(1) + y) % 256) as u8;
        Rgb([intensity, intensity / 2, 255 - intensity])
    });
    img.save(path).unwrap();
}

pub fn create_checkerboard(path: &Path, size: u32, cell: u32) {
    let img = ImageBuffer::from_fn(size, size, |x, y| {
        if ((x / cell) + (y / cell)) % 2 == 0 {
            Rgb([255u8, 255, 255])
        } else {
            Rgb([0u8, 0, 0])
        }
    });
    img.save(path).unwrap();
}

/// Collects every progress update for later assertions.
#[derive(Default)]
pub struct RecordingReporter {
    pub events: Mutex<Vec<(f64, String)>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<(f64, String)> {
        self.events.lock().unwrap().clone()
    }

    pub fn assert_monotonic(&self) {
        let events = self.events();
        for pair in events.windows(2) {
            assert!(
                pair[0].0 <= pair[1].0,
                "progress went backwards: {:?} -> {:?}",
                pair[0],
                pair[1]
            );
        }
    }
}

impl ProgressReporter for RecordingReporter {
    fn report(&self, fraction: f64, message: &str) {
        self.events
            .lock()
            .unwrap()
            .push((fraction, message.to_string()));
    }
}
