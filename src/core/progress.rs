//! Progress reporting seam between the engine and whatever displays it.
//!
//! The engine only ever calls [`ProgressReporter::report`] with a fraction in
//! `[0, 1]` and a human-readable message. Reports may arrive from a
//! background thread, so implementations must be `Send + Sync` and do their
//! own marshalling if the display needs a particular thread.

pub const NOT_STARTED: &str = "Not started yet";
pub const EMPTY_FOLDER: &str = "Selected folder is empty.";
pub const COMPLETED: &str = "Process completed";
pub const CRITICAL_ERROR: &str = "Critical error occurred";

pub trait ProgressReporter: Send + Sync {
    fn report(&self, fraction: f64, message: &str);
}

impl<F> ProgressReporter for F
where
    F: Fn(f64, &str) + Send + Sync,
{
    fn report(&self, fraction: f64, message: &str) {
        self(fraction, message)
    }
}

/// Discards every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _fraction: f64, _message: &str) {}
}

/// Coarse stage of the scan phase, chosen from the completed fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStage {
    Early,
    Midway,
    Finishing,
}

impl ScanStage {
    pub fn from_fraction(fraction: f64) -> Self {
        if fraction < 0.5 {
            ScanStage::Early
        } else if fraction < 0.9 {
            ScanStage::Midway
        } else {
            ScanStage::Finishing
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ScanStage::Early => "Started, hang in there!",
            ScanStage::Midway => "Halfway there, almost done!",
            ScanStage::Finishing => "Finishing up, hold tight!",
        }
    }
}

/// Progress line for `done` of `total` files, e.g. `"50% - Halfway there, almost done!"`.
pub fn scan_progress(done: usize, total: usize) -> (f64, String) {
    let fraction = done as f64 / total as f64;
    let stage = ScanStage::from_fraction(fraction);
    (
        fraction,
        format!("{}% - {}", done * 100 / total, stage.message()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_stage_thresholds() {
        assert_eq!(ScanStage::from_fraction(0.0), ScanStage::Early);
        assert_eq!(ScanStage::from_fraction(0.49), ScanStage::Early);
        assert_eq!(ScanStage::from_fraction(0.5), ScanStage::Midway);
        assert_eq!(ScanStage::from_fraction(0.89), ScanStage::Midway);
        assert_eq!(ScanStage::from_fraction(0.9), ScanStage::Finishing);
        assert_eq!(ScanStage::from_fraction(1.0), ScanStage::Finishing);
    }

    #[test]
    fn test_scan_progress_message() {
        let (fraction, message) = scan_progress(1, 4);
        assert_eq!(fraction, 0.25);
        assert_eq!(message, "25% - Started, hang in there!");

        let (fraction, message) = scan_progress(2, 4);
        assert_eq!(fraction, 0.5);
        assert_eq!(message, "50% - Halfway there, almost done!");

        let (fraction, message) = scan_progress(4, 4);
        assert_eq!(fraction, 1.0);
        assert_eq!(message, "100% - Finishing up, hold tight!");

        let (_, message) = scan_progress(29, 100);
        assert_eq!(message, "29% - Started, hang in there!");
    }

    #[test]
    fn test_closures_are_reporters() {
        let seen = Mutex::new(Vec::new());
        let reporter = |fraction: f64, message: &str| {
            seen.lock().unwrap().push((fraction, message.to_string()));
        };
        reporter.report(0.0, NOT_STARTED);
        NoopReporter.report(1.0, COMPLETED);

        assert_eq!(*seen.lock().unwrap(), vec![(0.0, NOT_STARTED.to_string())]);
    }
}
