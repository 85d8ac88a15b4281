//! Finds images and videos that share a perceptual fingerprint and keeps
//! one original per group, deleting or relocating the rest.
//!
//! ```rust,no_run
//! use dedupe::{Action, Config, Deduplicator, NoopReporter};
//!
//! let summary = Deduplicator::new("/photos", Config::default())
//!     .run(Some(Action::Move), &NoopReporter)?;
//! println!("moved {} duplicates", summary.actions.moved);
//! # Ok::<(), dedupe::EngineError>(())
//! ```

pub mod config;
pub mod core;
pub mod engine;
pub mod logging;

pub use config::Config;
pub use crate::core::actions::Action;
pub use crate::core::progress::{NoopReporter, ProgressReporter};
pub use engine::{Deduplicator, EngineError, RunSummary};
