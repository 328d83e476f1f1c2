//! A simulated loading bar
//!
//! The bar runs quickly to a small random value, slows towards a second
//! random ceiling, then crawls until the caller reports that the real work is
//! done, at which point it sprints to 100. Time comes from a
//! [`FrameScheduler`](scheduler::FrameScheduler) that the host pumps, so the
//! same widget runs against a wall clock or a manual clock.

pub mod animation;
pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod progress;
pub mod scheduler;
pub mod stage;
pub mod ui;

pub use config::ProgressOptions;
pub use error::{LoadbarError, Result};
pub use progress::{Callbacks, ProgressBar, RunStatus};
pub use scheduler::{FrameScheduler, FrameSource, ManualClock};
pub use stage::Stage;
