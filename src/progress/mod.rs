//! Progress simulation
//!
//! The widget lives in [`bar`]; the curve math in [`phase`] and the
//! pre-mount command queue in [`gate`] are usable on their own.

pub mod bar;
pub mod callbacks;
pub mod command;
pub mod gate;
pub mod phase;

pub use bar::{ProgressBar, RunStatus, READINESS_POLL_MS};
pub use callbacks::{Callbacks, Completion};
pub use command::Command;
pub use gate::LifecycleGate;
pub use phase::{PhaseThresholds, CRAWL_INTERVAL_MS, CRAWL_STEP, SPRINT_STEP};
