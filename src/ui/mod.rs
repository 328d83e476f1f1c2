//! Terminal presentation of the progress widget

pub mod screen;

pub use screen::{parse_color, ProgressScreen};
