pub mod misc;
pub mod progress;
