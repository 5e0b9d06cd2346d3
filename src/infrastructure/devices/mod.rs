//! Media device adapters

mod desktop;
mod microphone;
mod screen;
mod synthetic;

pub use desktop::DesktopDevices;
pub use synthetic::{pattern_frame, tone_chunk, SyntheticDevices, TONE_SAMPLE_RATE};
