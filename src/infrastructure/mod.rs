//! Infrastructure layer - Adapter implementations
//!
//! Contains concrete implementations of the port interfaces, integrating
//! with the desktop (xcap, cpal), FFmpeg, tiny-skia and the filesystem.

pub mod audio;
pub mod canvas;
pub mod config;
pub mod devices;
pub mod encoder;
pub mod export;

// Re-export adapters
pub use audio::SummingAudioContextFactory;
pub use canvas::SkiaCanvasFactory;
pub use config::XdgConfigStore;
pub use devices::{DesktopDevices, SyntheticDevices};
pub use encoder::FfmpegEncoderFactory;
pub use export::FsExporter;
