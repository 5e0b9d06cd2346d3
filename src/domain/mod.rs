//! Domain layer - Core capture logic
//!
//! Contains value objects, the recorder state machine, format negotiation
//! and domain errors. This layer has no dependencies on external systems.

pub mod capture;
pub mod config;
pub mod error;
pub mod media;
pub mod recording;

// Re-export common types
pub use capture::{CaptureMode, CaptureSettings, CapturedFile, FileKind, RecorderStatus};
pub use config::AppConfig;
pub use error::*;
pub use recording::Duration;
