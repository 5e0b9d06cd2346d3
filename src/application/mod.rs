//! Application layer - Use cases and port interfaces
//!
//! Contains the capture session controller, its compositing and mixing
//! helpers, and the trait definitions for the host media platform.

pub mod compositor;
pub mod controller;
pub mod gallery;
pub mod mixer;
pub mod ports;
pub mod screenshot;
pub mod session;

pub use compositor::{compose, Composition, CompositorError, PlaybackSurface};
pub use controller::{
    CaptureController, CaptureError, CapturePlatform, CompletionCallback, StartOutcome,
};
pub use gallery::{Gallery, ObjectUrls};
pub use mixer::{mix_audio, MixError, MixedAudio};
pub use screenshot::ScreenshotCapturer;
pub use session::{ActiveSession, TeardownAction};
