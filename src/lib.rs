//! CaptureDeck - screen, camera, microphone and screenshot capture
//!
//! Records the screen (optionally with the microphone), the microphone alone,
//! or the screen with a live camera overlay, and takes still screenshots.
//!
//! # Architecture
//!
//! The crate follows hexagonal (ports & adapters) architecture:
//!
//! - **Domain**: Capture settings, the recorder state machine, media frames and format negotiation
//! - **Application**: The capture controller, compositor, mixer and the platform port traits
//! - **Infrastructure**: Adapter implementations (xcap, cpal, FFmpeg, tiny-skia, filesystem)
//! - **CLI**: Command-line interface, argument parsing, and signal handling

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
