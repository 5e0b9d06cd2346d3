//! Encoder platform port
//!
//! Modelled on a chunk-emitting recorder: the encoder is attached to a
//! stream, started with a timeslice, and emits encoded chunks on a channel
//! until it reports that it has stopped.

use std::fmt;
use std::time::Duration as StdDuration;

use thiserror::Error;
use tokio::sync::mpsc;

use super::stream::MediaStream;

/// Encoder errors
#[derive(Debug, Clone, Error)]
pub enum EncoderError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Stream has no encodable track")]
    NoTracks,

    #[error("Failed to start encoder: {0}")]
    StartFailed(String),

    #[error("Invalid encoder state: cannot {action} while {state}")]
    InvalidState { state: EncoderState, action: String },

    #[error("FFmpeg not found. Please install FFmpeg.")]
    FfmpegNotFound,

    #[error("Encoding failed: {0}")]
    Failed(String),
}

/// Recorder state as reported by the encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncoderState {
    #[default]
    Inactive,
    Recording,
    Paused,
}

impl fmt::Display for EncoderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inactive => write!(f, "inactive"),
            Self::Recording => write!(f, "recording"),
            Self::Paused => write!(f, "paused"),
        }
    }
}

/// Events emitted while encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncoderEvent {
    /// One encoded chunk; may be empty
    Data(Vec<u8>),
    /// Final event after `stop()` once all data has been emitted
    Stopped,
    /// Encoding broke; no further data follows
    Error(String),
}

pub type EncoderEvents = mpsc::UnboundedReceiver<EncoderEvent>;

/// Options passed when constructing an encoder
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncoderOptions {
    /// Requested format; empty lets the platform choose
    pub mime_type: String,
    pub video_bits_per_second: Option<u32>,
    pub audio_bits_per_second: Option<u32>,
}

/// One encoder instance bound to one stream
pub trait MediaEncoder: Send {
    /// The format actually being produced, which may differ from the
    /// requested one
    fn mime_type(&self) -> String;

    fn state(&self) -> EncoderState;

    /// Begin encoding, emitting a chunk roughly every `timeslice`
    fn start(&mut self, timeslice: StdDuration) -> Result<EncoderEvents, EncoderError>;

    fn pause(&mut self) -> Result<(), EncoderError>;

    fn resume(&mut self) -> Result<(), EncoderError>;

    /// Request the final chunk followed by [`EncoderEvent::Stopped`]
    fn stop(&mut self) -> Result<(), EncoderError>;
}

/// Port for creating encoders
pub trait EncoderFactory: Send + Sync {
    /// Whether the platform can produce `mime_type`
    fn is_type_supported(&self, mime_type: &str) -> bool;

    fn create(
        &self,
        stream: &MediaStream,
        options: EncoderOptions,
    ) -> Result<Box<dyn MediaEncoder>, EncoderError>;
}
