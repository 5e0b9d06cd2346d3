//! Capture session value objects

pub mod elapsed;
pub mod file;
pub mod settings;
pub mod status;

pub use elapsed::{format_elapsed, ElapsedClock};
pub use file::{Blob, CapturedFile, CapturedFileInfo, FileKind, PlaybackHandle};
pub use settings::{
    AudioCodec, AudioSettings, CaptureMode, CaptureSettings, ImageFormat, ImageSettings,
    Resolution, VideoCodec, VideoContainer, VideoSettings,
};
pub use status::{InvalidStateTransition, RecorderSession, RecorderStatus};
