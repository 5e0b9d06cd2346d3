//! Port interfaces (traits) for the host media platform
//!
//! These traits define the boundaries between the capture use cases
//! and the infrastructure adapters.

pub mod audio_graph;
pub mod canvas;
pub mod config;
pub mod devices;
pub mod encoder;
pub mod export;
pub mod stream;

pub use audio_graph::{AudioContext, AudioContextFactory, AudioGraphError, AudioNodeId};
pub use canvas::{Canvas, CanvasError, CanvasFactory};
pub use config::ConfigStore;
pub use devices::{
    AcquireError, CameraConstraints, DisplayMediaRequest, MediaDevices, MicrophoneConstraints,
    UserMediaRequest,
};
pub use encoder::{
    EncoderError, EncoderEvent, EncoderEvents, EncoderFactory, EncoderOptions, EncoderState,
    MediaEncoder,
};
pub use export::{ExportError, FileExporter};
pub use stream::{MediaStream, MediaTrack, TrackKind, TrackState};
