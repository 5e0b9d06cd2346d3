//! Audio processing graph port

use thiserror::Error;

use super::stream::MediaTrack;

/// Audio graph errors
#[derive(Debug, Clone, Error)]
pub enum AudioGraphError {
    #[error("Track is not an audio track: {0}")]
    NotAudio(String),

    #[error("Unknown audio node: {0}")]
    UnknownNode(usize),

    #[error("Audio context is closed")]
    Closed,

    #[error("Audio context failed: {0}")]
    Failed(String),
}

/// Handle to a source node inside one context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioNodeId(pub usize);

/// One processing context with a single destination node
pub trait AudioContext: Send {
    /// Add a source node reading from `track`. The node is not routed
    /// anywhere until connected.
    fn create_source(&mut self, track: &MediaTrack) -> Result<AudioNodeId, AudioGraphError>;

    /// Route a source into the destination
    fn connect(&mut self, node: AudioNodeId) -> Result<(), AudioGraphError>;

    fn disconnect(&mut self, node: AudioNodeId);

    /// The destination's output track
    fn destination_track(&self) -> MediaTrack;

    /// Release the context and end its output track. Safe to call twice.
    fn close(&mut self);
}

/// Port for creating audio contexts
pub trait AudioContextFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn AudioContext>, AudioGraphError>;
}
