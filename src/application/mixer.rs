//! Audio mixer: many audio-bearing streams in, one mixed track out

use thiserror::Error;
use tracing::debug;

use super::ports::{AudioContextFactory, AudioGraphError, AudioNodeId, MediaStream, MediaTrack};
use super::session::TeardownAction;

/// Errors from building the mixing graph
#[derive(Debug, Error)]
pub enum MixError {
    #[error("Audio mixing failed: {0}")]
    Graph(#[from] AudioGraphError),
}

/// Mixed output plus the action that releases the graph
pub struct MixedAudio {
    pub track: MediaTrack,
    pub teardown: TeardownAction,
}

/// Route the first audio track of every stream into one destination.
/// Streams without audio are skipped; zero usable inputs yields a silent
/// output track.
pub fn mix_audio(
    factory: &dyn AudioContextFactory,
    streams: &[&MediaStream],
) -> Result<MixedAudio, MixError> {
    let mut context = factory.create()?;
    let mut sources: Vec<AudioNodeId> = Vec::new();

    for stream in streams {
        let Some(track) = stream.first_audio() else {
            continue;
        };
        let wired = context
            .create_source(track)
            .and_then(|node| context.connect(node).map(|()| node));
        match wired {
            Ok(node) => sources.push(node),
            Err(e) => {
                // Release what was wired so far before failing
                for node in &sources {
                    context.disconnect(*node);
                }
                context.close();
                return Err(e.into());
            }
        }
    }

    debug!(sources = sources.len(), "Audio mixer wired");
    let track = context.destination_track();

    let teardown: TeardownAction = Box::new(move || {
        for node in sources {
            context.disconnect(node);
        }
        context.close();
        debug!("Audio mixer released");
    });

    Ok(MixedAudio { track, teardown })
}
