//! Live media tracks and streams handed out by the platform

use std::fmt;
use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use uuid::Uuid;

use crate::domain::media::{AudioChunk, Size, VideoFrame};

/// Buffered audio chunks per subscriber before the oldest are dropped
const AUDIO_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => write!(f, "audio"),
            Self::Video => write!(f, "video"),
        }
    }
}

/// Lifecycle of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    Live,
    /// Released by its consumer
    Stopped,
    /// Ended by the platform (device gone, user stopped sharing)
    Ended,
}

enum TrackMedia {
    Video(watch::Sender<Option<VideoFrame>>),
    Audio(broadcast::Sender<AudioChunk>),
}

struct TrackInner {
    id: String,
    kind: TrackKind,
    label: String,
    state: watch::Sender<TrackState>,
    media: TrackMedia,
}

/// Handle to one live audio or video track. Clones share the same track.
#[derive(Clone)]
pub struct MediaTrack {
    inner: Arc<TrackInner>,
}

impl MediaTrack {
    /// New live video track with no frame yet
    pub fn video(label: impl Into<String>) -> Self {
        let (frames, _) = watch::channel(None);
        Self::with_media(TrackKind::Video, label.into(), TrackMedia::Video(frames))
    }

    /// New live audio track
    pub fn audio(label: impl Into<String>) -> Self {
        let (chunks, _) = broadcast::channel(AUDIO_CHANNEL_CAPACITY);
        Self::with_media(TrackKind::Audio, label.into(), TrackMedia::Audio(chunks))
    }

    fn with_media(kind: TrackKind, label: String, media: TrackMedia) -> Self {
        let (state, _) = watch::channel(TrackState::Live);
        Self {
            inner: Arc::new(TrackInner {
                id: Uuid::new_v4().to_string(),
                kind,
                label,
                state,
                media,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn kind(&self) -> TrackKind {
        self.inner.kind
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn state(&self) -> TrackState {
        *self.inner.state.borrow()
    }

    pub fn is_live(&self) -> bool {
        self.state() == TrackState::Live
    }

    /// Release the track. Does not fire the ended notification.
    pub fn stop(&self) {
        self.inner.state.send_if_modified(|state| {
            if *state == TrackState::Live {
                *state = TrackState::Stopped;
                true
            } else {
                false
            }
        });
    }

    /// Platform side: the source went away on its own
    pub fn end(&self) {
        self.inner.state.send_if_modified(|state| {
            if *state == TrackState::Live {
                *state = TrackState::Ended;
                true
            } else {
                false
            }
        });
    }

    /// Resolves once the track leaves the live state. Returns `true` when
    /// the platform ended it and `false` when a consumer stopped it.
    pub async fn ended(&self) -> bool {
        let mut state = self.inner.state.subscribe();
        let ended = match state.wait_for(|s| *s != TrackState::Live).await {
            Ok(s) => *s == TrackState::Ended,
            Err(_) => false,
        };
        ended
    }

    /// Publish a video frame. Ignored on audio tracks and once the track
    /// is no longer live.
    pub fn push_frame(&self, frame: VideoFrame) {
        if !self.is_live() {
            return;
        }
        if let TrackMedia::Video(frames) = &self.inner.media {
            frames.send_replace(Some(frame));
        }
    }

    /// Publish an audio chunk. Ignored on video tracks and once the track
    /// is no longer live.
    pub fn push_audio(&self, chunk: AudioChunk) {
        if !self.is_live() {
            return;
        }
        if let TrackMedia::Audio(chunks) = &self.inner.media {
            // No subscribers is not an error
            let _ = chunks.send(chunk);
        }
    }

    /// Latest-frame cell of a video track
    pub fn frames(&self) -> Option<watch::Receiver<Option<VideoFrame>>> {
        match &self.inner.media {
            TrackMedia::Video(frames) => Some(frames.subscribe()),
            TrackMedia::Audio(_) => None,
        }
    }

    /// Chunk subscription of an audio track
    pub fn subscribe_audio(&self) -> Option<broadcast::Receiver<AudioChunk>> {
        match &self.inner.media {
            TrackMedia::Audio(chunks) => Some(chunks.subscribe()),
            TrackMedia::Video(_) => None,
        }
    }

    /// Size of the most recent frame, if any
    pub fn frame_size(&self) -> Option<Size> {
        match &self.inner.media {
            TrackMedia::Video(frames) => frames.borrow().as_ref().map(|f| f.size()),
            TrackMedia::Audio(_) => None,
        }
    }

    /// Two handles refer to the same track
    pub fn same_track(&self, other: &MediaTrack) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for MediaTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaTrack")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("label", &self.inner.label)
            .field("state", &self.state())
            .finish()
    }
}

/// Ordered set of tracks
#[derive(Debug, Clone, Default)]
pub struct MediaStream {
    tracks: Vec<MediaTrack>,
}

impl MediaStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tracks(tracks: impl IntoIterator<Item = MediaTrack>) -> Self {
        Self {
            tracks: tracks.into_iter().collect(),
        }
    }

    pub fn add_track(&mut self, track: MediaTrack) {
        if !self.tracks.iter().any(|t| t.same_track(&track)) {
            self.tracks.push(track);
        }
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Video)
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Audio)
    }

    pub fn first_video(&self) -> Option<&MediaTrack> {
        self.video_tracks().next()
    }

    pub fn first_audio(&self) -> Option<&MediaTrack> {
        self.audio_tracks().next()
    }

    pub fn has_audio(&self) -> bool {
        self.first_audio().is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Stop every track
    pub fn stop_all(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }
}
