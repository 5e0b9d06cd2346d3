//! Captured file entity

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Local};
use serde::Serialize;
use uuid::Uuid;

use super::settings::{CaptureMode, ImageFormat};
use crate::domain::media::mime;

/// Kind of captured media
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Video,
    Audio,
    Image,
}

impl FileKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Image => "image",
        }
    }

    /// Kind produced by a capture mode
    pub const fn for_mode(mode: CaptureMode) -> Self {
        match mode {
            CaptureMode::Screenshot => Self::Image,
            CaptureMode::AudioOnly => Self::Audio,
            CaptureMode::ScreenVideo | CaptureMode::ScreenAndCam => Self::Video,
        }
    }

    const fn name_prefix(&self) -> &'static str {
        match self {
            Self::Video => "Recording",
            Self::Audio => "Audio",
            Self::Image => "Screenshot",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Encoded binary payload tagged with its format
#[derive(Debug, Clone)]
pub struct Blob {
    data: Arc<Vec<u8>>,
    mime_type: String,
}

impl Blob {
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            data: Arc::new(data),
            mime_type: mime_type.into(),
        }
    }

    /// Concatenate chunks in order
    pub fn from_chunks(chunks: Vec<Vec<u8>>, mime_type: impl Into<String>) -> Self {
        Self::new(chunks.concat(), mime_type)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    /// Get human-readable size
    pub fn human_readable_size(&self) -> String {
        let bytes = self.size_bytes();
        if bytes < 1024 {
            format!("{} B", bytes)
        } else if bytes < 1024 * 1024 {
            format!("{:.1} KB", bytes as f64 / 1024.0)
        } else {
            format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
        }
    }
}

/// Opaque handle used for in-app playback of a payload
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PlaybackHandle(String);

impl PlaybackHandle {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlaybackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A finished capture. Created once, never mutated.
#[derive(Debug, Clone)]
pub struct CapturedFile {
    id: Uuid,
    name: String,
    blob: Blob,
    handle: PlaybackHandle,
    kind: FileKind,
    created_at: DateTime<Local>,
    duration_secs: Option<u64>,
}

impl CapturedFile {
    /// A finished recording; the extension comes from the blob's format
    pub fn recording(
        mode: CaptureMode,
        blob: Blob,
        handle: PlaybackHandle,
        duration_secs: u64,
        created_at: DateTime<Local>,
    ) -> Self {
        let kind = FileKind::for_mode(mode);
        let extension = mime::extension_for(blob.mime_type(), mode.is_audio_only());
        Self {
            id: Uuid::new_v4(),
            name: file_name(kind, created_at, extension),
            blob,
            handle,
            kind,
            created_at,
            duration_secs: Some(duration_secs),
        }
    }

    /// A still image; images carry no duration
    pub fn image(
        format: ImageFormat,
        blob: Blob,
        handle: PlaybackHandle,
        created_at: DateTime<Local>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: file_name(FileKind::Image, created_at, format.extension()),
            blob,
            handle,
            kind: FileKind::Image,
            created_at,
            duration_secs: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn blob(&self) -> &Blob {
        &self.blob
    }

    pub fn handle(&self) -> &PlaybackHandle {
        &self.handle
    }

    pub fn kind(&self) -> FileKind {
        self.kind
    }

    pub fn created_at(&self) -> DateTime<Local> {
        self.created_at
    }

    pub fn duration_secs(&self) -> Option<u64> {
        self.duration_secs
    }

    /// Serializable summary without the payload
    pub fn info(&self) -> CapturedFileInfo {
        CapturedFileInfo {
            id: self.id,
            name: self.name.clone(),
            kind: self.kind,
            mime_type: self.blob.mime_type().to_string(),
            size_bytes: self.blob.size_bytes(),
            created_at: self.created_at,
            duration_secs: self.duration_secs,
            handle: self.handle.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CapturedFileInfo {
    pub id: Uuid,
    pub name: String,
    pub kind: FileKind,
    pub mime_type: String,
    pub size_bytes: usize,
    pub created_at: DateTime<Local>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u64>,
    pub handle: PlaybackHandle,
}

/// `Recording_2026-10-19_14-03-59.webm`
pub fn file_name(kind: FileKind, created_at: DateTime<Local>, extension: &str) -> String {
    format!(
        "{}_{}.{}",
        kind.name_prefix(),
        created_at.format("%Y-%m-%d_%H-%M-%S"),
        extension
    )
}
