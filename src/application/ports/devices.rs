//! Device/stream acquisition port

use async_trait::async_trait;
use thiserror::Error;

use super::stream::MediaStream;
use crate::domain::capture::Resolution;

/// Acquisition errors, classified once at the platform boundary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AcquireError {
    /// The user declined or dismissed the permission prompt
    #[error("Permission was declined")]
    Declined,

    #[error("No capture device found: {0}")]
    NotFound(String),

    #[error("Capture device could not be read: {0}")]
    NotReadable(String),

    #[error("Capture failed: {0}")]
    Failed(String),
}

/// Platform error categories that mean the user said no
const DECLINED_CATEGORIES: &[&str] = &["NotAllowedError", "AbortError", "SecurityError"];

/// Message fragments that mean the user said no
const DECLINED_PHRASES: &[&str] = &[
    "permission denied",
    "denied",
    "not allowed",
    "cancelled",
    "canceled",
    "aborted",
    "dismissed",
];

impl AcquireError {
    /// Map a platform-native error (category name plus message) onto the
    /// two-tier taxonomy. Adapters call this instead of the use cases
    /// inspecting message text.
    pub fn classify(category: &str, message: &str) -> Self {
        if DECLINED_CATEGORIES
            .iter()
            .any(|c| category.eq_ignore_ascii_case(c))
        {
            return Self::Declined;
        }

        let lowered = message.to_lowercase();
        if DECLINED_PHRASES.iter().any(|p| lowered.contains(p)) {
            return Self::Declined;
        }

        match category {
            "NotFoundError" | "OverconstrainedError" => Self::NotFound(message.to_string()),
            "NotReadableError" => Self::NotReadable(message.to_string()),
            _ => Self::Failed(message.to_string()),
        }
    }

    /// Declined prompts are silent cancellations, not failures
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Declined)
    }
}

/// Display capture request
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayMediaRequest {
    pub frame_rate: u32,
    pub resolution: Resolution,
    /// Include system audio in the same capture
    pub system_audio: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MicrophoneConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
}

impl Default for MicrophoneConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CameraConstraints {
    /// `None` = default camera
    pub device_id: Option<String>,
    pub resolution: Resolution,
}

/// User media request; at least one of `audio` / `video` is set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserMediaRequest {
    pub audio: Option<MicrophoneConstraints>,
    pub video: Option<CameraConstraints>,
}

impl UserMediaRequest {
    pub fn microphone() -> Self {
        Self {
            audio: Some(MicrophoneConstraints::default()),
            video: None,
        }
    }

    pub fn camera(constraints: CameraConstraints) -> Self {
        Self {
            audio: None,
            video: Some(constraints),
        }
    }
}

/// Port for acquiring live device streams
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Capture a screen (optionally with system audio). Suspends until the
    /// platform grants or denies access.
    async fn get_display_media(
        &self,
        request: DisplayMediaRequest,
    ) -> Result<MediaStream, AcquireError>;

    /// Capture a microphone and/or camera
    async fn get_user_media(&self, request: UserMediaRequest)
        -> Result<MediaStream, AcquireError>;
}
