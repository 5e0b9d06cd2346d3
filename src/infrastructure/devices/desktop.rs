//! Real desktop devices: primary monitor and default microphone

use async_trait::async_trait;
use tracing::{info, warn};

use super::microphone::open_default_microphone;
use super::screen::capture_primary_monitor;
use crate::application::ports::{
    AcquireError, DisplayMediaRequest, MediaDevices, MediaStream, UserMediaRequest,
};

/// [`MediaDevices`] backed by xcap (screen) and cpal (microphone).
///
/// Camera capture and system audio loopback are not available; camera
/// requests fail with `NotFound` so callers fall back to screen-only.
#[derive(Debug, Default, Clone, Copy)]
pub struct DesktopDevices;

impl DesktopDevices {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MediaDevices for DesktopDevices {
    async fn get_display_media(
        &self,
        request: DisplayMediaRequest,
    ) -> Result<MediaStream, AcquireError> {
        if request.system_audio {
            warn!("System audio capture is not supported on this host, recording without it");
        }
        let track = capture_primary_monitor(&request).await?;
        info!(resolution = %request.resolution, fps = request.frame_rate, "Screen acquired");
        Ok(MediaStream::from_tracks([track]))
    }

    async fn get_user_media(
        &self,
        request: UserMediaRequest,
    ) -> Result<MediaStream, AcquireError> {
        if request.audio.is_none() && request.video.is_none() {
            return Err(AcquireError::Failed("Empty media request".into()));
        }
        if let Some(camera) = &request.video {
            return Err(AcquireError::NotFound(format!(
                "No camera available{}",
                camera
                    .device_id
                    .as_deref()
                    .map(|id| format!(" (requested {})", id))
                    .unwrap_or_default()
            )));
        }

        let mut stream = MediaStream::new();
        if let Some(constraints) = &request.audio {
            stream.add_track(open_default_microphone(constraints).await?);
            info!("Microphone acquired");
        }
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::CameraConstraints;

    #[tokio::test]
    async fn camera_requests_are_not_found() {
        let err = DesktopDevices::new()
            .get_user_media(UserMediaRequest::camera(CameraConstraints::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, AcquireError::NotFound(_)));
        assert!(!err.is_cancellation());
    }

    #[tokio::test]
    async fn empty_request_fails() {
        let err = DesktopDevices::new()
            .get_user_media(UserMediaRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AcquireError::Failed(_)));
    }
}
