//! One-shot screenshot capture

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Local;
use tokio::time;
use tracing::{debug, warn};

use super::controller::CaptureError;
use super::gallery::ObjectUrls;
use super::ports::{Canvas, CanvasFactory, DisplayMediaRequest, MediaDevices, MediaStream};
use crate::domain::capture::settings::DEFAULT_FRAME_RATE;
use crate::domain::capture::{Blob, CapturedFile, ImageSettings, Resolution};
use crate::domain::media::{Rect, VideoFrame};

/// Upper bound on waiting for the first frame
pub const FIRST_FRAME_TIMEOUT: StdDuration = StdDuration::from_millis(1500);
/// Pause after the first frame so a half-painted frame is not grabbed
pub const SETTLE_DELAY: StdDuration = StdDuration::from_millis(200);

/// Acquires a screen, grabs one frame and encodes it as an image
pub struct ScreenshotCapturer {
    devices: Arc<dyn MediaDevices>,
    canvases: Arc<dyn CanvasFactory>,
    urls: Arc<ObjectUrls>,
}

impl ScreenshotCapturer {
    pub fn new(
        devices: Arc<dyn MediaDevices>,
        canvases: Arc<dyn CanvasFactory>,
        urls: Arc<ObjectUrls>,
    ) -> Self {
        Self {
            devices,
            canvases,
            urls,
        }
    }

    pub async fn capture(&self, settings: &ImageSettings) -> Result<CapturedFile, CaptureError> {
        let request = DisplayMediaRequest {
            frame_rate: DEFAULT_FRAME_RATE,
            resolution: Resolution::Native,
            system_audio: false,
        };
        let stream = self.devices.get_display_media(request).await?;

        let grabbed = self.draw_one_frame(&stream).await;
        // No capture indicator may outlive the screenshot
        stream.stop_all();
        let canvas = grabbed?;

        let bytes = canvas.encode_image(settings.format, settings.quality)?;
        let blob = Blob::new(bytes, settings.format.mime_type());
        let handle = self.urls.create(&blob);
        let file = CapturedFile::image(settings.format, blob, handle, Local::now());
        debug!(name = file.name(), size = %file.blob().human_readable_size(), "Screenshot taken");
        Ok(file)
    }

    async fn draw_one_frame(
        &self,
        stream: &MediaStream,
    ) -> Result<Box<dyn Canvas>, CaptureError> {
        let track = stream
            .first_video()
            .ok_or(CaptureError::MissingTrack("video"))?;
        let mut frames = track.frames().ok_or(CaptureError::MissingTrack("video"))?;

        let ready = time::timeout(FIRST_FRAME_TIMEOUT, frames.wait_for(Option::is_some))
            .await
            .is_ok_and(|r| r.is_ok());
        if !ready {
            warn!("No screen frame within timeout, trying anyway");
        }
        time::sleep(SETTLE_DELAY).await;

        let frame: VideoFrame = frames.borrow().clone().ok_or(CaptureError::NoFrame)?;
        let mut canvas = self.canvases.create(frame.size())?;
        canvas.draw_frame(&frame, Rect::fill(frame.size()))?;
        Ok(canvas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{AcquireError, CanvasError, MediaTrack, UserMediaRequest};
    use crate::domain::capture::{FileKind, ImageFormat};
    use crate::domain::media::{Rgba, Size};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct OneScreen {
        track: MediaTrack,
        fail: Option<AcquireError>,
    }

    #[async_trait]
    impl MediaDevices for OneScreen {
        async fn get_display_media(
            &self,
            _request: DisplayMediaRequest,
        ) -> Result<MediaStream, AcquireError> {
            match &self.fail {
                Some(e) => Err(e.clone()),
                None => Ok(MediaStream::from_tracks([self.track.clone()])),
            }
        }

        async fn get_user_media(
            &self,
            _request: UserMediaRequest,
        ) -> Result<MediaStream, AcquireError> {
            Err(AcquireError::NotFound("none".into()))
        }
    }

    struct StubCanvas {
        size: Size,
        quality: Arc<Mutex<Option<f32>>>,
    }

    impl Canvas for StubCanvas {
        fn size(&self) -> Size {
            self.size
        }
        fn resize(&mut self, size: Size) -> Result<(), CanvasError> {
            self.size = size;
            Ok(())
        }
        fn clear(&mut self, _color: Rgba) {}
        fn draw_frame(&mut self, _frame: &VideoFrame, _dest: Rect) -> Result<(), CanvasError> {
            Ok(())
        }
        fn fill_rect(&mut self, _rect: Rect, _color: Rgba) {}
        fn stroke_rect(&mut self, _rect: Rect, _width: f32, _color: Rgba) {}
        fn draw_shadow(&mut self, _rect: Rect, _blur: f32, _color: Rgba) {}
        fn snapshot(&self) -> VideoFrame {
            VideoFrame::solid(self.size, [0, 0, 0, 255])
        }
        fn encode_image(&self, _format: ImageFormat, quality: f32) -> Result<Vec<u8>, CanvasError> {
            *self.quality.lock().unwrap() = Some(quality);
            Ok(vec![0xFF, 0xD8, 0xFF])
        }
    }

    struct StubCanvases {
        sizes: Arc<Mutex<Vec<Size>>>,
        quality: Arc<Mutex<Option<f32>>>,
    }

    impl CanvasFactory for StubCanvases {
        fn create(&self, size: Size) -> Result<Box<dyn Canvas>, CanvasError> {
            self.sizes.lock().unwrap().push(size);
            Ok(Box::new(StubCanvas {
                size,
                quality: Arc::clone(&self.quality),
            }))
        }
    }

    type Probes = (Arc<Mutex<Vec<Size>>>, Arc<Mutex<Option<f32>>>);

    fn capturer(devices: OneScreen) -> (ScreenshotCapturer, Probes) {
        let sizes = Arc::new(Mutex::new(Vec::new()));
        let quality = Arc::new(Mutex::new(None));
        let canvases = StubCanvases {
            sizes: Arc::clone(&sizes),
            quality: Arc::clone(&quality),
        };
        (
            ScreenshotCapturer::new(
                Arc::new(devices),
                Arc::new(canvases),
                Arc::new(ObjectUrls::new()),
            ),
            (sizes, quality),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn captures_jpeg_at_frame_size_and_stops_tracks() {
        let track = MediaTrack::video("screen");
        track.push_frame(VideoFrame::solid(Size::new(800, 600), [1, 2, 3, 255]));
        let (capturer, (sizes, quality)) = capturer(OneScreen {
            track: track.clone(),
            fail: None,
        });

        let settings = ImageSettings::new(ImageFormat::Jpeg).with_quality(0.5);
        let file = capturer.capture(&settings).await.unwrap();

        assert_eq!(file.kind(), FileKind::Image);
        assert!(file.name().ends_with(".jpeg"));
        assert_eq!(file.duration_secs(), None);
        assert_eq!(file.blob().mime_type(), "image/jpeg");
        assert_eq!(*sizes.lock().unwrap(), vec![Size::new(800, 600)]);
        assert_eq!(*quality.lock().unwrap(), Some(0.5));
        assert!(!track.is_live());
    }

    #[tokio::test(start_paused = true)]
    async fn no_frame_is_an_error_and_still_stops_tracks() {
        let track = MediaTrack::video("screen");
        let (capturer, _) = capturer(OneScreen {
            track: track.clone(),
            fail: None,
        });

        let err = capturer
            .capture(&ImageSettings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::NoFrame));
        assert!(!track.is_live());
    }

    #[tokio::test]
    async fn declined_is_a_cancellation() {
        let (capturer, _) = capturer(OneScreen {
            track: MediaTrack::video("screen"),
            fail: Some(AcquireError::Declined),
        });
        let err = capturer
            .capture(&ImageSettings::default())
            .await
            .unwrap_err();
        assert!(err.is_cancellation());
    }
}
