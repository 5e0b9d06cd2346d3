//! Synthetic devices producing test patterns and a tone
//!
//! Useful on headless machines and in tests: every request succeeds (unless
//! configured otherwise) and the generated tracks behave like real ones,
//! publishing until they are stopped.

use std::f32::consts::TAU;
use std::sync::{Mutex, PoisonError};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use tokio::time::{self, MissedTickBehavior};
use tracing::debug;

use crate::application::ports::{
    AcquireError, DisplayMediaRequest, MediaDevices, MediaStream, MediaTrack, UserMediaRequest,
};
use crate::domain::capture::settings::DEFAULT_FRAME_RATE;
use crate::domain::media::{AudioChunk, Size, VideoFrame};

pub const TONE_SAMPLE_RATE: u32 = 48_000;
const TONE_HZ: f32 = 440.0;
const TONE_AMPLITUDE: f32 = 0.2;
const TONE_CHUNK: StdDuration = StdDuration::from_millis(20);

const BARS: [[u8; 4]; 7] = [
    [192, 192, 192, 255],
    [192, 192, 0, 255],
    [0, 192, 192, 255],
    [0, 192, 0, 255],
    [192, 0, 192, 255],
    [192, 0, 0, 255],
    [0, 0, 192, 255],
];

/// Configurable fake platform
pub struct SyntheticDevices {
    screen_size: Size,
    camera_size: Size,
    camera: bool,
    microphone: bool,
    decline_display: bool,
    decline_microphone: bool,
    display_delay: Option<StdDuration>,
    display_ends_after: Option<StdDuration>,
    issued: Mutex<Vec<MediaTrack>>,
}

impl SyntheticDevices {
    pub fn new() -> Self {
        Self {
            screen_size: Size::new(1280, 720),
            camera_size: Size::new(320, 240),
            camera: true,
            microphone: true,
            decline_display: false,
            decline_microphone: false,
            display_delay: None,
            display_ends_after: None,
            issued: Mutex::new(Vec::new()),
        }
    }

    pub fn with_screen_size(mut self, size: Size) -> Self {
        self.screen_size = size;
        self
    }

    pub fn with_camera_size(mut self, size: Size) -> Self {
        self.camera_size = size;
        self
    }

    pub fn without_camera(mut self) -> Self {
        self.camera = false;
        self
    }

    pub fn without_microphone(mut self) -> Self {
        self.microphone = false;
        self
    }

    /// Every display request is declined, as if the picker was dismissed
    pub fn declining_display(mut self) -> Self {
        self.decline_display = true;
        self
    }

    /// Every microphone request is declined at the permission prompt
    pub fn declining_microphone(mut self) -> Self {
        self.decline_microphone = true;
        self
    }

    /// Display requests take `delay` to resolve, like a picker left open
    pub fn with_display_delay(mut self, delay: StdDuration) -> Self {
        self.display_delay = Some(delay);
        self
    }

    /// Screen tracks end on their own after `after`, as if sharing was
    /// stopped from outside the app
    pub fn display_ends_after(mut self, after: StdDuration) -> Self {
        self.display_ends_after = Some(after);
        self
    }

    /// Every track handed out so far
    pub fn issued_tracks(&self) -> Vec<MediaTrack> {
        self.issued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn issue(&self, track: &MediaTrack) {
        self.issued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(track.clone());
    }

    fn pattern_track(&self, label: &str, size: Size, frame_rate: u32) -> MediaTrack {
        let track = MediaTrack::video(label);
        track.push_frame(pattern_frame(size, 0));
        tokio::spawn(run_pattern(track.clone(), size, frame_rate));
        self.issue(&track);
        track
    }

    fn tone_track(&self) -> MediaTrack {
        let track = MediaTrack::audio("synthetic tone");
        tokio::spawn(run_tone(track.clone()));
        self.issue(&track);
        track
    }
}

impl Default for SyntheticDevices {
    fn default() -> Self {
        Self::new()
    }
}

/// Colour bars with a white sweep line whose position follows `tick`
pub fn pattern_frame(size: Size, tick: u64) -> VideoFrame {
    let width = size.width.max(1) as usize;
    let height = size.height as usize;
    let sweep = (tick as usize * 4) % width;

    let mut data = Vec::with_capacity(width * height * 4);
    for _ in 0..height {
        for x in 0..width {
            let px = if x == sweep {
                [255, 255, 255, 255]
            } else {
                BARS[x * BARS.len() / width]
            };
            data.extend_from_slice(&px);
        }
    }
    VideoFrame::new(Size::new(width as u32, height as u32), data)
        .unwrap_or_else(|| VideoFrame::solid(size, [0, 0, 0, 255]))
}

async fn run_pattern(track: MediaTrack, size: Size, frame_rate: u32) {
    let period = StdDuration::from_secs_f64(1.0 / frame_rate.max(1) as f64);
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker.tick().await;

    let mut tick = 1;
    loop {
        ticker.tick().await;
        if !track.is_live() {
            break;
        }
        track.push_frame(pattern_frame(size, tick));
        tick += 1;
    }
    debug!(track = track.label(), "Pattern generator stopped");
}

/// One 20 ms chunk of the tone, continuing from `offset` frames
pub fn tone_chunk(offset: u64) -> AudioChunk {
    let frames = (TONE_SAMPLE_RATE as u128 * TONE_CHUNK.as_millis() / 1000) as u64;
    let samples = (offset..offset + frames)
        .map(|n| (TAU * TONE_HZ * n as f32 / TONE_SAMPLE_RATE as f32).sin() * TONE_AMPLITUDE)
        .collect();
    AudioChunk::new(TONE_SAMPLE_RATE, 1, samples)
}

async fn run_tone(track: MediaTrack) {
    let mut ticker = time::interval(TONE_CHUNK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut offset = 0;
    loop {
        ticker.tick().await;
        if !track.is_live() {
            break;
        }
        let chunk = tone_chunk(offset);
        offset += chunk.frames() as u64;
        track.push_audio(chunk);
    }
}

#[async_trait]
impl MediaDevices for SyntheticDevices {
    async fn get_display_media(
        &self,
        request: DisplayMediaRequest,
    ) -> Result<MediaStream, AcquireError> {
        if let Some(delay) = self.display_delay {
            time::sleep(delay).await;
        }
        if self.decline_display {
            return Err(AcquireError::classify("NotAllowedError", "Permission denied"));
        }

        let size = request
            .resolution
            .dimensions()
            .map(|(w, h)| Size::new(w, h))
            .unwrap_or(self.screen_size);
        let frame_rate = if request.frame_rate == 0 {
            DEFAULT_FRAME_RATE
        } else {
            request.frame_rate
        };
        let screen = self.pattern_track("synthetic screen", size, frame_rate);

        if let Some(after) = self.display_ends_after {
            let track = screen.clone();
            tokio::spawn(async move {
                time::sleep(after).await;
                track.end();
            });
        }

        let mut stream = MediaStream::from_tracks([screen]);
        if request.system_audio {
            stream.add_track(self.tone_track());
        }
        Ok(stream)
    }

    async fn get_user_media(
        &self,
        request: UserMediaRequest,
    ) -> Result<MediaStream, AcquireError> {
        let mut stream = MediaStream::new();

        if request.audio.is_some() {
            if self.decline_microphone {
                return Err(AcquireError::classify("NotAllowedError", "Permission denied"));
            }
            if !self.microphone {
                return Err(AcquireError::NotFound("No synthetic microphone".into()));
            }
            stream.add_track(self.tone_track());
        }

        if let Some(camera) = &request.video {
            if !self.camera {
                return Err(AcquireError::NotFound("No synthetic camera".into()));
            }
            let size = camera
                .resolution
                .dimensions()
                .map(|(w, h)| Size::new(w, h))
                .unwrap_or(self.camera_size);
            stream.add_track(self.pattern_track("synthetic camera", size, DEFAULT_FRAME_RATE));
        }

        if stream.is_empty() {
            return Err(AcquireError::Failed("Empty media request".into()));
        }
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{CameraConstraints, TrackState};
    use crate::domain::capture::Resolution;

    fn display(system_audio: bool) -> DisplayMediaRequest {
        DisplayMediaRequest {
            frame_rate: 10,
            resolution: Resolution::Native,
            system_audio,
        }
    }

    #[test]
    fn pattern_has_bars_and_sweep() {
        let frame = pattern_frame(Size::new(70, 2), 0);
        assert_eq!(frame.pixel(0, 0), Some([255, 255, 255, 255]));
        assert_eq!(frame.pixel(5, 1), Some(BARS[0]));
        assert_eq!(frame.pixel(69, 0), Some(BARS[6]));
    }

    #[test]
    fn tone_is_continuous_and_bounded() {
        let first = tone_chunk(0);
        assert_eq!(first.frames(), 960);
        assert_eq!(first.samples()[0], 0.0);
        assert!(first.samples().iter().all(|s| s.abs() <= TONE_AMPLITUDE));
    }

    #[tokio::test(start_paused = true)]
    async fn screen_publishes_until_stopped() {
        let devices = SyntheticDevices::new().with_screen_size(Size::new(16, 9));
        let stream = devices.get_display_media(display(false)).await.unwrap();
        let track = stream.first_video().unwrap().clone();
        assert_eq!(track.frame_size(), Some(Size::new(16, 9)));
        assert!(!stream.has_audio());

        time::sleep(StdDuration::from_millis(500)).await;
        stream.stop_all();
        assert_eq!(track.state(), TrackState::Stopped);
        assert_eq!(devices.issued_tracks().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn system_audio_adds_a_track() {
        let devices = SyntheticDevices::new().with_screen_size(Size::new(4, 4));
        let stream = devices.get_display_media(display(true)).await.unwrap();
        assert!(stream.has_audio());
        stream.stop_all();
    }

    #[tokio::test(start_paused = true)]
    async fn display_can_end_by_itself() {
        let devices = SyntheticDevices::new()
            .with_screen_size(Size::new(4, 4))
            .display_ends_after(StdDuration::from_secs(2));
        let stream = devices.get_display_media(display(false)).await.unwrap();
        let track = stream.first_video().unwrap().clone();
        assert!(track.ended().await);
        assert_eq!(track.state(), TrackState::Ended);
    }

    #[tokio::test(start_paused = true)]
    async fn display_request_can_be_slow() {
        let devices = SyntheticDevices::new()
            .with_screen_size(Size::new(4, 4))
            .with_display_delay(StdDuration::from_secs(5));
        let started = time::Instant::now();
        let stream = devices.get_display_media(display(false)).await.unwrap();
        assert!(started.elapsed() >= StdDuration::from_secs(5));
        stream.stop_all();
    }

    #[tokio::test]
    async fn declined_microphone_is_a_cancellation() {
        let devices = SyntheticDevices::new().declining_microphone();
        let err = devices
            .get_user_media(UserMediaRequest::microphone())
            .await
            .unwrap_err();
        assert!(err.is_cancellation());
    }

    #[tokio::test]
    async fn declined_display_is_a_cancellation() {
        let devices = SyntheticDevices::new().declining_display();
        let err = devices.get_display_media(display(false)).await.unwrap_err();
        assert!(err.is_cancellation());
    }

    #[tokio::test(start_paused = true)]
    async fn missing_camera_is_not_found() {
        let devices = SyntheticDevices::new().without_camera();
        let err = devices
            .get_user_media(UserMediaRequest::camera(CameraConstraints::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, AcquireError::NotFound(_)));

        let mic = devices
            .get_user_media(UserMediaRequest::microphone())
            .await
            .unwrap();
        assert!(mic.has_audio());
        mic.stop_all();
    }
}
