//! Capture session controller
//!
//! Acquires device streams per capture mode, wires the compositor and mixer
//! when needed, drives the encoder and the elapsed clock, and finalizes the
//! encoded chunks into a [`CapturedFile`].

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Local;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::compositor::{self, CompositorError};
use super::gallery::ObjectUrls;
use super::mixer::{self, MixError};
use super::ports::{
    AcquireError, AudioContextFactory, CameraConstraints, CanvasError, CanvasFactory,
    DisplayMediaRequest, EncoderError, EncoderEvent, EncoderEvents, EncoderFactory,
    EncoderOptions, MediaDevices, MediaStream, MediaTrack, UserMediaRequest,
};
use super::screenshot::ScreenshotCapturer;
use super::session::ActiveSession;
use crate::domain::capture::{
    Blob, CaptureMode, CaptureSettings, CapturedFile, ImageSettings, InvalidStateTransition,
    RecorderSession, RecorderStatus,
};
use crate::domain::media::mime;

/// Interval at which the encoder emits chunks
pub const CHUNK_TIMESLICE: StdDuration = StdDuration::from_secs(1);
/// Period of the elapsed-seconds ticker
pub const ELAPSED_TICK: StdDuration = StdDuration::from_millis(250);

/// Errors surfaced by capture operations
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("{0}")]
    Acquire(#[from] AcquireError),

    #[error("Encoder error: {0}")]
    Encoder(#[from] EncoderError),

    #[error("Compositing failed: {0}")]
    Compositor(#[from] CompositorError),

    #[error("{0}")]
    Mix(#[from] MixError),

    #[error("Canvas error: {0}")]
    Canvas(#[from] CanvasError),

    #[error("{0}")]
    InvalidState(#[from] InvalidStateTransition),

    #[error("Captured stream has no {0} track")]
    MissingTrack(&'static str),

    #[error("Screen did not produce a frame")]
    NoFrame,

    #[error("Recording failed: {0}")]
    Recording(String),
}

impl CaptureError {
    /// The user declined or dismissed a prompt; not an error to show
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Acquire(e) if e.is_cancellation())
    }
}

/// Result of a start command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// Recording began
    Started,
    /// A session is already acquiring or recording; nothing changed
    Rejected,
    /// The user declined a prompt, or the session was torn down mid-start
    Cancelled,
    /// Screenshot mode took a one-shot screenshot instead of recording
    Screenshot,
}

/// Host platform ports the controller drives
#[derive(Clone)]
pub struct CapturePlatform {
    pub devices: Arc<dyn MediaDevices>,
    pub encoders: Arc<dyn EncoderFactory>,
    pub canvases: Arc<dyn CanvasFactory>,
    pub audio: Arc<dyn AudioContextFactory>,
}

/// Invoked once per finished recording or screenshot
pub type CompletionCallback = Arc<dyn Fn(CapturedFile) + Send + Sync>;

struct ControllerState {
    session: RecorderSession,
    active: Option<ActiveSession>,
    /// Bumped on every start and teardown so stale tasks can tell they are
    /// no longer current
    generation: u64,
}

struct Shared {
    platform: CapturePlatform,
    urls: Arc<ObjectUrls>,
    on_complete: CompletionCallback,
    state: Mutex<ControllerState>,
    status: watch::Sender<RecorderStatus>,
    error: watch::Sender<Option<String>>,
    elapsed: watch::Sender<u64>,
}

/// Streams and the watched track produced by acquisition
struct Acquired {
    stream: MediaStream,
    /// Track whose platform-side end stops the recording
    primary: MediaTrack,
}

/// Owns at most one capture session at a time
#[derive(Clone)]
pub struct CaptureController {
    shared: Arc<Shared>,
}

impl CaptureController {
    pub fn new(
        platform: CapturePlatform,
        urls: Arc<ObjectUrls>,
        on_complete: impl Fn(CapturedFile) + Send + Sync + 'static,
    ) -> Self {
        let (status, _) = watch::channel(RecorderStatus::Idle);
        let (error, _) = watch::channel(None);
        let (elapsed, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                platform,
                urls,
                on_complete: Arc::new(on_complete),
                state: Mutex::new(ControllerState {
                    session: RecorderSession::new(),
                    active: None,
                    generation: 0,
                }),
                status,
                error,
                elapsed,
            }),
        }
    }

    pub fn status(&self) -> RecorderStatus {
        *self.shared.status.borrow()
    }

    pub fn error(&self) -> Option<String> {
        self.shared.error.borrow().clone()
    }

    pub fn elapsed_secs(&self) -> u64 {
        *self.shared.elapsed.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<RecorderStatus> {
        self.shared.status.subscribe()
    }

    pub fn subscribe_elapsed(&self) -> watch::Receiver<u64> {
        self.shared.elapsed.subscribe()
    }

    /// Start a session. Rejected while one is acquiring, recording or
    /// paused. In screenshot mode this takes a one-shot screenshot and leaves
    /// the recording status alone.
    pub async fn start(&self, settings: CaptureSettings) -> Result<StartOutcome, CaptureError> {
        if settings.mode == CaptureMode::Screenshot {
            return Ok(match self.screenshot(settings.image).await? {
                Some(_) => StartOutcome::Screenshot,
                None => StartOutcome::Cancelled,
            });
        }

        let generation = {
            let mut state = self.shared.state.lock().await;
            if state.session.begin_acquiring().is_err() {
                debug!(status = %state.session.status(), "Start rejected, session already active");
                return Ok(StartOutcome::Rejected);
            }
            state.generation += 1;
            self.shared.error.send_replace(None);
            self.shared.elapsed.send_replace(0);
            self.shared.publish(&state.session);
            state.generation
        };

        info!(mode = %settings.mode, "Starting capture");
        let mut pending = ActiveSession::new(settings.mode);

        let recording = match self.prepare(&settings, &mut pending).await {
            Ok(recording) => recording,
            Err(e) => {
                pending.release();
                return self.shared.fail_acquisition(generation, e).await;
            }
        };
        let (events, primary) = recording;

        let mut state = self.shared.state.lock().await;
        if state.generation != generation || state.session.status() != RecorderStatus::Acquiring {
            debug!("Session torn down during acquisition");
            pending.release();
            return Ok(StartOutcome::Cancelled);
        }
        state.session.acquired()?;

        let now = Instant::now();
        pending.clock_mut().start(now);
        pending.set_ticker(Some(spawn_ticker(Arc::clone(&self.shared), now)));
        pending.track_task(tokio::spawn(pump_events(
            Arc::clone(&self.shared),
            generation,
            events,
        )));
        pending.track_task(tokio::spawn(watch_primary(
            Arc::clone(&self.shared),
            generation,
            primary,
        )));

        state.active = Some(pending);
        self.shared.publish(&state.session);
        info!("Recording started");
        Ok(StartOutcome::Started)
    }

    /// Acquire streams, negotiate the format and start the encoder
    async fn prepare(
        &self,
        settings: &CaptureSettings,
        pending: &mut ActiveSession,
    ) -> Result<(EncoderEvents, MediaTrack), CaptureError> {
        let acquired = self.acquire(settings, pending).await?;

        let encoders = &self.shared.platform.encoders;
        let format = mime::negotiate_format(settings, |m| encoders.is_type_supported(m));
        if format.is_empty() {
            warn!("No candidate format supported, letting the encoder choose");
        }
        debug!(format = %format, "Negotiated encoder format");

        let audio_only = settings.mode.is_audio_only();
        let options = EncoderOptions {
            mime_type: format.clone(),
            video_bits_per_second: (!audio_only).then_some(settings.video.bitrate),
            audio_bits_per_second: Some(settings.audio.bitrate),
        };
        let mut encoder = encoders.create(&acquired.stream, options)?;
        let events = encoder.start(CHUNK_TIMESLICE)?;
        pending.attach_encoder(encoder, format);

        Ok((events, acquired.primary))
    }

    /// Acquire the streams a mode needs. Everything acquired is handed to
    /// `pending` immediately so a later failure releases it.
    async fn acquire(
        &self,
        settings: &CaptureSettings,
        pending: &mut ActiveSession,
    ) -> Result<Acquired, CaptureError> {
        let devices = &self.shared.platform.devices;

        match settings.mode {
            CaptureMode::Screenshot => Err(CaptureError::MissingTrack("video")),

            CaptureMode::AudioOnly => {
                // The microphone is the whole point here, so failure is fatal
                let mic = devices.get_user_media(UserMediaRequest::microphone()).await?;
                pending.add_stream(mic.clone());
                let primary = mic
                    .first_audio()
                    .cloned()
                    .ok_or(CaptureError::MissingTrack("audio"))?;
                Ok(Acquired {
                    stream: mic,
                    primary,
                })
            }

            CaptureMode::ScreenVideo => {
                let (screen, primary) = self.acquire_screen(settings, pending).await?;
                let mic = self.acquire_optional_microphone(settings, pending).await;

                let mut stream = MediaStream::new();
                for track in screen.tracks() {
                    stream.add_track(track.clone());
                }
                if let Some(mic) = &mic {
                    for track in mic.tracks() {
                        stream.add_track(track.clone());
                    }
                }
                Ok(Acquired { stream, primary })
            }

            CaptureMode::ScreenAndCam => {
                let (screen, primary) = self.acquire_screen(settings, pending).await?;

                let camera_request = UserMediaRequest::camera(CameraConstraints {
                    device_id: settings.camera_device_id.clone(),
                    resolution: settings.video.resolution,
                });
                let camera = match devices.get_user_media(camera_request).await {
                    Ok(camera) => {
                        pending.add_stream(camera.clone());
                        Some(camera)
                    }
                    Err(e) => {
                        warn!(error = %e, "Camera unavailable, recording screen only");
                        None
                    }
                };

                let mic = self.acquire_optional_microphone(settings, pending).await;

                let audio_sources: Vec<&MediaStream> = [Some(&screen), mic.as_ref()]
                    .into_iter()
                    .flatten()
                    .filter(|s| s.has_audio())
                    .collect();
                let mixed = if audio_sources.is_empty() {
                    None
                } else {
                    let mixed =
                        mixer::mix_audio(self.shared.platform.audio.as_ref(), &audio_sources)?;
                    pending.register_teardown(mixed.teardown);
                    Some(mixed.track)
                };

                let video = match &camera {
                    Some(camera) => {
                        let composition = compositor::compose(
                            self.shared.platform.canvases.as_ref(),
                            &screen,
                            camera,
                        )
                        .await?;
                        pending.register_teardown(composition.teardown);
                        composition.track
                    }
                    None => primary.clone(),
                };

                let mut stream = MediaStream::from_tracks([video]);
                if let Some(mixed) = mixed {
                    stream.add_track(mixed);
                }
                Ok(Acquired { stream, primary })
            }
        }
    }

    /// Screen capture, optionally with system audio. Always fatal on failure.
    async fn acquire_screen(
        &self,
        settings: &CaptureSettings,
        pending: &mut ActiveSession,
    ) -> Result<(MediaStream, MediaTrack), CaptureError> {
        let request = DisplayMediaRequest {
            frame_rate: settings.video.frame_rate,
            resolution: settings.video.resolution,
            system_audio: settings.audio.system_audio,
        };
        let screen = self.shared.platform.devices.get_display_media(request).await?;
        pending.add_stream(screen.clone());

        let primary = screen
            .first_video()
            .cloned()
            .ok_or(CaptureError::MissingTrack("video"))?;
        Ok((screen, primary))
    }

    /// Microphone alongside a screen capture. Failure is logged and the
    /// recording continues without it.
    async fn acquire_optional_microphone(
        &self,
        settings: &CaptureSettings,
        pending: &mut ActiveSession,
    ) -> Option<MediaStream> {
        if !settings.audio.microphone {
            return None;
        }
        match self
            .shared
            .platform
            .devices
            .get_user_media(UserMediaRequest::microphone())
            .await
        {
            Ok(mic) => {
                pending.add_stream(mic.clone());
                Some(mic)
            }
            Err(e) => {
                warn!(error = %e, "Microphone unavailable, recording without it");
                None
            }
        }
    }

    /// Request the final chunk. Finalization happens once the encoder
    /// reports it has stopped.
    pub async fn stop(&self) -> Result<(), CaptureError> {
        self.shared.request_stop(None).await
    }

    pub async fn pause(&self) -> Result<(), CaptureError> {
        let mut state = self.shared.state.lock().await;
        let state = &mut *state;
        state.session.pause()?;

        if let Some(active) = state.active.as_mut() {
            if let Some(encoder) = active.encoder_mut() {
                if let Err(e) = encoder.pause() {
                    warn!(error = %e, "Encoder refused to pause");
                }
            }
            let now = Instant::now();
            active.clock_mut().pause(now);
            active.set_ticker(None);
            self.shared
                .elapsed
                .send_replace(active.clock().elapsed_secs(now));
        }

        self.shared.publish(&state.session);
        debug!("Recording paused");
        Ok(())
    }

    pub async fn resume(&self) -> Result<(), CaptureError> {
        let mut state = self.shared.state.lock().await;
        let state = &mut *state;
        state.session.resume()?;

        if let Some(active) = state.active.as_mut() {
            if let Some(encoder) = active.encoder_mut() {
                if let Err(e) = encoder.resume() {
                    warn!(error = %e, "Encoder refused to resume");
                }
            }
            let now = Instant::now();
            active.clock_mut().resume(now);
            self.shared
                .elapsed
                .send_replace(active.clock().elapsed_secs(now));
            if let Some(origin) = active.clock().origin() {
                active.set_ticker(Some(spawn_ticker(Arc::clone(&self.shared), origin)));
            }
        }

        self.shared.publish(&state.session);
        debug!("Recording resumed");
        Ok(())
    }

    /// Take a screenshot. Independent of the recording state.
    ///
    /// Returns `Ok(None)` when the user declined. Other failures set the
    /// error message without touching the recording status.
    pub async fn screenshot(
        &self,
        settings: ImageSettings,
    ) -> Result<Option<CapturedFile>, CaptureError> {
        let capturer = ScreenshotCapturer::new(
            Arc::clone(&self.shared.platform.devices),
            Arc::clone(&self.shared.platform.canvases),
            Arc::clone(&self.shared.urls),
        );

        match capturer.capture(&settings).await {
            Ok(file) => {
                (self.shared.on_complete)(file.clone());
                Ok(Some(file))
            }
            Err(e) if e.is_cancellation() => {
                debug!("Screenshot cancelled");
                Ok(None)
            }
            Err(e) => {
                warn!(error = %e, "Screenshot failed");
                self.shared.error.send_replace(Some(e.to_string()));
                Err(e)
            }
        }
    }

    /// Release everything and return to idle. Safe to call at any time and
    /// any number of times.
    pub async fn teardown(&self) {
        let mut state = self.shared.state.lock().await;
        state.generation += 1;
        if let Some(mut active) = state.active.take() {
            debug!("Tearing down active session");
            active.release();
        }
        state.session.reset();
        self.shared.elapsed.send_replace(0);
        self.shared.publish(&state.session);
    }
}

impl Shared {
    fn publish(&self, session: &RecorderSession) {
        self.status.send_if_modified(|status| {
            let next = session.status();
            if *status == next {
                false
            } else {
                *status = next;
                true
            }
        });
    }

    async fn fail_acquisition(
        &self,
        generation: u64,
        error: CaptureError,
    ) -> Result<StartOutcome, CaptureError> {
        let mut state = self.state.lock().await;
        if state.generation != generation {
            return Ok(StartOutcome::Cancelled);
        }

        if error.is_cancellation() {
            info!("Capture cancelled by the user");
            state.session.cancel_acquiring()?;
            self.publish(&state.session);
            return Ok(StartOutcome::Cancelled);
        }

        warn!(error = %error, "Capture failed to start");
        state.session.fail()?;
        self.error.send_replace(Some(error.to_string()));
        self.publish(&state.session);
        Err(error)
    }

    /// Shared stop path for the stop command, the max-duration limit and a
    /// platform-ended capture track. `generation` limits the request to one
    /// session.
    async fn request_stop(&self, generation: Option<u64>) -> Result<(), CaptureError> {
        let mut state = self.state.lock().await;
        if generation.is_some_and(|g| g != state.generation) {
            return Ok(());
        }
        if !matches!(
            state.session.status(),
            RecorderStatus::Recording | RecorderStatus::Paused
        ) {
            debug!(status = %state.session.status(), "Nothing to stop");
            return Ok(());
        }

        let Some(active) = state.active.as_mut() else {
            return Ok(());
        };
        if !active.begin_stopping() {
            return Ok(());
        }

        let result = match active.encoder_mut() {
            Some(encoder) => encoder.stop(),
            None => Ok(()),
        };
        if let Err(e) = result {
            warn!(error = %e, "Encoder failed to stop");
            if let Some(mut active) = state.active.take() {
                active.release();
            }
            state.session.fail()?;
            self.error.send_replace(Some(e.to_string()));
            self.publish(&state.session);
            return Err(e.into());
        }

        info!("Stopping recording");
        Ok(())
    }

    /// Turn the collected chunks into a file, hand it out and release the
    /// session.
    async fn finalize(&self, generation: u64) {
        let mut state = self.state.lock().await;
        if state.generation != generation {
            return;
        }
        let Some(mut active) = state.active.take() else {
            return;
        };

        let now = Instant::now();
        let duration_secs = active.clock().elapsed_secs(now);

        if active.chunk_count() == 0 {
            warn!("Recording produced no data, nothing to save");
        } else {
            let mode = active.mode();
            let format = mime::resolve_output_format(
                mode,
                &active.negotiated_format(),
                active.requested_format(),
            );
            let blob = Blob::from_chunks(active.take_chunks(), format);
            let handle = self.urls.create(&blob);
            let file = CapturedFile::recording(mode, blob, handle, duration_secs, Local::now());
            info!(
                name = file.name(),
                size = %file.blob().human_readable_size(),
                duration_secs,
                "Recording finished"
            );
            (self.on_complete)(file);
        }

        if let Err(e) = state.session.finish() {
            warn!(error = %e, "Unexpected status at finalize");
        }
        self.elapsed.send_replace(duration_secs);
        self.publish(&state.session);
        active.release();
    }

    async fn fail_recording(&self, generation: u64, message: String) {
        let mut state = self.state.lock().await;
        if state.generation != generation {
            return;
        }
        warn!(error = %message, "Recording failed");
        if let Some(mut active) = state.active.take() {
            active.release();
        }
        if state.session.fail().is_ok() {
            self.error.send_replace(Some(message));
            self.publish(&state.session);
        }
    }
}

/// Publish whole elapsed seconds measured from `origin`
fn spawn_ticker(shared: Arc<Shared>, origin: Instant) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval(ELAPSED_TICK);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let secs = Instant::now().saturating_duration_since(origin).as_secs();
            shared.elapsed.send_if_modified(|current| {
                if *current == secs {
                    false
                } else {
                    *current = secs;
                    true
                }
            });
        }
    })
}

/// Collect encoder events until it stops or fails
async fn pump_events(shared: Arc<Shared>, generation: u64, mut events: EncoderEvents) {
    while let Some(event) = events.recv().await {
        match event {
            EncoderEvent::Data(chunk) => {
                let mut state = shared.state.lock().await;
                if state.generation != generation {
                    return;
                }
                if let Some(active) = state.active.as_mut() {
                    active.push_chunk(chunk);
                }
            }
            EncoderEvent::Stopped => {
                shared.finalize(generation).await;
                return;
            }
            EncoderEvent::Error(message) => {
                shared
                    .fail_recording(generation, CaptureError::Recording(message).to_string())
                    .await;
                return;
            }
        }
    }

    shared
        .fail_recording(generation, "Encoder closed unexpectedly".to_string())
        .await;
}

/// Stop the recording when the platform ends the primary capture track,
/// e.g. the user clicks "stop sharing"
async fn watch_primary(shared: Arc<Shared>, generation: u64, track: MediaTrack) {
    if track.ended().await {
        info!(track = track.label(), "Capture track ended by the platform");
        if let Err(e) = shared.request_stop(Some(generation)).await {
            warn!(error = %e, "Failed to stop after track ended");
        }
    }
}
