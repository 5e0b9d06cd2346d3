//! Capture controller scenarios against synthetic devices and a scripted encoder

use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use capture_deck::application::ports::{
    EncoderError, EncoderEvent, EncoderEvents, EncoderFactory, EncoderOptions, EncoderState,
    MediaEncoder, MediaStream, TrackKind, TrackState,
};
use capture_deck::application::{CaptureController, CapturePlatform, ObjectUrls, StartOutcome};
use capture_deck::domain::capture::{
    CaptureMode, CaptureSettings, CapturedFile, FileKind, ImageFormat, ImageSettings,
    RecorderStatus,
};
use capture_deck::domain::media::Size;
use capture_deck::infrastructure::{SkiaCanvasFactory, SummingAudioContextFactory, SyntheticDevices};
use tokio::sync::mpsc;
use tokio::time;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Script {
    /// One chunk on start, one on stop
    Normal,
    /// Never emits data
    Silent,
    /// Reports an error instead of stopping
    FailOnStop,
}

#[derive(Debug, Clone)]
struct Created {
    options: EncoderOptions,
    tracks: Vec<(TrackKind, String)>,
}

#[derive(Default)]
struct Log {
    created: Vec<Created>,
    calls: Vec<&'static str>,
}

struct ScriptedEncoder {
    script: Script,
    mime: String,
    state: EncoderState,
    events: Option<mpsc::UnboundedSender<EncoderEvent>>,
    log: Arc<Mutex<Log>>,
}

impl ScriptedEncoder {
    fn send(&self, event: EncoderEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    fn record(&self, call: &'static str) {
        self.log.lock().unwrap().calls.push(call);
    }
}

impl MediaEncoder for ScriptedEncoder {
    fn mime_type(&self) -> String {
        self.mime.clone()
    }

    fn state(&self) -> EncoderState {
        self.state
    }

    fn start(&mut self, _timeslice: StdDuration) -> Result<EncoderEvents, EncoderError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        self.state = EncoderState::Recording;
        self.record("start");
        if self.script != Script::Silent {
            self.send(EncoderEvent::Data(b"head".to_vec()));
        }
        Ok(rx)
    }

    fn pause(&mut self) -> Result<(), EncoderError> {
        self.state = EncoderState::Paused;
        self.record("pause");
        Ok(())
    }

    fn resume(&mut self) -> Result<(), EncoderError> {
        self.state = EncoderState::Recording;
        self.record("resume");
        Ok(())
    }

    fn stop(&mut self) -> Result<(), EncoderError> {
        self.state = EncoderState::Inactive;
        self.record("stop");
        match self.script {
            Script::Normal => {
                self.send(EncoderEvent::Data(b"tail".to_vec()));
                self.send(EncoderEvent::Stopped);
            }
            Script::Silent => self.send(EncoderEvent::Stopped),
            Script::FailOnStop => self.send(EncoderEvent::Error("disk full".to_string())),
        }
        Ok(())
    }
}

struct ScriptedEncoders {
    script: Script,
    supported: Vec<&'static str>,
    /// Format the encoders claim to produce, whatever was requested
    substitute: Option<&'static str>,
    log: Arc<Mutex<Log>>,
}

impl EncoderFactory for ScriptedEncoders {
    fn is_type_supported(&self, mime_type: &str) -> bool {
        self.supported.contains(&mime_type)
    }

    fn create(
        &self,
        stream: &MediaStream,
        options: EncoderOptions,
    ) -> Result<Box<dyn MediaEncoder>, EncoderError> {
        let tracks = stream
            .tracks()
            .iter()
            .map(|t| (t.kind(), t.label().to_string()))
            .collect();
        self.log.lock().unwrap().created.push(Created {
            options: options.clone(),
            tracks,
        });
        Ok(Box::new(ScriptedEncoder {
            script: self.script,
            mime: self
                .substitute
                .map(str::to_string)
                .unwrap_or(options.mime_type),
            state: EncoderState::Inactive,
            events: None,
            log: Arc::clone(&self.log),
        }))
    }
}

struct Harness {
    controller: CaptureController,
    devices: Arc<SyntheticDevices>,
    log: Arc<Mutex<Log>>,
    files: Arc<Mutex<Vec<CapturedFile>>>,
    urls: Arc<ObjectUrls>,
}

fn small_devices() -> SyntheticDevices {
    SyntheticDevices::new()
        .with_screen_size(Size::new(64, 36))
        .with_camera_size(Size::new(16, 12))
}

fn harness_with(devices: SyntheticDevices, script: Script) -> Harness {
    build_harness(devices, script, None)
}

fn build_harness(
    devices: SyntheticDevices,
    script: Script,
    substitute: Option<&'static str>,
) -> Harness {
    let devices = Arc::new(devices);
    let log = Arc::new(Mutex::new(Log::default()));
    let encoders = ScriptedEncoders {
        script,
        supported: vec![
            "video/webm;codecs=vp9,opus",
            "video/webm",
            "audio/webm;codecs=opus",
            "audio/webm",
        ],
        substitute,
        log: Arc::clone(&log),
    };
    let platform = CapturePlatform {
        devices: devices.clone(),
        encoders: Arc::new(encoders),
        canvases: Arc::new(SkiaCanvasFactory),
        audio: Arc::new(SummingAudioContextFactory),
    };
    let files = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&files);
    let urls = Arc::new(ObjectUrls::new());
    let controller = CaptureController::new(platform, Arc::clone(&urls), move |file| {
        sink.lock().unwrap().push(file);
    });
    Harness {
        controller,
        devices,
        log,
        files,
        urls,
    }
}

fn harness(devices: SyntheticDevices) -> Harness {
    harness_with(devices, Script::Normal)
}

fn settings(mode: CaptureMode, microphone: bool) -> CaptureSettings {
    let mut settings = CaptureSettings::for_mode(mode);
    settings.audio.microphone = microphone;
    settings
}

async fn wait_for_status(controller: &CaptureController, wanted: RecorderStatus) {
    let mut rx = controller.subscribe_status();
    time::timeout(StdDuration::from_secs(30), rx.wait_for(|s| *s == wanted))
        .await
        .expect("status not reached in time")
        .expect("controller dropped");
}

fn all_tracks_released(devices: &SyntheticDevices) -> bool {
    devices
        .issued_tracks()
        .iter()
        .all(|t| t.state() != TrackState::Live)
}

#[tokio::test(start_paused = true)]
async fn screen_recording_is_finalized_on_stop() {
    let h = harness(small_devices());

    let outcome = h
        .controller
        .start(settings(CaptureMode::ScreenVideo, false))
        .await
        .unwrap();
    assert_eq!(outcome, StartOutcome::Started);
    assert_eq!(h.controller.status(), RecorderStatus::Recording);

    time::sleep(StdDuration::from_millis(3100)).await;
    assert_eq!(h.controller.elapsed_secs(), 3);

    h.controller.stop().await.unwrap();
    wait_for_status(&h.controller, RecorderStatus::Stopped).await;

    let files = h.files.lock().unwrap();
    assert_eq!(files.len(), 1);
    let file = &files[0];
    assert_eq!(file.kind(), FileKind::Video);
    assert_eq!(file.blob().mime_type(), "video/webm;codecs=vp9,opus");
    assert_eq!(file.blob().data(), b"headtail");
    assert_eq!(file.duration_secs(), Some(3));
    assert!(file.name().ends_with(".webm"));
    assert!(h.urls.resolve(file.handle()).is_some());

    assert!(all_tracks_released(&h.devices));
    assert_eq!(h.log.lock().unwrap().calls, vec!["start", "stop"]);
}

#[tokio::test(start_paused = true)]
async fn start_while_recording_is_rejected() {
    let h = harness(small_devices());
    h.controller
        .start(settings(CaptureMode::ScreenVideo, false))
        .await
        .unwrap();

    let second = h
        .controller
        .start(settings(CaptureMode::AudioOnly, false))
        .await
        .unwrap();
    assert_eq!(second, StartOutcome::Rejected);
    assert_eq!(h.controller.status(), RecorderStatus::Recording);
    assert_eq!(h.log.lock().unwrap().created.len(), 1);

    h.controller.teardown().await;
}

#[tokio::test(start_paused = true)]
async fn start_while_acquiring_is_rejected() {
    let h = harness(small_devices().with_display_delay(StdDuration::from_secs(1)));

    let (first, (status_during, second)) = tokio::join!(
        h.controller.start(settings(CaptureMode::ScreenVideo, false)),
        async {
            time::sleep(StdDuration::from_millis(100)).await;
            let status = h.controller.status();
            let outcome = h
                .controller
                .start(settings(CaptureMode::AudioOnly, false))
                .await
                .unwrap();
            (status, outcome)
        }
    );

    assert_eq!(status_during, RecorderStatus::Acquiring);
    assert_eq!(second, StartOutcome::Rejected);
    assert_eq!(first.unwrap(), StartOutcome::Started);
    assert_eq!(h.controller.status(), RecorderStatus::Recording);

    let created = h.log.lock().unwrap().created.clone();
    assert_eq!(created.len(), 1);
    assert!(created[0]
        .tracks
        .iter()
        .all(|(kind, _)| *kind == TrackKind::Video));
    h.controller.teardown().await;
}

#[tokio::test(start_paused = true)]
async fn declined_prompt_returns_to_idle_without_error() {
    let h = harness(small_devices().declining_display());

    let outcome = h
        .controller
        .start(settings(CaptureMode::ScreenVideo, false))
        .await
        .unwrap();
    assert_eq!(outcome, StartOutcome::Cancelled);
    assert_eq!(h.controller.status(), RecorderStatus::Idle);
    assert!(h.controller.error().is_none());
    assert!(h.log.lock().unwrap().created.is_empty());
}

#[tokio::test(start_paused = true)]
async fn missing_microphone_is_fatal_for_audio_mode() {
    let h = harness(small_devices().without_microphone());

    let err = h
        .controller
        .start(settings(CaptureMode::AudioOnly, false))
        .await
        .unwrap_err();
    assert!(!err.is_cancellation());
    assert_eq!(h.controller.status(), RecorderStatus::Error);
    assert!(h.controller.error().is_some());

    // A new start is allowed after an error
    let h2 = harness(small_devices());
    assert_eq!(
        h2.controller
            .start(settings(CaptureMode::AudioOnly, false))
            .await
            .unwrap(),
        StartOutcome::Started
    );
    let created = h2.log.lock().unwrap().created.clone();
    assert_eq!(created[0].options.mime_type, "audio/webm;codecs=opus");
    assert_eq!(created[0].options.video_bits_per_second, None);
    h2.controller.teardown().await;
}

#[tokio::test(start_paused = true)]
async fn declined_microphone_cancels_audio_mode() {
    let h = harness(small_devices().declining_microphone());

    let outcome = h
        .controller
        .start(settings(CaptureMode::AudioOnly, false))
        .await
        .unwrap();
    assert_eq!(outcome, StartOutcome::Cancelled);
    assert_eq!(h.controller.status(), RecorderStatus::Idle);
    assert!(h.controller.error().is_none());
    assert!(h.log.lock().unwrap().created.is_empty());
    assert!(h.files.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn encoder_format_substitution_names_the_file() {
    let h = build_harness(small_devices(), Script::Normal, Some("video/mp4"));

    h.controller
        .start(settings(CaptureMode::ScreenVideo, false))
        .await
        .unwrap();
    time::sleep(StdDuration::from_millis(1100)).await;
    h.controller.stop().await.unwrap();
    wait_for_status(&h.controller, RecorderStatus::Stopped).await;

    let created = h.log.lock().unwrap().created.clone();
    assert_eq!(created[0].options.mime_type, "video/webm;codecs=vp9,opus");

    let files = h.files.lock().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].blob().mime_type(), "video/mp4");
    assert!(files[0].name().ends_with(".mp4"));
    assert_eq!(files[0].duration_secs(), Some(1));
}

#[tokio::test(start_paused = true)]
async fn missing_microphone_is_tolerated_for_screen_mode() {
    let h = harness(small_devices().without_microphone());

    let outcome = h
        .controller
        .start(settings(CaptureMode::ScreenVideo, true))
        .await
        .unwrap();
    assert_eq!(outcome, StartOutcome::Started);

    let created = h.log.lock().unwrap().created.clone();
    assert_eq!(created.len(), 1);
    assert!(created[0]
        .tracks
        .iter()
        .all(|(kind, _)| *kind == TrackKind::Video));
    h.controller.teardown().await;
}

#[tokio::test(start_paused = true)]
async fn screen_mode_with_microphone_encodes_both() {
    let h = harness(small_devices());
    h.controller
        .start(settings(CaptureMode::ScreenVideo, true))
        .await
        .unwrap();

    let created = h.log.lock().unwrap().created.clone();
    let kinds: Vec<TrackKind> = created[0].tracks.iter().map(|(k, _)| *k).collect();
    assert_eq!(kinds, vec![TrackKind::Video, TrackKind::Audio]);
    h.controller.teardown().await;
    assert!(all_tracks_released(&h.devices));
}

#[tokio::test(start_paused = true)]
async fn missing_camera_falls_back_to_screen_only() {
    let h = harness(small_devices().without_camera());

    let outcome = h
        .controller
        .start(settings(CaptureMode::ScreenAndCam, false))
        .await
        .unwrap();
    assert_eq!(outcome, StartOutcome::Started);

    let created = h.log.lock().unwrap().created.clone();
    assert_eq!(created[0].tracks.len(), 1);
    assert_eq!(created[0].tracks[0].1, "synthetic screen");
    h.controller.teardown().await;
}

#[tokio::test(start_paused = true)]
async fn screen_and_camera_are_composited_and_mixed() {
    let h = harness(small_devices());

    let outcome = h
        .controller
        .start(settings(CaptureMode::ScreenAndCam, true))
        .await
        .unwrap();
    assert_eq!(outcome, StartOutcome::Started);

    let created = h.log.lock().unwrap().created.clone();
    let tracks = &created[0].tracks;
    assert_eq!(tracks.len(), 2);
    assert_eq!(tracks[0].0, TrackKind::Video);
    assert_ne!(tracks[0].1, "synthetic screen");
    assert_eq!(tracks[1].0, TrackKind::Audio);

    h.controller.stop().await.unwrap();
    wait_for_status(&h.controller, RecorderStatus::Stopped).await;
    assert!(all_tracks_released(&h.devices));
    assert_eq!(h.files.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn platform_ending_the_screen_finalizes() {
    let h = harness(small_devices().display_ends_after(StdDuration::from_secs(2)));

    h.controller
        .start(settings(CaptureMode::ScreenVideo, false))
        .await
        .unwrap();
    wait_for_status(&h.controller, RecorderStatus::Stopped).await;

    let files = h.files.lock().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].duration_secs(), Some(2));
}

#[tokio::test(start_paused = true)]
async fn pause_freezes_elapsed_and_resume_continues() {
    let h = harness(small_devices());
    h.controller
        .start(settings(CaptureMode::ScreenVideo, false))
        .await
        .unwrap();

    time::sleep(StdDuration::from_millis(2100)).await;
    h.controller.pause().await.unwrap();
    assert_eq!(h.controller.status(), RecorderStatus::Paused);
    assert_eq!(h.controller.elapsed_secs(), 2);

    time::sleep(StdDuration::from_secs(5)).await;
    assert_eq!(h.controller.elapsed_secs(), 2);

    h.controller.resume().await.unwrap();
    assert_eq!(h.controller.status(), RecorderStatus::Recording);
    time::sleep(StdDuration::from_millis(1100)).await;
    assert_eq!(h.controller.elapsed_secs(), 3);

    // Pausing twice is an invalid transition
    h.controller.pause().await.unwrap();
    assert!(h.controller.pause().await.is_err());

    h.controller.stop().await.unwrap();
    wait_for_status(&h.controller, RecorderStatus::Stopped).await;
    assert_eq!(
        h.log.lock().unwrap().calls,
        vec!["start", "pause", "resume", "pause", "stop"]
    );
}

#[tokio::test(start_paused = true)]
async fn teardown_releases_everything() {
    let h = harness(small_devices());
    h.controller
        .start(settings(CaptureMode::ScreenAndCam, true))
        .await
        .unwrap();

    h.controller.teardown().await;
    assert_eq!(h.controller.status(), RecorderStatus::Idle);
    assert_eq!(h.controller.elapsed_secs(), 0);
    assert!(all_tracks_released(&h.devices));
    assert!(h.files.lock().unwrap().is_empty());

    // Idempotent
    h.controller.teardown().await;
    assert_eq!(h.controller.status(), RecorderStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn recording_without_data_produces_no_file() {
    let h = harness_with(small_devices(), Script::Silent);
    h.controller
        .start(settings(CaptureMode::ScreenVideo, false))
        .await
        .unwrap();

    h.controller.stop().await.unwrap();
    wait_for_status(&h.controller, RecorderStatus::Stopped).await;
    assert!(h.files.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn encoder_failure_sets_error() {
    let h = harness_with(small_devices(), Script::FailOnStop);
    h.controller
        .start(settings(CaptureMode::ScreenVideo, false))
        .await
        .unwrap();

    h.controller.stop().await.unwrap();
    wait_for_status(&h.controller, RecorderStatus::Error).await;
    let message = h.controller.error().unwrap();
    assert!(message.contains("disk full"), "got: {message}");
    assert!(h.files.lock().unwrap().is_empty());
    assert!(all_tracks_released(&h.devices));
}

#[tokio::test(start_paused = true)]
async fn screenshot_is_independent_of_recording() {
    let h = harness(small_devices());
    h.controller
        .start(settings(CaptureMode::ScreenVideo, false))
        .await
        .unwrap();

    let shot = h
        .controller
        .screenshot(ImageSettings::new(ImageFormat::Jpeg).with_quality(0.5))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(shot.kind(), FileKind::Image);
    assert_eq!(shot.blob().mime_type(), "image/jpeg");
    assert!(shot.name().ends_with(".jpeg"));
    assert_eq!(shot.duration_secs(), None);
    assert_eq!(h.controller.status(), RecorderStatus::Recording);
    assert_eq!(h.files.lock().unwrap().len(), 1);

    h.controller.teardown().await;
}

#[tokio::test(start_paused = true)]
async fn screenshot_mode_start_takes_a_screenshot() {
    let h = harness(small_devices());
    let outcome = h
        .controller
        .start(settings(CaptureMode::Screenshot, false))
        .await
        .unwrap();
    assert_eq!(outcome, StartOutcome::Screenshot);
    assert_eq!(h.controller.status(), RecorderStatus::Idle);
    assert_eq!(h.files.lock().unwrap()[0].kind(), FileKind::Image);
}

#[tokio::test(start_paused = true)]
async fn declined_screenshot_is_none() {
    let h = harness(small_devices().declining_display());
    let shot = h
        .controller
        .screenshot(ImageSettings::default())
        .await
        .unwrap();
    assert!(shot.is_none());
    assert!(h.controller.error().is_none());
}
