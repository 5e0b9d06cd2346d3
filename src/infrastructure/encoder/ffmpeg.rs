//! FFmpeg subprocess encoder
//!
//! Raw frames (RGBA) or samples (f32le) are written to FFmpeg's stdin and a
//! streamable container is read back from stdout, then cut into chunks every
//! timeslice. When a video stream also carries audio, the samples go over a
//! loopback socket as a second FFmpeg input. Closing the inputs finalizes the
//! container.

use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration as StdDuration;

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::application::ports::{
    EncoderError, EncoderEvent, EncoderEvents, EncoderFactory, EncoderOptions, EncoderState,
    MediaEncoder, MediaStream, MediaTrack,
};
use crate::domain::capture::settings::DEFAULT_FRAME_RATE;
use crate::domain::media::mime::{codecs, essence};
use crate::domain::media::{AudioChunk, Size, VideoFrame};

const READ_BUFFER: usize = 64 * 1024;
/// How long a video session waits for its audio track before going silent
const AUDIO_PRIME_TIMEOUT: StdDuration = StdDuration::from_secs(2);
/// How long FFmpeg gets to connect to the audio socket
const AUDIO_CONNECT_TIMEOUT: StdDuration = StdDuration::from_secs(10);

/// Container and encoders for one output format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPlan {
    pub muxer: &'static str,
    pub video_encoder: Option<&'static str>,
    pub audio_encoder: &'static str,
}

impl OutputPlan {
    /// Map a format string onto FFmpeg muxer and encoder names
    pub fn for_format(format: &str) -> Option<Self> {
        let tokens = codecs(format);
        let video = tokens.iter().find_map(|t| video_encoder(t));
        let audio = tokens.iter().find_map(|t| audio_encoder(t));
        // Unknown tokens make the whole format unsupported
        if tokens
            .iter()
            .any(|t| video_encoder(t).is_none() && audio_encoder(t).is_none())
        {
            return None;
        }

        let plan = match essence(format).to_lowercase().as_str() {
            "video/webm" => Self {
                muxer: "webm",
                video_encoder: Some(video.unwrap_or("libvpx")),
                audio_encoder: audio.unwrap_or("libopus"),
            },
            "video/x-matroska" => Self {
                muxer: "matroska",
                video_encoder: Some(video.unwrap_or("libx264")),
                audio_encoder: audio.unwrap_or("libopus"),
            },
            "video/mp4" => Self {
                muxer: "mp4",
                video_encoder: Some(video.unwrap_or("libx264")),
                audio_encoder: audio.unwrap_or("aac"),
            },
            "audio/webm" => Self {
                muxer: "webm",
                video_encoder: None,
                audio_encoder: audio.unwrap_or("libopus"),
            },
            "audio/ogg" => Self {
                muxer: "ogg",
                video_encoder: None,
                audio_encoder: audio.unwrap_or("libopus"),
            },
            "audio/mp4" => Self {
                muxer: "mp4",
                video_encoder: None,
                audio_encoder: audio.unwrap_or("aac"),
            },
            _ => return None,
        };

        // The WebM muxer only takes VP8, VP9 and AV1 with Opus
        if plan.muxer == "webm"
            && (plan.video_encoder == Some("libx264") || plan.audio_encoder == "aac")
        {
            return None;
        }
        Some(plan)
    }

    /// Encoder names that must be available
    pub fn required_encoders(&self) -> impl Iterator<Item = &'static str> {
        self.video_encoder.into_iter().chain([self.audio_encoder])
    }
}

fn video_encoder(token: &str) -> Option<&'static str> {
    if token.starts_with("avc1") || token == "h264" {
        Some("libx264")
    } else if token == "vp9" || token.starts_with("vp09") {
        Some("libvpx-vp9")
    } else if token == "vp8" {
        Some("libvpx")
    } else if token == "av1" || token.starts_with("av01") {
        Some("libaom-av1")
    } else {
        None
    }
}

fn audio_encoder(token: &str) -> Option<&'static str> {
    if token == "opus" {
        Some("libopus")
    } else if token == "aac" || token.starts_with("mp4a") {
        Some("aac")
    } else {
        None
    }
}

/// Encoder names from `ffmpeg -encoders` output
pub fn parse_encoder_list(output: &str) -> HashSet<String> {
    output
        .lines()
        .skip_while(|line| !line.trim_start().starts_with("------"))
        .skip(1)
        .filter_map(|line| line.split_whitespace().nth(1))
        .map(str::to_string)
        .collect()
}

/// What gets fed to FFmpeg
#[derive(Debug, Clone, PartialEq)]
pub enum InputFormat {
    Video {
        size: Size,
        frame_rate: u32,
    },
    Audio {
        sample_rate: u32,
        channels: u16,
    },
    /// Video on stdin, audio read from `audio_url`
    VideoWithAudio {
        size: Size,
        frame_rate: u32,
        sample_rate: u32,
        channels: u16,
        audio_url: String,
    },
}

/// Full FFmpeg command line for one session
pub fn build_ffmpeg_args(
    plan: &OutputPlan,
    input: InputFormat,
    options: &EncoderOptions,
) -> Vec<String> {
    let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error", "-nostats"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    match input {
        InputFormat::Video { size, frame_rate } => {
            push_video_input(&mut args, size, frame_rate);
            push_video_output(&mut args, plan, options);
        }
        InputFormat::Audio {
            sample_rate,
            channels,
        } => {
            push_audio_input(&mut args, sample_rate, channels, "pipe:0");
            push_audio_output(&mut args, plan, options);
        }
        InputFormat::VideoWithAudio {
            size,
            frame_rate,
            sample_rate,
            channels,
            audio_url,
        } => {
            push_video_input(&mut args, size, frame_rate);
            push_audio_input(&mut args, sample_rate, channels, &audio_url);
            args.extend(["-map", "0:v", "-map", "1:a"].map(String::from));
            push_video_output(&mut args, plan, options);
            push_audio_output(&mut args, plan, options);
        }
    }

    args.extend(["-f".into(), plan.muxer.into()]);
    if plan.muxer == "mp4" {
        // Fragmented so the output can be streamed from a pipe
        args.extend([
            "-movflags".into(),
            "frag_keyframe+empty_moov+default_base_moof".into(),
        ]);
    }
    args.push("pipe:1".into());
    args
}

fn push_video_input(args: &mut Vec<String>, size: Size, frame_rate: u32) {
    args.extend([
        "-f".into(),
        "rawvideo".into(),
        "-pix_fmt".into(),
        "rgba".into(),
        "-s".into(),
        format!("{}x{}", size.width, size.height),
        "-r".into(),
        frame_rate.to_string(),
        "-i".into(),
        "pipe:0".into(),
    ]);
}

fn push_audio_input(args: &mut Vec<String>, sample_rate: u32, channels: u16, url: &str) {
    args.extend([
        "-f".into(),
        "f32le".into(),
        "-ar".into(),
        sample_rate.to_string(),
        "-ac".into(),
        channels.to_string(),
        "-i".into(),
        url.into(),
    ]);
}

fn push_video_output(args: &mut Vec<String>, plan: &OutputPlan, options: &EncoderOptions) {
    args.extend([
        // 4:2:0 needs even dimensions
        "-vf".into(),
        "scale=trunc(iw/2)*2:trunc(ih/2)*2".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
    ]);
    let encoder = plan.video_encoder.unwrap_or("libvpx");
    args.extend(["-c:v".into(), encoder.into()]);
    args.extend(realtime_flags(encoder).iter().map(|s| s.to_string()));
    if let Some(bps) = options.video_bits_per_second {
        args.extend(["-b:v".into(), bps.to_string()]);
    }
}

fn push_audio_output(args: &mut Vec<String>, plan: &OutputPlan, options: &EncoderOptions) {
    args.extend(["-c:a".into(), plan.audio_encoder.into()]);
    if let Some(bps) = options.audio_bits_per_second {
        args.extend(["-b:a".into(), bps.to_string()]);
    }
}

fn realtime_flags(encoder: &str) -> &'static [&'static str] {
    match encoder {
        "libx264" => &["-preset", "veryfast", "-tune", "zerolatency"],
        "libvpx" | "libvpx-vp9" => &["-deadline", "realtime", "-cpu-used", "8"],
        "libaom-av1" => &["-cpu-used", "8", "-row-mt", "1"],
        _ => &[],
    }
}

/// Scale `frame` to fit inside `size`, centred on opaque black
pub fn letterbox(frame: &VideoFrame, size: Size) -> Vec<u8> {
    let mut canvas = RgbaImage::from_pixel(size.width, size.height, Rgba([0, 0, 0, 255]));
    let src = frame.size();
    if src.is_empty() || size.is_empty() {
        return canvas.into_raw();
    }
    let Some(image) = RgbaImage::from_raw(src.width, src.height, frame.data().to_vec()) else {
        return canvas.into_raw();
    };

    let scale = (size.width as f64 / src.width as f64).min(size.height as f64 / src.height as f64);
    let width = ((src.width as f64 * scale).round() as u32).clamp(1, size.width);
    let height = ((src.height as f64 * scale).round() as u32).clamp(1, size.height);
    let scaled = imageops::resize(&image, width, height, FilterType::Triangle);
    let x = (size.width - width) / 2;
    let y = (size.height - height) / 2;
    imageops::replace(&mut canvas, &scaled, x as i64, y as i64);
    canvas.into_raw()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Running,
    Paused,
    Stopping,
}

/// Where raw media comes from
enum Source {
    Video {
        frames: watch::Receiver<Option<VideoFrame>>,
        audio: Option<broadcast::Receiver<AudioChunk>>,
    },
    Audio(broadcast::Receiver<AudioChunk>),
}

impl Source {
    fn from_stream(stream: &MediaStream) -> Result<(Self, MediaTrack), EncoderError> {
        if let Some(track) = stream.first_video() {
            let frames = track.frames().ok_or(EncoderError::NoTracks)?;
            let audio = stream.first_audio().and_then(MediaTrack::subscribe_audio);
            return Ok((Self::Video { frames, audio }, track.clone()));
        }
        if let Some(track) = stream.first_audio() {
            let chunks = track.subscribe_audio().ok_or(EncoderError::NoTracks)?;
            return Ok((Self::Audio(chunks), track.clone()));
        }
        Err(EncoderError::NoTracks)
    }
}

/// Creates [`FfmpegEncoder`]s for formats the local FFmpeg can produce
pub struct FfmpegEncoderFactory {
    program: PathBuf,
    /// `None` when FFmpeg could not be run
    encoders: Option<HashSet<String>>,
}

impl FfmpegEncoderFactory {
    /// Probe the `ffmpeg` on `PATH` for its encoders
    pub fn detect() -> Self {
        Self::detect_program("ffmpeg")
    }

    pub fn detect_program(program: impl Into<PathBuf>) -> Self {
        let program = program.into();
        let encoders = std::process::Command::new(&program)
            .args(["-hide_banner", "-encoders"])
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .ok()
            .filter(|out| out.status.success())
            .map(|out| parse_encoder_list(&String::from_utf8_lossy(&out.stdout)));

        match &encoders {
            Some(list) => debug!(count = list.len(), "FFmpeg encoders detected"),
            None => warn!(program = %program.display(), "FFmpeg is not available"),
        }
        Self { program, encoders }
    }

    /// Factory with a known encoder list, skipping the probe
    pub fn with_encoders<I, S>(program: impl Into<PathBuf>, encoders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            encoders: Some(encoders.into_iter().map(Into::into).collect()),
        }
    }

    pub fn is_available(&self) -> bool {
        self.encoders.is_some()
    }

    fn has_encoders(&self, plan: &OutputPlan) -> bool {
        self.encoders
            .as_ref()
            .is_some_and(|list| plan.required_encoders().all(|e| list.contains(e)))
    }
}

impl EncoderFactory for FfmpegEncoderFactory {
    fn is_type_supported(&self, mime_type: &str) -> bool {
        OutputPlan::for_format(mime_type).is_some_and(|plan| self.has_encoders(&plan))
    }

    fn create(
        &self,
        stream: &MediaStream,
        options: EncoderOptions,
    ) -> Result<Box<dyn MediaEncoder>, EncoderError> {
        if !self.is_available() {
            return Err(EncoderError::FfmpegNotFound);
        }

        let (source, track) = Source::from_stream(stream)?;
        let mime_type = if options.mime_type.trim().is_empty() {
            match source {
                Source::Video { .. } => "video/webm".to_string(),
                Source::Audio(_) => "audio/webm".to_string(),
            }
        } else {
            options.mime_type.trim().to_string()
        };

        let plan = OutputPlan::for_format(&mime_type)
            .filter(|plan| self.has_encoders(plan))
            .ok_or_else(|| EncoderError::UnsupportedFormat(mime_type.clone()))?;

        debug!(format = %mime_type, track = track.label(), ?plan, "Encoder created");
        Ok(Box::new(FfmpegEncoder {
            program: self.program.clone(),
            mime_type,
            plan,
            options,
            source: Some(source),
            state: EncoderState::Inactive,
            control: None,
        }))
    }
}

/// One FFmpeg process bound to one track
pub struct FfmpegEncoder {
    program: PathBuf,
    mime_type: String,
    plan: OutputPlan,
    options: EncoderOptions,
    source: Option<Source>,
    state: EncoderState,
    control: Option<watch::Sender<Control>>,
}

impl FfmpegEncoder {
    fn invalid(&self, action: &str) -> EncoderError {
        EncoderError::InvalidState {
            state: self.state,
            action: action.to_string(),
        }
    }

    fn signal(&self, control: Control) {
        if let Some(tx) = &self.control {
            tx.send_replace(control);
        }
    }
}

impl MediaEncoder for FfmpegEncoder {
    fn mime_type(&self) -> String {
        self.mime_type.clone()
    }

    fn state(&self) -> EncoderState {
        self.state
    }

    fn start(&mut self, timeslice: StdDuration) -> Result<EncoderEvents, EncoderError> {
        if self.state != EncoderState::Inactive {
            return Err(self.invalid("start"));
        }
        let source = self.source.take().ok_or_else(|| self.invalid("restart"))?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (control_tx, control_rx) = watch::channel(Control::Running);
        let session = EncodeSession {
            program: self.program.clone(),
            plan: self.plan.clone(),
            options: self.options.clone(),
            timeslice: timeslice.max(StdDuration::from_millis(10)),
            control: control_rx,
            events: events_tx,
        };
        tokio::spawn(session.run(source));

        self.control = Some(control_tx);
        self.state = EncoderState::Recording;
        info!(format = %self.mime_type, "Encoder started");
        Ok(events_rx)
    }

    fn pause(&mut self) -> Result<(), EncoderError> {
        if self.state != EncoderState::Recording {
            return Err(self.invalid("pause"));
        }
        self.signal(Control::Paused);
        self.state = EncoderState::Paused;
        Ok(())
    }

    fn resume(&mut self) -> Result<(), EncoderError> {
        if self.state != EncoderState::Paused {
            return Err(self.invalid("resume"));
        }
        self.signal(Control::Running);
        self.state = EncoderState::Recording;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), EncoderError> {
        if self.state == EncoderState::Inactive {
            return Err(self.invalid("stop"));
        }
        self.signal(Control::Stopping);
        self.state = EncoderState::Inactive;
        debug!("Encoder stop requested");
        Ok(())
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        self.signal(Control::Stopping);
    }
}

struct EncodeSession {
    program: PathBuf,
    plan: OutputPlan,
    options: EncoderOptions,
    timeslice: StdDuration,
    control: watch::Receiver<Control>,
    events: mpsc::UnboundedSender<EncoderEvent>,
}

/// An audio subscription plus its first chunk, which fixes the sample format
struct PrimedAudio {
    chunks: broadcast::Receiver<AudioChunk>,
    first: AudioChunk,
}

/// Source plus the first piece of media, which fixes the input format
enum Primed {
    Video {
        frames: watch::Receiver<Option<VideoFrame>>,
        size: Size,
        audio: Option<PrimedAudio>,
    },
    Audio(PrimedAudio),
}

impl Primed {
    fn input_format(&self, audio_url: Option<String>) -> InputFormat {
        match (self, audio_url) {
            (
                Primed::Video {
                    size,
                    audio: Some(audio),
                    ..
                },
                Some(audio_url),
            ) => InputFormat::VideoWithAudio {
                size: *size,
                frame_rate: DEFAULT_FRAME_RATE,
                sample_rate: audio.first.sample_rate,
                channels: audio.first.channels,
                audio_url,
            },
            (Primed::Video { size, .. }, _) => InputFormat::Video {
                size: *size,
                frame_rate: DEFAULT_FRAME_RATE,
            },
            (Primed::Audio(audio), _) => InputFormat::Audio {
                sample_rate: audio.first.sample_rate,
                channels: audio.first.channels,
            },
        }
    }
}

impl EncodeSession {
    async fn run(mut self, source: Source) {
        let Some(primed) = self.prime(source).await else {
            // Stopped before any media arrived
            let _ = self.events.send(EncoderEvent::Stopped);
            return;
        };

        let event = match self.encode(primed).await {
            Ok(event) => event,
            Err(e) => EncoderEvent::Error(e.to_string()),
        };
        let _ = self.events.send(event);
    }

    /// Run FFmpeg until its output ends and describe how it finished
    async fn encode(&self, primed: Primed) -> Result<EncoderEvent, EncoderError> {
        let listener = match &primed {
            Primed::Video { audio: Some(_), .. } => Some(
                TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
                    .await
                    .map_err(|e| EncoderError::StartFailed(format!("audio input socket: {}", e)))?,
            ),
            _ => None,
        };
        let audio_url = match &listener {
            Some(listener) => {
                let addr = listener
                    .local_addr()
                    .map_err(|e| EncoderError::StartFailed(format!("audio input socket: {}", e)))?;
                Some(format!("tcp://{}", addr))
            }
            None => None,
        };

        let input = primed.input_format(audio_url);
        let args = build_ffmpeg_args(&self.plan, input.clone(), &self.options);
        let mut child = self.spawn_ffmpeg(&args)?;
        debug!(?input, "FFmpeg spawned");

        let (Some(stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            return Err(EncoderError::StartFailed("FFmpeg pipes unavailable".into()));
        };

        let mut feeders: Vec<JoinHandle<()>> = Vec::new();
        match primed {
            Primed::Video {
                frames,
                size,
                audio,
            } => {
                feeders.push(tokio::spawn(feed_video(
                    stdin,
                    frames,
                    size,
                    self.control.clone(),
                )));
                if let (Some(audio), Some(listener)) = (audio, listener) {
                    feeders.push(tokio::spawn(feed_audio_socket(
                        listener,
                        audio,
                        self.control.clone(),
                    )));
                }
            }
            Primed::Audio(audio) => {
                feeders.push(tokio::spawn(feed_audio(stdin, audio, self.control.clone())));
            }
        }
        let stderr_task = tokio::spawn(read_all(stderr));

        let read_result = self.pump_output(stdout).await;
        for feeder in &feeders {
            feeder.abort();
        }

        let status = child.wait().await;
        let stderr = stderr_task.await.unwrap_or_default();

        Ok(match (read_result, status) {
            (Err(e), _) => EncoderEvent::Error(format!("Failed to read FFmpeg output: {}", e)),
            (Ok(()), Ok(status)) if status.success() => EncoderEvent::Stopped,
            (Ok(()), Ok(_)) => EncoderEvent::Error(format!(
                "FFmpeg exited with error: {}",
                stderr.lines().last().unwrap_or("unknown error")
            )),
            (Ok(()), Err(e)) => EncoderEvent::Error(format!("FFmpeg failed: {}", e)),
        })
    }

    /// Wait for the first frame or chunk, or `None` if stopped first
    async fn prime(&mut self, source: Source) -> Option<Primed> {
        match source {
            Source::Video { mut frames, audio } => {
                let size = tokio::select! {
                    frame = frames.wait_for(Option::is_some) => {
                        (*frame.ok()?).as_ref().map(VideoFrame::size)?
                    }
                    _ = wait_for_stop(&mut self.control) => return None,
                };

                let audio = match audio {
                    // Drop whatever was captured before the first frame
                    Some(chunks) => {
                        let primed = self
                            .first_chunk(chunks.resubscribe(), Some(AUDIO_PRIME_TIMEOUT))
                            .await;
                        if *self.control.borrow() == Control::Stopping {
                            return None;
                        }
                        if primed.is_none() {
                            warn!("No audio arrived, recording video only");
                        }
                        primed
                    }
                    None => None,
                };
                Some(Primed::Video {
                    frames,
                    size,
                    audio,
                })
            }
            Source::Audio(chunks) => self.first_chunk(chunks, None).await.map(Primed::Audio),
        }
    }

    /// First audio chunk, or `None` on stop, on a closed track or after `timeout`
    async fn first_chunk(
        &mut self,
        mut chunks: broadcast::Receiver<AudioChunk>,
        timeout: Option<StdDuration>,
    ) -> Option<PrimedAudio> {
        let expired = async {
            match timeout {
                Some(timeout) => time::sleep(timeout).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(expired);

        loop {
            tokio::select! {
                chunk = chunks.recv() => match chunk {
                    Ok(first) => return Some(PrimedAudio { chunks, first }),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => return None,
                },
                _ = wait_for_stop(&mut self.control) => return None,
                _ = &mut expired => return None,
            }
        }
    }

    fn spawn_ffmpeg(&self, args: &[String]) -> Result<Child, EncoderError> {
        Command::new(&self.program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EncoderError::FfmpegNotFound
                } else {
                    EncoderError::StartFailed(e.to_string())
                }
            })
    }

    /// Read the container until EOF, emitting one chunk per timeslice
    async fn pump_output(&self, mut stdout: tokio::process::ChildStdout) -> std::io::Result<()> {
        let mut flush = time::interval(self.timeslice);
        flush.set_missed_tick_behavior(MissedTickBehavior::Delay);
        flush.tick().await;

        let mut buf = vec![0u8; READ_BUFFER];
        let mut pending = Vec::new();
        loop {
            tokio::select! {
                read = stdout.read(&mut buf) => match read? {
                    0 => break,
                    n => pending.extend_from_slice(&buf[..n]),
                },
                _ = flush.tick() => {
                    if !pending.is_empty() {
                        let _ = self.events.send(EncoderEvent::Data(std::mem::take(&mut pending)));
                    }
                }
            }
        }
        if !pending.is_empty() {
            let _ = self.events.send(EncoderEvent::Data(pending));
        }
        Ok(())
    }
}

async fn wait_for_stop(control: &mut watch::Receiver<Control>) {
    // A dropped sender means the encoder itself is gone
    let _ = control.wait_for(|c| *c == Control::Stopping).await;
}

async fn read_all(mut stderr: tokio::process::ChildStderr) -> String {
    let mut buf = Vec::new();
    let _ = stderr.read_to_end(&mut buf).await;
    String::from_utf8_lossy(&buf).into_owned()
}

fn f32le_bytes(samples: &[f32]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Write frames at the input frame rate until stopped. Frames whose size no
/// longer matches the input are letterboxed to it.
async fn feed_video(
    mut sink: ChildStdin,
    mut frames: watch::Receiver<Option<VideoFrame>>,
    size: Size,
    mut control: watch::Receiver<Control>,
) {
    let period = StdDuration::from_secs_f64(1.0 / DEFAULT_FRAME_RATE as f64);
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut fitted: Option<Vec<u8>> = None;
    let mut warned = false;
    loop {
        tokio::select! {
            _ = wait_for_stop(&mut control) => break,
            _ = ticker.tick() => {
                if *control.borrow() == Control::Paused {
                    continue;
                }
                let fresh = frames.has_changed().unwrap_or(false);
                let Some(frame) = frames.borrow_and_update().clone() else {
                    continue;
                };
                let written = if frame.size() == size {
                    sink.write_all(frame.data()).await
                } else {
                    if !warned {
                        warn!(expected = ?size, got = ?frame.size(), "Frame size changed, letterboxing");
                        warned = true;
                    }
                    if fresh || fitted.is_none() {
                        fitted = Some(letterbox(&frame, size));
                    }
                    match &fitted {
                        Some(data) => sink.write_all(data).await,
                        None => continue,
                    }
                };
                if written.is_err() {
                    break;
                }
            }
        }
    }
    let _ = sink.shutdown().await;
    debug!("Video input closed");
}

/// Write samples as they arrive until stopped; dropping the sink ends the input
async fn feed_audio<W>(mut sink: W, audio: PrimedAudio, mut control: watch::Receiver<Control>)
where
    W: AsyncWrite + Unpin,
{
    let PrimedAudio { mut chunks, first } = audio;
    if sink.write_all(&f32le_bytes(first.samples())).await.is_err() {
        return;
    }
    loop {
        tokio::select! {
            _ = wait_for_stop(&mut control) => break,
            chunk = chunks.recv() => match chunk {
                Ok(chunk) => {
                    if *control.borrow() == Control::Paused {
                        continue;
                    }
                    if sink.write_all(&f32le_bytes(chunk.samples())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Encoder input lagged");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    let _ = sink.shutdown().await;
    debug!("Audio input closed");
}

/// Serve the audio input to FFmpeg once it connects
async fn feed_audio_socket(
    listener: TcpListener,
    audio: PrimedAudio,
    control: watch::Receiver<Control>,
) {
    match time::timeout(AUDIO_CONNECT_TIMEOUT, listener.accept()).await {
        Ok(Ok((socket, peer))) => {
            debug!(%peer, "FFmpeg connected for audio");
            let _ = socket.set_nodelay(true);
            feed_audio(socket, audio, control).await;
        }
        Ok(Err(e)) => warn!(error = %e, "Audio input connection failed"),
        Err(_) => warn!("FFmpeg never connected for audio"),
    }
}
