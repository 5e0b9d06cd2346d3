//! Capture settings value objects

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::SettingsParseError;

/// What a session captures.
///
/// Every component that behaves differently per mode matches on this enum
/// exhaustively, so a new mode cannot be added without visiting each of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureMode {
    Screenshot,
    #[default]
    ScreenVideo,
    AudioOnly,
    ScreenAndCam,
}

impl CaptureMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Screenshot => "screenshot",
            Self::ScreenVideo => "screen",
            Self::AudioOnly => "audio",
            Self::ScreenAndCam => "screen-cam",
        }
    }

    /// Whether the mode produces an encoded recording (as opposed to a still)
    pub const fn is_recording(&self) -> bool {
        match self {
            Self::Screenshot => false,
            Self::ScreenVideo | Self::AudioOnly | Self::ScreenAndCam => true,
        }
    }

    pub const fn is_audio_only(&self) -> bool {
        matches!(self, Self::AudioOnly)
    }
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CaptureMode {
    type Err = SettingsParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "screenshot" => Ok(Self::Screenshot),
            "screen" | "screen-video" => Ok(Self::ScreenVideo),
            "audio" | "audio-only" => Ok(Self::AudioOnly),
            "screen-cam" | "screen-and-cam" => Ok(Self::ScreenAndCam),
            _ => Err(SettingsParseError::new(
                "mode",
                s,
                "screenshot, screen, audio, screen-cam",
            )),
        }
    }
}

/// Requested capture resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Resolution {
    /// Whatever the source delivers
    #[default]
    Native,
    Hd720,
    FullHd1080,
    Qhd1440,
    Uhd2160,
}

impl Resolution {
    /// Ideal (width, height), or `None` for native
    pub const fn dimensions(&self) -> Option<(u32, u32)> {
        match self {
            Self::Native => None,
            Self::Hd720 => Some((1280, 720)),
            Self::FullHd1080 => Some((1920, 1080)),
            Self::Qhd1440 => Some((2560, 1440)),
            Self::Uhd2160 => Some((3840, 2160)),
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Hd720 => "720p",
            Self::FullHd1080 => "1080p",
            Self::Qhd1440 => "1440p",
            Self::Uhd2160 => "2160p",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = SettingsParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "native" => Ok(Self::Native),
            "720p" | "hd" => Ok(Self::Hd720),
            "1080p" | "fullhd" => Ok(Self::FullHd1080),
            "1440p" | "qhd" => Ok(Self::Qhd1440),
            "2160p" | "4k" => Ok(Self::Uhd2160),
            _ => Err(SettingsParseError::new(
                "resolution",
                s,
                "native, 720p, 1080p, 1440p, 2160p",
            )),
        }
    }
}

/// Preferred video container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VideoContainer {
    /// The maximally compatible container
    Mp4,
    #[default]
    Webm,
    Matroska,
}

impl VideoContainer {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Webm => "webm",
            Self::Matroska => "mkv",
        }
    }
}

impl fmt::Display for VideoContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VideoContainer {
    type Err = SettingsParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mp4" => Ok(Self::Mp4),
            "webm" => Ok(Self::Webm),
            "mkv" | "matroska" => Ok(Self::Matroska),
            _ => Err(SettingsParseError::new("container", s, "mp4, webm, mkv")),
        }
    }
}

/// Preferred video codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VideoCodec {
    H264,
    Vp8,
    #[default]
    Vp9,
    Av1,
}

impl VideoCodec {
    /// Codec token as it appears in a `codecs=` parameter
    pub const fn codec_token(&self) -> &'static str {
        match self {
            Self::H264 => "h264",
            Self::Vp8 => "vp8",
            Self::Vp9 => "vp9",
            Self::Av1 => "av1",
        }
    }

    pub const fn as_str(&self) -> &'static str {
        self.codec_token()
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VideoCodec {
    type Err = SettingsParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "h264" | "avc" | "avc1" => Ok(Self::H264),
            "vp8" => Ok(Self::Vp8),
            "vp9" => Ok(Self::Vp9),
            "av1" | "av01" => Ok(Self::Av1),
            _ => Err(SettingsParseError::new("video_codec", s, "h264, vp8, vp9, av1")),
        }
    }
}

/// Preferred audio codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AudioCodec {
    #[default]
    Opus,
    Aac,
}

impl AudioCodec {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Opus => "opus",
            Self::Aac => "aac",
        }
    }
}

impl fmt::Display for AudioCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AudioCodec {
    type Err = SettingsParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "opus" => Ok(Self::Opus),
            "aac" | "mp4a" => Ok(Self::Aac),
            _ => Err(SettingsParseError::new("audio_codec", s, "opus, aac")),
        }
    }
}

/// Still image format for screenshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ImageFormat {
    #[default]
    Png,
    Jpeg,
    Webp,
}

impl ImageFormat {
    pub const fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
        }
    }

    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Webp => "webp",
        }
    }

    /// Whether the format takes a quality parameter
    pub const fn is_lossy(&self) -> bool {
        matches!(self, Self::Jpeg)
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl FromStr for ImageFormat {
    type Err = SettingsParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "webp" => Ok(Self::Webp),
            _ => Err(SettingsParseError::new("image_format", s, "png, jpeg, webp")),
        }
    }
}

pub const DEFAULT_FRAME_RATE: u32 = 30;
pub const DEFAULT_VIDEO_BITRATE: u32 = 5_000_000;
pub const DEFAULT_AUDIO_BITRATE: u32 = 128_000;
pub const DEFAULT_JPEG_QUALITY: f32 = 0.92;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSettings {
    pub resolution: Resolution,
    pub frame_rate: u32,
    /// Bits per second
    pub bitrate: u32,
    pub container: VideoContainer,
    pub codec: VideoCodec,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            resolution: Resolution::default(),
            frame_rate: DEFAULT_FRAME_RATE,
            bitrate: DEFAULT_VIDEO_BITRATE,
            container: VideoContainer::default(),
            codec: VideoCodec::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSettings {
    /// Record the microphone alongside the screen
    pub microphone: bool,
    /// Ask the display capture for system audio.
    /// Independent of `microphone`; never triggers a microphone request.
    pub system_audio: bool,
    pub codec: AudioCodec,
    /// Bits per second
    pub bitrate: u32,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            microphone: false,
            system_audio: false,
            codec: AudioCodec::default(),
            bitrate: DEFAULT_AUDIO_BITRATE,
        }
    }
}

/// Screenshot encoding options. Also the partial settings accepted by
/// a standalone screenshot request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageSettings {
    pub format: ImageFormat,
    /// 0.0 - 1.0, only used by lossy formats
    pub quality: f32,
}

impl ImageSettings {
    pub fn new(format: ImageFormat) -> Self {
        Self {
            format,
            ..Default::default()
        }
    }

    pub fn with_quality(mut self, quality: f32) -> Self {
        self.quality = quality.clamp(0.0, 1.0);
        self
    }
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            format: ImageFormat::default(),
            quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

/// Immutable per-session configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureSettings {
    pub mode: CaptureMode,
    pub video: VideoSettings,
    pub audio: AudioSettings,
    pub image: ImageSettings,
    /// Camera to use in screen-and-cam mode (`None` = default camera)
    pub camera_device_id: Option<String>,
}

impl CaptureSettings {
    pub fn for_mode(mode: CaptureMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }
}
