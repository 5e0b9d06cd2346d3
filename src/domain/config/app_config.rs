//! Application configuration value object

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::capture::settings::{
    DEFAULT_AUDIO_BITRATE, DEFAULT_FRAME_RATE, DEFAULT_JPEG_QUALITY, DEFAULT_VIDEO_BITRATE,
};
use crate::domain::capture::{
    AudioCodec, AudioSettings, CaptureMode, CaptureSettings, ImageFormat, ImageSettings,
    Resolution, VideoCodec, VideoContainer, VideoSettings,
};

/// Application configuration.
/// All fields are optional to support partial configs and merging.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub output_dir: Option<String>,
    pub mode: Option<String>,
    pub resolution: Option<String>,
    pub frame_rate: Option<u32>,
    pub video_bitrate: Option<u32>,
    pub container: Option<String>,
    pub video_codec: Option<String>,
    pub microphone: Option<bool>,
    pub system_audio: Option<bool>,
    pub audio_codec: Option<String>,
    pub audio_bitrate: Option<u32>,
    pub image_format: Option<String>,
    pub jpeg_quality: Option<f32>,
    pub camera_device: Option<String>,
}

impl AppConfig {
    /// Create config with default values
    pub fn defaults() -> Self {
        Self {
            output_dir: None,
            mode: Some(CaptureMode::default().to_string()),
            resolution: Some(Resolution::default().to_string()),
            frame_rate: Some(DEFAULT_FRAME_RATE),
            video_bitrate: Some(DEFAULT_VIDEO_BITRATE),
            container: Some(VideoContainer::default().to_string()),
            video_codec: Some(VideoCodec::default().to_string()),
            microphone: Some(false),
            system_audio: Some(false),
            audio_codec: Some(AudioCodec::default().to_string()),
            audio_bitrate: Some(DEFAULT_AUDIO_BITRATE),
            image_format: Some(ImageFormat::default().to_string()),
            jpeg_quality: Some(DEFAULT_JPEG_QUALITY),
            camera_device: None,
        }
    }

    /// Create an empty config (all None)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merge this config with another, where other takes precedence.
    /// Only non-None values from other will override this.
    pub fn merge(self, other: Self) -> Self {
        Self {
            output_dir: other.output_dir.or(self.output_dir),
            mode: other.mode.or(self.mode),
            resolution: other.resolution.or(self.resolution),
            frame_rate: other.frame_rate.or(self.frame_rate),
            video_bitrate: other.video_bitrate.or(self.video_bitrate),
            container: other.container.or(self.container),
            video_codec: other.video_codec.or(self.video_codec),
            microphone: other.microphone.or(self.microphone),
            system_audio: other.system_audio.or(self.system_audio),
            audio_codec: other.audio_codec.or(self.audio_codec),
            audio_bitrate: other.audio_bitrate.or(self.audio_bitrate),
            image_format: other.image_format.or(self.image_format),
            jpeg_quality: other.jpeg_quality.or(self.jpeg_quality),
            camera_device: other.camera_device.or(self.camera_device),
        }
    }

    fn parsed_or_default<T>(value: &Option<String>) -> T
    where
        T: std::str::FromStr + Default,
    {
        value
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }

    pub fn mode_or_default(&self) -> CaptureMode {
        Self::parsed_or_default(&self.mode)
    }

    pub fn resolution_or_default(&self) -> Resolution {
        Self::parsed_or_default(&self.resolution)
    }

    pub fn container_or_default(&self) -> VideoContainer {
        Self::parsed_or_default(&self.container)
    }

    pub fn video_codec_or_default(&self) -> VideoCodec {
        Self::parsed_or_default(&self.video_codec)
    }

    pub fn audio_codec_or_default(&self) -> AudioCodec {
        Self::parsed_or_default(&self.audio_codec)
    }

    pub fn image_format_or_default(&self) -> ImageFormat {
        Self::parsed_or_default(&self.image_format)
    }

    pub fn frame_rate_or_default(&self) -> u32 {
        self.frame_rate
            .filter(|fps| *fps > 0)
            .unwrap_or(DEFAULT_FRAME_RATE)
    }

    pub fn jpeg_quality_or_default(&self) -> f32 {
        self.jpeg_quality
            .filter(|q| (0.0..=1.0).contains(q))
            .unwrap_or(DEFAULT_JPEG_QUALITY)
    }

    /// Output directory, falling back to the user's video directory and
    /// then the current directory
    pub fn output_dir_or_default(&self) -> PathBuf {
        self.output_dir
            .as_ref()
            .map(PathBuf::from)
            .or_else(|| dirs::video_dir().map(|d| d.join("capture-deck")))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Build the per-session settings from this config
    pub fn capture_settings(&self) -> CaptureSettings {
        CaptureSettings {
            mode: self.mode_or_default(),
            video: VideoSettings {
                resolution: self.resolution_or_default(),
                frame_rate: self.frame_rate_or_default(),
                bitrate: self.video_bitrate.unwrap_or(DEFAULT_VIDEO_BITRATE),
                container: self.container_or_default(),
                codec: self.video_codec_or_default(),
            },
            audio: AudioSettings {
                microphone: self.microphone.unwrap_or(false),
                system_audio: self.system_audio.unwrap_or(false),
                codec: self.audio_codec_or_default(),
                bitrate: self.audio_bitrate.unwrap_or(DEFAULT_AUDIO_BITRATE),
            },
            image: ImageSettings {
                format: self.image_format_or_default(),
                quality: self.jpeg_quality_or_default(),
            },
            camera_device_id: self.camera_device.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_expected_values() {
        let config = AppConfig::defaults();
        assert!(config.output_dir.is_none());
        assert_eq!(config.mode, Some("screen".to_string()));
        assert_eq!(config.container, Some("webm".to_string()));
        assert_eq!(config.microphone, Some(false));
        assert_eq!(config.system_audio, Some(false));
        assert_eq!(config.frame_rate, Some(30));
    }

    #[test]
    fn empty_has_all_none() {
        let config = AppConfig::empty();
        assert!(config.mode.is_none());
        assert!(config.microphone.is_none());
        assert!(config.jpeg_quality.is_none());
    }

    #[test]
    fn merge_other_takes_precedence() {
        let base = AppConfig {
            mode: Some("screen".to_string()),
            container: Some("webm".to_string()),
            microphone: Some(false),
            ..Default::default()
        };
        let other = AppConfig {
            mode: Some("audio".to_string()),
            container: None,
            microphone: Some(true),
            ..Default::default()
        };

        let merged = base.merge(other);
        assert_eq!(merged.mode, Some("audio".to_string()));
        assert_eq!(merged.container, Some("webm".to_string()));
        assert_eq!(merged.microphone, Some(true));
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let config = AppConfig {
            mode: Some("hologram".to_string()),
            frame_rate: Some(0),
            jpeg_quality: Some(4.0),
            ..Default::default()
        };
        assert_eq!(config.mode_or_default(), CaptureMode::ScreenVideo);
        assert_eq!(config.frame_rate_or_default(), DEFAULT_FRAME_RATE);
        assert_eq!(config.jpeg_quality_or_default(), DEFAULT_JPEG_QUALITY);
    }

    #[test]
    fn capture_settings_from_config() {
        let config = AppConfig::defaults().merge(AppConfig {
            mode: Some("screen-cam".to_string()),
            container: Some("mp4".to_string()),
            video_codec: Some("h264".to_string()),
            microphone: Some(true),
            image_format: Some("jpeg".to_string()),
            jpeg_quality: Some(0.5),
            camera_device: Some("cam-2".to_string()),
            ..Default::default()
        });

        let settings = config.capture_settings();
        assert_eq!(settings.mode, CaptureMode::ScreenAndCam);
        assert_eq!(settings.video.container, VideoContainer::Mp4);
        assert_eq!(settings.video.codec, VideoCodec::H264);
        assert!(settings.audio.microphone);
        assert!(!settings.audio.system_audio);
        assert_eq!(settings.image.format, ImageFormat::Jpeg);
        assert_eq!(settings.image.quality, 0.5);
        assert_eq!(settings.camera_device_id.as_deref(), Some("cam-2"));
    }

    #[test]
    fn configured_output_dir_wins() {
        let config = AppConfig {
            output_dir: Some("/tmp/captures".to_string()),
            ..Default::default()
        };
        assert_eq!(config.output_dir_or_default(), PathBuf::from("/tmp/captures"));
    }
}
