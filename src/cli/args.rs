//! CLI argument definitions using Clap

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::capture::{
    CaptureMode, ImageFormat, Resolution, VideoCodec, VideoContainer,
};

/// CaptureDeck - screen, camera, microphone and screenshot capture
#[derive(Parser, Debug)]
#[command(name = "capture-deck")]
#[command(version)]
#[command(about = "Record the screen, camera and microphone, or take screenshots")]
#[command(long_about = None)]
pub struct Cli {
    /// Show debug logs (overrides CAPTURE_DECK_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Record until Ctrl+C, the time limit, or the capture ending
    Record(RecordArgs),
    /// Take a single screenshot
    Screenshot(ScreenshotArgs),
    /// Show which recording formats are tried and which one is used
    Formats(FormatsArgs),
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Options shared by commands that capture
#[derive(Args, Debug, Clone, Default)]
pub struct OutputArgs {
    /// Directory to save captures in
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Use generated test sources instead of real devices
    #[arg(long)]
    pub synthetic: bool,

    /// Print the saved capture as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RecordArgs {
    /// What to record: screen, audio, screen-cam
    #[arg(short, long, value_name = "MODE")]
    pub mode: Option<CaptureMode>,

    /// Record the microphone alongside the screen
    #[arg(long)]
    pub mic: bool,

    /// Include system audio with the screen
    #[arg(long)]
    pub system_audio: bool,

    /// Preferred container: mp4, webm, mkv
    #[arg(long, value_name = "CONTAINER")]
    pub container: Option<VideoContainer>,

    /// Preferred video codec: h264, vp8, vp9, av1
    #[arg(long, value_name = "CODEC")]
    pub codec: Option<VideoCodec>,

    /// Capture resolution: native, 720p, 1080p, 1440p, 2160p
    #[arg(long, value_name = "RES")]
    pub resolution: Option<Resolution>,

    /// Stop automatically after this long (e.g., 30s, 5m, 1h30m)
    #[arg(short = 'd', long, value_name = "TIME")]
    pub max_duration: Option<String>,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ScreenshotArgs {
    /// Image format: png, jpeg, webp
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<ImageFormat>,

    /// JPEG quality between 0.0 and 1.0
    #[arg(short, long, value_name = "QUALITY", value_parser = parse_quality)]
    pub quality: Option<f32>,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args, Debug, Clone, Default)]
pub struct FormatsArgs {
    /// Capture mode to negotiate for
    #[arg(short, long, value_name = "MODE")]
    pub mode: Option<CaptureMode>,

    /// Preferred container: mp4, webm, mkv
    #[arg(long, value_name = "CONTAINER")]
    pub container: Option<VideoContainer>,

    /// Preferred video codec: h264, vp8, vp9, av1
    #[arg(long, value_name = "CODEC")]
    pub codec: Option<VideoCodec>,

    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

/// Config action subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Create config file with defaults
    Init,
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// Config value
        value: String,
    },
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },
    /// List all config values
    List,
    /// Show config file path
    Path,
}

fn parse_quality(s: &str) -> Result<f32, String> {
    let quality: f32 = s
        .trim()
        .parse()
        .map_err(|_| format!("\"{}\" is not a number", s))?;
    if (0.0..=1.0).contains(&quality) {
        Ok(quality)
    } else {
        Err("quality must be between 0.0 and 1.0".to_string())
    }
}

/// Valid config keys
pub const VALID_CONFIG_KEYS: &[&str] = &[
    "output_dir",
    "mode",
    "resolution",
    "frame_rate",
    "video_bitrate",
    "container",
    "video_codec",
    "microphone",
    "system_audio",
    "audio_codec",
    "audio_bitrate",
    "image_format",
    "jpeg_quality",
    "camera_device",
];

/// Check if a config key is valid
pub fn is_valid_config_key(key: &str) -> bool {
    VALID_CONFIG_KEYS.contains(&key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn record_parses_defaults() {
        let cli = Cli::parse_from(["capture-deck", "record"]);
        let Commands::Record(args) = cli.command else {
            panic!("Expected record command");
        };
        assert!(args.mode.is_none());
        assert!(!args.mic);
        assert!(!args.system_audio);
        assert!(args.max_duration.is_none());
        assert!(!args.output.synthetic);
        assert!(!cli.verbose);
    }

    #[test]
    fn record_parses_options() {
        let cli = Cli::parse_from([
            "capture-deck",
            "record",
            "--mode",
            "screen-cam",
            "--mic",
            "--container",
            "mp4",
            "--codec",
            "h264",
            "-d",
            "30s",
            "-o",
            "/tmp/out",
            "--synthetic",
            "--json",
        ]);
        let Commands::Record(args) = cli.command else {
            panic!("Expected record command");
        };
        assert_eq!(args.mode, Some(CaptureMode::ScreenAndCam));
        assert!(args.mic);
        assert_eq!(args.container, Some(VideoContainer::Mp4));
        assert_eq!(args.codec, Some(VideoCodec::H264));
        assert_eq!(args.max_duration.as_deref(), Some("30s"));
        assert_eq!(args.output.output, Some(PathBuf::from("/tmp/out")));
        assert!(args.output.synthetic);
        assert!(args.output.json);
    }

    #[test]
    fn record_rejects_unknown_mode() {
        assert!(Cli::try_parse_from(["capture-deck", "record", "--mode", "hologram"]).is_err());
    }

    #[test]
    fn screenshot_parses_format_and_quality() {
        let cli = Cli::parse_from(["capture-deck", "screenshot", "-f", "jpg", "-q", "0.5"]);
        let Commands::Screenshot(args) = cli.command else {
            panic!("Expected screenshot command");
        };
        assert_eq!(args.format, Some(ImageFormat::Jpeg));
        assert_eq!(args.quality, Some(0.5));
    }

    #[test]
    fn screenshot_rejects_out_of_range_quality() {
        assert!(Cli::try_parse_from(["capture-deck", "screenshot", "-q", "1.5"]).is_err());
    }

    #[test]
    fn verbose_is_global() {
        let cli = Cli::parse_from(["capture-deck", "formats", "--verbose"]);
        assert!(cli.verbose);
    }

    #[test]
    fn config_set_parses() {
        let cli = Cli::parse_from(["capture-deck", "config", "set", "mode", "audio"]);
        if let Commands::Config {
            action: ConfigAction::Set { key, value },
        } = cli.command
        {
            assert_eq!(key, "mode");
            assert_eq!(value, "audio");
        } else {
            panic!("Expected Config Set command");
        }
    }

    #[test]
    fn valid_config_keys() {
        assert!(is_valid_config_key("output_dir"));
        assert!(is_valid_config_key("jpeg_quality"));
        assert!(!is_valid_config_key("api_key"));
    }

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }
}
