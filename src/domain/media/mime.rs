//! Encoder container/codec negotiation and output format resolution

use crate::domain::capture::{CaptureMode, CaptureSettings, VideoCodec, VideoContainer};

pub const DEFAULT_VIDEO_FORMAT: &str = "video/webm";
pub const DEFAULT_AUDIO_FORMAT: &str = "audio/webm";

const AUDIO_CANDIDATES: &[&str] = &[
    "audio/mp4",
    "audio/webm;codecs=opus",
    "audio/webm",
    "audio/ogg;codecs=opus",
    "audio/ogg",
];

const MP4_CANDIDATES: &[&str] = &[
    "video/mp4;codecs=avc1.42E01E,mp4a.40.2",
    "video/mp4;codecs=avc1,mp4a",
    "video/mp4",
    "video/webm;codecs=h264,opus",
];

/// Open-container variants, riskiest codec first, generic last
const WEBM_TAIL: &[&str] = &[
    "video/webm;codecs=vp9,opus",
    "video/webm;codecs=vp8,opus",
    "video/webm",
];

/// Ordered encoder formats worth trying for these settings
pub fn candidate_formats(settings: &CaptureSettings) -> Vec<String> {
    let mut candidates: Vec<String> = match settings.mode {
        CaptureMode::Screenshot => Vec::new(),
        CaptureMode::AudioOnly => AUDIO_CANDIDATES.iter().map(|s| s.to_string()).collect(),
        CaptureMode::ScreenVideo | CaptureMode::ScreenAndCam => {
            video_candidates(settings.video.container, settings.video.codec)
        }
    };

    // Keep the first occurrence of each entry
    let mut seen = Vec::with_capacity(candidates.len());
    candidates.retain(|c| {
        if seen.contains(c) {
            false
        } else {
            seen.push(c.clone());
            true
        }
    });
    candidates
}

fn video_candidates(container: VideoContainer, codec: VideoCodec) -> Vec<String> {
    let mut list: Vec<String> = match container {
        VideoContainer::Mp4 => MP4_CANDIDATES.iter().map(|s| s.to_string()).collect(),
        VideoContainer::Matroska => vec![
            format!("video/x-matroska;codecs={},opus", codec.codec_token()),
            "video/x-matroska".to_string(),
        ],
        VideoContainer::Webm => vec![format!("video/webm;codecs={},opus", codec.codec_token())],
    };
    list.extend(WEBM_TAIL.iter().map(|s| s.to_string()));
    list
}

/// Pick the first candidate the platform can encode, or an empty string
/// when none is supported.
pub fn negotiate_format<F>(settings: &CaptureSettings, is_supported: F) -> String
where
    F: Fn(&str) -> bool,
{
    candidate_formats(settings)
        .into_iter()
        .find(|candidate| is_supported(candidate))
        .unwrap_or_default()
}

/// Safe format for a mode when nothing else is known
pub fn default_format(mode: CaptureMode) -> &'static str {
    match mode {
        CaptureMode::AudioOnly => DEFAULT_AUDIO_FORMAT,
        CaptureMode::Screenshot | CaptureMode::ScreenVideo | CaptureMode::ScreenAndCam => {
            DEFAULT_VIDEO_FORMAT
        }
    }
}

/// Format that describes the finished payload.
///
/// The encoder's negotiated format wins over the requested one, because the
/// platform may substitute silently. Audio-only payloads are never labelled
/// with a video type.
pub fn resolve_output_format(mode: CaptureMode, negotiated: &str, requested: &str) -> String {
    let mut format = if !negotiated.trim().is_empty() {
        negotiated.trim().to_string()
    } else if !requested.trim().is_empty() {
        requested.trim().to_string()
    } else {
        default_format(mode).to_string()
    };

    if mode.is_audio_only() {
        if let Some(rest) = format.strip_prefix("video/") {
            format = format!("audio/{}", rest);
        }
    }
    format
}

/// File extension for a resolved format
pub fn extension_for(format: &str, audio_only: bool) -> &'static str {
    let format = format.to_lowercase();
    if format.contains("mp4") {
        if audio_only {
            "m4a"
        } else {
            "mp4"
        }
    } else if format.contains("wav") {
        "wav"
    } else if format.contains("ogg") {
        "ogg"
    } else if format.contains("mp3") || format.contains("mpeg") {
        "mp3"
    } else if format.contains("matroska") {
        "mkv"
    } else {
        "webm"
    }
}

/// The container part of a format, without parameters (`video/webm`)
pub fn essence(format: &str) -> &str {
    format.split(';').next().unwrap_or("").trim()
}

/// Codec tokens from a `codecs=` parameter, lowercased
pub fn codecs(format: &str) -> Vec<String> {
    format
        .split(';')
        .skip(1)
        .filter_map(|param| {
            let (key, value) = param.split_once('=')?;
            (key.trim().eq_ignore_ascii_case("codecs")).then_some(value)
        })
        .flat_map(|value| value.trim_matches('"').split(','))
        .map(|codec| codec.trim().to_lowercase())
        .filter(|codec| !codec.is_empty())
        .collect()
}
