//! Config command handler

use crate::application::ports::ConfigStore;
use crate::domain::capture::{
    AudioCodec, CaptureMode, ImageFormat, Resolution, VideoCodec, VideoContainer,
};
use crate::domain::config::AppConfig;
use crate::domain::error::ConfigError;

use super::args::{is_valid_config_key, ConfigAction, VALID_CONFIG_KEYS};
use super::presenter::Presenter;

const NOT_SET: &str = "(not set)";

/// Handle config subcommand
pub async fn handle_config_command<S: ConfigStore>(
    action: ConfigAction,
    store: &S,
    presenter: &Presenter,
) -> Result<(), ConfigError> {
    match action {
        ConfigAction::Init => handle_init(store, presenter).await,
        ConfigAction::Set { key, value } => handle_set(store, presenter, &key, &value).await,
        ConfigAction::Get { key } => handle_get(store, presenter, &key).await,
        ConfigAction::List => handle_list(store, presenter).await,
        ConfigAction::Path => handle_path(store, presenter),
    }
}

async fn handle_init<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    store.init().await?;
    presenter.success(&format!(
        "Config file created at: {}",
        store.path().display()
    ));
    Ok(())
}

async fn handle_set<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
    value: &str,
) -> Result<(), ConfigError> {
    check_key(key)?;

    let mut config = store.load().await?;
    set_value(&mut config, key, value)?;
    store.save(&config).await?;

    presenter.success(&format!("{} = {}", key, value));
    Ok(())
}

async fn handle_get<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
) -> Result<(), ConfigError> {
    check_key(key)?;

    let config = store.load().await?;
    match get_value(&config, key) {
        Some(v) => presenter.output(&v),
        None => presenter.output(NOT_SET),
    }
    Ok(())
}

async fn handle_list<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    let config = store.load().await?;
    for key in VALID_CONFIG_KEYS {
        let value = get_value(&config, key);
        presenter.key_value(key, value.as_deref().unwrap_or(NOT_SET));
    }
    Ok(())
}

fn handle_path<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    presenter.output(&store.path().to_string_lossy());
    Ok(())
}

fn check_key(key: &str) -> Result<(), ConfigError> {
    if is_valid_config_key(key) {
        Ok(())
    } else {
        Err(ConfigError::ValidationError {
            key: key.to_string(),
            message: format!("Unknown key. Valid keys: {}", VALID_CONFIG_KEYS.join(", ")),
        })
    }
}

/// Validate `value` for `key` and store it in canonical form
pub fn set_value(config: &mut AppConfig, key: &str, value: &str) -> Result<(), ConfigError> {
    match key {
        "output_dir" => config.output_dir = Some(value.to_string()),
        "camera_device" => config.camera_device = Some(value.to_string()),
        "mode" => config.mode = Some(value.parse::<CaptureMode>()?.to_string()),
        "resolution" => config.resolution = Some(value.parse::<Resolution>()?.to_string()),
        "container" => config.container = Some(value.parse::<VideoContainer>()?.to_string()),
        "video_codec" => config.video_codec = Some(value.parse::<VideoCodec>()?.to_string()),
        "audio_codec" => config.audio_codec = Some(value.parse::<AudioCodec>()?.to_string()),
        "image_format" => config.image_format = Some(value.parse::<ImageFormat>()?.to_string()),
        "frame_rate" => config.frame_rate = Some(parse_positive(key, value)?),
        "video_bitrate" => config.video_bitrate = Some(parse_positive(key, value)?),
        "audio_bitrate" => config.audio_bitrate = Some(parse_positive(key, value)?),
        "microphone" => config.microphone = Some(parse_bool_value(key, value)?),
        "system_audio" => config.system_audio = Some(parse_bool_value(key, value)?),
        "jpeg_quality" => config.jpeg_quality = Some(parse_quality(key, value)?),
        _ => check_key(key)?,
    }
    Ok(())
}

/// Current value of `key` as text, if set
pub fn get_value(config: &AppConfig, key: &str) -> Option<String> {
    match key {
        "output_dir" => config.output_dir.clone(),
        "mode" => config.mode.clone(),
        "resolution" => config.resolution.clone(),
        "frame_rate" => config.frame_rate.map(|v| v.to_string()),
        "video_bitrate" => config.video_bitrate.map(|v| v.to_string()),
        "container" => config.container.clone(),
        "video_codec" => config.video_codec.clone(),
        "microphone" => config.microphone.map(|b| b.to_string()),
        "system_audio" => config.system_audio.map(|b| b.to_string()),
        "audio_codec" => config.audio_codec.clone(),
        "audio_bitrate" => config.audio_bitrate.map(|v| v.to_string()),
        "image_format" => config.image_format.clone(),
        "jpeg_quality" => config.jpeg_quality.map(|q| q.to_string()),
        "camera_device" => config.camera_device.clone(),
        _ => None,
    }
}

fn parse_positive(key: &str, value: &str) -> Result<u32, ConfigError> {
    match value.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::ValidationError {
            key: key.to_string(),
            message: format!("'{}' is not a positive whole number", value),
        }),
    }
}

fn parse_quality(key: &str, value: &str) -> Result<f32, ConfigError> {
    match value.trim().parse::<f32>() {
        Ok(q) if (0.0..=1.0).contains(&q) => Ok(q),
        _ => Err(ConfigError::ValidationError {
            key: key.to_string(),
            message: "Value must be a number between 0.0 and 1.0".to_string(),
        }),
    }
}

fn parse_bool_value(key: &str, value: &str) -> Result<bool, ConfigError> {
    parse_bool(value).map_err(|_| ConfigError::ValidationError {
        key: key.to_string(),
        message: "Value must be 'true' or 'false'".to_string(),
    })
}

/// Parse a boolean value
fn parse_bool(value: &str) -> Result<bool, ()> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(()),
    }
}
