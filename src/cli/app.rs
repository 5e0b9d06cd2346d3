//! Command runners for record, screenshot and formats

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tracing::{debug, warn};

use crate::application::ports::{ConfigStore, EncoderFactory, FileExporter, MediaDevices};
use crate::application::{
    CaptureController, CapturePlatform, Gallery, ObjectUrls, StartOutcome,
};
use crate::domain::capture::{CapturedFile, CapturedFileInfo, RecorderStatus};
use crate::domain::config::AppConfig;
use crate::domain::media::mime;
use crate::domain::recording::Duration;
use crate::infrastructure::{
    DesktopDevices, FfmpegEncoderFactory, FsExporter, SkiaCanvasFactory,
    SummingAudioContextFactory, SyntheticDevices, XdgConfigStore,
};

use super::args::{FormatsArgs, OutputArgs, RecordArgs, ScreenshotArgs};
use super::presenter::Presenter;
use super::signals::{CaptureSignal, ShutdownSignal};

/// Exit codes
pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_USAGE_ERROR: u8 = 2;
/// Cancelled by the user (prompt declined or Ctrl+C twice)
pub const EXIT_INTERRUPTED: u8 = 130;

/// Overrides the configured output directory
pub const OUTPUT_DIR_ENV: &str = "CAPTURE_DECK_OUTPUT_DIR";
/// Path to the `ffmpeg` binary to use instead of the one on `PATH`
pub const FFMPEG_ENV: &str = "CAPTURE_DECK_FFMPEG";

/// Load and merge configuration from file, env, and CLI
pub async fn load_merged_config(cli_config: AppConfig) -> AppConfig {
    let store = XdgConfigStore::new();
    let file_config = match store.load().await {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "Ignoring unreadable config file");
            AppConfig::empty()
        }
    };

    let env_config = AppConfig {
        output_dir: env::var(OUTPUT_DIR_ENV).ok().filter(|s| !s.is_empty()),
        ..Default::default()
    };

    // Merge: defaults < file < env < cli
    AppConfig::defaults()
        .merge(file_config)
        .merge(env_config)
        .merge(cli_config)
}

/// Probe FFmpeg off the async threads
async fn detect_encoders() -> FfmpegEncoderFactory {
    let program = env::var_os(FFMPEG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("ffmpeg"));
    let probe = program.clone();
    match tokio::task::spawn_blocking(move || FfmpegEncoderFactory::detect_program(probe)).await {
        Ok(factory) => factory,
        Err(e) => {
            warn!(error = %e, "Encoder probe did not finish");
            FfmpegEncoderFactory::with_encoders(program, Vec::<String>::new())
        }
    }
}

/// Wire the adapters. `synthetic` swaps real devices for generated ones.
pub async fn build_platform(synthetic: bool) -> CapturePlatform {
    let devices: Arc<dyn MediaDevices> = if synthetic {
        Arc::new(SyntheticDevices::new())
    } else {
        Arc::new(DesktopDevices::new())
    };
    CapturePlatform {
        devices,
        encoders: Arc::new(detect_encoders().await),
        canvases: Arc::new(SkiaCanvasFactory),
        audio: Arc::new(SummingAudioContextFactory),
    }
}

fn output_config(output: &OutputArgs) -> AppConfig {
    AppConfig {
        output_dir: output
            .output
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned()),
        ..Default::default()
    }
}

/// JSON line printed with `--json`
#[derive(Debug, Serialize)]
struct SavedCapture {
    #[serde(flatten)]
    info: CapturedFileInfo,
    path: PathBuf,
}

/// Save a finished capture and report where it went
async fn save_capture(
    file: &CapturedFile,
    config: &AppConfig,
    json: bool,
    presenter: &Presenter,
) -> ExitCode {
    let exporter = FsExporter::new(config.output_dir_or_default());
    let path = match exporter.export(file).await {
        Ok(path) => path,
        Err(e) => {
            presenter.error(&e.to_string());
            return ExitCode::from(EXIT_ERROR);
        }
    };

    if json {
        let saved = SavedCapture {
            info: file.info(),
            path,
        };
        match serde_json::to_string(&saved) {
            Ok(line) => presenter.output(&line),
            Err(e) => {
                presenter.error(&format!("Failed to serialize capture: {}", e));
                return ExitCode::from(EXIT_ERROR);
            }
        }
    } else {
        presenter.success(&presenter.format_saved(file, &path));
        presenter.output(&path.to_string_lossy());
    }
    ExitCode::from(EXIT_SUCCESS)
}

/// Record until Ctrl+C, the time limit or the capture ending by itself
pub async fn run_record(args: RecordArgs) -> ExitCode {
    let mut presenter = Presenter::new();

    let limit = match args.max_duration.as_deref().map(str::parse::<Duration>) {
        None => None,
        Some(Ok(limit)) => Some(limit),
        Some(Err(e)) => {
            presenter.error(&e.to_string());
            return ExitCode::from(EXIT_USAGE_ERROR);
        }
    };

    let cli_config = AppConfig {
        mode: args.mode.map(|m| m.to_string()),
        resolution: args.resolution.map(|r| r.to_string()),
        container: args.container.map(|c| c.to_string()),
        video_codec: args.codec.map(|c| c.to_string()),
        microphone: args.mic.then_some(true),
        system_audio: args.system_audio.then_some(true),
        ..output_config(&args.output)
    };
    let config = load_merged_config(cli_config).await;
    let settings = config.capture_settings();

    let mut signals = match ShutdownSignal::listen() {
        Ok(signals) => signals,
        Err(e) => {
            presenter.error(&format!("Failed to setup signal handler: {}", e));
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let urls = Arc::new(ObjectUrls::new());
    let mut gallery = Gallery::new(Arc::clone(&urls));
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    let platform = build_platform(args.output.synthetic).await;
    let controller = CaptureController::new(platform, urls, move |file| {
        let _ = done_tx.send(file);
    });

    let mut status_rx = controller.subscribe_status();
    let mut elapsed_rx = controller.subscribe_elapsed();

    presenter.start_spinner("Waiting for capture permission...");
    match controller.start(settings).await {
        Ok(StartOutcome::Started) => {}
        Ok(StartOutcome::Screenshot) => {}
        Ok(StartOutcome::Cancelled) => {
            presenter.stop_spinner();
            presenter.warn("Capture cancelled");
            return ExitCode::from(EXIT_INTERRUPTED);
        }
        Ok(StartOutcome::Rejected) => {
            presenter.spinner_fail("A capture is already running");
            return ExitCode::from(EXIT_ERROR);
        }
        Err(e) => {
            presenter.spinner_fail(&e.to_string());
            return ExitCode::from(EXIT_ERROR);
        }
    }

    // Mark the current status seen so only later transitions wake the loop
    let recording = status_rx.borrow_and_update().is_active();
    if recording {
        let limit_secs = limit.map(|l| l.as_secs());
        presenter.update_recording(0, limit_secs, false);

        let deadline = time::sleep_until(match limit {
            Some(limit) => Instant::now() + limit.as_std(),
            None => Instant::now(),
        });
        tokio::pin!(deadline);
        let mut limit_pending = limit.is_some();
        let mut stopping = false;

        loop {
            tokio::select! {
                Some(signal) = signals.recv() => {
                    if stopping && signal == CaptureSignal::Interrupt {
                        controller.teardown().await;
                        presenter.spinner_fail("Recording discarded");
                        return ExitCode::from(EXIT_INTERRUPTED);
                    }
                    debug!(?signal, "Stopping on signal");
                    stopping = true;
                    presenter.update_spinner("Finishing recording (Ctrl+C again to discard)...");
                    if let Err(e) = controller.stop().await {
                        debug!(error = %e, "Stop ignored");
                    }
                }
                _ = &mut deadline, if limit_pending => {
                    limit_pending = false;
                    stopping = true;
                    debug!("Time limit reached");
                    presenter.update_spinner("Time limit reached, finishing recording...");
                    if let Err(e) = controller.stop().await {
                        debug!(error = %e, "Stop ignored");
                    }
                }
                Ok(()) = status_rx.changed() => {
                    let status = *status_rx.borrow_and_update();
                    if !status.is_active() {
                        break;
                    }
                    if !stopping {
                        presenter.update_recording(
                            controller.elapsed_secs(),
                            limit_secs,
                            status == RecorderStatus::Paused,
                        );
                    }
                }
                Ok(()) = elapsed_rx.changed() => {
                    let elapsed = *elapsed_rx.borrow_and_update();
                    if !stopping {
                        presenter.update_recording(elapsed, limit_secs, false);
                    }
                }
            }
        }
    }

    if controller.status() == RecorderStatus::Error {
        let message = controller
            .error()
            .unwrap_or_else(|| "Recording failed".to_string());
        presenter.spinner_fail(&message);
        return ExitCode::from(EXIT_ERROR);
    }

    let Ok(file) = done_rx.try_recv() else {
        presenter.spinner_fail("Nothing was recorded");
        return ExitCode::from(EXIT_ERROR);
    };
    presenter.stop_spinner();

    gallery.add(file);
    let mut code = ExitCode::from(EXIT_SUCCESS);
    for file in gallery.files() {
        code = save_capture(file, &config, args.output.json, &presenter).await;
    }
    gallery.clear();
    code
}

/// Take one screenshot and save it
pub async fn run_screenshot(args: ScreenshotArgs) -> ExitCode {
    let presenter = Presenter::new();

    let cli_config = AppConfig {
        image_format: args.format.map(|f| f.to_string()),
        jpeg_quality: args.quality,
        ..output_config(&args.output)
    };
    let config = load_merged_config(cli_config).await;
    let image = config.capture_settings().image;

    let urls = Arc::new(ObjectUrls::new());
    let platform = build_platform(args.output.synthetic).await;
    let controller = CaptureController::new(platform, Arc::clone(&urls), |file| {
        debug!(name = file.name(), "Screenshot taken");
    });

    let file = match controller.screenshot(image).await {
        Ok(Some(file)) => file,
        Ok(None) => {
            presenter.warn("Screenshot cancelled");
            return ExitCode::from(EXIT_INTERRUPTED);
        }
        Err(e) => {
            presenter.error(&e.to_string());
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let code = save_capture(&file, &config, args.output.json, &presenter).await;
    urls.revoke(file.handle());
    code
}

/// One negotiated candidate, for `formats --json`
#[derive(Debug, Serialize)]
struct FormatCandidate {
    format: String,
    supported: bool,
}

#[derive(Debug, Serialize)]
struct FormatReport {
    mode: String,
    ffmpeg: bool,
    candidates: Vec<FormatCandidate>,
    selected: Option<String>,
    extension: Option<&'static str>,
}

/// Show the candidate formats for the configured mode and the one that wins
pub async fn run_formats(args: FormatsArgs) -> ExitCode {
    let presenter = Presenter::new();

    let cli_config = AppConfig {
        mode: args.mode.map(|m| m.to_string()),
        container: args.container.map(|c| c.to_string()),
        video_codec: args.codec.map(|c| c.to_string()),
        ..Default::default()
    };
    let settings = load_merged_config(cli_config).await.capture_settings();
    let encoders = detect_encoders().await;

    let candidates: Vec<FormatCandidate> = mime::candidate_formats(&settings)
        .into_iter()
        .map(|format| FormatCandidate {
            supported: encoders.is_type_supported(&format),
            format,
        })
        .collect();
    let selected = candidates
        .iter()
        .find(|c| c.supported)
        .map(|c| c.format.clone());
    let audio_only = settings.mode.is_audio_only();
    let extension = selected
        .as_deref()
        .map(|format| mime::extension_for(format, audio_only));

    let report = FormatReport {
        mode: settings.mode.to_string(),
        ffmpeg: encoders.is_available(),
        candidates,
        selected,
        extension,
    };

    if args.json {
        return match serde_json::to_string_pretty(&report) {
            Ok(text) => {
                presenter.output(&text);
                ExitCode::from(EXIT_SUCCESS)
            }
            Err(e) => {
                presenter.error(&format!("Failed to serialize report: {}", e));
                ExitCode::from(EXIT_ERROR)
            }
        };
    }

    if report.candidates.is_empty() {
        presenter.info(&format!(
            "Screenshots are encoded as {}",
            settings.image.format.mime_type()
        ));
        return ExitCode::from(EXIT_SUCCESS);
    }
    if !report.ffmpeg {
        presenter.warn("FFmpeg not found; recordings are unavailable");
    }

    for candidate in &report.candidates {
        let chosen = report.selected.as_deref() == Some(candidate.format.as_str());
        presenter.output(&presenter.format_candidate(&candidate.format, candidate.supported, chosen));
    }
    match (&report.selected, report.extension) {
        (Some(format), Some(ext)) => presenter.info(&format!("Recording as {} (.{})", format, ext)),
        _ => presenter.warn(&format!(
            "No candidate is supported; the encoder falls back to {}",
            mime::default_format(settings.mode)
        )),
    }
    ExitCode::from(EXIT_SUCCESS)
}

/// Handle `config` with the XDG store
pub async fn run_config(action: super::args::ConfigAction) -> ExitCode {
    let presenter = Presenter::new();
    let store = XdgConfigStore::new();
    debug!(path = %store.path().display(), "Using config file");
    match super::config_cmd::handle_config_command(action, &store, &presenter).await {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            presenter.error(&e.to_string());
            ExitCode::from(EXIT_ERROR)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn output_flag_becomes_output_dir() {
        let args = OutputArgs {
            output: Some(PathBuf::from("/tmp/caps")),
            synthetic: false,
            json: false,
        };
        assert_eq!(output_config(&args).output_dir.as_deref(), Some("/tmp/caps"));
        assert!(output_config(&OutputArgs::default()).output_dir.is_none());
    }

    #[tokio::test]
    async fn saves_a_synthetic_screenshot() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            output_dir: Some(dir.path().to_string_lossy().into_owned()),
            ..AppConfig::defaults()
        };
        let platform = CapturePlatform {
            devices: Arc::new(SyntheticDevices::new().with_screen_size(
                crate::domain::media::Size::new(8, 6),
            )),
            encoders: Arc::new(FfmpegEncoderFactory::with_encoders("ffmpeg", ["libvpx"])),
            canvases: Arc::new(SkiaCanvasFactory),
            audio: Arc::new(SummingAudioContextFactory),
        };
        let controller = CaptureController::new(platform, Arc::new(ObjectUrls::new()), |_| {});
        let file = controller
            .screenshot(config.capture_settings().image)
            .await
            .unwrap()
            .unwrap();

        let presenter = Presenter::new();
        save_capture(&file, &config, true, &presenter).await;
        assert!(Path::new(&dir.path().join(file.name())).exists());
    }
}
