//! Monitor capture via xcap
//!
//! xcap monitors are not `Send` on every platform, so the capture loop runs
//! on a dedicated thread that owns the monitor and polls it at the requested
//! frame rate until the track is released.

use std::thread;
use std::time::{Duration as StdDuration, Instant};

use image::imageops::{self, FilterType};
use image::RgbaImage;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use xcap::Monitor;

use crate::application::ports::{AcquireError, DisplayMediaRequest, MediaTrack};
use crate::domain::media::{Size, VideoFrame};

/// Consecutive failed grabs before the track is ended
const MAX_CONSECUTIVE_FAILURES: u32 = 10;

/// Start capturing the primary monitor. Resolves once the first frame has
/// been grabbed.
pub async fn capture_primary_monitor(
    request: &DisplayMediaRequest,
) -> Result<MediaTrack, AcquireError> {
    let track = MediaTrack::video("screen");
    let frame_rate = request.frame_rate.max(1);
    let bounds = request.resolution.dimensions();
    let (ready_tx, ready_rx) = oneshot::channel();

    let worker_track = track.clone();
    thread::Builder::new()
        .name("capture-deck-screen".into())
        .spawn(move || run_capture(worker_track, frame_rate, bounds, ready_tx))
        .map_err(|e| AcquireError::Failed(format!("Failed to spawn capture thread: {}", e)))?;

    ready_rx
        .await
        .map_err(|_| AcquireError::Failed("Screen capture thread exited".into()))??;
    Ok(track)
}

fn primary_monitor() -> Result<Monitor, AcquireError> {
    let monitors =
        Monitor::all().map_err(|e| AcquireError::classify("NotReadableError", &e.to_string()))?;

    let mut fallback = None;
    for monitor in monitors {
        if monitor.is_primary().unwrap_or(false) {
            return Ok(monitor);
        }
        fallback.get_or_insert(monitor);
    }
    fallback.ok_or_else(|| AcquireError::NotFound("No monitor available".into()))
}

fn run_capture(
    track: MediaTrack,
    frame_rate: u32,
    bounds: Option<(u32, u32)>,
    ready: oneshot::Sender<Result<(), AcquireError>>,
) {
    let monitor = match primary_monitor() {
        Ok(monitor) => monitor,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    // The first grab doubles as the permission check
    match grab(&monitor, bounds) {
        Ok(frame) => {
            debug!(width = frame.size().width, height = frame.size().height, "Screen capture started");
            track.push_frame(frame);
            let _ = ready.send(Ok(()));
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    }

    let interval = StdDuration::from_secs_f64(1.0 / frame_rate as f64);
    let mut failures = 0;
    while track.is_live() {
        let started = Instant::now();
        match grab(&monitor, bounds) {
            Ok(frame) => {
                failures = 0;
                track.push_frame(frame);
            }
            Err(e) => {
                failures += 1;
                warn!(error = %e, failures, "Screen grab failed");
                if failures >= MAX_CONSECUTIVE_FAILURES {
                    track.end();
                    break;
                }
            }
        }
        if let Some(rest) = interval.checked_sub(started.elapsed()) {
            thread::sleep(rest);
        }
    }
    debug!("Screen capture thread finished");
}

fn grab(monitor: &Monitor, bounds: Option<(u32, u32)>) -> Result<VideoFrame, AcquireError> {
    let image = monitor
        .capture_image()
        .map_err(|e| AcquireError::classify("NotReadableError", &e.to_string()))?;
    let image = fit_within(image, bounds);
    frame_from_image(&image)
        .ok_or_else(|| AcquireError::NotReadable("Monitor returned an empty image".into()))
}

/// Downscale to fit `bounds`, keeping the aspect ratio. Never upscales.
pub fn fit_within(image: RgbaImage, bounds: Option<(u32, u32)>) -> RgbaImage {
    let Some((max_w, max_h)) = bounds else {
        return image;
    };
    let (w, h) = image.dimensions();
    if w <= max_w && h <= max_h {
        return image;
    }
    let scale = (max_w as f64 / w as f64).min(max_h as f64 / h as f64);
    let new_w = ((w as f64 * scale).round() as u32).max(1);
    let new_h = ((h as f64 * scale).round() as u32).max(1);
    imageops::resize(&image, new_w, new_h, FilterType::Triangle)
}

/// Straight-alpha image to a premultiplied frame
pub fn frame_from_image(image: &RgbaImage) -> Option<VideoFrame> {
    let (width, height) = image.dimensions();
    let data = image
        .pixels()
        .flat_map(|p| {
            let [r, g, b, a] = p.0;
            let premul = |c: u8| ((c as u16 * a as u16 + 127) / 255) as u8;
            [premul(r), premul(g), premul(b), a]
        })
        .collect();
    VideoFrame::new(Size::new(width, height), data)
}
