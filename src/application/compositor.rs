//! Picture-in-picture compositor
//!
//! Renders the screen (primary) and camera (secondary) tracks onto one
//! canvas and publishes the canvas as a new video track.

use std::time::Duration as StdDuration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::ports::{Canvas, CanvasError, CanvasFactory, MediaStream, MediaTrack};
use super::session::TeardownAction;
use crate::domain::media::{InsetLayout, Rect, Rgba, Size, VideoFrame};

/// How long to wait for the screen to report its dimensions
pub const PRIMARY_DIMENSIONS_TIMEOUT: StdDuration = StdDuration::from_secs(2);
/// Canvas size when the screen never reports one
pub const FALLBACK_SIZE: Size = Size::new(1920, 1080);
/// Render tick, one per display refresh
pub const RENDER_INTERVAL: StdDuration = StdDuration::from_micros(16_667);
/// Upper bound on the composed track's frame rate
pub const OUTPUT_FRAME_RATE: u32 = 30;

/// Errors from setting up composition
#[derive(Debug, Error)]
pub enum CompositorError {
    #[error("Primary stream has no video track")]
    NoPrimaryVideo,

    #[error("Canvas error: {0}")]
    Canvas(#[from] CanvasError),
}

/// Composed video track plus the action that stops rendering
pub struct Composition {
    pub track: MediaTrack,
    pub teardown: TeardownAction,
}

/// Hidden, muted sink for one source track; exposes whatever frame was
/// decoded last.
pub struct PlaybackSurface {
    frames: Option<watch::Receiver<Option<VideoFrame>>>,
}

impl PlaybackSurface {
    pub fn attach(track: Option<&MediaTrack>) -> Self {
        Self {
            frames: track.and_then(MediaTrack::frames),
        }
    }

    pub fn current_frame(&self) -> Option<VideoFrame> {
        self.frames.as_ref().and_then(|rx| rx.borrow().clone())
    }

    pub fn video_size(&self) -> Option<Size> {
        self.current_frame()
            .map(|f| f.size())
            .filter(|s| !s.is_empty())
    }

    /// Wait until the source reports non-zero dimensions
    pub async fn wait_for_dimensions(&mut self, timeout: StdDuration) -> Option<Size> {
        let rx = self.frames.as_mut()?;
        let ready = rx.wait_for(|frame| frame.as_ref().is_some_and(|f| !f.size().is_empty()));
        match time::timeout(timeout, ready).await {
            Ok(Ok(frame)) => frame.as_ref().map(VideoFrame::size),
            _ => None,
        }
    }
}

/// Start compositing `primary`'s video with `secondary`'s video inset in
/// the bottom-right corner.
///
/// Blocks until the primary source reports its dimensions (or the timeout
/// passes) so the canvas is never zero-sized when encoding begins.
pub async fn compose(
    canvases: &dyn CanvasFactory,
    primary: &MediaStream,
    secondary: &MediaStream,
) -> Result<Composition, CompositorError> {
    let primary_track = primary
        .first_video()
        .ok_or(CompositorError::NoPrimaryVideo)?;

    let mut screen = PlaybackSurface::attach(Some(primary_track));
    let camera = PlaybackSurface::attach(secondary.first_video());

    let size = match screen.wait_for_dimensions(PRIMARY_DIMENSIONS_TIMEOUT).await {
        Some(size) => size,
        None => {
            warn!(
                width = FALLBACK_SIZE.width,
                height = FALLBACK_SIZE.height,
                "Screen did not report dimensions in time, using fallback size"
            );
            FALLBACK_SIZE
        }
    };

    let canvas = canvases.create(size)?;
    let output = MediaTrack::video("composite");
    info!(width = size.width, height = size.height, "Compositor started");

    let render = tokio::spawn(render_loop(canvas, screen, camera, output.clone()));

    let stopped_output = output.clone();
    let teardown: TeardownAction = Box::new(move || {
        render.abort();
        stopped_output.stop();
        debug!("Compositor stopped");
    });

    Ok(Composition {
        track: output,
        teardown,
    })
}

async fn render_loop(
    mut canvas: Box<dyn Canvas>,
    screen: PlaybackSurface,
    camera: PlaybackSurface,
    output: MediaTrack,
) {
    let publish_interval = StdDuration::from_secs(1) / OUTPUT_FRAME_RATE;
    let mut ticker = time::interval(RENDER_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_published: Option<Instant> = None;

    loop {
        ticker.tick().await;
        if !output.is_live() {
            break;
        }

        if let Err(e) = render_frame(canvas.as_mut(), &screen, &camera) {
            warn!(error = %e, "Failed to render composite frame");
            continue;
        }

        let now = Instant::now();
        let due = last_published.map_or(true, |at| now.duration_since(at) >= publish_interval);
        if due {
            output.push_frame(canvas.snapshot());
            last_published = Some(now);
        }
    }
}

/// Draw one composite frame
pub fn render_frame(
    canvas: &mut dyn Canvas,
    screen: &PlaybackSurface,
    camera: &PlaybackSurface,
) -> Result<(), CanvasError> {
    if let Some(size) = screen.video_size().filter(|s| *s != canvas.size()) {
        debug!(
            width = size.width,
            height = size.height,
            "Screen size changed, resizing canvas"
        );
        canvas.resize(size)?;
    }

    match screen.current_frame() {
        Some(frame) => canvas.draw_frame(&frame, Rect::fill(canvas.size()))?,
        None => canvas.clear(Rgba::BLACK),
    }

    // Inset only once the camera has produced a frame
    if let Some(cam) = camera.current_frame() {
        let layout = InsetLayout::bottom_right(canvas.size(), cam.size());
        canvas.draw_shadow(layout.rect, layout.shadow_blur, layout.shadow_color);
        canvas.draw_frame(&cam, layout.rect)?;
        canvas.stroke_rect(layout.rect, layout.border_width, layout.border_color);
    }

    Ok(())
}
