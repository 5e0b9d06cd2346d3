//! Raster drawing surface port

use thiserror::Error;

use crate::domain::capture::ImageFormat;
use crate::domain::media::{Rect, Rgba, Size, VideoFrame};

/// Canvas errors
#[derive(Debug, Clone, Error)]
pub enum CanvasError {
    #[error("Invalid canvas size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Failed to encode image: {0}")]
    EncodeFailed(String),
}

/// One drawing surface. All coordinates are surface pixels.
pub trait Canvas: Send {
    fn size(&self) -> Size;

    /// Resize, discarding the current contents
    fn resize(&mut self, size: Size) -> Result<(), CanvasError>;

    fn clear(&mut self, color: Rgba);

    /// Draw `frame` scaled into `dest`
    fn draw_frame(&mut self, frame: &VideoFrame, dest: Rect) -> Result<(), CanvasError>;

    fn fill_rect(&mut self, rect: Rect, color: Rgba);

    fn stroke_rect(&mut self, rect: Rect, width: f32, color: Rgba);

    /// Soft drop shadow behind `rect`
    fn draw_shadow(&mut self, rect: Rect, blur: f32, color: Rgba);

    /// Current contents as a frame
    fn snapshot(&self) -> VideoFrame;

    /// Encode the current contents. `quality` (0.0..=1.0) applies to lossy
    /// formats only.
    fn encode_image(&self, format: ImageFormat, quality: f32) -> Result<Vec<u8>, CanvasError>;
}

/// Port for creating canvases
pub trait CanvasFactory: Send + Sync {
    fn create(&self, size: Size) -> Result<Box<dyn Canvas>, CanvasError>;
}
