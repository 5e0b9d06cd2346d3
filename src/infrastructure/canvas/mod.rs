//! Drawing surface adapters

mod skia;

pub use skia::{jpeg_quality, SkiaCanvas, SkiaCanvasFactory};
