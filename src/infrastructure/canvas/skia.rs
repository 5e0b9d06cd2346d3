//! Raster canvas backed by tiny-skia, with PNG/JPEG/WebP export via `image`

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{ExtendedColorType, ImageEncoder};
use tiny_skia::{
    Color, FilterQuality, Paint, PathBuilder, Pixmap, PixmapPaint, PixmapRef, Stroke, Transform,
};

use crate::application::ports::{Canvas, CanvasError, CanvasFactory};
use crate::domain::capture::ImageFormat;
use crate::domain::media::{Rect, Rgba, Size, VideoFrame};

/// Layers used to fake a gaussian shadow
const SHADOW_STEPS: u32 = 8;

pub struct SkiaCanvas {
    pixmap: Pixmap,
}

impl SkiaCanvas {
    pub fn new(size: Size) -> Result<Self, CanvasError> {
        Ok(Self {
            pixmap: Self::pixmap(size)?,
        })
    }

    fn pixmap(size: Size) -> Result<Pixmap, CanvasError> {
        Pixmap::new(size.width, size.height).ok_or(CanvasError::InvalidSize {
            width: size.width,
            height: size.height,
        })
    }

    fn skia_rect(rect: Rect) -> Option<tiny_skia::Rect> {
        tiny_skia::Rect::from_xywh(rect.x, rect.y, rect.width, rect.height)
    }

    fn paint(color: Rgba) -> Paint<'static> {
        let mut paint = Paint::default();
        paint.set_color(Color::from_rgba8(color.0, color.1, color.2, color.3));
        paint.anti_alias = true;
        paint
    }

    /// Straight-alpha RGBA bytes
    fn demultiplied(&self) -> Vec<u8> {
        self.pixmap
            .pixels()
            .iter()
            .flat_map(|p| {
                let c = p.demultiply();
                [c.red(), c.green(), c.blue(), c.alpha()]
            })
            .collect()
    }

    /// Straight RGB bytes with alpha dropped, for formats without alpha
    fn rgb(&self) -> Vec<u8> {
        self.pixmap
            .pixels()
            .iter()
            .flat_map(|p| {
                let c = p.demultiply();
                [c.red(), c.green(), c.blue()]
            })
            .collect()
    }
}

impl Canvas for SkiaCanvas {
    fn size(&self) -> Size {
        Size::new(self.pixmap.width(), self.pixmap.height())
    }

    fn resize(&mut self, size: Size) -> Result<(), CanvasError> {
        self.pixmap = Self::pixmap(size)?;
        Ok(())
    }

    fn clear(&mut self, color: Rgba) {
        self.pixmap
            .fill(Color::from_rgba8(color.0, color.1, color.2, color.3));
    }

    fn draw_frame(&mut self, frame: &VideoFrame, dest: Rect) -> Result<(), CanvasError> {
        let size = frame.size();
        let source = PixmapRef::from_bytes(frame.data(), size.width, size.height)
            .ok_or_else(|| CanvasError::InvalidFrame(format!("{}x{}", size.width, size.height)))?;

        let scale_x = dest.width / size.width as f32;
        let scale_y = dest.height / size.height as f32;
        let transform = Transform::from_row(scale_x, 0.0, 0.0, scale_y, dest.x, dest.y);
        let paint = PixmapPaint {
            quality: FilterQuality::Bilinear,
            ..PixmapPaint::default()
        };

        self.pixmap.draw_pixmap(0, 0, source, &paint, transform, None);
        Ok(())
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgba) {
        if let Some(rect) = Self::skia_rect(rect) {
            self.pixmap
                .fill_rect(rect, &Self::paint(color), Transform::identity(), None);
        }
    }

    fn stroke_rect(&mut self, rect: Rect, width: f32, color: Rgba) {
        let Some(rect) = Self::skia_rect(rect) else {
            return;
        };
        let path = PathBuilder::from_rect(rect);
        let stroke = Stroke {
            width,
            ..Stroke::default()
        };
        self.pixmap.stroke_path(
            &path,
            &Self::paint(color),
            &stroke,
            Transform::identity(),
            None,
        );
    }

    fn draw_shadow(&mut self, rect: Rect, blur: f32, color: Rgba) {
        // Concentric translucent layers, widest first
        let alpha = (color.3 as u32 / SHADOW_STEPS).max(1) as u8;
        for step in (1..=SHADOW_STEPS).rev() {
            let grow = blur * step as f32 / SHADOW_STEPS as f32;
            let layer = Rect::new(
                rect.x - grow,
                rect.y - grow,
                rect.width + grow * 2.0,
                rect.height + grow * 2.0,
            );
            self.fill_rect(layer, Rgba(color.0, color.1, color.2, alpha));
        }
    }

    fn snapshot(&self) -> VideoFrame {
        let size = self.size();
        VideoFrame::new(size, self.pixmap.data().to_vec())
            .unwrap_or_else(|| VideoFrame::solid(size, [0, 0, 0, 255]))
    }

    fn encode_image(&self, format: ImageFormat, quality: f32) -> Result<Vec<u8>, CanvasError> {
        let Size { width, height } = self.size();
        let mut buf = Vec::new();

        let result = match format {
            ImageFormat::Png => PngEncoder::new(&mut buf).write_image(
                &self.demultiplied(),
                width,
                height,
                ExtendedColorType::Rgba8,
            ),
            ImageFormat::Jpeg => {
                JpegEncoder::new_with_quality(&mut buf, jpeg_quality(quality)).write_image(
                    &self.rgb(),
                    width,
                    height,
                    ExtendedColorType::Rgb8,
                )
            }
            // Lossless; quality does not apply
            ImageFormat::Webp => WebPEncoder::new_lossless(&mut buf).write_image(
                &self.demultiplied(),
                width,
                height,
                ExtendedColorType::Rgba8,
            ),
        };

        result.map_err(|e| CanvasError::EncodeFailed(e.to_string()))?;
        Ok(buf)
    }
}

/// Map 0.0..=1.0 onto the JPEG 1..=100 scale
pub fn jpeg_quality(quality: f32) -> u8 {
    ((quality.clamp(0.0, 1.0) * 100.0).round() as u8).max(1)
}

/// Creates [`SkiaCanvas`] surfaces
#[derive(Debug, Default, Clone, Copy)]
pub struct SkiaCanvasFactory;

impl CanvasFactory for SkiaCanvasFactory {
    fn create(&self, size: Size) -> Result<Box<dyn Canvas>, CanvasError> {
        Ok(Box::new(SkiaCanvas::new(size)?))
    }
}
