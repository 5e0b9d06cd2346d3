//! Picture-in-picture geometry for the composed video

use super::frame::Size;

/// Inset width as a fraction of the surface width
pub const INSET_WIDTH_FRACTION: f32 = 0.20;
/// Gap between inset and surface edge, as a fraction of the surface width
pub const INSET_PADDING_FRACTION: f32 = 0.02;
/// Aspect ratio used when the camera has not reported its size
pub const FALLBACK_ASPECT_RATIO: f32 = 16.0 / 9.0;
pub const BORDER_WIDTH_FRACTION: f32 = 0.0025;
pub const MIN_BORDER_WIDTH: f32 = 2.0;
pub const SHADOW_BLUR: f32 = 20.0;

/// RGBA colour, straight alpha
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba(pub u8, pub u8, pub u8, pub u8);

impl Rgba {
    pub const WHITE: Self = Self(255, 255, 255, 255);
    pub const BLACK: Self = Self(0, 0, 0, 255);
    pub const SHADOW: Self = Self(0, 0, 0, 128);
}

/// Axis-aligned rectangle in surface pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The whole surface
    pub fn fill(size: Size) -> Self {
        Self::new(0.0, 0.0, size.width as f32, size.height as f32)
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

/// Where and how the camera inset is drawn
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InsetLayout {
    pub rect: Rect,
    pub border_width: f32,
    pub border_color: Rgba,
    pub shadow_blur: f32,
    pub shadow_color: Rgba,
}

impl InsetLayout {
    /// Bottom-right inset for a surface of `surface` size showing a source of
    /// `source` size. The inset keeps the source's aspect ratio.
    pub fn bottom_right(surface: Size, source: Size) -> Self {
        let surface_width = surface.width as f32;
        let surface_height = surface.height as f32;

        let aspect = source.aspect_ratio().unwrap_or(FALLBACK_ASPECT_RATIO);
        let width = surface_width * INSET_WIDTH_FRACTION;
        let height = width / aspect;
        let padding = surface_width * INSET_PADDING_FRACTION;

        Self {
            rect: Rect::new(
                surface_width - width - padding,
                surface_height - height - padding,
                width,
                height,
            ),
            border_width: (surface_width * BORDER_WIDTH_FRACTION).max(MIN_BORDER_WIDTH),
            border_color: Rgba::WHITE,
            shadow_blur: SHADOW_BLUR,
            shadow_color: Rgba::SHADOW,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 0.01
    }

    #[test]
    fn inset_is_fifth_of_width_in_bottom_right() {
        let layout = InsetLayout::bottom_right(Size::new(1920, 1080), Size::new(1280, 720));
        assert!(approx(layout.rect.width, 384.0));
        assert!(approx(layout.rect.height, 216.0));
        // 2% padding = 38.4px from right and bottom edges
        assert!(approx(layout.rect.right(), 1920.0 - 38.4));
        assert!(approx(layout.rect.bottom(), 1080.0 - 38.4));
    }

    #[test]
    fn inset_keeps_portrait_camera_ratio() {
        let layout = InsetLayout::bottom_right(Size::new(1000, 1000), Size::new(480, 640));
        assert!(approx(layout.rect.width, 200.0));
        assert!(approx(layout.rect.height, 200.0 * 640.0 / 480.0));
    }

    #[test]
    fn unknown_camera_size_falls_back_to_widescreen() {
        let layout = InsetLayout::bottom_right(Size::new(1600, 900), Size::new(0, 0));
        assert!(approx(layout.rect.width / layout.rect.height, 16.0 / 9.0));
    }

    #[test]
    fn border_has_minimum_width() {
        let small = InsetLayout::bottom_right(Size::new(320, 240), Size::new(16, 9));
        assert!(approx(small.border_width, MIN_BORDER_WIDTH));
        let large = InsetLayout::bottom_right(Size::new(3840, 2160), Size::new(16, 9));
        assert!(approx(large.border_width, 9.6));
    }
}
