//! Raw media payloads carried by live tracks

use std::sync::Arc;

/// Width and height in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// width / height, or `None` when either side is zero
    pub fn aspect_ratio(&self) -> Option<f32> {
        if self.is_empty() {
            None
        } else {
            Some(self.width as f32 / self.height as f32)
        }
    }
}

/// One decoded video frame, RGBA8 with premultiplied alpha, row-major,
/// no row padding.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    size: Size,
    data: Arc<Vec<u8>>,
}

impl VideoFrame {
    /// Returns `None` if `data` does not hold exactly `width * height` pixels
    pub fn new(size: Size, data: Vec<u8>) -> Option<Self> {
        let expected = size.width as usize * size.height as usize * 4;
        if data.len() != expected {
            return None;
        }
        Some(Self {
            size,
            data: Arc::new(data),
        })
    }

    /// Frame filled with a single colour
    pub fn solid(size: Size, rgba: [u8; 4]) -> Self {
        let pixels = size.width as usize * size.height as usize;
        let data = rgba.iter().copied().cycle().take(pixels * 4).collect();
        Self {
            size,
            data: Arc::new(data),
        }
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// RGBA value at (x, y)
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.size.width || y >= self.size.height {
            return None;
        }
        let offset = (y as usize * self.size.width as usize + x as usize) * 4;
        let px = self.data.get(offset..offset + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

/// Interleaved f32 PCM samples
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub sample_rate: u32,
    pub channels: u16,
    samples: Arc<Vec<f32>>,
}

impl AudioChunk {
    pub fn new(sample_rate: u32, channels: u16, samples: Vec<f32>) -> Self {
        Self {
            sample_rate,
            channels,
            samples: Arc::new(samples),
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rejects_wrong_length() {
        assert!(VideoFrame::new(Size::new(2, 2), vec![0; 15]).is_none());
        assert!(VideoFrame::new(Size::new(2, 2), vec![0; 16]).is_some());
    }

    #[test]
    fn solid_frame_pixels() {
        let frame = VideoFrame::solid(Size::new(3, 2), [10, 20, 30, 255]);
        assert_eq!(frame.data().len(), 24);
        assert_eq!(frame.pixel(2, 1), Some([10, 20, 30, 255]));
        assert_eq!(frame.pixel(3, 0), None);
    }

    #[test]
    fn aspect_ratio_of_empty_size() {
        assert_eq!(Size::new(0, 720).aspect_ratio(), None);
        assert_eq!(Size::new(1280, 720).aspect_ratio(), Some(1280.0 / 720.0));
    }

    #[test]
    fn audio_chunk_frames() {
        let chunk = AudioChunk::new(48_000, 2, vec![0.0; 960]);
        assert_eq!(chunk.frames(), 480);
    }
}
