//! Media payloads, layout math and format negotiation

pub mod frame;
pub mod layout;
pub mod mime;

pub use frame::{AudioChunk, Size, VideoFrame};
pub use layout::{InsetLayout, Rect, Rgba};
