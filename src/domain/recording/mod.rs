//! Recording value objects

pub mod duration;

pub use duration::Duration;
