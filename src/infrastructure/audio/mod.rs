//! Audio mixing adapters

mod graph;

pub use graph::{
    SummingAudioContext, SummingAudioContextFactory, MIX_CHANNELS, MIX_SAMPLE_RATE, MIX_TICK,
};
