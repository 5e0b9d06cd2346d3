//! Encoder adapters

mod ffmpeg;

pub use ffmpeg::{
    build_ffmpeg_args, parse_encoder_list, FfmpegEncoder, FfmpegEncoderFactory, InputFormat,
    OutputPlan,
};
